//! SSH sessions: password authentication, an interactive PTY shell channel
//! and short-lived exec channels for completion data.
//!
//! All network I/O runs on the shared Tokio runtime. Callers never block
//! except in [`RemoteSession::commands`] / [`RemoteSession::directories`]
//! with [`FetchPolicy::AllowFetch`], which wait at most `exec_timeout`.

use crate::completion::{FetchPolicy, RemoteCompletionSource};
use crate::reader::LineAssembler;
use crate::scrollback::ScrollbackBuffer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use russh::client;
use russh::{ChannelMsg, Disconnect};
use secrecy::{ExposeSecret, SecretString};
use settings::constants::ssh::{COMMAND_LIST, HELP_PREAMBLE_LINES, PTY_COLUMNS, PTY_ROWS, TERM};
use settings::SshConfig;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use util::TtlCache;

const COMMANDS_KEY: &str = "commands";

/// Connection parameters for one remote session.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub default_port: u16,
    pub connect_timeout: Duration,
    /// Overall bound for exec channels (command and directory fetches).
    pub exec_timeout: Duration,
    pub command_ttl: Duration,
    /// Output substrings after which `help` is sent to collect command names.
    pub ready_patterns: Vec<String>,
}

impl From<&SshConfig> for RemoteConfig {
    fn from(config: &SshConfig) -> Self {
        Self {
            default_port: config.default_port,
            connect_timeout: config.connect_timeout(),
            exec_timeout: config.exec_timeout(),
            command_ttl: config.command_cache_ttl(),
            ready_patterns: config.ready_patterns.clone(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self::from(&SshConfig::default())
    }
}

/// `user@host[:port]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub user: String,
    pub host: String,
    pub port: u16,
}

impl SshTarget {
    /// Parse an `ssh user@host[:port]` command line.
    pub fn parse(command: &str, default_port: u16) -> Result<Self> {
        let mut parts = command.split_whitespace();
        if parts.next() != Some("ssh") {
            anyhow::bail!("Usage: ssh user@host");
        }
        let Some(user_host) = parts.next() else {
            anyhow::bail!("Usage: ssh user@host");
        };
        let (user, host_port) = match user_host.split_once('@') {
            Some((user, rest)) if !user.is_empty() && !rest.is_empty() && !rest.contains('@') => {
                (user, rest)
            }
            _ => anyhow::bail!("Invalid SSH command. Use ssh user@host"),
        };
        let (host, port) = match host_port.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .ok()
                    .filter(|p| *p > 0)
                    .with_context(|| format!("Invalid SSH port: {}", port))?;
                (host, port)
            }
            None => (host_port, default_port),
        };
        if host.is_empty() {
            anyhow::bail!("Invalid SSH command. Use ssh user@host");
        }
        Ok(Self {
            user: user.to_string(),
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for SshTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.host)?;
        if self.port != settings::constants::ssh::DEFAULT_PORT {
            write!(f, ":{}", self.port)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteState {
    Disconnected,
    /// TCP connect and key exchange in progress.
    Connecting,
    /// Transport is up; waiting for the user to type a password.
    AwaitingPassword,
    Authenticating,
    Connected,
}

struct ClientHandler;

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh_keys::key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Host keys are not verified.
        Ok(true)
    }
}

type SshHandle = client::Handle<ClientHandler>;

/// Where the shell output stands relative to the `help` listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HelpScan {
    /// No ready banner seen yet.
    Waiting,
    /// `help` was sent; its first entry has not arrived.
    Requested { skipped: usize },
    /// Inside the listing.
    Reading,
    /// The listing ended (or never came). Later output is not scanned.
    Done,
}

#[derive(Debug, PartialEq, Eq)]
enum HelpEvent {
    Nothing,
    RequestHelp,
    Command(String),
}

impl HelpScan {
    fn observe(&mut self, line: &str, ready_patterns: &[String]) -> HelpEvent {
        match *self {
            Self::Waiting => {
                let ready = ready_patterns
                    .iter()
                    .any(|p| !p.is_empty() && line.contains(p.as_str()));
                if !ready {
                    return HelpEvent::Nothing;
                }
                *self = Self::Requested { skipped: 0 };
                HelpEvent::RequestHelp
            }
            Self::Requested { skipped } => match parse_help_line(line) {
                Some(name) => {
                    *self = Self::Reading;
                    HelpEvent::Command(name)
                }
                None => {
                    let skipped = skipped + 1;
                    *self = if skipped >= HELP_PREAMBLE_LINES {
                        tracing::debug!("No help listing after {} lines", skipped);
                        Self::Done
                    } else {
                        Self::Requested { skipped }
                    };
                    HelpEvent::Nothing
                }
            },
            Self::Reading => match parse_help_line(line) {
                Some(name) => HelpEvent::Command(name),
                None => {
                    *self = Self::Done;
                    HelpEvent::Nothing
                }
            },
            Self::Done => HelpEvent::Nothing,
        }
    }
}

enum Connection {
    None,
    /// Transport established, not yet authenticated.
    Pending(SshHandle),
    Ready(Arc<SshHandle>),
}

struct Inner {
    config: RemoteConfig,
    scrollback: ScrollbackBuffer,
    state: Mutex<RemoteState>,
    target: Mutex<Option<SshTarget>>,
    connection: Mutex<Connection>,
    input: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    cwd: Mutex<String>,
    /// Bumped by every connect and shutdown; tasks from older attempts go quiet.
    generation: AtomicU64,
    help: Mutex<HelpScan>,
    commands: TtlCache<Vec<String>>,
    directories: TtlCache<Vec<String>>,
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn set_state(&self, state: RemoteState) {
        let mut current = self.state.lock();
        if *current != state {
            tracing::debug!("Remote state {:?} -> {:?}", *current, state);
            *current = state;
        }
    }

    /// Report a failed connect or login and return to the disconnected state.
    fn fail(&self, generation: u64, error: &anyhow::Error) {
        if !self.is_current(generation) {
            return;
        }
        tracing::warn!("SSH connection failed: {:#}", error);
        self.scrollback
            .append_line(&format!("SSH connection failed: {}", error));
        self.reset();
    }

    fn reset(&self) {
        self.input.lock().take();
        let connection = std::mem::replace(&mut *self.connection.lock(), Connection::None);
        disconnect(connection);
        self.target.lock().take();
        *self.help.lock() = HelpScan::Waiting;
        self.set_state(RemoteState::Disconnected);
    }

    fn on_line(&self, line: String) {
        let event = self.help.lock().observe(&line, &self.config.ready_patterns);
        match event {
            HelpEvent::RequestHelp => {
                if let Some(input) = self.input.lock().as_ref() {
                    tracing::debug!("Remote console ready, requesting command list");
                    let _ = input.send(b"help\n".to_vec());
                }
            }
            HelpEvent::Command(name) => {
                let mut names = self.commands.get(COMMANDS_KEY).unwrap_or_default();
                if !names.contains(&name) {
                    names.push(name);
                    names.sort();
                    self.commands.insert(COMMANDS_KEY, names);
                }
            }
            HelpEvent::Nothing => {}
        }

        let is_logout = line.trim() == "logout";
        self.scrollback.append_line(&line);
        if is_logout {
            self.close_with_notice("Logged out.");
        }
    }

    fn close_with_notice(&self, notice: &str) {
        if *self.state.lock() != RemoteState::Connected {
            return;
        }
        let target = self
            .target
            .lock()
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        tracing::info!("Remote session to {} closed", target);
        self.scrollback
            .append_line(&format!("{} Disconnected from {}.", notice, target));
        self.reset();
    }

    fn ready_handle(&self) -> Option<Arc<SshHandle>> {
        match &*self.connection.lock() {
            Connection::Ready(handle) => Some(handle.clone()),
            _ => None,
        }
    }
}

fn disconnect(connection: Connection) {
    let send = |handle: Arc<SshHandle>| {
        let task = async move {
            if let Err(e) = handle
                .disconnect(Disconnect::ByApplication, "", "English")
                .await
            {
                tracing::debug!("SSH disconnect: {}", e);
            }
        };
        if let Err(e) = runtime::spawn(task) {
            tracing::debug!("SSH disconnect not sent: {:#}", e);
        }
    };
    match connection {
        Connection::None => {}
        Connection::Pending(handle) => send(Arc::new(handle)),
        Connection::Ready(handle) => send(handle),
    }
}

/// An SSH login flow and, once authenticated, its interactive shell.
pub struct RemoteSession {
    inner: Arc<Inner>,
}

impl RemoteSession {
    pub fn new(config: RemoteConfig, scrollback: ScrollbackBuffer) -> Self {
        let command_ttl = config.command_ttl;
        Self {
            inner: Arc::new(Inner {
                config,
                scrollback,
                state: Mutex::new(RemoteState::Disconnected),
                target: Mutex::new(None),
                connection: Mutex::new(Connection::None),
                input: Mutex::new(None),
                cwd: Mutex::new("~".to_string()),
                generation: AtomicU64::new(0),
                help: Mutex::new(HelpScan::Waiting),
                commands: TtlCache::new(command_ttl),
                directories: TtlCache::new(command_ttl),
            }),
        }
    }

    pub fn state(&self) -> RemoteState {
        *self.inner.state.lock()
    }

    pub fn target(&self) -> Option<SshTarget> {
        self.inner.target.lock().clone()
    }

    pub fn current_directory(&self) -> String {
        self.inner.cwd.lock().clone()
    }

    pub fn set_current_directory(&self, dir: String) {
        *self.inner.cwd.lock() = dir;
    }

    /// Start connecting for an `ssh user@host[:port]` command line.
    ///
    /// Returns immediately. The password prompt is written to the scrollback
    /// once the transport is up; failures are written there too.
    pub fn connect(&self, command: &str) {
        if self.state() != RemoteState::Disconnected {
            self.inner
                .scrollback
                .append_line("An SSH session is already active.");
            return;
        }
        self.inner.scrollback.append_line("Connecting...");
        let target = match SshTarget::parse(command, self.inner.config.default_port) {
            Ok(target) => target,
            Err(e) => {
                self.inner.scrollback.append_line(&e.to_string());
                return;
            }
        };

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.inner.target.lock() = Some(target.clone());
        self.inner.set_state(RemoteState::Connecting);
        tracing::info!("Connecting to {}", target);

        let inner = self.inner.clone();
        let task = async move {
            let address = format!("{}:{}", target.host, target.port);
            let config = Arc::new(client::Config::default());
            let connect = client::connect(config, address, ClientHandler);
            let result = match tokio::time::timeout(inner.config.connect_timeout, connect).await {
                Ok(Ok(handle)) => Ok(handle),
                Ok(Err(e)) => Err(anyhow::Error::from(e)),
                Err(_) => Err(anyhow::anyhow!(
                    "timed out after {}s",
                    inner.config.connect_timeout.as_secs()
                )),
            };
            match result {
                Ok(handle) if inner.is_current(generation) => {
                    *inner.connection.lock() = Connection::Pending(handle);
                    inner.set_state(RemoteState::AwaitingPassword);
                    inner.scrollback.append("Password: ");
                }
                Ok(handle) => disconnect(Connection::Pending(handle)),
                Err(e) => inner.fail(generation, &e),
            }
        };
        if let Err(e) = runtime::spawn(task) {
            self.inner.fail(generation, &e);
        }
    }

    /// Jump straight to the password prompt for `target` with no transport
    /// behind it. Submitting a password then fails like a dropped connection.
    #[cfg(any(test, feature = "test-support"))]
    pub fn prompt_for_password(&self, target: SshTarget) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        *self.inner.target.lock() = Some(target);
        self.inner.set_state(RemoteState::AwaitingPassword);
        self.inner.scrollback.append("Password: ");
    }

    /// Log in with `password` and open the shell channel.
    ///
    /// The secret is dropped (and zeroed) as soon as the attempt finishes.
    pub fn authenticate(&self, password: SecretString) {
        if self.state() != RemoteState::AwaitingPassword {
            tracing::debug!("authenticate called in state {:?}", self.state());
            return;
        }
        let generation = self.inner.generation.load(Ordering::SeqCst);
        let previous = std::mem::replace(&mut *self.inner.connection.lock(), Connection::None);
        let Connection::Pending(handle) = previous else {
            self.inner
                .fail(generation, &anyhow::anyhow!("no pending connection"));
            return;
        };
        let Some(target) = self.target() else {
            self.inner.fail(generation, &anyhow::anyhow!("no target"));
            return;
        };
        self.inner.set_state(RemoteState::Authenticating);
        self.inner.scrollback.append("\n");

        let inner = self.inner.clone();
        let task = async move {
            let opened = open_shell(handle, &target.user, password).await;
            let (handle, channel) = match opened {
                Ok(opened) => opened,
                Err(e) => {
                    inner.fail(generation, &e);
                    return;
                }
            };
            if !inner.is_current(generation) {
                disconnect(Connection::Ready(Arc::new(handle)));
                return;
            }

            let (tx, rx) = mpsc::unbounded_channel();
            *inner.connection.lock() = Connection::Ready(Arc::new(handle));
            *inner.input.lock() = Some(tx);
            *inner.cwd.lock() = "~".to_string();
            inner.set_state(RemoteState::Connected);
            inner.scrollback.append_line("Connected.");
            tracing::info!("Connected to {}", target);

            run_shell_channel(&inner, channel, rx).await;

            if inner.is_current(generation) {
                inner.close_with_notice("Connection closed.");
            }
        };
        if let Err(e) = runtime::spawn(task) {
            self.inner.fail(generation, &e);
        }
    }

    /// Write `text` and a newline to the remote shell.
    pub fn send_line(&self, text: &str) -> Result<()> {
        let input = self.inner.input.lock();
        let sender = input.as_ref().context("SSH channel is not open")?;
        sender
            .send(format!("{}\n", text).into_bytes())
            .map_err(|_| anyhow::anyhow!("SSH channel is closed"))
    }

    /// Close the channel and transport. Safe to call in any state, repeatedly.
    pub fn shutdown(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if self.state() == RemoteState::Disconnected {
            return;
        }
        tracing::info!("Shutting down SSH session");
        self.inner.reset();
    }

    fn fetch(&self, command: String) -> Result<String> {
        let handle = self
            .inner
            .ready_handle()
            .context("SSH session is not connected")?;
        runtime::block_on_timeout(self.inner.config.exec_timeout, exec_capture(handle, command))
    }
}

impl Drop for RemoteSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl RemoteCompletionSource for RemoteSession {
    fn commands(&self, prefix: &str, policy: FetchPolicy) -> Vec<String> {
        let names = match self.inner.commands.get(COMMANDS_KEY) {
            Some(names) => names,
            None if policy == FetchPolicy::AllowFetch && self.state() == RemoteState::Connected => {
                match self.fetch(COMMAND_LIST.to_string()) {
                    Ok(output) => {
                        let mut names: Vec<String> = output
                            .lines()
                            .map(str::trim)
                            .filter(|l| !l.is_empty())
                            .map(str::to_string)
                            .collect();
                        names.sort();
                        names.dedup();
                        self.inner.commands.insert(COMMANDS_KEY, names.clone());
                        names
                    }
                    Err(e) => {
                        tracing::warn!("Remote command list unavailable: {:#}", e);
                        return Vec::new();
                    }
                }
            }
            None => return Vec::new(),
        };
        let prefix = prefix.to_lowercase();
        names
            .into_iter()
            .filter(|n| n.to_lowercase().starts_with(&prefix))
            .collect()
    }

    fn directories(&self, path: &str, policy: FetchPolicy) -> Vec<String> {
        if let Some(entries) = self.inner.directories.get(path) {
            return entries;
        }
        if policy != FetchPolicy::AllowFetch || self.state() != RemoteState::Connected {
            return Vec::new();
        }
        match self.fetch(format!("ls -1p -- {}", shell_path(path))) {
            Ok(output) => {
                let entries = parse_directory_listing(&output);
                self.inner.directories.insert(path, entries.clone());
                entries
            }
            Err(e) => {
                tracing::warn!("Remote listing of {} failed: {:#}", path, e);
                Vec::new()
            }
        }
    }
}

async fn open_shell(
    mut handle: SshHandle,
    user: &str,
    password: SecretString,
) -> Result<(SshHandle, russh::Channel<client::Msg>)> {
    let authenticated = handle
        .authenticate_password(user, password.expose_secret())
        .await
        .context("authentication error")?;
    drop(password);
    if !authenticated {
        anyhow::bail!("Authentication failed");
    }

    let mut channel = handle
        .channel_open_session()
        .await
        .context("Failed to open session channel")?;
    channel
        .request_pty(false, TERM, PTY_COLUMNS, PTY_ROWS, 0, 0, &[])
        .await
        .context("Failed to request PTY")?;
    channel
        .request_shell(true)
        .await
        .context("Failed to start remote shell")?;
    Ok((handle, channel))
}

async fn run_shell_channel(
    inner: &Inner,
    mut channel: russh::Channel<client::Msg>,
    mut input: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    let mut assembler = LineAssembler::new();
    loop {
        tokio::select! {
            data = input.recv() => match data {
                Some(bytes) => {
                    if let Err(e) = channel.data(&bytes[..]).await {
                        tracing::warn!("SSH write failed: {}", e);
                        inner.scrollback.append_line(&format!("Error writing to SSH channel: {}", e));
                        break;
                    }
                }
                None => {
                    let _ = channel.eof().await;
                    break;
                }
            },
            msg = channel.wait() => match msg {
                Some(ChannelMsg::Data { data }) | Some(ChannelMsg::ExtendedData { data, .. }) => {
                    for line in assembler.push(&data) {
                        inner.on_line(line);
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    tracing::debug!("Remote shell exited with {}", exit_status);
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => break,
                Some(_) => {}
            },
        }
    }
    if let Some(tail) = assembler.finish() {
        inner.on_line(tail);
    }
}

async fn exec_capture(handle: Arc<SshHandle>, command: String) -> Result<String> {
    let mut channel = handle
        .channel_open_session()
        .await
        .context("Failed to open exec channel")?;
    channel
        .exec(true, command)
        .await
        .context("Failed to run remote command")?;
    let mut output = Vec::new();
    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { data } => output.extend_from_slice(&data),
            ChannelMsg::Eof | ChannelMsg::Close => break,
            _ => {}
        }
    }
    Ok(String::from_utf8_lossy(&output).into_owned())
}

/// Command name from a `help` output line such as `/gamemode <mode>` or
/// `[12:00:00 INFO]: /tp <target>`.
pub fn parse_help_line(line: &str) -> Option<String> {
    let body = match line.rfind(": /") {
        Some(idx) => &line[idx + 2..],
        None => line.trim_start(),
    };
    let name: String = body
        .strip_prefix('/')?
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != ':')
        .collect();
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'));
    valid.then_some(name)
}

/// Directory names from `ls -1p` output (entries ending in `/`).
pub fn parse_directory_listing(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.trim_end_matches('\r').strip_suffix('/'))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Quote a remote path for `sh`, keeping a leading `~` expandable.
fn shell_path(path: &str) -> String {
    let quote = |s: &str| format!("'{}'", s.replace('\'', r"'\''"));
    if path == "~" {
        "~".to_string()
    } else if let Some(rest) = path.strip_prefix("~/") {
        format!("~/{}", quote(rest))
    } else {
        quote(path)
    }
}
