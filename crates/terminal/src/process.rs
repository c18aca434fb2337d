//! Local shell and server process sessions.

use crate::pid_file::PidFile;
use crate::reader::spawn_line_reader;
use crate::scrollback::ScrollbackBuffer;
use crate::state::{PatternMatcher, ProcessState, ShellMatcher, StateMatcher};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use settings::constants::process::{DIRECTORY_MARKER, REAP_TIMEOUT, STDERR_PREFIX};
use settings::{Config, ServerConfig};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const TERMINATED_NOTICE: &str = "Terminal process and its child processes terminated.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionKind {
    /// Interactive shell owned by the tab.
    Shell,
    /// Long-lived child that may outlive the tab (see [`ProcessHandle::Detached`]).
    Server { jar: Option<PathBuf> },
}

/// What to run and where.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub kind: SessionKind,
    /// Overrides the directory passed to [`ProcessSession::launch`].
    pub working_dir: Option<PathBuf>,
}

impl LaunchSpec {
    /// The user's shell, or the platform default.
    pub fn shell(config: &Config) -> Self {
        let (program, args) = match &config.shell {
            Some(shell) => (shell.clone(), config.shell_args.clone()),
            None => default_shell(),
        };
        Self {
            program,
            args,
            kind: SessionKind::Shell,
            working_dir: None,
        }
    }

    /// `java -jar <jar> <args>` run from the jar's directory.
    pub fn server(config: &ServerConfig, jar: Option<PathBuf>) -> Self {
        let mut args = Vec::new();
        if let Some(jar) = &jar {
            args.push("-jar".to_string());
            args.push(jar.to_string_lossy().into_owned());
        }
        args.extend(config.args.iter().cloned());
        let working_dir = jar.as_ref().and_then(|j| j.parent()).map(Path::to_path_buf);
        Self {
            program: config.java.clone(),
            args,
            kind: SessionKind::Server { jar },
            working_dir,
        }
    }

    pub fn is_server(&self) -> bool {
        matches!(self.kind, SessionKind::Server { .. })
    }
}

#[cfg(windows)]
fn default_shell() -> (String, Vec<String>) {
    (
        "cmd.exe".to_string(),
        vec!["/k".to_string(), "powershell".to_string()],
    )
}

#[cfg(not(windows))]
fn default_shell() -> (String, Vec<String>) {
    let shell = std::env::var("SHELL")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "/bin/sh".to_string());
    (shell, Vec::new())
}

/// A process spawned by this run, with its pipes.
pub struct OwnedProcess {
    pid: u32,
    child: Mutex<Child>,
    stdin: Option<ChildStdin>,
    readers: Vec<thread::JoinHandle<()>>,
}

impl OwnedProcess {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    fn is_running(&self) -> bool {
        matches!(self.child.lock().try_wait(), Ok(None))
    }
}

/// A process found through the PID file. Only its PID is known.
#[derive(Debug, Clone, Copy)]
pub struct DetachedProcess {
    pid: u32,
}

impl DetachedProcess {
    pub fn pid(&self) -> u32 {
        self.pid
    }
}

pub enum ProcessHandle {
    Owned(OwnedProcess),
    Detached(DetachedProcess),
}

impl ProcessHandle {
    pub fn pid(&self) -> u32 {
        match self {
            Self::Owned(p) => p.pid,
            Self::Detached(p) => p.pid,
        }
    }

    fn is_alive(&self) -> bool {
        match self {
            Self::Owned(p) => p.is_running(),
            Self::Detached(p) => platform::is_process_alive(p.pid),
        }
    }
}

/// State shared with the reader threads.
struct Shared {
    scrollback: ScrollbackBuffer,
    state: Mutex<ProcessState>,
    cwd: Mutex<PathBuf>,
    matcher: Box<dyn StateMatcher>,
}

impl Shared {
    fn ingest(&self, text: &str) {
        for line in text.split('\n') {
            let line = line.trim_end_matches('\r');
            if let Some(dir) = line.strip_prefix(DIRECTORY_MARKER) {
                let dir = dir.trim();
                if !dir.is_empty() {
                    tracing::debug!("Working directory reported: {}", dir);
                    *self.cwd.lock() = PathBuf::from(dir);
                }
            }
            if let Some(next) = self.matcher.classify(line) {
                let mut state = self.state.lock();
                let advanced = state.advance(next);
                if advanced != *state {
                    tracing::info!("Process state {:?} -> {:?}", *state, advanced);
                    *state = advanced;
                }
            }
        }
        self.scrollback.append(text);
    }

    fn set_state(&self, state: ProcessState) {
        *self.state.lock() = state;
    }
}

/// One local process (interactive shell or server) and its output.
pub struct ProcessSession {
    spec: LaunchSpec,
    pid_file: Option<PidFile>,
    shared: Arc<Shared>,
    handle: Option<ProcessHandle>,
    alive: Arc<AtomicBool>,
}

impl ProcessSession {
    pub fn new(spec: LaunchSpec, scrollback: ScrollbackBuffer) -> Self {
        let matcher: Box<dyn StateMatcher> = if spec.is_server() {
            Box::new(PatternMatcher::from_config(&ServerConfig::default()))
        } else {
            Box::new(ShellMatcher)
        };
        let cwd = std::env::current_dir().unwrap_or_default();
        Self {
            spec,
            pid_file: None,
            shared: Arc::new(Shared {
                scrollback,
                state: Mutex::new(ProcessState::NotStarted),
                cwd: Mutex::new(cwd),
                matcher,
            }),
            handle: None,
            alive: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_pid_file(mut self, pid_file: PidFile) -> Self {
        self.pid_file = Some(pid_file);
        self
    }

    /// Replace the output matcher. Only valid before launch.
    pub fn with_matcher(mut self, matcher: impl StateMatcher + 'static) -> Self {
        match Arc::get_mut(&mut self.shared) {
            Some(shared) => shared.matcher = Box::new(matcher),
            None => util::debug_panic!("with_matcher called after launch"),
        }
        self
    }

    pub fn spec(&self) -> &LaunchSpec {
        &self.spec
    }

    pub fn scrollback(&self) -> &ScrollbackBuffer {
        &self.shared.scrollback
    }

    /// Start the process, or reattach to the one recorded in the PID file.
    ///
    /// Failures are written to the scrollback as one line and also returned.
    pub fn launch(&mut self, working_dir: &Path) -> Result<()> {
        match self.handle.take() {
            Some(ProcessHandle::Detached(detached)) if platform::is_process_alive(detached.pid) => {
                self.handle = Some(ProcessHandle::Detached(detached));
                self.shared
                    .scrollback
                    .append_line(&format!("Server process {} is already running.", detached.pid));
                return Ok(());
            }
            Some(ProcessHandle::Owned(process)) => {
                tracing::info!("Relaunching; terminating previous process");
                self.kill_owned(process);
            }
            _ => {}
        }

        if self.try_reattach() {
            return Ok(());
        }

        match self.spawn(working_dir) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.shared
                    .scrollback
                    .append_line(&format!("Failed to start process: {:#}", e));
                self.shared.set_state(ProcessState::NotStarted);
                self.alive.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    fn try_reattach(&mut self) -> bool {
        let Some(pid_file) = &self.pid_file else {
            return false;
        };
        let Some(pid) = pid_file.read() else {
            return false;
        };
        if !platform::is_process_alive(pid) {
            tracing::info!("Stale PID file for {}, removing", pid);
            pid_file.remove();
            return false;
        }

        tracing::info!("Reattaching to running process {}", pid);
        self.handle = Some(ProcessHandle::Detached(DetachedProcess { pid }));
        self.shared.set_state(ProcessState::Running);
        self.shared.scrollback.append_line(&format!(
            "Reattached to running server process {}. Output is unavailable for a process started by an earlier session.",
            pid
        ));
        true
    }

    fn spawn(&mut self, working_dir: &Path) -> Result<()> {
        if let SessionKind::Server { jar } = &self.spec.kind {
            let jar = jar.as_ref().context("No server JAR specified.")?;
            if !jar.is_file() {
                anyhow::bail!("Server JAR not found at: {}", jar.display());
            }
        }

        let dir = self.spec.working_dir.as_deref().unwrap_or(working_dir);
        let mut command = Command::new(&self.spec.program);
        command
            .args(&self.spec.args)
            .current_dir(dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.spec.program))?;
        let pid = child.id();
        let stdin = child.stdin.take();
        let stdout = child.stdout.take().context("Failed to capture stdout")?;
        let stderr = child.stderr.take().context("Failed to capture stderr")?;

        self.alive = Arc::new(AtomicBool::new(true));
        *self.shared.cwd.lock() = dir.to_path_buf();

        let shared = self.shared.clone();
        let stdout_reader = spawn_line_reader(
            format!("stdout-{}", pid),
            stdout,
            self.alive.clone(),
            move |line| shared.ingest(&format!("{}\n", line)),
        );
        let shared = self.shared.clone();
        let stderr_reader = spawn_line_reader(
            format!("stderr-{}", pid),
            stderr,
            self.alive.clone(),
            move |line| shared.ingest(&format!("{}{}\n", STDERR_PREFIX, line)),
        );
        let readers = match (stdout_reader, stderr_reader) {
            (Ok(out), Ok(err)) => vec![out, err],
            (Err(e), _) | (_, Err(e)) => {
                self.alive.store(false, Ordering::SeqCst);
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        };

        self.handle = Some(ProcessHandle::Owned(OwnedProcess {
            pid,
            child: Mutex::new(child),
            stdin,
            readers,
        }));

        if self.spec.is_server() {
            if let Some(pid_file) = &self.pid_file {
                if let Err(e) = pid_file.write(pid) {
                    tracing::warn!("{:#}", e);
                }
            }
            self.shared.set_state(ProcessState::Starting);
            self.shared.scrollback.append_line("Server process started.");
        } else {
            self.shared.set_state(ProcessState::Running);
        }
        tracing::info!(pid, program = %self.spec.program, dir = %dir.display(), "Process launched");
        Ok(())
    }

    /// Write `text` and a newline to the process's stdin.
    pub fn send_line(&mut self, text: &str) -> Result<()> {
        match &mut self.handle {
            Some(ProcessHandle::Owned(process)) => {
                let stdin = process
                    .stdin
                    .as_mut()
                    .context("Writer is not initialized.")?;
                stdin
                    .write_all(format!("{}\n", text).as_bytes())
                    .and_then(|_| stdin.flush())
                    .context("Failed to write to process")
            }
            Some(ProcessHandle::Detached(process)) => anyhow::bail!(
                "Process {} was not started by this session; input is unavailable.",
                process.pid
            ),
            None => anyhow::bail!("Writer is not initialized."),
        }
    }

    /// Stop the session. Owned processes are killed with their whole tree;
    /// detached ones are left running. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        let Some(handle) = self.handle.take() else {
            return;
        };
        match handle {
            ProcessHandle::Detached(detached) => {
                tracing::info!("Leaving detached process {} running", detached.pid);
                self.shared.set_state(ProcessState::Detached);
                self.shared.scrollback.append_line(&format!(
                    "Server process {} detached, still running.",
                    detached.pid
                ));
            }
            ProcessHandle::Owned(process) => self.kill_owned(process),
        }
    }

    fn kill_owned(&self, mut process: OwnedProcess) {
        self.alive.store(false, Ordering::SeqCst);
        drop(process.stdin.take());

        if process.is_running() {
            if let Err(e) = platform::kill_process_tree(process.pid) {
                tracing::warn!("Failed to kill process tree {}: {:#}", process.pid, e);
            }
        }
        reap(&process);
        for reader in process.readers.drain(..) {
            if reader.is_finished() && reader.join().is_err() {
                tracing::warn!("Reader thread for {} panicked", process.pid);
            }
        }

        if let Some(pid_file) = &self.pid_file {
            pid_file.remove();
        }
        let state = *self.shared.state.lock();
        if state != ProcessState::Crashed {
            self.shared.set_state(ProcessState::Stopped);
        }
        self.shared.scrollback.append_line(TERMINATED_NOTICE);
        tracing::info!("Process {} terminated", process.pid);
    }

    /// Current state, noticing processes that exited on their own.
    pub fn state(&self) -> ProcessState {
        if let Some(ProcessHandle::Owned(process)) = &self.handle {
            if let Ok(Some(status)) = process.child.lock().try_wait() {
                let mut state = self.shared.state.lock();
                if state.is_active() {
                    let next = if self.spec.is_server() && !status.success() {
                        ProcessState::Crashed
                    } else {
                        ProcessState::Stopped
                    };
                    tracing::info!("Process {} exited ({}), now {:?}", process.pid, status, next);
                    *state = next;
                    if let Some(pid_file) = &self.pid_file {
                        pid_file.remove();
                    }
                }
            }
        }
        *self.shared.state.lock()
    }

    pub fn is_alive(&self) -> bool {
        self.handle.as_ref().is_some_and(ProcessHandle::is_alive)
    }

    pub fn pid(&self) -> Option<u32> {
        self.handle.as_ref().map(ProcessHandle::pid)
    }

    pub fn is_detached(&self) -> bool {
        matches!(self.handle, Some(ProcessHandle::Detached(_)))
    }

    pub fn current_directory(&self) -> PathBuf {
        self.shared.cwd.lock().clone()
    }

    pub fn set_current_directory(&self, dir: PathBuf) {
        *self.shared.cwd.lock() = dir;
    }

    /// Record output: directory marker, state inference, then scrollback.
    pub fn ingest(&self, text: &str) {
        self.shared.ingest(text);
    }
}

impl Drop for ProcessSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn reap(process: &OwnedProcess) {
    let deadline = Instant::now() + REAP_TIMEOUT;
    loop {
        match process.child.lock().try_wait() {
            Ok(Some(_)) => return,
            Ok(None) if Instant::now() < deadline => {}
            Ok(None) => {
                tracing::warn!("Process {} not reaped within {:?}", process.pid, REAP_TIMEOUT);
                return;
            }
            Err(e) => {
                tracing::debug!("Wait for process {}: {}", process.pid, e);
                return;
            }
        }
        thread::sleep(Duration::from_millis(20));
    }
}
