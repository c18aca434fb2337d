//! Per-tab session state machine.
//!
//! A tab starts in a local shell (or server) session. `ssh user@host` moves
//! it through connecting and password entry to a remote shell; any failure
//! or logout drops it back to local. Keystrokes are routed by mode.

use crate::history::History;
use crate::input::{InputEvent, InputLine, Key, LineEditor, Modifiers, PasswordPrompt};
use crate::interpreter::{InterpreterOptions, OutputInterpreter, RenderedOutput};
use crate::render::{self, Layout, RenderSink, TextMeasure, Viewport};
use crate::selection::Selection;
use anyhow::Result;
use parking_lot::Mutex;
use settings::Config;
use std::path::{Path, PathBuf};
use terminal::{
    directory, CommandLog, CompletionContext, CompletionEngine, CompletionState, FetchPolicy,
    LaunchSpec, PatternMatcher, PidFile, ProcessSession, RemoteConfig, RemoteSession, RemoteState,
    ScrollbackBuffer,
};
use uuid::Uuid;

const PROMPT: &str = "> ";
const PASSWORD_PROMPT: &str = "Password: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    LocalReady,
    RemoteConnecting,
    RemoteAwaitingPassword,
    RemoteReady,
}

impl From<RemoteState> for SessionMode {
    fn from(state: RemoteState) -> Self {
        match state {
            RemoteState::Disconnected => Self::LocalReady,
            RemoteState::Connecting | RemoteState::Authenticating => Self::RemoteConnecting,
            RemoteState::AwaitingPassword => Self::RemoteAwaitingPassword,
            RemoteState::Connected => Self::RemoteReady,
        }
    }
}

/// Services the embedding UI provides.
pub trait HostServices {
    fn set_clipboard(&self, text: &str);
    fn open_url(&self, url: &str) -> Result<()>;
}

/// Opens links with the OS handler and keeps copied text in memory.
#[derive(Debug, Default)]
pub struct SystemHost {
    clipboard: Mutex<Option<String>>,
}

impl SystemHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text most recently copied.
    pub fn clipboard(&self) -> Option<String> {
        self.clipboard.lock().clone()
    }
}

impl HostServices for SystemHost {
    fn set_clipboard(&self, text: &str) {
        *self.clipboard.lock() = Some(text.to_string());
    }

    fn open_url(&self, url: &str) -> Result<()> {
        platform::open_url(url)
    }
}

/// Everything behind one terminal tab.
pub struct SessionController {
    id: Uuid,
    config: Config,
    config_path: Option<PathBuf>,
    host: Box<dyn HostServices>,
    scrollback: ScrollbackBuffer,
    interpreter: OutputInterpreter,
    process: ProcessSession,
    remote: RemoteSession,
    completion: CompletionEngine,
    suggestion: CompletionState,
    editor: LineEditor,
    password: PasswordPrompt,
    history: History,
    command_log: Option<CommandLog>,
    selection: Option<Selection>,
    rendered: RenderedOutput,
    layout: Layout,
    scroll: usize,
    remote_state: RemoteState,
    closed: bool,
}

impl SessionController {
    /// Start a local shell in the home directory.
    pub fn new_shell(config: Config, host: Box<dyn HostServices>) -> Self {
        let spec = LaunchSpec::shell(&config);
        Self::launch(config, spec, None, &default_working_dir(), host)
    }

    /// Start (or reattach to) a server from `jar`.
    pub fn new_server(config: Config, jar: Option<PathBuf>, host: Box<dyn HostServices>) -> Self {
        let spec = LaunchSpec::server(&config.server, jar.clone());
        let pid_file = jar.as_deref().map(PidFile::for_server);
        let dir = spec.working_dir.clone().unwrap_or_else(default_working_dir);
        Self::launch(config, spec, pid_file, &dir, host)
    }

    fn launch(
        config: Config,
        spec: LaunchSpec,
        pid_file: Option<PidFile>,
        working_dir: &Path,
        host: Box<dyn HostServices>,
    ) -> Self {
        let scrollback = ScrollbackBuffer::new();
        let mut process = ProcessSession::new(spec, scrollback.clone());
        if process.spec().is_server() {
            process = process.with_matcher(PatternMatcher::from_config(&config.server));
        }
        if let Some(pid_file) = pid_file {
            process = process.with_pid_file(pid_file);
        }
        if let Err(e) = process.launch(working_dir) {
            tracing::warn!("Session launch failed: {:#}", e);
        }

        let id = Uuid::new_v4();
        Self {
            id,
            remote: RemoteSession::new(RemoteConfig::from(&config.ssh), scrollback.clone()),
            interpreter: OutputInterpreter::with_scrollback(
                InterpreterOptions {
                    ansi_aware: config.local_ansi,
                },
                scrollback.clone(),
            ),
            completion: CompletionEngine::new(config.completion.command_cache_ttl()),
            command_log: config.log_commands.then(|| CommandLog::for_tab(id)),
            config,
            config_path: None,
            host,
            scrollback,
            process,
            suggestion: CompletionState::default(),
            editor: LineEditor::new(),
            password: PasswordPrompt::new(),
            history: History::new(),
            selection: None,
            rendered: RenderedOutput::default(),
            layout: Layout::default(),
            scroll: 0,
            remote_state: RemoteState::Disconnected,
            closed: false,
        }
    }

    /// Adopt an existing tab id, restoring its command history.
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        if self.config.log_commands {
            self = self.with_command_log(CommandLog::for_tab(id));
        }
        self
    }

    /// Log commands to `log`, seeding history from what it already holds.
    pub fn with_command_log(mut self, log: CommandLog) -> Self {
        match log.load() {
            Ok(entries) => self.history = History::from_entries(entries),
            Err(e) => tracing::warn!("Failed to restore history: {:#}", e),
        }
        self.command_log = Some(log);
        self
    }

    /// Config file that receives `recent-hosts` updates.
    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mode(&self) -> SessionMode {
        SessionMode::from(self.remote.state())
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn scrollback(&self) -> &ScrollbackBuffer {
        &self.scrollback
    }

    pub fn process(&self) -> &ProcessSession {
        &self.process
    }

    pub fn remote(&self) -> &RemoteSession {
        &self.remote
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Tracked working directory of whichever shell has the input.
    pub fn current_directory(&self) -> String {
        match self.mode() {
            SessionMode::RemoteReady => self.remote.current_directory(),
            _ => self.process.current_directory().display().to_string(),
        }
    }

    /// Record output as if a reader produced it.
    pub fn append_output(&self, text: &str) {
        self.process.ingest(text);
    }

    /// Returns whether the event was consumed.
    pub fn handle_event(&mut self, event: InputEvent) -> bool {
        self.sync_remote();
        if self.mode() == SessionMode::RemoteAwaitingPassword {
            return self.handle_password_event(event);
        }
        match event {
            InputEvent::Char(c) if !c.is_control() => {
                self.editor.insert_char(c);
                self.edited();
                true
            }
            InputEvent::Char(_) => false,
            InputEvent::Paste(text) => {
                self.editor.insert_str(&text);
                self.edited();
                true
            }
            InputEvent::Key { key, modifiers } => self.handle_key(key, modifiers),
            InputEvent::MouseDown { x, y, modifiers } => self.mouse_down(x, y, modifiers),
            InputEvent::MouseDrag { x, y, .. } | InputEvent::MouseUp { x, y, .. } => {
                match (self.selection.as_mut(), self.layout.position_at(x, y)) {
                    (Some(selection), Some(pos)) => {
                        selection.extend_to(pos);
                        true
                    }
                    _ => false,
                }
            }
            InputEvent::Scroll(delta) => self.scroll_by(delta),
        }
    }

    fn handle_password_event(&mut self, event: InputEvent) -> bool {
        match event {
            InputEvent::Char(c) if !c.is_control() => {
                self.password.push(c);
                true
            }
            InputEvent::Paste(text) => {
                self.password.push_str(&text);
                true
            }
            InputEvent::Key {
                key: Key::Backspace,
                ..
            } => self.password.backspace(),
            InputEvent::Key {
                key: Key::Enter, ..
            } => {
                self.submit();
                true
            }
            InputEvent::Scroll(delta) => self.scroll_by(delta),
            _ => false,
        }
    }

    fn handle_key(&mut self, key: Key, modifiers: Modifiers) -> bool {
        let word = modifiers.control || modifiers.alt;
        match key {
            Key::Enter => self.submit(),
            Key::Tab => self.accept_completion(),
            Key::Backspace if word => {
                self.editor.delete_word();
            }
            Key::Backspace => {
                self.editor.backspace();
            }
            Key::Delete => {
                self.editor.delete();
            }
            Key::Left if word => self.editor.word_left(),
            Key::Left => self.editor.move_left(),
            Key::Right if word => self.editor.word_right(),
            Key::Right => self.editor.move_right(),
            Key::Home => self.editor.move_home(),
            Key::End => self.editor.move_end(),
            Key::Up => {
                if let Some(entry) = self.history.previous().map(str::to_string) {
                    self.editor.set(&entry);
                }
            }
            Key::Down => match self.history.next().map(str::to_string) {
                Some(entry) => self.editor.set(&entry),
                None => self.editor.clear(),
            },
            Key::PageUp => return self.scroll_by(self.page_rows()),
            Key::PageDown => return self.scroll_by(-self.page_rows()),
            Key::Escape => {
                self.selection = None;
                self.suggestion.reset();
                return true;
            }
            Key::Character(c) if modifiers.is_command() && c.eq_ignore_ascii_case(&'c') => {
                return self.copy_selection();
            }
            Key::Character(_) => return false,
        }
        if !matches!(key, Key::Enter | Key::Tab) {
            self.edited();
        }
        true
    }

    /// Run the typed line.
    pub fn submit(&mut self) {
        self.sync_remote();
        self.suggestion.reset();
        self.scroll = 0;
        match self.mode() {
            SessionMode::RemoteAwaitingPassword => {
                let password = self.password.take();
                self.remote.authenticate(password);
            }
            SessionMode::RemoteConnecting => {
                tracing::debug!("Input ignored while connecting");
            }
            SessionMode::RemoteReady => {
                let command = self.editor.take();
                self.record(command.trim());
                self.submit_remote(&command);
            }
            SessionMode::LocalReady => {
                let command = self.editor.take();
                self.record(command.trim());
                self.submit_local(&command);
            }
        }
    }

    fn record(&mut self, command: &str) {
        self.history.push(command);
        if command.is_empty() {
            return;
        }
        if let Some(log) = &self.command_log {
            if let Err(e) = log.append(command) {
                self.scrollback
                    .append_line(&format!("Failed to log command: {:#}", e));
            }
        }
    }

    fn submit_local(&mut self, command: &str) {
        let trimmed = command.trim();
        if trimmed.eq_ignore_ascii_case("clear") {
            self.scrollback.clear();
            return;
        }
        if self.process.spec().is_server() {
            if !self.process.state().is_active() {
                tracing::debug!("Server not running; input ignored");
                return;
            }
            self.send_local(command);
            return;
        }
        if trimmed == "exit" {
            self.process.shutdown();
            return;
        }
        if trimmed == "ssh" || trimmed.starts_with("ssh ") {
            self.remote.connect(trimmed);
            self.sync_remote();
            return;
        }
        if let Some(arg) = directory::cd_argument(trimmed) {
            if let Some(dir) = directory::resolve_local(&self.process.current_directory(), arg) {
                self.process.set_current_directory(dir);
            }
        }
        self.send_local(command);
    }

    fn submit_remote(&mut self, command: &str) {
        let trimmed = command.trim();
        if trimmed.eq_ignore_ascii_case("clear") {
            self.scrollback.clear();
        } else if let Some(arg) = directory::cd_argument(trimmed) {
            let dir = directory::resolve_remote(&self.remote.current_directory(), arg);
            self.remote.set_current_directory(dir);
        }
        if let Err(e) = self.remote.send_line(command) {
            self.scrollback.append_line(&format!("ERROR: {:#}", e));
        }
    }

    fn send_local(&mut self, command: &str) {
        if let Err(e) = self.process.send_line(command) {
            self.scrollback.append_line(&format!("ERROR: {:#}", e));
        }
    }

    /// Notice remote transitions made by background tasks.
    fn sync_remote(&mut self) {
        let state = self.remote.state();
        if state == self.remote_state {
            return;
        }
        tracing::debug!("Remote state {:?} -> {:?}", self.remote_state, state);
        match state {
            RemoteState::Connected => self.remember_host(),
            RemoteState::Disconnected => self.password.clear(),
            _ => {}
        }
        self.remote_state = state;
        self.suggestion.reset();
    }

    fn remember_host(&mut self) {
        let Some(target) = self.remote.target() else {
            return;
        };
        let target = target.to_string();
        if let Some(path) = &self.config_path {
            if let Err(e) = settings::remember_host(path, &target) {
                tracing::warn!("Failed to remember {}: {:#}", target, e);
            }
        }
        self.config.recent_hosts.retain(|host| host != &target);
        self.config.recent_hosts.push(target);
    }

    /// Recompute the ghost suggestion after an edit.
    fn edited(&mut self) {
        self.suggestion.reset();
        self.scroll = 0;
        if self.config.inline_suggestions && !self.editor.is_empty() {
            self.suggestion = self.complete(FetchPolicy::CacheOnly);
        }
    }

    fn complete(&self, policy: FetchPolicy) -> CompletionState {
        let input = self.editor.text();
        let cursor = self.editor.cursor();
        match self.mode() {
            SessionMode::LocalReady => {
                let cwd = self.process.current_directory();
                let context = CompletionContext::Local { cwd: &cwd };
                self.completion.state_for(input, cursor, &context, policy)
            }
            SessionMode::RemoteReady => {
                let cwd = self.remote.current_directory();
                let context = CompletionContext::Remote {
                    cwd: &cwd,
                    source: &self.remote,
                };
                self.completion.state_for(input, cursor, &context, policy)
            }
            _ => CompletionState::default(),
        }
    }

    fn accept_completion(&mut self) {
        let suggestion = match self.suggestion.suggestion_for(self.editor.text()) {
            Some(suggestion) => Some(suggestion.to_string()),
            None => self.complete(FetchPolicy::AllowFetch).suggestion,
        };
        if let Some(suggestion) = suggestion {
            self.editor.accept_completion(&suggestion);
        }
        self.edited();
    }

    /// Mouse presses start a selection; with the command modifier they open links.
    fn mouse_down(&mut self, x: f32, y: f32, modifiers: Modifiers) -> bool {
        if modifiers.is_command() {
            if let Some(url) = self.layout.link_at(x, y).map(str::to_string) {
                if let Err(e) = self.host.open_url(&url) {
                    tracing::warn!("Failed to open {}: {:#}", url, e);
                }
                return true;
            }
        }
        self.selection = self.layout.position_at(x, y).map(Selection::new);
        self.selection.is_some()
    }

    fn copy_selection(&mut self) -> bool {
        match self.selection.filter(|s| !s.is_empty()) {
            Some(selection) => {
                self.host
                    .set_clipboard(&selection.selected_text(&self.rendered.lines));
                true
            }
            None => false,
        }
    }

    fn page_rows(&self) -> i32 {
        self.layout.visible_lines().len().max(1) as i32
    }

    fn scroll_by(&mut self, delta: i32) -> bool {
        let max = self.layout.max_scroll() as i64;
        let next = (self.scroll as i64 + delta as i64).clamp(0, max) as usize;
        let changed = next != self.scroll;
        self.scroll = next;
        changed
    }

    /// Render the scrollback to rows no wider than `width`.
    pub fn render(&mut self, width: f32, measure: &dyn TextMeasure) -> &RenderedOutput {
        self.sync_remote();
        let ansi_aware = self.config.local_ansi || self.mode() == SessionMode::RemoteReady;
        self.interpreter.set_ansi_aware(ansi_aware);
        self.rendered = self.interpreter.render_scrollback(width, measure);
        &self.rendered
    }

    /// Render and paint the output area, remembering the layout for mouse events.
    pub fn paint<S: RenderSink>(&mut self, sink: &mut S, viewport: Viewport) -> &Layout {
        self.render(viewport.width, &*sink);
        let viewport = Viewport {
            scroll: self.scroll,
            ..viewport
        };
        self.layout = render::paint(sink, &self.rendered, viewport, self.selection.as_ref());
        self.scroll = self.layout.scroll();
        &self.layout
    }

    /// Prompt, visible input and ghost suggestion.
    pub fn input_line(&self) -> InputLine {
        if self.mode() == SessionMode::RemoteAwaitingPassword {
            return InputLine {
                prompt: PASSWORD_PROMPT.to_string(),
                cursor: self.password.len(),
                text: self.password.masked(),
                suggestion: None,
            };
        }
        let suggestion = if self.config.inline_suggestions {
            self.suggestion
                .suggestion_for(self.editor.text())
                .map(str::to_string)
        } else {
            None
        };
        InputLine {
            prompt: PROMPT.to_string(),
            text: self.editor.text().to_string(),
            cursor: self.editor.cursor(),
            suggestion,
        }
    }

    /// Default location for this tab's transcript.
    pub fn transcript_path(&self) -> PathBuf {
        remotely_paths::transcripts_dir().join(format!("{}.txt", self.id))
    }

    pub fn save_transcript(&self, path: &Path) -> Result<()> {
        self.scrollback.save_to(path).inspect_err(|e| {
            self.scrollback
                .append_line(&format!("Failed to save terminal output: {:#}", e));
        })
    }

    /// Append a saved transcript to the scrollback.
    pub fn load_transcript(&self, path: &Path) -> Result<()> {
        self.scrollback.load_from(path).inspect_err(|e| {
            self.scrollback
                .append_line(&format!("Failed to load terminal output: {:#}", e));
        })
    }

    /// Tear down the remote channel and the local process. Detached servers
    /// keep running.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        tracing::debug!("Closing session {}", self.id);
        self.password.clear();
        self.remote.shutdown();
        self.process.shutdown();
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.close();
    }
}

fn default_working_dir() -> PathBuf {
    dirs::home_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}
