//! Process lifecycle states and output-based state inference.

use settings::ServerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    /// Server launched but not yet reporting ready.
    Starting,
    Running,
    Stopped,
    /// Best-effort: inferred from output or a failing exit status.
    Crashed,
    /// Shut down while still running a process this run did not spawn.
    Detached,
}

impl ProcessState {
    /// Whether the process is expected to accept input.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }

    /// Apply an inferred transition; returns the resulting state.
    pub(crate) fn advance(self, next: ProcessState) -> ProcessState {
        match (self, next) {
            (Self::Starting, Self::Running) => Self::Running,
            (Self::Starting | Self::Running, Self::Crashed | Self::Stopped) => next,
            _ => self,
        }
    }
}

/// Infers a state change from a single output line.
pub trait StateMatcher: Send + Sync {
    fn classify(&self, line: &str) -> Option<ProcessState>;
}

/// Interactive shells never change state from their output.
pub struct ShellMatcher;

impl StateMatcher for ShellMatcher {
    fn classify(&self, _line: &str) -> Option<ProcessState> {
        None
    }
}

/// Case-insensitive substring matcher. Crash patterns win over stop patterns,
/// which win over ready patterns.
#[derive(Debug, Clone, Default)]
pub struct PatternMatcher {
    running: Vec<String>,
    crashed: Vec<String>,
    stopped: Vec<String>,
}

impl PatternMatcher {
    pub fn new(running: &[String], crashed: &[String], stopped: &[String]) -> Self {
        let lower = |patterns: &[String]| -> Vec<String> {
            patterns
                .iter()
                .filter(|p| !p.is_empty())
                .map(|p| p.to_lowercase())
                .collect()
        };
        Self {
            running: lower(running),
            crashed: lower(crashed),
            stopped: lower(stopped),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            &config.running_patterns,
            &config.crash_patterns,
            &config.stop_patterns,
        )
    }
}

impl StateMatcher for PatternMatcher {
    fn classify(&self, line: &str) -> Option<ProcessState> {
        let line = line.to_lowercase();
        let hit = |patterns: &[String]| patterns.iter().any(|p| line.contains(p.as_str()));
        if hit(&self.crashed) {
            Some(ProcessState::Crashed)
        } else if hit(&self.stopped) {
            Some(ProcessState::Stopped)
        } else if hit(&self.running) {
            Some(ProcessState::Running)
        } else {
            None
        }
    }
}
