//! Tab completion for directories, local executables and command names.
//!
//! Rules, in order:
//! 1. `cd <path>` completes a directory relative to the working directory.
//! 2. A last token starting with `./` completes an executable in the working directory.
//! 3. Any other last token completes a command name (PATH locally, the
//!    remote session's list otherwise).
//!
//! Candidates are matched case-insensitively, sorted case-insensitively, and
//! the first one wins. Only the missing suffix is returned.

use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::time::Duration;
use util::TtlCache;

const PATH_CACHE_KEY: &str = "PATH";

/// Whether a completion may touch the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPolicy {
    /// Serve only what is already cached (used for ghost suggestions).
    CacheOnly,
    /// May block briefly on a bounded remote fetch (used for Tab).
    AllowFetch,
}

/// Completion data from a remote session.
#[cfg_attr(test, mockall::automock)]
pub trait RemoteCompletionSource {
    /// Command names starting with `prefix`, case-insensitively.
    fn commands(&self, prefix: &str, policy: FetchPolicy) -> Vec<String>;
    /// Names of subdirectories of `path`.
    fn directories(&self, path: &str, policy: FetchPolicy) -> Vec<String>;
}

/// Where the line being completed will run.
pub enum CompletionContext<'a> {
    Local {
        cwd: &'a Path,
    },
    Remote {
        cwd: &'a str,
        source: &'a dyn RemoteCompletionSource,
    },
}

/// The suggestion currently offered to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionState {
    /// Suffix to insert at the cursor.
    pub suggestion: Option<String>,
    /// Input line the suggestion was computed for.
    pub original: String,
    /// Token being completed.
    pub prefix: String,
}

impl CompletionState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// The suggestion if it still belongs to `input`.
    pub fn suggestion_for(&self, input: &str) -> Option<&str> {
        if self.original == input {
            self.suggestion.as_deref()
        } else {
            None
        }
    }
}

pub struct CompletionEngine {
    path_commands: TtlCache<Vec<String>>,
}

impl Default for CompletionEngine {
    fn default() -> Self {
        Self::new(Duration::from_secs(
            settings::constants::completion::DEFAULT_CACHE_SECS,
        ))
    }
}

impl CompletionEngine {
    /// `command_ttl` bounds how often PATH is rescanned.
    pub fn new(command_ttl: Duration) -> Self {
        Self {
            path_commands: TtlCache::new(command_ttl),
        }
    }

    /// Drop cached PATH commands so the next lookup rescans.
    pub fn invalidate(&self) {
        self.path_commands.clear();
    }

    /// Suffix completing the token before `cursor` (a char index), if any.
    pub fn suggest(
        &self,
        input: &str,
        cursor: usize,
        context: &CompletionContext<'_>,
        policy: FetchPolicy,
    ) -> Option<String> {
        let before = match input.char_indices().nth(cursor) {
            Some((byte, _)) => &input[..byte],
            None => input,
        };

        if let Some(arg) = cd_operand(before) {
            return self.complete_directory(arg, context, policy);
        }

        let token = last_token(before);
        if let Some(partial) = token.strip_prefix("./") {
            return self.complete_executable(partial, context);
        }
        if token.is_empty() {
            return None;
        }
        self.complete_command(token, context, policy)
    }

    /// Prefix token and suggestion for `input`, packaged for the caller to keep.
    pub fn state_for(
        &self,
        input: &str,
        cursor: usize,
        context: &CompletionContext<'_>,
        policy: FetchPolicy,
    ) -> CompletionState {
        let before: String = input.chars().take(cursor).collect();
        CompletionState {
            suggestion: self.suggest(input, cursor, context, policy),
            original: input.to_string(),
            prefix: last_token(&before).to_string(),
        }
    }

    fn complete_directory(
        &self,
        arg: &str,
        context: &CompletionContext<'_>,
        policy: FetchPolicy,
    ) -> Option<String> {
        let (base, partial) = match arg.rfind(['/', '\\']) {
            Some(idx) => (&arg[..=idx], &arg[idx + 1..]),
            None => ("", arg),
        };

        let (entries, separator) = match context {
            CompletionContext::Local { cwd } => {
                (list_local_directories(&local_base(cwd, base)), MAIN_SEPARATOR)
            }
            CompletionContext::Remote { cwd, source } => {
                let path = if base.is_empty() {
                    cwd.to_string()
                } else {
                    crate::directory::resolve_remote(cwd, base)
                };
                (source.directories(&path, policy), '/')
            }
        };

        let best = best_match(entries, partial)?;
        let mut suffix = suffix_after(&best, partial);
        suffix.push(separator);
        Some(suffix)
    }

    fn complete_executable(&self, partial: &str, context: &CompletionContext<'_>) -> Option<String> {
        let CompletionContext::Local { cwd } = context else {
            return None;
        };
        let entries = std::fs::read_dir(cwd)
            .ok()?
            .flatten()
            .filter(|entry| platform::is_executable(&entry.path()))
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        non_empty(suffix_after(&best_match(entries, partial)?, partial))
    }

    fn complete_command(
        &self,
        token: &str,
        context: &CompletionContext<'_>,
        policy: FetchPolicy,
    ) -> Option<String> {
        let candidates = match context {
            CompletionContext::Local { .. } => self.local_commands(),
            CompletionContext::Remote { source, .. } => source.commands(token, policy),
        };
        non_empty(suffix_after(&best_match(candidates, token)?, token))
    }

    fn local_commands(&self) -> Vec<String> {
        if let Some(commands) = self.path_commands.get(PATH_CACHE_KEY) {
            return commands;
        }
        let commands = scan_path();
        tracing::debug!("Indexed {} commands from PATH", commands.len());
        self.path_commands.insert(PATH_CACHE_KEY, commands.clone());
        commands
    }
}

/// Everything after a leading `cd` token, once whitespace has followed it.
fn cd_operand(text: &str) -> Option<&str> {
    let (first, rest) = text.trim_start().split_once(char::is_whitespace)?;
    (first == "cd").then(|| rest.trim_start())
}

fn last_token(text: &str) -> &str {
    if text.ends_with(char::is_whitespace) {
        return "";
    }
    text.split_whitespace().last().unwrap_or("")
}

fn local_base(cwd: &Path, base: &str) -> PathBuf {
    if base.is_empty() {
        return cwd.to_path_buf();
    }
    if let Some(rest) = base.strip_prefix("~/").or_else(|| base.strip_prefix("~\\")) {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    cwd.join(base)
}

fn list_local_directories(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect()
}

fn scan_path() -> Vec<String> {
    let Some(path) = std::env::var_os("PATH") else {
        return Vec::new();
    };
    let mut commands: Vec<String> = std::env::split_paths(&path)
        .filter_map(|dir| std::fs::read_dir(dir).ok())
        .flat_map(|entries| entries.flatten())
        .filter(|entry| platform::is_executable(&entry.path()))
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    commands.sort();
    commands.dedup();
    commands
}

/// First candidate (case-insensitive order) that starts with `partial`.
/// Hidden names only match when `partial` itself starts with a dot.
fn best_match(mut candidates: Vec<String>, partial: &str) -> Option<String> {
    let needle = partial.to_lowercase();
    let show_hidden = partial.starts_with('.');
    candidates.retain(|c| {
        (show_hidden || !c.starts_with('.')) && c.to_lowercase().starts_with(&needle)
    });
    candidates.sort_by(|a, b| {
        a.to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b))
    });
    candidates.into_iter().next()
}

fn suffix_after(word: &str, partial: &str) -> String {
    word.chars().skip(partial.chars().count()).collect()
}

fn non_empty(suffix: String) -> Option<String> {
    (!suffix.is_empty()).then_some(suffix)
}
