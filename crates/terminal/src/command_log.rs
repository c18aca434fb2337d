//! Per-tab log of submitted commands.
//!
//! One plaintext file per tab id, one command per line, append-only. The log
//! seeds the history when a tab with the same id is opened again.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CommandLog {
    path: PathBuf,
}

impl CommandLog {
    /// Log file for a tab: `<logs_dir>/commands_<uuid>.log`.
    pub fn for_tab(id: Uuid) -> Self {
        Self::new(remotely_paths::command_log_file(id))
    }

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, command: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory: {:?}", parent))?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open command log: {:?}", self.path))?;
        // Embedded newlines would split one command into several history entries.
        let line = command.replace(['\n', '\r'], " ");
        writeln!(file, "{}", line).context("Failed to write command log")?;
        Ok(())
    }

    /// All logged commands in order. A missing file is an empty log.
    pub fn load(&self) -> Result<Vec<String>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read command log: {:?}", self.path))
            }
        };
        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn append_then_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = CommandLog::new(dir.path().join("logs").join("commands.log"));
        log.append("ls -la").expect("append");
        log.append("cd /tmp").expect("append");
        assert_eq!(log.load().expect("load"), vec!["ls -la", "cd /tmp"]);
        assert_eq!(
            std::fs::read_to_string(log.path()).expect("read"),
            "ls -la\ncd /tmp\n"
        );
    }

    #[test]
    fn missing_log_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = CommandLog::new(dir.path().join("none.log"));
        assert!(log.load().expect("load").is_empty());
    }

    #[test]
    fn multiline_command_stays_one_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = CommandLog::new(dir.path().join("commands.log"));
        log.append("echo a\necho b").expect("append");
        assert_eq!(log.load().expect("load"), vec!["echo a echo b"]);
    }

    #[test]
    fn tab_log_is_named_after_id() {
        let id = Uuid::new_v4();
        let log = CommandLog::for_tab(id);
        assert!(log
            .path()
            .to_string_lossy()
            .ends_with(&format!("commands_{}.log", id)));
    }
}
