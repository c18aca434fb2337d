//! Single-PID text file used to find a server process after a restart.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// PID file for the server launched from `jar`, under the run directory.
    pub fn for_server(jar: &Path) -> Self {
        let stem = jar
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "server".to_string());
        Self::new(remotely_paths::run_dir().join(format!("{}.pid", stem)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored PID, or `None` if the file is missing or unreadable.
    pub fn read(&self) -> Option<u32> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Failed to read PID file {:?}: {}", self.path, e);
                }
                return None;
            }
        };
        match content.trim().parse::<u32>() {
            Ok(pid) if pid > 0 => Some(pid),
            _ => {
                tracing::warn!("Ignoring malformed PID file {:?}", self.path);
                None
            }
        }
    }

    pub fn write(&self, pid: u32) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&self.path, pid.to_string())
            .with_context(|| format!("Failed to write PID file {}", self.path.display()))
    }

    pub fn remove(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove PID file {:?}: {}", self.path, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_remove() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pid_file = PidFile::new(dir.path().join("run").join("server.pid"));
        assert_eq!(pid_file.read(), None);

        pid_file.write(4242).expect("write");
        assert_eq!(
            std::fs::read_to_string(pid_file.path()).expect("read"),
            "4242"
        );
        assert_eq!(pid_file.read(), Some(4242));

        pid_file.remove();
        assert_eq!(pid_file.read(), None);
        pid_file.remove();
    }

    #[test]
    fn malformed_content_reads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pid_file = PidFile::new(dir.path().join("server.pid"));
        std::fs::write(pid_file.path(), "not a pid").expect("write");
        assert_eq!(pid_file.read(), None);
        std::fs::write(pid_file.path(), "0").expect("write");
        assert_eq!(pid_file.read(), None);
    }

    #[test]
    fn surrounding_whitespace_is_tolerated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pid_file = PidFile::new(dir.path().join("server.pid"));
        std::fs::write(pid_file.path(), " 17\n").expect("write");
        assert_eq!(pid_file.read(), Some(17));
    }

    #[test]
    fn server_pid_file_named_after_jar() {
        let pid_file = PidFile::for_server(Path::new("/srv/mc/paper-1.21.jar"));
        assert!(pid_file.path().ends_with("paper-1.21.pid"));
    }
}
