//! Platform-specific process and desktop integrations.
//!
//! Provides process-tree termination, PID liveness checks, the executable-file
//! test used by completion, and opening URLs with the OS handler.

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use unix::*;
#[cfg(windows)]
pub use windows::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Whether `path` is a regular file the current platform would execute.
///
/// Windows decides by extension (`.exe`, `.bat`, `.cmd`); elsewhere any
/// execute bit counts.
pub fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }

    #[cfg(windows)]
    {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        name.ends_with(".exe") || name.ends_with(".bat") || name.ends_with(".cmd")
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }

    #[cfg(not(any(unix, windows)))]
    {
        true
    }
}

/// Open a URL with the desktop's default handler.
pub fn open_url(url: &str) -> Result<()> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        anyhow::bail!("Refusing to open non-http URL: {}", url);
    }

    #[cfg(target_os = "macos")]
    let mut command = std::process::Command::new("open");
    #[cfg(windows)]
    let mut command = {
        let mut c = std::process::Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    };
    #[cfg(all(unix, not(target_os = "macos")))]
    let mut command = std::process::Command::new("xdg-open");

    command
        .arg(url)
        .spawn()
        .with_context(|| format!("Failed to open URL: {}", url))?;
    tracing::debug!("Opened URL {}", url);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_executable() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(!is_executable(&dir.path().join("nope")));
    }

    #[test]
    fn directory_is_not_executable() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(!is_executable(dir.path()));
    }

    #[cfg(unix)]
    #[test]
    fn execute_bit_decides_on_unix() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("run.sh");
        std::fs::write(&script, "#!/bin/sh\n").expect("write");
        assert!(!is_executable(&script));

        let mut perms = std::fs::metadata(&script).expect("metadata").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).expect("chmod");
        assert!(is_executable(&script));
    }

    #[test]
    fn open_url_rejects_other_schemes() {
        assert!(open_url("file:///etc/passwd").is_err());
        assert!(open_url("javascript:alert(1)").is_err());
    }

    #[test]
    fn current_process_is_alive() {
        assert!(is_process_alive(std::process::id()));
    }
}
