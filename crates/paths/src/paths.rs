//! Centralized path management for Remotely.
//!
//! All application directories are lazily initialized and cached.
//! Use `set_*` functions before first access to override for testing.

use std::path::PathBuf;
use std::sync::OnceLock;
use uuid::Uuid;

static CONFIG_DIR: OnceLock<PathBuf> = OnceLock::new();
static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();
static LOGS_DIR: OnceLock<PathBuf> = OnceLock::new();

/// ~/.config/remotely (or platform equivalent)
pub fn config_dir() -> &'static PathBuf {
    CONFIG_DIR.get_or_init(|| {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("remotely")
    })
}

/// ~/.local/share/remotely (or platform equivalent)
pub fn data_dir() -> &'static PathBuf {
    DATA_DIR.get_or_init(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("remotely")
    })
}

/// Per-tab command logs live here.
pub fn logs_dir() -> &'static PathBuf {
    LOGS_DIR.get_or_init(|| {
        #[cfg(target_os = "macos")]
        {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("Library")
                .join("Logs")
                .join("remotely")
        }
        #[cfg(not(target_os = "macos"))]
        {
            data_dir().join("logs")
        }
    })
}

/// Override config dir (must be called before first access). For testing.
pub fn set_config_dir(path: PathBuf) {
    let _ = CONFIG_DIR.set(path);
}

/// Override data dir (must be called before first access). For testing.
pub fn set_data_dir(path: PathBuf) {
    let _ = DATA_DIR.set(path);
}

/// Override logs dir (must be called before first access). For testing.
pub fn set_logs_dir(path: PathBuf) {
    let _ = LOGS_DIR.set(path);
}

/// Config file path: config_dir()/config.toml
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// PID files for long-running server processes.
pub fn run_dir() -> PathBuf {
    data_dir().join("run")
}

/// Saved terminal transcripts.
pub fn transcripts_dir() -> PathBuf {
    data_dir().join("transcripts")
}

/// Command log for one terminal tab: logs_dir()/commands_<uuid>.log
pub fn command_log_file(tab: Uuid) -> PathBuf {
    logs_dir().join(format!("commands_{}.log", tab))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_dir_ends_with_remotely() {
        let dir = config_dir();
        assert!(
            dir.ends_with("remotely"),
            "config_dir should end with 'remotely': {:?}",
            dir
        );
    }

    #[test]
    fn config_file_is_toml() {
        let path = config_file();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("toml"));
    }

    #[test]
    fn command_log_is_named_after_tab() {
        let id = Uuid::new_v4();
        let path = command_log_file(id);
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        assert_eq!(name, format!("commands_{}.log", id));
        assert!(path.starts_with(logs_dir()));
    }

    #[test]
    fn run_dir_is_under_data_dir() {
        assert!(run_dir().starts_with(data_dir()));
        assert!(transcripts_dir().starts_with(data_dir()));
    }
}
