//! TOML config file support.
//!
//! Config location: `<config_dir>/remotely/config.toml`

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// `[ssh]` table.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct SshConfig {
    /// Port used when the target has no `:port`.
    pub default_port: u16,
    /// Timeout for TCP connect and handshake.
    pub connect_timeout_secs: u64,
    /// Overall timeout for one-shot exec channels (command and directory fetches).
    pub exec_timeout_secs: u64,
    /// How long the remote command-name list stays fresh.
    pub command_cache_secs: u64,
    /// Substrings that mark the remote console as ready for `help`.
    pub ready_patterns: Vec<String>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            default_port: crate::constants::ssh::DEFAULT_PORT,
            connect_timeout_secs: 10,
            exec_timeout_secs: 5,
            command_cache_secs: 60,
            ready_patterns: vec!["Done (".to_string()],
        }
    }
}

impl SshConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_timeout_secs)
    }

    pub fn command_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.command_cache_secs)
    }
}

/// `[server]` table: the long-lived child launched by server sessions.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct ServerConfig {
    pub java: String,
    pub jar_path: Option<PathBuf>,
    pub args: Vec<String>,
    pub running_patterns: Vec<String>,
    pub crash_patterns: Vec<String>,
    pub stop_patterns: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            java: "java".to_string(),
            jar_path: None,
            args: vec!["--nogui".to_string()],
            running_patterns: vec!["Done (".to_string()],
            crash_patterns: vec![
                "Fatal".to_string(),
                "Unhandled exception".to_string(),
                "Exception in thread \"main\"".to_string(),
            ],
            stop_patterns: vec!["Stopping server".to_string()],
        }
    }
}

/// `[completion]` table.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct CompletionConfig {
    /// Refresh interval for the PATH executable scan.
    pub command_cache_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            command_cache_secs: crate::constants::completion::DEFAULT_CACHE_SECS,
        }
    }
}

impl CompletionConfig {
    pub fn command_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.command_cache_secs)
    }
}

/// `[view]` table, used by hosts that have no font metrics of their own.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct ViewConfig {
    pub cell_width: f32,
    pub line_height: f32,
    pub columns: u32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        use crate::constants::view;
        Self {
            cell_width: view::CELL_WIDTH,
            line_height: view::LINE_HEIGHT,
            columns: view::COLUMNS,
        }
    }
}

/// User-facing config parsed from TOML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Shell program for local sessions. Falls back to `$SHELL` (or PowerShell on Windows).
    pub shell: Option<String>,
    /// Extra arguments passed to `shell`.
    pub shell_args: Vec<String>,
    /// Interpret ANSI sequences in local sessions instead of stripping them.
    pub local_ansi: bool,
    /// Show a ghost completion after each edit.
    pub inline_suggestions: bool,
    /// Append submitted commands to the per-tab command log.
    pub log_commands: bool,
    pub ssh: SshConfig,
    pub server: ServerConfig,
    pub completion: CompletionConfig,
    pub view: ViewConfig,
    /// Recently connected SSH targets, most recent last.
    pub recent_hosts: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: None,
            shell_args: Vec::new(),
            local_ansi: false,
            inline_suggestions: true,
            log_commands: true,
            ssh: SshConfig::default(),
            server: ServerConfig::default(),
            completion: CompletionConfig::default(),
            view: ViewConfig::default(),
            recent_hosts: Vec::new(),
        }
    }
}

/// Default config file content with comments (generated on first launch).
const DEFAULT_CONFIG: &str = r#"# Remotely Configuration

# Shell for local sessions (defaults to $SHELL, or PowerShell on Windows)
# shell = "/bin/zsh"
# shell-args = []

# Interpret ANSI colors from local shells instead of stripping them
local-ansi = false

# Show the best completion as ghost text while typing
inline-suggestions = true

# Keep a per-tab log of submitted commands (used to restore history)
log-commands = true

# Recently used SSH targets (managed automatically)
recent-hosts = []

[ssh]
default-port = 22
connect-timeout-secs = 10
# Upper bound for one-shot remote commands (command list, directory listing)
exec-timeout-secs = 5
command-cache-secs = 60
# Output substrings that mean the remote console is ready to list its commands
ready-patterns = ["Done ("]

[server]
java = "java"
# jar-path = "/srv/minecraft/server.jar"
args = ["--nogui"]
running-patterns = ["Done ("]
crash-patterns = ["Fatal", "Unhandled exception", "Exception in thread \"main\""]
stop-patterns = ["Stopping server"]

[completion]
command-cache-secs = 60

[view]
cell-width = 6
line-height = 9
columns = 120
"#;

/// Return the config file path.
pub fn config_path() -> PathBuf {
    remotely_paths::config_file()
}

/// Ensure the config file exists, creating a default if missing.
/// Returns the path to the config file.
pub fn ensure_config_file() -> Result<PathBuf> {
    let path = config_path();
    if !path.exists() {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, DEFAULT_CONFIG)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Created default config at {:?}", path);
    }
    Ok(path)
}

/// Load and parse the config file. Returns default on any error.
pub fn load_config() -> Config {
    load_config_from(&config_path())
}

/// Load a config from an explicit path. Returns default on any error.
pub fn load_config_from(path: &Path) -> Config {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to read config: {}", e);
            }
            return Config::default();
        }
    };

    // Size guard
    if content.len() > crate::constants::settings::MAX_FILE_SIZE as usize {
        tracing::warn!(
            "Config file too large ({} bytes), using defaults",
            content.len()
        );
        return Config::default();
    }

    match toml::from_str(&content) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!("Failed to parse config.toml: {}", e);
            Config::default()
        }
    }
}

/// Record a successful SSH target in `recent-hosts` (preserving comments/formatting).
///
/// The entry moves to the end if already present; the list is capped at
/// [`crate::constants::history::MAX_RECENT_HOSTS`].
pub fn remember_host(path: &Path, target: &str) -> Result<()> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };
    let mut doc = content
        .parse::<toml_edit::DocumentMut>()
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let mut hosts: Vec<String> = doc
        .get("recent-hosts")
        .and_then(|item| item.as_array())
        .map(|array| {
            array
                .iter()
                .filter_map(|v| v.as_str())
                .filter(|h| *h != target)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    hosts.push(target.to_string());
    let max = crate::constants::history::MAX_RECENT_HOSTS;
    if hosts.len() > max {
        hosts.drain(..hosts.len() - max);
    }

    let mut array = toml_edit::Array::new();
    for host in &hosts {
        array.push(host.as_str());
    }
    doc["recent-hosts"] = toml_edit::value(array);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, doc.to_string())
        .with_context(|| format!("Failed to save recent hosts to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_has_sane_values() {
        let config = Config::default();
        assert!(config.shell.is_none());
        assert!(!config.local_ansi);
        assert!(config.inline_suggestions);
        assert_eq!(config.ssh.default_port, 22);
        assert_eq!(config.ssh.exec_timeout(), Duration::from_secs(5));
        assert_eq!(config.server.args, vec!["--nogui".to_string()]);
    }

    #[test]
    fn parses_minimal_toml() {
        let config: Config = toml::from_str("local-ansi = true").expect("should parse");
        assert!(config.local_ansi);
        assert_eq!(config.ssh, SshConfig::default());
    }

    #[test]
    fn parses_full_toml() {
        let toml_str = r#"
shell = "/bin/zsh"
shell-args = ["-l"]
inline-suggestions = false
recent-hosts = ["alice@example.com"]

[ssh]
default-port = 2222
exec-timeout-secs = 2
ready-patterns = ["Welcome"]

[server]
jar-path = "/srv/mc/server.jar"
crash-patterns = ["boom"]

[view]
columns = 80
"#;
        let config: Config = toml::from_str(toml_str).expect("should parse");
        assert_eq!(config.shell.as_deref(), Some("/bin/zsh"));
        assert_eq!(config.shell_args, vec!["-l".to_string()]);
        assert!(!config.inline_suggestions);
        assert_eq!(config.recent_hosts, vec!["alice@example.com".to_string()]);
        assert_eq!(config.ssh.default_port, 2222);
        assert_eq!(config.ssh.exec_timeout_secs, 2);
        assert_eq!(config.ssh.connect_timeout_secs, 10);
        assert_eq!(config.ssh.ready_patterns, vec!["Welcome".to_string()]);
        assert_eq!(
            config.server.jar_path,
            Some(PathBuf::from("/srv/mc/server.jar"))
        );
        assert_eq!(config.server.crash_patterns, vec!["boom".to_string()]);
        assert_eq!(config.server.java, "java");
        assert_eq!(config.view.columns, 80);
    }

    #[test]
    fn ignores_unknown_keys() {
        let config: Config =
            toml::from_str("unknown-key = 1\n[ssh]\nbogus = true").expect("should parse");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn default_config_template_is_valid_toml() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).expect("template should parse");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn empty_string_parses_to_defaults() {
        let config: Config = toml::from_str("").expect("should parse");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(load_config_from(&dir.path().join("nope.toml")), Config::default());
    }

    #[test]
    fn load_invalid_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "local-ansi = [").expect("write");
        assert_eq!(load_config_from(&path), Config::default());
    }

    #[test]
    fn load_oversized_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        let padding = "#".repeat(crate::constants::settings::MAX_FILE_SIZE as usize);
        std::fs::write(&path, format!("local-ansi = true\n{}", padding)).expect("write");
        assert_eq!(load_config_from(&path), Config::default());
    }

    #[test]
    fn remember_host_preserves_comments() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, DEFAULT_CONFIG).expect("write");

        remember_host(&path, "alice@example.com").expect("save");
        remember_host(&path, "bob@example.com:2222").expect("save");
        remember_host(&path, "alice@example.com").expect("save");

        let content = std::fs::read_to_string(&path).expect("read");
        assert!(content.contains("# Remotely Configuration"));
        let config = load_config_from(&path);
        assert_eq!(
            config.recent_hosts,
            vec![
                "bob@example.com:2222".to_string(),
                "alice@example.com".to_string()
            ]
        );
    }

    #[test]
    fn remember_host_caps_list() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        for i in 0..15 {
            remember_host(&path, &format!("user@host{}", i)).expect("save");
        }
        let config = load_config_from(&path);
        let max = crate::constants::history::MAX_RECENT_HOSTS;
        assert_eq!(config.recent_hosts.len(), max);
        assert_eq!(config.recent_hosts.first().map(String::as_str), Some("user@host5"));
        assert_eq!(config.recent_hosts.last().map(String::as_str), Some("user@host14"));
    }
}
