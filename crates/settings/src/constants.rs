//! Centralized configuration constants for Remotely.
//!
//! Organized by component. Anything a user may want to tune lives in
//! [`crate::Config`] instead.

/// Local and server process handling.
pub mod process {
    use std::time::Duration;

    /// Reader chunk size in bytes.
    pub const READ_CHUNK: usize = 1024;
    /// Marker emitted by the shell prompt hook to report its working directory.
    pub const DIRECTORY_MARKER: &str = "Directory: ";
    /// Prefix applied to every stderr line.
    pub const STDERR_PREFIX: &str = "ERROR: ";
    /// How long shutdown waits for a killed owned process to be reaped.
    pub const REAP_TIMEOUT: Duration = Duration::from_secs(3);
}

/// SSH defaults.
pub mod ssh {
    /// Port used when the target omits one.
    pub const DEFAULT_PORT: u16 = 22;
    /// Terminal type requested for the shell channel.
    pub const TERM: &str = "xterm";
    /// Pseudo-terminal size requested for the shell channel.
    pub const PTY_COLUMNS: u32 = 120;
    pub const PTY_ROWS: u32 = 40;
    /// Command used for the fallback remote command-name fetch.
    pub const COMMAND_LIST: &str = "bash -lc 'compgen -c'";
    /// Lines after `help` within which the listing must start.
    pub const HELP_PREAMBLE_LINES: usize = 5;
}

/// Completion limits.
pub mod completion {
    /// Default TTL for the local PATH executable cache, in seconds.
    pub const DEFAULT_CACHE_SECS: u64 = 60;
}

/// Session history and the recent-hosts list.
pub mod history {
    /// Number of SSH targets kept in `recent-hosts`.
    pub const MAX_RECENT_HOSTS: usize = 10;
}

/// Scrollback buffer configuration.
pub mod scrollback {
    /// Largest transcript accepted by `load_transcript`, in bytes.
    pub const MAX_TRANSCRIPT_BYTES: u64 = 16 * 1024 * 1024;
}

/// Display fallbacks for hosts without font metrics.
pub mod view {
    /// Default cell width in pixels.
    pub const CELL_WIDTH: f32 = 6.0;
    /// Default line height in pixels.
    pub const LINE_HEIGHT: f32 = 9.0;
    /// Default viewport width in columns.
    pub const COLUMNS: u32 = 120;
    /// Minimum run of spaces that splits a status line into left and right.
    pub const STATUS_SPLIT_SPACES: usize = 5;
}

/// Settings file validation limits.
pub mod settings {
    /// Maximum settings file size in bytes (64 KB).
    /// Settings files should be tiny; anything larger is suspicious.
    pub const MAX_FILE_SIZE: u64 = 64 * 1024;
}

#[cfg(test)]
#[allow(clippy::assertions_on_constants)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_marker_has_separator() {
        assert!(process::DIRECTORY_MARKER.ends_with(": "));
    }

    #[test]
    fn test_default_port_is_ssh() {
        assert_eq!(ssh::DEFAULT_PORT, 22);
    }

    #[test]
    fn test_view_defaults_are_positive() {
        assert!(view::CELL_WIDTH > 0.0);
        assert!(view::LINE_HEIGHT > 0.0);
        assert!(view::COLUMNS > 0);
    }

    #[test]
    fn test_transcript_limit_exceeds_settings_limit() {
        assert!(scrollback::MAX_TRANSCRIPT_BYTES > settings::MAX_FILE_SIZE);
    }
}
