//! Configuration system for Remotely.
//!
//! Provides compile-time constants and TOML config file support.

pub mod constants;
pub mod file;

pub use file::{
    config_path, ensure_config_file, load_config, load_config_from, remember_host,
    CompletionConfig, Config, ServerConfig, SshConfig, ViewConfig,
};
