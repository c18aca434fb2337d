//! Session core: local processes, SSH sessions and completion.
//!
//! Nothing here knows how output is drawn. Sessions write into a shared
//! [`ScrollbackBuffer`]; the view layer reads snapshots of it.

mod command_log;
pub mod completion;
pub mod directory;
mod pid_file;
mod process;
mod reader;
mod scrollback;
pub mod ssh;
mod state;

pub use command_log::CommandLog;
pub use completion::{
    CompletionContext, CompletionEngine, CompletionState, FetchPolicy, RemoteCompletionSource,
};
pub use pid_file::PidFile;
pub use process::{DetachedProcess, LaunchSpec, OwnedProcess, ProcessHandle, ProcessSession, SessionKind};
pub use reader::{spawn_line_reader, LineAssembler};
pub use scrollback::ScrollbackBuffer;
pub use ssh::{RemoteConfig, RemoteSession, RemoteState, SshTarget};
pub use state::{PatternMatcher, ProcessState, ShellMatcher, StateMatcher};
