//! Shared utilities for Remotely.

mod ttl_cache;

pub use ttl_cache::TtlCache;

/// Panic in debug builds, log error with backtrace in release.
///
/// Use for invariants whose violation should not take a session down in
/// production.
#[macro_export]
macro_rules! debug_panic {
    ( $($fmt_arg:tt)* ) => {
        if cfg!(debug_assertions) {
            panic!( $($fmt_arg)* );
        } else {
            let backtrace = std::backtrace::Backtrace::capture();
            tracing::error!("{}\n{:?}", format_args!($($fmt_arg)*), backtrace);
        }
    };
}
