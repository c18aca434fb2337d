//! Shared helpers for terminal integration tests.

#![allow(dead_code)]

use std::time::{Duration, Instant};
use terminal::ScrollbackBuffer;

/// Upper bound for waiting on real processes.
pub const PROCESS_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    condition()
}

/// Wait for `needle` to show up in the scrollback.
pub fn wait_for_output(buffer: &ScrollbackBuffer, needle: &str) -> bool {
    wait_until(PROCESS_TIMEOUT, || buffer.snapshot().contains(needle))
}

pub fn sh_config() -> settings::Config {
    settings::Config {
        shell: Some("/bin/sh".to_string()),
        ..settings::Config::default()
    }
}
