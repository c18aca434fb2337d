//! Windows process control via `taskkill` and the process table.

use anyhow::{Context, Result};
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Check whether a process with this PID exists.
pub fn is_process_alive(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system.process(pid).is_some()
}

/// Force-kill `pid` and all of its descendants.
pub fn kill_process_tree(pid: u32) -> Result<()> {
    let status = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .status()
        .context("Failed to run taskkill")?;
    if !status.success() && is_process_alive(pid) {
        anyhow::bail!("taskkill exited with {}", status);
    }
    Ok(())
}
