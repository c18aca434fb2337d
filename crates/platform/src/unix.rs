//! Unix process control via process groups and `kill(2)`.

use anyhow::Result;

/// Check whether a process with this PID exists.
///
/// An exited but unreaped child still counts; callers owning a `Child`
/// should prefer `try_wait`.
pub fn is_process_alive(pid: u32) -> bool {
    let pid_t: libc::pid_t = match pid.try_into() {
        Ok(pid_t) if pid_t > 0 => pid_t,
        _ => return false,
    };
    // SAFETY: signal 0 performs the existence/permission check without delivering anything.
    if unsafe { libc::kill(pid_t, 0) } == 0 {
        return true;
    }
    // EPERM means the process exists but belongs to someone else.
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Force-kill the process group led by `pid`.
///
/// Processes are spawned as group leaders, so signalling `-pid` reaches every
/// descendant that did not create its own group. Falls back to the single
/// process when `pid` leads no group. A missing process is not an error.
pub fn kill_process_tree(pid: u32) -> Result<()> {
    let pid_t: libc::pid_t = pid
        .try_into()
        .map_err(|_| anyhow::anyhow!("PID {} out of range", pid))?;
    if pid_t <= 0 {
        anyhow::bail!("Refusing to signal PID {}", pid);
    }

    // SAFETY: negative pid targets the process group created for the session leader.
    if unsafe { libc::kill(-pid_t, libc::SIGKILL) } == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() != Some(libc::ESRCH) {
        return Err(err.into());
    }

    // SAFETY: plain kill on the validated pid.
    if unsafe { libc::kill(pid_t, libc::SIGKILL) } == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        tracing::debug!("Process {} already gone", pid);
        return Ok(());
    }
    Err(err.into())
}
