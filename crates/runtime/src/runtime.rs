//! Process-wide Tokio runtime for SSH sessions.
//!
//! Session controllers are driven from a synchronous host loop. Network work
//! is spawned here; the only place a synchronous caller waits on it is
//! [`block_on_timeout`], which always has a deadline.

use anyhow::{Context, Result};
use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Build the runtime if needed and return a handle to it.
pub fn handle() -> Result<Handle> {
    if let Some(runtime) = RUNTIME.get() {
        return Ok(runtime.handle().clone());
    }
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("remotely-tokio")
        .enable_all()
        .build()
        .context("Failed to initialize Tokio runtime")?;
    // A concurrent initializer may have won; its runtime is used and ours is dropped.
    let runtime = RUNTIME.get_or_init(|| runtime);
    Ok(runtime.handle().clone())
}

/// Spawn a future on the shared runtime.
pub fn spawn<Fut>(f: Fut) -> Result<JoinHandle<Fut::Output>>
where
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    Ok(handle()?.spawn(f))
}

/// Run `f` to completion from synchronous code, giving up after `timeout`.
///
/// Must not be called from inside the runtime's own worker threads.
pub fn block_on_timeout<Fut, R>(timeout: Duration, f: Fut) -> Result<R>
where
    Fut: Future<Output = Result<R>> + Send + 'static,
    R: Send + 'static,
{
    if Handle::try_current().is_ok() {
        anyhow::bail!("block_on_timeout called from within the async runtime");
    }
    let handle = handle()?;
    handle.block_on(async move {
        match tokio::time::timeout(timeout, f).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Operation timed out after {:?}", timeout);
                anyhow::bail!("timed out after {}s", timeout.as_secs_f32())
            }
        }
    })
}
