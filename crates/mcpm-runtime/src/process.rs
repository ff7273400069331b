//! Child process termination: polite signal first, kill after a grace period.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
use tokio::time::timeout;
use tracing::warn;

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Asks the process to exit (SIGTERM on Unix).
///
/// A process that already exited is not an error.
pub fn terminate(child: &mut Child) -> io::Result<()> {
    #[cfg(unix)]
    {
        let Some(pid) = child.id() else {
            return Ok(());
        };
        match signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
            Err(e) => Err(io::Error::other(e)),
        }
    }

    #[cfg(not(unix))]
    {
        // No polite signal available.
        child.start_kill()
    }
}

/// Waits up to `grace` for the process to exit, then kills it.
///
/// Always reaps the process.
pub async fn wait_or_kill(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    match timeout(grace, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            warn!(
                pid = ?child.id(),
                grace_secs = grace.as_secs_f64(),
                "process ignored termination, killing"
            );
            child.kill().await?;
            child.wait().await
        }
    }
}
