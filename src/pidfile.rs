//! Single-instance guard backed by a PID file.
//!
//! The marker is never removed, so a stale PID left by a crashed run is
//! expected. Liveness is probed with signal 0: a PID that cannot be signalled
//! counts as not running. That includes a live process owned by another user
//! when we lack permission to signal it, in which case a second instance is
//! allowed to start. This is a known limitation of PID files.

use crate::SniffError;
use log::{debug, info};
use std::fs;
use std::path::Path;

/// Claim the PID marker at `path` for this process.
///
/// Fails with [`SniffError::AlreadyRunning`] if the marker names a live
/// process; otherwise overwrites it with our PID and returns that PID.
pub fn acquire(path: &Path) -> Result<u32, SniffError> {
    if let Some(pid) = read_marker(path) {
        if process_alive(pid) {
            return Err(SniffError::AlreadyRunning(pid));
        }
        debug!("Ignoring stale PID {} in {}", pid, path.display());
    }

    let pid = std::process::id();
    fs::write(path, pid.to_string())?;
    info!("Wrote PID {} to {}", pid, path.display());
    Ok(pid)
}

fn read_marker(path: &Path) -> Option<i32> {
    let contents = fs::read_to_string(path).ok()?;
    contents.trim().parse::<i32>().ok().filter(|pid| *pid > 0)
}

#[cfg(unix)]
fn process_alive(pid: i32) -> bool {
    // SAFETY: signal 0 performs only the existence and permission checks.
    unsafe { libc::kill(pid, 0) == 0 }
}

#[cfg(not(unix))]
fn process_alive(_pid: i32) -> bool {
    false
}
