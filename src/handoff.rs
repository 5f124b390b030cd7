//! Handoff of a completed capture file.
//!
//! The finished contents are copied to `<output>.<suffix>`, then the output
//! file is truncated in place. The output path keeps its inode, owner and
//! mode, and anyone holding it open sees a zero-length file afterwards.
//!
//! Between the copy and the truncation the output path still shows the old
//! capture; it is never missing and never shares storage with the handed-off
//! file. A failed copy leaves the output untouched and removes any partial
//! target.

use crate::SniffError;
use log::{debug, warn};
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

/// `<output>.<suffix>`
pub fn handoff_path(output: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(output.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Hand `output` off under `<output>.<suffix>` and truncate `output`.
///
/// Returns the timestamped path now holding the completed capture.
pub fn hand_off(output: &Path, suffix: &str) -> Result<PathBuf, SniffError> {
    let target = handoff_path(output, suffix);

    if let Err(e) = fs::copy(output, &target) {
        if target.is_file() {
            if let Err(cleanup) = fs::remove_file(&target) {
                warn!(
                    "Cannot remove partial copy {}: {}",
                    target.display(),
                    cleanup
                );
            }
        }
        return Err(e.into());
    }

    OpenOptions::new().write(true).open(output)?.set_len(0)?;
    debug!("Copied {} to {}", output.display(), target.display());
    Ok(target)
}
