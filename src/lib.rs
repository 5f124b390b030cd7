//! Continuous filtered packet capture into rotating pcap files.
//!
//! A [`RotationController`] repeatedly opens a capture file and a live
//! capture session, streams matching frames into the file for the configured
//! interval, then hands the finished file off under a timestamped name and
//! optionally compresses it in the background.

pub mod archive;
pub mod cli;
pub mod clock;
pub mod config;
pub mod handoff;
pub mod pidfile;
pub mod rotation;
pub mod source;
pub mod writer;

pub use archive::{ArchiveFormat, ArchiveQueue, Archiver, GzipArchiver, ZipArchiver};
pub use clock::{Clock, SystemClock};
pub use config::{SniffOptions, TimestampMode};
pub use rotation::{ActiveCycle, ClosedCycle, CycleReport, RotationController};
pub use source::{CaptureSettings, Frame, FrameSource, LiveOpener, LiveSource, SourceOpener};
pub use writer::CaptureFileWriter;

use pcap::Error as PcapError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SniffError {
    #[error("pid already running: {0}")]
    AlreadyRunning(i32),

    #[error("Error opening device {device}: {source}")]
    DeviceOpen {
        device: String,
        #[source]
        source: PcapError,
    },

    #[error("Invalid capture filter {filter:?}: {source}")]
    Filter {
        filter: String,
        #[source]
        source: PcapError,
    },

    #[error("Invalid device name: {0:?}")]
    InvalidDevice(String),

    #[error("Pcap error: {0}")]
    Pcap(#[from] PcapError),

    #[error("Pcap file error: {0}")]
    PcapFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Archive error: {0}")]
    Archive(String),
}

/// Claim the PID marker and capture from the live interface forever.
///
/// Returns only on error.
pub fn run(options: SniffOptions) -> Result<(), SniffError> {
    let mut controller = RotationController::start(options, LiveOpener, SystemClock)?;
    controller.run()
}

/// Names of all capture devices on this host.
pub fn get_available_devices() -> Result<Vec<String>, SniffError> {
    source::available_devices()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_startup_messages() {
        assert_eq!(
            SniffError::AlreadyRunning(42).to_string(),
            "pid already running: 42"
        );
        assert_eq!(
            SniffError::Config("bad".to_string()).to_string(),
            "Configuration error: bad"
        );
    }

    #[test]
    fn test_run_rejects_invalid_options_before_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let options = SniffOptions {
            rotate_minutes: 0,
            output: dir.path().join("out.pcap"),
            pid_file: dir.path().join("sniff.pid"),
            ..Default::default()
        };
        assert!(matches!(run(options), Err(SniffError::Config(_))));
        assert!(!dir.path().join("sniff.pid").exists());
        assert!(!dir.path().join("out.pcap").exists());
    }
}
