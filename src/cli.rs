//! Command line arguments.

use crate::archive::ArchiveFormat;
use crate::config::{SniffOptions, TimestampMode};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// Capture filtered packets into a rotating pcap file.
///
/// Values given on the command line override the config file, which in turn
/// overrides the built-in defaults.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Interface to capture on [default: eth0]
    #[arg(short = 'i', long)]
    pub interface: Option<String>,

    /// Capture file path [default: out.pcap]
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// BPF filter expression [default: "udp and port 5060"]
    #[arg(short = 'f', long)]
    pub filter: Option<String>,

    /// Rotate the capture file every N minutes [default: 1]
    #[arg(short = 'r', long = "rotate")]
    pub rotate_minutes: Option<u64>,

    /// Compress rotated files
    #[arg(short = 'z', long = "zip")]
    pub compress: bool,

    /// Print every captured packet (double dash only; `-debug` is rejected)
    #[arg(long)]
    pub debug: bool,

    /// PID file used to prevent concurrent runs [default: /var/run/sniff.pid]
    #[arg(short = 'p', long)]
    pub pid_file: Option<PathBuf>,

    /// Snapshot length in bytes [default: 4096]
    #[arg(long)]
    pub snaplen: Option<u32>,

    /// Put the interface into promiscuous mode
    #[arg(long)]
    pub promisc: bool,

    /// Capture read timeout in milliseconds [default: 1000]
    #[arg(long)]
    pub timeout_ms: Option<u32>,

    /// Archive format for rotated files
    #[arg(long, value_enum)]
    pub archive_format: Option<ArchiveFormat>,

    /// Which time names a rotated file
    #[arg(long, value_enum)]
    pub timestamp_mode: Option<TimestampMode>,

    /// JSON config file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// List capture devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

impl Args {
    /// Merge these arguments over the config file (if any) and the defaults.
    pub fn into_options(self) -> Result<SniffOptions> {
        let base = match &self.config {
            Some(path) => SniffOptions::from_file(path)?,
            None => SniffOptions::default(),
        };

        Ok(SniffOptions {
            interface: self.interface.unwrap_or(base.interface),
            output: self.output.unwrap_or(base.output),
            filter: self.filter.unwrap_or(base.filter),
            rotate_minutes: self.rotate_minutes.unwrap_or(base.rotate_minutes),
            compress: self.compress || base.compress,
            debug: self.debug || base.debug,
            pid_file: self.pid_file.unwrap_or(base.pid_file),
            snaplen: self.snaplen.unwrap_or(base.snaplen),
            promiscuous: self.promisc || base.promiscuous,
            timeout_ms: self.timeout_ms.unwrap_or(base.timeout_ms),
            archive_format: self.archive_format.unwrap_or(base.archive_format),
            timestamp_mode: self.timestamp_mode.unwrap_or(base.timestamp_mode),
        })
    }
}
