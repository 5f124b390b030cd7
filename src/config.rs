//! Runtime options.

use crate::SniffError;
use crate::archive::ArchiveFormat;
use crate::source::CaptureSettings;
use anyhow::{Context, Result};
use chrono::{DateTime, Local, SecondsFormat, TimeDelta};
use pcap_file::DataLink;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which instant names a handed-off file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TimestampMode {
    /// Close time minus the rotation interval.
    #[default]
    Nominal,
    /// When streaming into the file began.
    Start,
    /// When the file was closed.
    Close,
}

impl TimestampMode {
    /// RFC3339 suffix for a cycle that began at `started` and closed at `closed`.
    pub fn suffix(
        self,
        started: DateTime<Local>,
        closed: DateTime<Local>,
        interval: TimeDelta,
    ) -> String {
        let at = match self {
            TimestampMode::Nominal => closed - interval,
            TimestampMode::Start => started,
            TimestampMode::Close => closed,
        };
        at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SniffOptions {
    pub interface: String,
    pub output: PathBuf,
    pub filter: String,
    pub rotate_minutes: u64,
    pub compress: bool,
    pub debug: bool,
    pub pid_file: PathBuf,
    pub snaplen: u32,
    pub promiscuous: bool,
    pub timeout_ms: u32,
    pub archive_format: ArchiveFormat,
    pub timestamp_mode: TimestampMode,
}

impl Default for SniffOptions {
    fn default() -> Self {
        Self {
            interface: "eth0".to_string(),
            output: PathBuf::from("out.pcap"),
            filter: "udp and port 5060".to_string(),
            rotate_minutes: 1,
            compress: false,
            debug: false,
            pid_file: PathBuf::from("/var/run/sniff.pid"),
            snaplen: 4096,
            promiscuous: false,
            timeout_ms: 1000,
            archive_format: ArchiveFormat::Zip,
            timestamp_mode: TimestampMode::Nominal,
        }
    }
}

impl SniffOptions {
    /// Load options from a JSON file; absent keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        let options = serde_json::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), SniffError> {
        if self.rotate_minutes == 0 {
            return Err(SniffError::Config(
                "rotation interval must be at least one minute".to_string(),
            ));
        }
        if TimeDelta::try_minutes(self.rotate_minutes as i64).is_none() {
            return Err(SniffError::Config(format!(
                "rotation interval of {} minutes is too large",
                self.rotate_minutes
            )));
        }
        if self.snaplen == 0 || i32::try_from(self.snaplen).is_err() {
            return Err(SniffError::Config(format!(
                "snapshot length {} is out of range",
                self.snaplen
            )));
        }
        if i32::try_from(self.timeout_ms).is_err() {
            return Err(SniffError::Config(format!(
                "read timeout {}ms is out of range",
                self.timeout_ms
            )));
        }
        if self.interface.is_empty() {
            return Err(SniffError::InvalidDevice(self.interface.clone()));
        }
        if self.output.as_os_str().is_empty() {
            return Err(SniffError::Config("output path is empty".to_string()));
        }
        Ok(())
    }

    /// Rotation interval. Only meaningful after [`validate`](Self::validate).
    pub fn rotation_interval(&self) -> TimeDelta {
        TimeDelta::try_minutes(self.rotate_minutes as i64).unwrap_or(TimeDelta::MAX)
    }

    /// Rotation interval as a monotonic duration.
    pub fn rotation_deadline(&self) -> Duration {
        Duration::from_secs(self.rotate_minutes.saturating_mul(60))
    }

    /// Link type written into every capture file header.
    pub fn datalink(&self) -> DataLink {
        DataLink::ETHERNET
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            device: self.interface.clone(),
            filter: self.filter.clone(),
            snaplen: i32::try_from(self.snaplen).unwrap_or(i32::MAX),
            promiscuous: self.promiscuous,
            timeout_ms: i32::try_from(self.timeout_ms).unwrap_or(i32::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_sniff_options_default() {
        let options = SniffOptions::default();
        assert_eq!(options.interface, "eth0");
        assert_eq!(options.output, PathBuf::from("out.pcap"));
        assert_eq!(options.filter, "udp and port 5060");
        assert_eq!(options.rotate_minutes, 1);
        assert!(!options.compress);
        assert!(!options.debug);
        assert_eq!(options.pid_file, PathBuf::from("/var/run/sniff.pid"));
        assert_eq!(options.snaplen, 4096);
        assert!(!options.promiscuous);
        assert_eq!(options.rotation_deadline(), Duration::from_secs(60));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_rotation = SniffOptions {
            rotate_minutes: 0,
            ..Default::default()
        };
        assert!(matches!(
            zero_rotation.validate(),
            Err(SniffError::Config(_))
        ));

        let huge_snaplen = SniffOptions {
            snaplen: u32::MAX,
            ..Default::default()
        };
        assert!(huge_snaplen.validate().is_err());

        let no_device = SniffOptions {
            interface: String::new(),
            ..Default::default()
        };
        assert!(matches!(
            no_device.validate(),
            Err(SniffError::InvalidDevice(_))
        ));
    }

    #[test]
    fn test_from_file_fills_missing_keys_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sniff.json");
        fs::write(
            &path,
            r#"{ "interface": "lo", "rotate_minutes": 5, "archive_format": "gzip" }"#,
        )
        .unwrap();

        let options = SniffOptions::from_file(&path).unwrap();
        assert_eq!(options.interface, "lo");
        assert_eq!(options.rotate_minutes, 5);
        assert_eq!(options.archive_format, ArchiveFormat::Gzip);
        assert_eq!(options.filter, "udp and port 5060");
        assert_eq!(options.timestamp_mode, TimestampMode::Nominal);
    }

    #[test]
    fn test_from_file_rejects_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sniff.json");
        fs::write(&path, r#"{ "interfcae": "lo" }"#).unwrap();
        assert!(SniffOptions::from_file(&path).is_err());
    }

    #[test]
    fn test_capture_settings_carry_options() {
        let options = SniffOptions {
            interface: "lo".to_string(),
            filter: "tcp".to_string(),
            promiscuous: true,
            ..Default::default()
        };
        let settings = options.capture_settings();
        assert_eq!(settings.device, "lo");
        assert_eq!(settings.filter, "tcp");
        assert_eq!(settings.snaplen, 4096);
        assert_eq!(settings.timeout_ms, 1000);
        assert!(settings.promiscuous);
    }

    #[test]
    fn test_suffix_modes() {
        let started = chrono::Utc
            .with_ymd_and_hms(2024, 5, 1, 10, 0, 0)
            .unwrap()
            .with_timezone(&Local);
        let closed = started + TimeDelta::seconds(65);
        let interval = TimeDelta::minutes(1);

        let expect = |at: DateTime<Local>| at.to_rfc3339_opts(SecondsFormat::Secs, true);
        assert_eq!(
            TimestampMode::Nominal.suffix(started, closed, interval),
            expect(started + TimeDelta::seconds(5))
        );
        assert_eq!(
            TimestampMode::Start.suffix(started, closed, interval),
            expect(started)
        );
        assert_eq!(
            TimestampMode::Close.suffix(started, closed, interval),
            expect(closed)
        );
    }

    #[test]
    fn test_suffix_is_rfc3339() {
        let at = Local.timestamp_opt(1_700_000_000, 0).unwrap();
        let suffix = TimestampMode::Close.suffix(at, at, TimeDelta::minutes(1));
        let parsed = DateTime::parse_from_rfc3339(&suffix).unwrap();
        assert_eq!(parsed.timestamp(), 1_700_000_000);
    }
}
