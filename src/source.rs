//! Capture sources.
//!
//! A [`SourceOpener`] opens one filtered capture session per rotation cycle;
//! the session yields [`Frame`]s through [`FrameSource::next_frame`].

use crate::SniffError;
use log::{debug, info};
use pcap::{Active, Capture, Device};
use std::fmt;
use std::time::Duration;

/// One captured packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Capture time since the Unix epoch.
    pub timestamp: Duration,
    /// Length of the packet on the wire.
    pub orig_len: u32,
    /// Captured bytes, at most the snapshot length.
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(timestamp: Duration, orig_len: u32, data: Vec<u8>) -> Self {
        Self {
            timestamp,
            orig_len,
            data,
        }
    }

    pub fn captured_len(&self) -> u32 {
        self.data.len() as u32
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:06} caplen={} len={} |",
            self.timestamp.as_secs(),
            self.timestamp.subsec_micros(),
            self.captured_len(),
            self.orig_len
        )?;
        for byte in self.data.iter().take(16) {
            write!(f, " {:02x}", byte)?;
        }
        if self.data.len() > 16 {
            write!(f, " ...")?;
        }
        Ok(())
    }
}

/// Parameters for one capture session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSettings {
    pub device: String,
    pub filter: String,
    pub snaplen: i32,
    pub promiscuous: bool,
    pub timeout_ms: i32,
}

/// An open capture session.
pub trait FrameSource {
    /// Blocks until the next frame arrives.
    ///
    /// Returns `Ok(None)` when the read timeout expires with nothing captured.
    fn next_frame(&mut self) -> Result<Option<Frame>, SniffError>;
}

/// Opens capture sessions, one per rotation cycle.
pub trait SourceOpener {
    type Source: FrameSource;

    fn open(&mut self, settings: &CaptureSettings) -> Result<Self::Source, SniffError>;
}

/// Opens live sessions on a network interface through libpcap.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiveOpener;

impl SourceOpener for LiveOpener {
    type Source = LiveSource;

    fn open(&mut self, settings: &CaptureSettings) -> Result<LiveSource, SniffError> {
        let device_open = |source| SniffError::DeviceOpen {
            device: settings.device.clone(),
            source,
        };

        let mut cap = Capture::from_device(settings.device.as_str())
            .map_err(device_open)?
            .snaplen(settings.snaplen)
            .promisc(settings.promiscuous)
            .timeout(settings.timeout_ms)
            .open()
            .map_err(device_open)?;

        cap.filter(&settings.filter, true)
            .map_err(|source| SniffError::Filter {
                filter: settings.filter.clone(),
                source,
            })?;

        info!(
            "Capture session open on {} with filter {:?}",
            settings.device, settings.filter
        );
        Ok(LiveSource { cap })
    }
}

/// A live libpcap session.
pub struct LiveSource {
    cap: Capture<Active>,
}

impl FrameSource for LiveSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SniffError> {
        match self.cap.next_packet() {
            Ok(packet) => {
                let ts = packet.header.ts;
                Ok(Some(Frame {
                    timestamp: Duration::new(ts.tv_sec as u64, ts.tv_usec as u32 * 1_000),
                    orig_len: packet.header.len,
                    data: packet.data.to_vec(),
                }))
            }
            Err(pcap::Error::TimeoutExpired) => {
                debug!("Read timeout expired with no packets");
                Ok(None)
            }
            Err(e) => Err(SniffError::Pcap(e)),
        }
    }
}

/// Names of all capture devices libpcap can see.
pub fn available_devices() -> Result<Vec<String>, SniffError> {
    let devices = Device::list()?;
    Ok(devices.into_iter().map(|d| d.name).collect())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_display_summarises_header_fields() {
        let frame = Frame::new(Duration::new(12, 345_000), 100, vec![0xab; 4]);
        assert_eq!(frame.to_string(), "12.000345 caplen=4 len=100 | ab ab ab ab");
    }

    #[test]
    fn test_frame_display_truncates_long_payloads() {
        let frame = Frame::new(Duration::ZERO, 64, vec![0u8; 64]);
        let line = frame.to_string();
        assert!(line.ends_with(" ..."));
        assert_eq!(line.matches(" 00").count(), 16);
    }

    #[test]
    fn test_captured_len_follows_payload() {
        let frame = Frame::new(Duration::ZERO, 1500, vec![1, 2, 3]);
        assert_eq!(frame.captured_len(), 3);
        assert_eq!(frame.orig_len, 1500);
    }
}
