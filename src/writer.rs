//! Capture file writer.

use crate::SniffError;
use crate::source::Frame;
use log::debug;
use pcap_file::DataLink;
use pcap_file::pcap::{PcapHeader, PcapPacket, PcapWriter};
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};

/// Sequential writer for one pcap file.
///
/// The header is written on [`open`](Self::open); frames are appended in the
/// order they are handed in. Nothing is reordered or buffered beyond the
/// `BufWriter` flushed on [`close`](Self::close).
pub struct CaptureFileWriter {
    path: PathBuf,
    writer: PcapWriter<BufWriter<File>>,
    frames: usize,
}

impl CaptureFileWriter {
    /// Create (or truncate) `path` and write the pcap header.
    pub fn open(path: &Path, datalink: DataLink, snaplen: u32) -> Result<Self, SniffError> {
        let file = File::create(path)?;
        let header = PcapHeader {
            snaplen,
            datalink,
            ..Default::default()
        };
        let mut writer = PcapWriter::with_header(BufWriter::new(file), header)
            .map_err(|e| SniffError::PcapFile(e.to_string()))?;
        // Make the header visible right away so a reader never sees a
        // headerless file at the output path.
        writer
            .flush()
            .map_err(|e| SniffError::PcapFile(e.to_string()))?;

        debug!("Opened capture file {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            writer,
            frames: 0,
        })
    }

    /// Append one frame record.
    pub fn append(&mut self, frame: &Frame) -> Result<(), SniffError> {
        let packet = PcapPacket {
            timestamp: frame.timestamp,
            orig_len: frame.orig_len,
            data: Cow::Borrowed(&frame.data[..]),
        };
        self.writer
            .write_packet(&packet)
            .map_err(|e| SniffError::PcapFile(e.to_string()))?;
        self.frames += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Flush and release the file. Returns the number of frames written.
    pub fn close(self) -> Result<usize, SniffError> {
        let mut buffered = self.writer.into_writer();
        buffered.flush()?;
        buffered.get_ref().sync_data()?;
        debug!(
            "Closed capture file {} after {} frames",
            self.path.display(),
            self.frames
        );
        Ok(self.frames)
    }
}
