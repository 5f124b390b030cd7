//! Archival of handed-off capture files.
//!
//! Compression runs on a single background thread fed by a bounded queue.
//! Delivery is best-effort: a job that does not fit in the queue is dropped,
//! and a job that fails is logged and forgotten. Neither is retried, and the
//! rotation loop never waits on or observes the outcome.

use crate::SniffError;
use flate2::Compression;
use flate2::write::GzEncoder;
use log::{debug, error, info, warn};
use serde::Deserialize;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};

/// Pending archive jobs allowed before new ones are dropped.
pub const ARCHIVE_QUEUE_DEPTH: usize = 16;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    #[default]
    Zip,
    Gzip,
}

impl ArchiveFormat {
    pub fn archiver(self) -> Box<dyn Archiver> {
        match self {
            ArchiveFormat::Zip => Box::new(ZipArchiver),
            ArchiveFormat::Gzip => Box::new(GzipArchiver),
        }
    }
}

/// Compresses a finished capture file.
pub trait Archiver: Send {
    /// Write the archive next to `path` and remove `path` on success.
    fn compress(&self, path: &Path) -> Result<PathBuf, SniffError>;
}

fn with_extension_appended(path: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// `<path>.zip` holding a single deflated entry named after the input file.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipArchiver;

impl Archiver for ZipArchiver {
    fn compress(&self, path: &Path) -> Result<PathBuf, SniffError> {
        let entry = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| SniffError::Archive(format!("no file name in {}", path.display())))?;
        let archive_path = with_extension_appended(path, "zip");

        let mut input = BufReader::new(File::open(path)?);
        let mut writer = zip::ZipWriter::new(BufWriter::new(File::create(&archive_path)?));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        writer
            .start_file(entry, options)
            .map_err(|e| SniffError::Archive(e.to_string()))?;
        io::copy(&mut input, &mut writer)?;
        writer
            .finish()
            .map_err(|e| SniffError::Archive(e.to_string()))?
            .flush()?;

        fs::remove_file(path)?;
        Ok(archive_path)
    }
}

/// `<path>.gz`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GzipArchiver;

impl Archiver for GzipArchiver {
    fn compress(&self, path: &Path) -> Result<PathBuf, SniffError> {
        let archive_path = with_extension_appended(path, "gz");

        let mut input = BufReader::new(File::open(path)?);
        let mut encoder = GzEncoder::new(
            BufWriter::new(File::create(&archive_path)?),
            Compression::default(),
        );
        io::copy(&mut input, &mut encoder)?;
        encoder.finish()?.flush()?;

        fs::remove_file(path)?;
        Ok(archive_path)
    }
}

/// Handle to the background archiver thread.
pub struct ArchiveQueue {
    tx: Option<SyncSender<PathBuf>>,
    worker: Option<JoinHandle<()>>,
}

impl ArchiveQueue {
    pub fn spawn(archiver: Box<dyn Archiver>) -> Result<Self, SniffError> {
        let (tx, rx) = mpsc::sync_channel(ARCHIVE_QUEUE_DEPTH);
        let worker = thread::Builder::new()
            .name("archiver".to_string())
            .spawn(move || archive_worker(archiver, rx))?;
        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
        })
    }

    /// Queue `path` for compression. Returns whether the job was accepted.
    pub fn submit(&self, path: PathBuf) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        match tx.try_send(path) {
            Ok(()) => true,
            Err(TrySendError::Full(path)) => {
                warn!(
                    "Archive queue full, leaving {} uncompressed",
                    path.display()
                );
                false
            }
            Err(TrySendError::Disconnected(path)) => {
                warn!(
                    "Archiver thread gone, leaving {} uncompressed",
                    path.display()
                );
                false
            }
        }
    }

    /// Stop accepting jobs and wait for queued ones to finish.
    pub fn drain(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Archiver thread panicked");
            }
        }
    }
}

impl Drop for ArchiveQueue {
    fn drop(&mut self) {
        // Detach rather than block: pending jobs finish only if the process
        // outlives them.
        self.tx.take();
        self.worker.take();
    }
}

fn archive_worker(archiver: Box<dyn Archiver>, rx: Receiver<PathBuf>) {
    debug!("Archiver thread started");
    for path in rx {
        match archiver.compress(&path) {
            Ok(archive) => info!("Archived {} to {}", path.display(), archive.display()),
            Err(e) => error!("Failed to archive {}: {}", path.display(), e),
        }
    }
    debug!("Archiver thread stopped");
}
