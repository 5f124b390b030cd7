//! The rotation loop.
//!
//! Each cycle moves through Opening, Streaming, Closing and Handoff. The state
//! of a cycle lives in [`ActiveCycle`] and [`ClosedCycle`], which are passed by
//! value from one step to the next; nothing is carried between cycles except
//! the controller's fixed configuration and its archive queue.

use crate::SniffError;
use crate::archive::ArchiveQueue;
use crate::clock::Clock;
use crate::config::SniffOptions;
use crate::handoff;
use crate::pidfile;
use crate::source::{FrameSource, SourceOpener};
use crate::writer::CaptureFileWriter;
use chrono::{DateTime, Local, TimeDelta};
use log::{debug, error, info};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// A cycle in the Streaming state: one capture file and one capture session.
pub struct ActiveCycle<S> {
    writer: CaptureFileWriter,
    source: S,
    started: DateTime<Local>,
    started_at: Instant,
}

impl<S> ActiveCycle<S> {
    pub fn started(&self) -> DateTime<Local> {
        self.started
    }

    pub fn frames(&self) -> usize {
        self.writer.frames()
    }
}

/// A cycle whose file and session have both been closed.
#[derive(Debug, Clone)]
pub struct ClosedCycle {
    pub started: DateTime<Local>,
    pub closed: DateTime<Local>,
    pub frames: usize,
    pub suffix: String,
}

/// Outcome of one full cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub frames: usize,
    pub started: DateTime<Local>,
    pub closed: DateTime<Local>,
    /// Where the finished capture went, if the handoff succeeded.
    pub handed_off: Option<PathBuf>,
}

pub struct RotationController<O: SourceOpener, C: Clock> {
    options: SniffOptions,
    interval: TimeDelta,
    deadline: Duration,
    opener: O,
    clock: C,
    archive: Option<ArchiveQueue>,
}

impl<O: SourceOpener, C: Clock> RotationController<O, C> {
    pub fn new(options: SniffOptions, opener: O, clock: C) -> Result<Self, SniffError> {
        options.validate()?;
        Self::build(options, opener, clock)
    }

    /// Validate options, claim the PID marker, then build the controller.
    ///
    /// Nothing touches the output path before the guard has passed.
    pub fn start(options: SniffOptions, opener: O, clock: C) -> Result<Self, SniffError> {
        options.validate()?;
        pidfile::acquire(&options.pid_file)?;
        Self::build(options, opener, clock)
    }

    fn build(options: SniffOptions, opener: O, clock: C) -> Result<Self, SniffError> {
        let archive = if options.compress {
            Some(ArchiveQueue::spawn(options.archive_format.archiver())?)
        } else {
            None
        };
        Ok(Self {
            interval: options.rotation_interval(),
            deadline: options.rotation_deadline(),
            options,
            opener,
            clock,
            archive,
        })
    }

    pub fn options(&self) -> &SniffOptions {
        &self.options
    }

    /// Run cycles until one fails.
    pub fn run(&mut self) -> Result<(), SniffError> {
        info!(
            "Sniffing on {} into {}, rotating every {} minute(s)",
            self.options.interface,
            self.options.output.display(),
            self.options.rotate_minutes
        );
        loop {
            self.run_cycle()?;
        }
    }

    pub fn run_cycle(&mut self) -> Result<CycleReport, SniffError> {
        let mut cycle = self.open()?;
        self.stream(&mut cycle)?;
        let closed = self.close(cycle)?;
        Ok(self.hand_off(closed))
    }

    /// Opening: fresh capture file with header, then a new filtered session.
    pub fn open(&mut self) -> Result<ActiveCycle<O::Source>, SniffError> {
        let writer = CaptureFileWriter::open(
            &self.options.output,
            self.options.datalink(),
            self.options.snaplen,
        )?;
        let source = self.opener.open(&self.options.capture_settings())?;
        let started = self.clock.now();
        let started_at = self.clock.instant();
        info!(
            "Capturing on {} into {}",
            self.options.interface,
            self.options.output.display()
        );
        Ok(ActiveCycle {
            writer,
            source,
            started,
            started_at,
        })
    }

    /// Streaming: append frames until the rotation interval has passed.
    ///
    /// The deadline is only checked between frames (or after a read timeout),
    /// so the frame that crosses it is still written to this file. Elapsed
    /// time is monotonic; wall-clock steps neither shorten nor stretch a cycle.
    pub fn stream(&self, cycle: &mut ActiveCycle<O::Source>) -> Result<(), SniffError> {
        loop {
            if let Some(frame) = cycle.source.next_frame()? {
                if self.options.debug {
                    println!("{}", frame);
                }
                cycle.writer.append(&frame)?;

                let frames = cycle.writer.frames();
                if frames % 1000 == 0 {
                    debug!("Captured {} frames in current file", frames);
                }
            }

            if self.clock.instant().duration_since(cycle.started_at) > self.deadline {
                return Ok(());
            }
        }
    }

    /// Closing: release the file and the session, and name the cycle.
    pub fn close(&self, cycle: ActiveCycle<O::Source>) -> Result<ClosedCycle, SniffError> {
        let ActiveCycle {
            writer,
            source,
            started,
            ..
        } = cycle;
        let frames = writer.close()?;
        drop(source);

        let closed = self.clock.now();
        let suffix = self
            .options
            .timestamp_mode
            .suffix(started, closed, self.interval);
        Ok(ClosedCycle {
            started,
            closed,
            frames,
            suffix,
        })
    }

    /// Handoff: move the finished file aside and queue it for archival.
    ///
    /// Failures here are logged and do not stop the loop.
    pub fn hand_off(&mut self, closed: ClosedCycle) -> CycleReport {
        let handed_off = match handoff::hand_off(&self.options.output, &closed.suffix) {
            Ok(path) => {
                info!("Rotated {} frames into {}", closed.frames, path.display());
                if let Some(archive) = &self.archive {
                    archive.submit(path.clone());
                }
                Some(path)
            }
            Err(e) => {
                error!(
                    "Failed to hand off {}: {}",
                    self.options.output.display(),
                    e
                );
                None
            }
        };

        CycleReport {
            frames: closed.frames,
            started: closed.started,
            closed: closed.closed,
            handed_off,
        }
    }

    /// Wait for queued archive jobs. The loop itself never does this.
    pub fn finish(mut self) {
        if let Some(archive) = self.archive.take() {
            archive.drain();
        }
    }
}
