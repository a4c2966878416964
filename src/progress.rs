//! Run observation.
//!
//! An OCR session reports what happens during a run through a
//! [`SessionObserver`] passed in with its options: periodic
//! [`ProgressInfo`] snapshots and a [`SessionWarning`] for every recoverable
//! problem. [`LogObserver`], the default, forwards both to the `log` facade.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use ocrvid::{ProgressInfo, SessionObserver, SessionOptions, SessionWarning};
//!
//! struct PrintProgress;
//!
//! impl SessionObserver for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("{pct:.1}% ({} sampled)", info.frames_sampled);
//!         }
//!     }
//!
//!     fn on_warning(&self, warning: &SessionWarning) {
//!         eprintln!("warning: {warning}");
//!     }
//! }
//!
//! let options = SessionOptions::new().with_observer(Arc::new(PrintProgress));
//! ```

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    sync::Arc,
    time::{Duration, Instant},
};

/// A snapshot of run progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Physical frames read so far.
    pub frames_read: u64,
    /// Frames sent to the detector so far.
    pub frames_sampled: u64,
    /// Total frames in the video, if known.
    pub total_frames: Option<u64>,
    /// Completion percentage (0.0 to 100.0), if `total_frames` is known.
    pub percentage: Option<f32>,
    /// Wall-clock time since the run started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
    /// Index of the most recent frame read.
    pub current_frame: Option<u64>,
}

/// A recoverable problem during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionWarning {
    /// The detector failed on one frame; the frame was skipped.
    DetectionFailed {
        /// Index of the skipped frame.
        frame_index: u64,
        /// Detector message.
        cause: String,
    },
    /// Decoding ended before the end of the stream. The document holds the
    /// frames read up to that point.
    DecodingStopped {
        /// Frames read before decoding stopped.
        frames_read: u64,
        /// Decoder message.
        reason: String,
    },
}

impl Display for SessionWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SessionWarning::DetectionFailed { frame_index, cause } => {
                write!(f, "text detection failed on frame {frame_index}, skipped: {cause}")
            }
            SessionWarning::DecodingStopped {
                frames_read,
                reason,
            } => write!(
                f,
                "decoding stopped after {frames_read} frames, results are partial: {reason}"
            ),
        }
    }
}

/// Receives progress and warnings from a session.
///
/// Implementations must be [`Send`] and [`Sync`] so one observer can be
/// shared between runs.
pub trait SessionObserver: Send + Sync {
    /// Called every `batch_size` frames and once at the end of the run.
    fn on_progress(&self, info: &ProgressInfo) {
        let _ = info;
    }

    /// Called once per recoverable problem.
    fn on_warning(&self, warning: &SessionWarning);
}

/// Forwards progress at debug level and warnings at warn level to `log`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl SessionObserver for LogObserver {
    fn on_progress(&self, info: &ProgressInfo) {
        log::debug!(
            "Read {} frame(s), sampled {} ({:?} total)",
            info.frames_read,
            info.frames_sampled,
            info.total_frames
        );
    }

    fn on_warning(&self, warning: &SessionWarning) {
        log::warn!("{warning}");
    }
}

/// Tracks timing and throttles progress callbacks.
pub(crate) struct ProgressTracker {
    observer: Arc<dyn SessionObserver>,
    total: Option<u64>,
    frames_read: u64,
    frames_sampled: u64,
    batch_size: u64,
    start_time: Instant,
    items_since_last_report: u64,
    current_frame: Option<u64>,
}

impl ProgressTracker {
    pub(crate) fn new(
        observer: Arc<dyn SessionObserver>,
        total: Option<u64>,
        batch_size: u64,
    ) -> Self {
        Self {
            observer,
            total,
            frames_read: 0,
            frames_sampled: 0,
            batch_size: batch_size.max(1),
            start_time: Instant::now(),
            items_since_last_report: 0,
            current_frame: None,
        }
    }

    /// Record one frame read and report if the batch threshold is reached.
    pub(crate) fn advance(&mut self, frame_index: u64, sampled: bool) {
        self.frames_read += 1;
        self.current_frame = Some(frame_index);
        if sampled {
            self.frames_sampled += 1;
        }

        self.items_since_last_report += 1;
        if self.items_since_last_report >= self.batch_size {
            self.report();
            self.items_since_last_report = 0;
        }
    }

    /// Forward a warning to the observer.
    pub(crate) fn warn(&self, warning: SessionWarning) {
        self.observer.on_warning(&warning);
    }

    /// Unconditionally emit a final report.
    pub(crate) fn finish(&mut self) {
        self.report();
    }

    fn report(&self) {
        let elapsed = self.start_time.elapsed();

        let percentage = self
            .total
            .filter(|&total| total > 0)
            .map(|total| ((self.frames_read as f32 / total as f32) * 100.0).min(100.0));

        let estimated_remaining = if self.frames_read > 0 {
            self.total.map(|total| {
                let remaining = total.saturating_sub(self.frames_read);
                elapsed.mul_f64(remaining as f64 / self.frames_read as f64)
            })
        } else {
            None
        };

        self.observer.on_progress(&ProgressInfo {
            frames_read: self.frames_read,
            frames_sampled: self.frames_sampled,
            total_frames: self.total,
            percentage,
            elapsed,
            estimated_remaining,
            current_frame: self.current_frame,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        reports: Mutex<Vec<ProgressInfo>>,
        warnings: Mutex<Vec<SessionWarning>>,
    }

    impl SessionObserver for Recorder {
        fn on_progress(&self, info: &ProgressInfo) {
            self.reports.lock().unwrap().push(info.clone());
        }

        fn on_warning(&self, warning: &SessionWarning) {
            self.warnings.lock().unwrap().push(warning.clone());
        }
    }

    #[test]
    fn reports_every_batch_and_at_finish() {
        let recorder = Arc::new(Recorder::default());
        let mut tracker = ProgressTracker::new(recorder.clone(), Some(10), 4);
        for index in 0..10 {
            tracker.advance(index, index % 5 == 0);
        }
        tracker.finish();

        let reports = recorder.reports.lock().unwrap();
        let read: Vec<u64> = reports.iter().map(|info| info.frames_read).collect();
        assert_eq!(read, vec![4, 8, 10]);
        assert_eq!(reports[2].frames_sampled, 2);
        assert_eq!(reports[2].percentage, Some(100.0));
    }

    #[test]
    fn warnings_reach_the_observer() {
        let recorder = Arc::new(Recorder::default());
        let tracker = ProgressTracker::new(recorder.clone(), None, 1);
        tracker.warn(SessionWarning::DetectionFailed {
            frame_index: 5,
            cause: "bad".into(),
        });
        let warnings = recorder.warnings.lock().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].to_string().contains("frame 5"));
    }
}
