//! The OCR pipeline.
//!
//! An [`OcrSession`] drives one pass over a frame stream: every frame whose
//! index is a multiple of the sampling step is encoded to PNG, optionally
//! written to the frame sink, and handed to the [`TextDetector`]. Frames
//! with at least one observation are appended to the [`OcrDocument`] in
//! stream order. Processing is strictly sequential, which is what keeps the
//! document sorted by frame index.
//!
//! # Example
//!
//! ```no_run
//! use ocrvid::{OcrSession, Sampling, SessionOptions, TesseractDetector, VideoFile};
//!
//! let video = VideoFile::open("talk.mp4")?;
//! let session = OcrSession::new(
//!     TesseractDetector::new(),
//!     SessionOptions::new().with_languages(["en-US"]),
//! );
//! let outcome = session.process_video(video, &Sampling::Interval(1.0))?;
//! println!(
//!     "{} of {} sampled frames had text",
//!     outcome.summary.frames_with_text, outcome.summary.frames_sampled
//! );
//! # Ok::<(), ocrvid::OcrvidError>(())
//! ```

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Serialize;

use crate::{
    config::{DetectionFailurePolicy, RunConfig, SessionOptions},
    conversion::encode_png,
    detector::{DetectorError, TextDetector, TextObservation},
    document::OcrDocument,
    error::OcrvidError,
    frame_sink::FrameSink,
    progress::{ProgressTracker, SessionObserver, SessionWarning},
    sampling::{Sampling, is_sampled},
    store::ResultStore,
    video::VideoFile,
    video_iterator::FrameStream,
};

/// Counters describing one finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Sampling step the run used.
    pub step: u64,
    /// Physical frames read from the stream.
    pub frames_read: u64,
    /// Frames handed to the detector.
    pub frames_sampled: u64,
    /// Sampled frames that produced at least one observation.
    pub frames_with_text: u64,
    /// Sampled frames skipped because the detector failed on them.
    pub detection_failures: u64,
    /// Why decoding ended early, if it did.
    pub decode_stop: Option<String>,
}

/// The document produced by a run and its summary.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub document: OcrDocument,
    pub summary: RunSummary,
}

/// Runs a [`TextDetector`] over sampled frames.
///
/// A session holds no state between runs; each `process_*` call starts from
/// an empty document.
pub struct OcrSession<D> {
    detector: D,
    options: SessionOptions,
}

impl<D: TextDetector> OcrSession<D> {
    pub fn new(detector: D, options: SessionOptions) -> Self {
        Self { detector, options }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Resolve `sampling` against the video and process every sampled frame.
    ///
    /// The step is resolved before the first frame is decoded, so sampling
    /// errors never leave a partially populated frame sink.
    ///
    /// # Errors
    ///
    /// Sampling errors from [`Sampling::resolve`], and every error of
    /// [`run`](OcrSession::run).
    pub fn process_video(
        &self,
        video: VideoFile,
        sampling: &Sampling,
    ) -> Result<SessionOutcome, OcrvidError> {
        let properties = video.properties().clone();
        let step = sampling.resolve(&properties)?;
        let video_file = video.path().to_path_buf();

        log::info!(
            "Processing {} ({sampling}, step {step})",
            video_file.display()
        );
        let frames = video.into_frames()?;
        self.run_stream(frames, step, Some(video_file), properties.frame_count)
    }

    /// Process an already-open frame stream with a resolved `step`.
    ///
    /// # Errors
    ///
    /// - [`OcrvidError::InvalidFrameStep`] if `step` is 0.
    /// - [`OcrvidError::FrameSinkNotDirectory`] or
    ///   [`OcrvidError::WriteFailed`] from the frame sink.
    /// - [`OcrvidError::DetectorUnavailable`] if the detector cannot run.
    /// - [`OcrvidError::DetectionFailed`] for a failed frame under
    ///   [`DetectionFailurePolicy::Abort`].
    /// - [`OcrvidError::FrameOutOfOrder`] if the stream yields indices that
    ///   are not increasing.
    pub fn run<S: FrameStream>(
        &self,
        frames: S,
        step: u64,
        video_file: Option<PathBuf>,
    ) -> Result<SessionOutcome, OcrvidError> {
        self.run_stream(frames, step, video_file, None)
    }

    fn run_stream<S: FrameStream>(
        &self,
        mut frames: S,
        step: u64,
        video_file: Option<PathBuf>,
        total_frames: Option<u64>,
    ) -> Result<SessionOutcome, OcrvidError> {
        if step == 0 {
            return Err(OcrvidError::InvalidFrameStep);
        }

        let sink = self
            .options
            .frame_sink
            .as_ref()
            .map(FrameSink::prepare)
            .transpose()?;

        let mut tracker = ProgressTracker::new(
            Arc::clone(&self.options.observer),
            total_frames,
            self.options.batch_size,
        );
        let mut document = OcrDocument::new(video_file);
        let mut summary = RunSummary {
            step,
            ..RunSummary::default()
        };

        for (index, frame) in frames.by_ref() {
            summary.frames_read += 1;
            let sampled = is_sampled(index, step);
            tracker.advance(index, sampled);
            if !sampled {
                continue;
            }
            summary.frames_sampled += 1;

            let png = encode_png(&frame)?;
            if let Some(sink) = &sink {
                sink.write(index, &png)?;
            }

            let Some(observations) = self.detect_frame(index, &png, &tracker, &mut summary)?
            else {
                continue;
            };
            if document.push_frame(index, observations)? {
                summary.frames_with_text += 1;
            }
        }

        if let Some(reason) = frames.stop_reason() {
            summary.decode_stop = Some(reason.to_string());
            tracker.warn(SessionWarning::DecodingStopped {
                frames_read: summary.frames_read,
                reason: reason.to_string(),
            });
        }
        tracker.finish();

        log::info!(
            "Read {} frame(s), sampled {}, {} with text, {} detection failure(s)",
            summary.frames_read,
            summary.frames_sampled,
            summary.frames_with_text,
            summary.detection_failures
        );
        Ok(SessionOutcome { document, summary })
    }

    /// Run OCR over a frame-sink directory, keying results by frame file.
    ///
    /// Frames are processed in ascending index order.
    ///
    /// # Errors
    ///
    /// - [`OcrvidError::SourceUnavailable`] if `directory` is not a directory.
    /// - [`OcrvidError::InvalidFrameFile`] for a `.png` not named
    ///   `frame-<index>.png`.
    /// - Detector errors as in [`run`](OcrSession::run).
    pub fn process_directory(&self, directory: &Path) -> Result<SessionOutcome, OcrvidError> {
        if !directory.is_dir() {
            return Err(OcrvidError::SourceUnavailable {
                path: directory.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }

        let frame_files = FrameSink::prepare(directory)?.frame_files()?;
        let mut tracker = ProgressTracker::new(
            Arc::clone(&self.options.observer),
            Some(frame_files.len() as u64),
            self.options.batch_size,
        );
        let mut document = OcrDocument::new(None);
        let mut summary = RunSummary {
            step: 1,
            ..RunSummary::default()
        };

        for (index, path) in frame_files {
            summary.frames_read += 1;
            summary.frames_sampled += 1;
            tracker.advance(index, true);

            let bytes = std::fs::read(&path)?;
            let Some(observations) = self.detect_frame(index, &bytes, &tracker, &mut summary)?
            else {
                continue;
            };
            if document.push_frame_file(&path, observations)? {
                summary.frames_with_text += 1;
            }
        }
        tracker.finish();

        Ok(SessionOutcome { document, summary })
    }

    /// Detect text on one frame, applying the failure policy.
    ///
    /// `Ok(None)` means the frame was skipped.
    fn detect_frame(
        &self,
        index: u64,
        image: &[u8],
        tracker: &ProgressTracker,
        summary: &mut RunSummary,
    ) -> Result<Option<Vec<TextObservation>>, OcrvidError> {
        match self.detector.detect(image, &self.options.detect) {
            Ok(observations) => Ok(Some(observations)),
            Err(DetectorError::Failed(cause))
                if self.options.failure_policy == DetectionFailurePolicy::Skip =>
            {
                summary.detection_failures += 1;
                tracker.warn(SessionWarning::DetectionFailed {
                    frame_index: index,
                    cause,
                });
                Ok(None)
            }
            Err(error) => {
                if matches!(error, DetectorError::Failed(_)) {
                    summary.detection_failures += 1;
                }
                Err(error.into_frame_error(index))
            }
        }
    }
}

/// Run OCR over a frame-sink directory.
///
/// Shorthand for [`OcrSession::process_directory`] that returns only the
/// document.
///
/// # Example
///
/// ```no_run
/// use ocrvid::{SessionOptions, TesseractDetector, detect_frame_directory};
///
/// let document = detect_frame_directory(
///     TesseractDetector::new(),
///     ".frames/talk",
///     &SessionOptions::new(),
/// )?;
/// for frame in &document.frames {
///     println!("{:?}: {} line(s)", frame.frame, frame.results.len());
/// }
/// # Ok::<(), ocrvid::OcrvidError>(())
/// ```
pub fn detect_frame_directory<D: TextDetector, P: AsRef<Path>>(
    detector: D,
    directory: P,
    options: &SessionOptions,
) -> Result<OcrDocument, OcrvidError> {
    OcrSession::new(detector, options.clone())
        .process_directory(directory.as_ref())
        .map(|outcome| outcome.document)
}

/// Execute a validated [`RunConfig`]: open the video, run the session and
/// write the document.
///
/// Nothing is written when any step fails; a previous output file is left
/// in place.
///
/// # Errors
///
/// Every error of [`RunConfig::validate`], [`VideoFile::open`],
/// [`OcrSession::process_video`] and [`ResultStore::write`].
pub fn run_video<D: TextDetector>(
    config: &RunConfig,
    detector: D,
    observer: Arc<dyn SessionObserver>,
) -> Result<SessionOutcome, OcrvidError> {
    config.validate()?;
    let video = VideoFile::open(&config.frame_source)?;
    let session = OcrSession::new(detector, config.session_options(observer));
    let outcome = session.process_video(video, &config.sampling)?;
    ResultStore::write(&outcome.document, &config.output)?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use image::RgbImage;

    use super::*;
    use crate::{
        detector::{BoundingBox, DetectOptions},
        progress::ProgressInfo,
    };

    /// Reads the frame number back from the red channel of pixel (0, 0).
    struct PixelDetector {
        failing: Vec<u8>,
        silent: Vec<u8>,
        seen: Mutex<Vec<u8>>,
    }

    impl PixelDetector {
        fn new() -> Self {
            Self {
                failing: Vec::new(),
                silent: Vec::new(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl TextDetector for PixelDetector {
        fn detect(
            &self,
            image: &[u8],
            _options: &DetectOptions,
        ) -> Result<Vec<TextObservation>, DetectorError> {
            let decoded = image::load_from_memory(image).unwrap().to_rgb8();
            let marker = decoded.get_pixel(0, 0)[0];
            self.seen.lock().unwrap().push(marker);
            if self.failing.contains(&marker) {
                return Err(DetectorError::Failed(format!("cannot read {marker}")));
            }
            if self.silent.contains(&marker) {
                return Ok(Vec::new());
            }
            Ok(vec![TextObservation::new(
                format!("frame {marker}"),
                0.9,
                BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            )])
        }

        fn supported_languages(&self) -> Result<Vec<String>, DetectorError> {
            Ok(vec!["en-US".into()])
        }
    }

    struct NoEngine;

    impl TextDetector for NoEngine {
        fn detect(
            &self,
            _image: &[u8],
            _options: &DetectOptions,
        ) -> Result<Vec<TextObservation>, DetectorError> {
            Err(DetectorError::Unavailable("engine missing".into()))
        }

        fn supported_languages(&self) -> Result<Vec<String>, DetectorError> {
            Err(DetectorError::Unavailable("engine missing".into()))
        }
    }

    #[derive(Default)]
    struct Warnings(Mutex<Vec<SessionWarning>>);

    impl SessionObserver for Warnings {
        fn on_progress(&self, _info: &ProgressInfo) {}

        fn on_warning(&self, warning: &SessionWarning) {
            self.0.lock().unwrap().push(warning.clone());
        }
    }

    fn frames(count: u64) -> std::vec::IntoIter<(u64, RgbImage)> {
        (0..count)
            .map(|index| {
                let marker = (index % 256) as u8;
                (index, RgbImage::from_pixel(4, 4, image::Rgb([marker, 0, 0])))
            })
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn samples_every_step_in_order() {
        let detector = PixelDetector::new();
        let session = OcrSession::new(&detector, SessionOptions::new());
        let outcome = session.run(frames(10), 3, None).unwrap();

        assert_eq!(outcome.document.frame_indices(), vec![0, 3, 6, 9]);
        assert_eq!(*detector.seen.lock().unwrap(), vec![0, 3, 6, 9]);
        assert_eq!(outcome.summary.frames_read, 10);
        assert_eq!(outcome.summary.frames_sampled, 4);
        assert_eq!(outcome.summary.frames_with_text, 4);
        assert_eq!(outcome.document.frames[1].results[0].text, "frame 3");
    }

    #[test]
    fn drops_frames_without_text() {
        let mut detector = PixelDetector::new();
        detector.silent = vec![0, 4];
        let session = OcrSession::new(&detector, SessionOptions::new());
        let outcome = session.run(frames(10), 2, None).unwrap();

        assert_eq!(outcome.document.frame_indices(), vec![2, 6, 8]);
        assert_eq!(outcome.summary.frames_sampled, 5);
        assert_eq!(outcome.summary.frames_with_text, 3);
    }

    #[test]
    fn skips_failed_frames_and_warns() {
        let mut detector = PixelDetector::new();
        detector.failing = vec![2];
        let warnings = Arc::new(Warnings::default());
        let options = SessionOptions::new().with_observer(warnings.clone());
        let outcome = OcrSession::new(&detector, options)
            .run(frames(5), 1, None)
            .unwrap();

        assert_eq!(outcome.document.frame_indices(), vec![0, 1, 3, 4]);
        assert_eq!(outcome.summary.detection_failures, 1);
        let warnings = warnings.0.lock().unwrap();
        assert!(matches!(
            warnings.as_slice(),
            [SessionWarning::DetectionFailed { frame_index: 2, .. }]
        ));
    }

    #[test]
    fn abort_policy_stops_at_first_failure() {
        let mut detector = PixelDetector::new();
        detector.failing = vec![2];
        let options = SessionOptions::new().with_failure_policy(DetectionFailurePolicy::Abort);
        let result = OcrSession::new(&detector, options).run(frames(5), 1, None);

        assert!(matches!(
            result,
            Err(OcrvidError::DetectionFailed { frame_index: 2, .. })
        ));
        assert_eq!(*detector.seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn unavailable_detector_aborts() {
        let result = OcrSession::new(NoEngine, SessionOptions::new()).run(frames(3), 1, None);
        assert!(matches!(result, Err(OcrvidError::DetectorUnavailable(_))));
    }

    #[test]
    fn zero_step_is_rejected() {
        let result = OcrSession::new(NoEngine, SessionOptions::new()).run(frames(3), 0, None);
        assert!(matches!(result, Err(OcrvidError::InvalidFrameStep)));
    }

    #[test]
    fn writes_sampled_frames_to_sink() {
        let directory = tempfile::tempdir().unwrap();
        let sink = directory.path().join("frames");
        let detector = PixelDetector::new();
        let options = SessionOptions::new().with_frame_sink(&sink);
        OcrSession::new(&detector, options)
            .run(frames(7), 3, Some(PathBuf::from("v.mp4")))
            .unwrap();

        let written = FrameSink::prepare(&sink).unwrap().frame_files().unwrap();
        let indices: Vec<u64> = written.iter().map(|(index, _)| *index).collect();
        assert_eq!(indices, vec![0, 3, 6]);
    }

    #[test]
    fn reports_decode_stop() {
        struct Truncated(std::vec::IntoIter<(u64, RgbImage)>);

        impl Iterator for Truncated {
            type Item = (u64, RgbImage);

            fn next(&mut self) -> Option<Self::Item> {
                self.0.next()
            }
        }

        impl FrameStream for Truncated {
            fn stop_reason(&self) -> Option<&str> {
                Some("corrupt packet")
            }
        }

        let detector = PixelDetector::new();
        let warnings = Arc::new(Warnings::default());
        let options = SessionOptions::new().with_observer(warnings.clone());
        let outcome = OcrSession::new(&detector, options)
            .run(Truncated(frames(4)), 2, None)
            .unwrap();

        assert_eq!(outcome.document.frame_indices(), vec![0, 2]);
        assert_eq!(outcome.summary.decode_stop.as_deref(), Some("corrupt packet"));
        assert_eq!(warnings.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn directory_results_are_keyed_by_file() {
        let directory = tempfile::tempdir().unwrap();
        let detector = PixelDetector::new();
        OcrSession::new(
            &detector,
            SessionOptions::new().with_frame_sink(directory.path()),
        )
        .run(frames(5), 2, None)
        .unwrap();

        let document =
            detect_frame_directory(&detector, directory.path(), &SessionOptions::new()).unwrap();
        assert_eq!(document.frame_indices(), vec![0, 2, 4]);
        assert_eq!(document.video_file, None);
        assert_eq!(
            document.frames[2].frame,
            crate::document::FrameKey::FrameFile(directory.path().join("frame-4.png"))
        );
    }
}
