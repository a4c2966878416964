//! Session and run configuration.
//!
//! [`SessionOptions`] is a builder that carries the frame sink, detector
//! settings, failure policy and observer into an
//! [`OcrSession`](crate::OcrSession) without widening every signature.
//! [`RunConfig`] is the complete, versioned description of one video run as
//! assembled by the command line, validated once before any work starts.
//!
//! # Example
//!
//! ```no_run
//! use ocrvid::{DetectionFailurePolicy, RecognitionLevel, SessionOptions};
//!
//! let options = SessionOptions::new()
//!     .with_frame_sink(".frames/talk")
//!     .with_languages(["en-US", "fr-FR"])
//!     .with_recognition_level(RecognitionLevel::Fast)
//!     .with_failure_policy(DetectionFailurePolicy::Abort)
//!     .with_batch_size(50);
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::{
    detector::{DetectOptions, RecognitionLevel},
    error::OcrvidError,
    progress::{LogObserver, SessionObserver},
    sampling::Sampling,
};

/// Version of the [`RunConfig`] layout.
pub const CONFIG_VERSION: u32 = 1;

/// What a session does when the detector fails on a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionFailurePolicy {
    /// Report a warning and continue without the frame. This is the default.
    #[default]
    Skip,
    /// Stop the run with [`OcrvidError::DetectionFailed`].
    Abort,
}

/// Options for an [`OcrSession`](crate::OcrSession).
///
/// A default-constructed value writes no frames, lets the detector pick the
/// language, skips frames the detector fails on and logs through
/// [`LogObserver`].
#[derive(Clone)]
pub struct SessionOptions {
    pub(crate) frame_sink: Option<PathBuf>,
    pub(crate) detect: DetectOptions,
    pub(crate) failure_policy: DetectionFailurePolicy,
    pub(crate) observer: Arc<dyn SessionObserver>,
    pub(crate) batch_size: u64,
}

impl Debug for SessionOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("SessionOptions")
            .field("frame_sink", &self.frame_sink)
            .field("detect", &self.detect)
            .field("failure_policy", &self.failure_policy)
            .field("has_observer", &true)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionOptions {
    /// Defaults: no frame sink, automatic language, accurate recognition,
    /// [`DetectionFailurePolicy::Skip`], progress every 100 frames.
    pub fn new() -> Self {
        Self {
            frame_sink: None,
            detect: DetectOptions::default(),
            failure_policy: DetectionFailurePolicy::default(),
            observer: Arc::new(LogObserver),
            batch_size: 100,
        }
    }

    /// Write every sampled frame to `directory` as `frame-<index>.png`.
    ///
    /// The directory is created when the run starts.
    #[must_use]
    pub fn with_frame_sink<P: Into<PathBuf>>(mut self, directory: P) -> Self {
        self.frame_sink = Some(directory.into());
        self
    }

    /// Preferred recognition languages, highest priority first.
    #[must_use]
    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.detect = self.detect.with_languages(languages);
        self
    }

    #[must_use]
    pub fn with_recognition_level(mut self, level: RecognitionLevel) -> Self {
        self.detect = self.detect.with_recognition_level(level);
        self
    }

    #[must_use]
    pub fn with_failure_policy(mut self, policy: DetectionFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Receive progress and warnings. Replaces the default [`LogObserver`].
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Set how often progress is reported, in frames read.
    /// Clamped to a minimum of 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// The configured frame sink directory.
    pub fn frame_sink(&self) -> Option<&Path> {
        self.frame_sink.as_deref()
    }

    /// The detector settings passed with every frame.
    pub fn detect_options(&self) -> &DetectOptions {
        &self.detect
    }

    pub fn failure_policy(&self) -> DetectionFailurePolicy {
        self.failure_policy
    }
}

/// Everything needed to process one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Layout version, [`CONFIG_VERSION`] for configs built by this crate.
    pub version: u32,
    /// Video to read.
    pub frame_source: PathBuf,
    /// Where the JSON document is written.
    pub output: PathBuf,
    /// Optional directory receiving sampled frames.
    pub frame_sink: Option<PathBuf>,
    pub sampling: Sampling,
    /// Preferred languages, empty for automatic.
    pub languages: Vec<String>,
    pub recognition_level: RecognitionLevel,
    pub detection_failure_policy: DetectionFailurePolicy,
}

impl RunConfig {
    /// A config with default sampling and detector settings.
    pub fn new<S: Into<PathBuf>, O: Into<PathBuf>>(frame_source: S, output: O) -> Self {
        Self {
            version: CONFIG_VERSION,
            frame_source: frame_source.into(),
            output: output.into(),
            frame_sink: None,
            sampling: Sampling::default(),
            languages: Vec::new(),
            recognition_level: RecognitionLevel::default(),
            detection_failure_policy: DetectionFailurePolicy::default(),
        }
    }

    /// Check the config before any frame is read.
    ///
    /// Sampling values that depend on the video (an interval too short for
    /// the frame rate, a missing frame rate) are only detectable once the
    /// video is open and are reported by
    /// [`Sampling::resolve`](crate::Sampling::resolve).
    ///
    /// # Errors
    ///
    /// - [`OcrvidError::InvalidConfig`] for an unknown version or an output
    ///   path without a file name.
    /// - [`OcrvidError::InvalidFrameStep`] for a frame step of 0.
    /// - [`OcrvidError::DegenerateInterval`] for a zero, negative or
    ///   non-finite interval, which gives a step below 1 at any frame rate.
    ///   The error carries no `fps` since the video is not open yet.
    /// - [`OcrvidError::SourceUnavailable`] if the input file does not exist.
    /// - [`OcrvidError::FrameSinkNotDirectory`] if the frame sink path is an
    ///   existing file.
    pub fn validate(&self) -> Result<(), OcrvidError> {
        if self.version != CONFIG_VERSION {
            return Err(OcrvidError::InvalidConfig(format!(
                "unsupported config version {} (expected {CONFIG_VERSION})",
                self.version
            )));
        }

        match self.sampling {
            Sampling::FixedStep(0) => return Err(OcrvidError::InvalidFrameStep),
            Sampling::Interval(interval_seconds)
                if !(interval_seconds.is_finite() && interval_seconds > 0.0) =>
            {
                return Err(OcrvidError::DegenerateInterval {
                    fps: None,
                    interval_seconds,
                });
            }
            _ => {}
        }

        if self.output.file_name().is_none() {
            return Err(OcrvidError::InvalidConfig(format!(
                "output path has no file name: {}",
                self.output.display()
            )));
        }

        if !self.frame_source.is_file() {
            return Err(OcrvidError::SourceUnavailable {
                path: self.frame_source.clone(),
                reason: "no such file".to_string(),
            });
        }

        if let Some(sink) = &self.frame_sink {
            if sink.exists() && !sink.is_dir() {
                return Err(OcrvidError::FrameSinkNotDirectory(sink.clone()));
            }
        }

        Ok(())
    }

    /// Session options matching this config, reporting to `observer`.
    pub fn session_options(&self, observer: Arc<dyn SessionObserver>) -> SessionOptions {
        let mut options = SessionOptions::new()
            .with_languages(self.languages.iter().cloned())
            .with_recognition_level(self.recognition_level)
            .with_failure_policy(self.detection_failure_policy)
            .with_observer(observer);
        if let Some(sink) = &self.frame_sink {
            options = options.with_frame_sink(sink.clone());
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for_existing_file() -> (tempfile::TempDir, RunConfig) {
        let directory = tempfile::tempdir().unwrap();
        let input = directory.path().join("talk.mp4");
        std::fs::write(&input, b"not really a video").unwrap();
        let config = RunConfig::new(&input, directory.path().join("talk.json"));
        (directory, config)
    }

    #[test]
    fn defaults_validate() {
        let (_directory, config) = config_for_existing_file();
        assert_eq!(config.version, CONFIG_VERSION);
        assert_eq!(config.sampling, Sampling::FixedStep(100));
        config.validate().unwrap();
    }

    #[test]
    fn rejects_bad_sampling_before_opening() {
        let (_directory, mut config) = config_for_existing_file();
        config.sampling = Sampling::FixedStep(0);
        assert!(matches!(config.validate(), Err(OcrvidError::InvalidFrameStep)));

        for interval_seconds in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            config.sampling = Sampling::Interval(interval_seconds);
            assert!(
                matches!(
                    config.validate(),
                    Err(OcrvidError::DegenerateInterval { fps: None, .. })
                ),
                "interval {interval_seconds} should be degenerate"
            );
        }
    }

    #[test]
    fn rejects_missing_input_and_future_versions() {
        let (_directory, mut config) = config_for_existing_file();
        config.version = CONFIG_VERSION + 1;
        assert!(matches!(config.validate(), Err(OcrvidError::InvalidConfig(_))));

        let missing = RunConfig::new("/definitely/not/here.mp4", "out.json");
        assert!(matches!(
            missing.validate(),
            Err(OcrvidError::SourceUnavailable { .. })
        ));
    }

    #[test]
    fn rejects_file_as_frame_sink() {
        let (directory, mut config) = config_for_existing_file();
        config.frame_sink = Some(directory.path().join("talk.mp4"));
        assert!(matches!(
            config.validate(),
            Err(OcrvidError::FrameSinkNotDirectory(_))
        ));
    }

    #[test]
    fn session_options_follow_config() {
        let (_directory, mut config) = config_for_existing_file();
        config.languages = vec!["ja".into()];
        config.recognition_level = RecognitionLevel::Fast;
        config.detection_failure_policy = DetectionFailurePolicy::Abort;
        config.frame_sink = Some(PathBuf::from("frames"));

        let options = config.session_options(Arc::new(LogObserver));
        assert_eq!(options.detect_options().languages, vec!["ja".to_string()]);
        assert_eq!(options.detect_options().recognition_level, RecognitionLevel::Fast);
        assert_eq!(options.failure_policy(), DetectionFailurePolicy::Abort);
        assert_eq!(options.frame_sink(), Some(Path::new("frames")));
    }

    #[test]
    fn batch_size_is_clamped() {
        assert_eq!(SessionOptions::new().with_batch_size(0).batch_size, 1);
    }
}
