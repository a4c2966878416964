//! Text detection boundary.
//!
//! The OCR engine is an external capability consumed through the
//! [`TextDetector`] trait: encoded image bytes in, ordered
//! [`TextObservation`]s out. [`TesseractDetector`](crate::TesseractDetector)
//! is the bundled implementation; tests and embedders can supply their own.
//!
//! Bounding boxes are normalized to `[0, 1]` with a **bottom-left origin**:
//! `x` grows rightwards, `y` grows upwards from the bottom edge of the image.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::Path,
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::OcrvidError;

/// Normalized bounding box, serialized as `[x, y, width, height]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    /// Left edge.
    pub x: f64,
    /// Bottom edge, measured from the bottom of the image.
    pub y: f64,
    /// Width as a fraction of the image width.
    pub width: f64,
    /// Height as a fraction of the image height.
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Convert a top-left-origin pixel box into a normalized bottom-left box.
    ///
    /// Returns `None` if the image has a zero dimension.
    pub fn from_top_left_pixels(
        left: u32,
        top: u32,
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
    ) -> Option<Self> {
        if image_width == 0 || image_height == 0 {
            return None;
        }

        let image_width = f64::from(image_width);
        let image_height = f64::from(image_height);
        let x = f64::from(left) / image_width;
        let w = f64::from(width) / image_width;
        let h = f64::from(height) / image_height;
        let bottom = f64::from(top.saturating_add(height)) / image_height;

        Some(Self::new(
            x.clamp(0.0, 1.0),
            (1.0 - bottom).clamp(0.0, 1.0),
            w.clamp(0.0, 1.0),
            h.clamp(0.0, 1.0),
        ))
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from([x, y, width, height]: [f64; 4]) -> Self {
        Self::new(x, y, width, height)
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(bbox: BoundingBox) -> Self {
        [bbox.x, bbox.y, bbox.width, bbox.height]
    }
}

/// One recognized span of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextObservation {
    /// Recognized text.
    pub text: String,
    /// Recognition confidence in `[0, 1]`.
    pub confidence: f64,
    /// Normalized bounding box.
    pub bbox: BoundingBox,
}

impl TextObservation {
    /// Create an observation, clamping `confidence` into `[0, 1]`.
    pub fn new(text: impl Into<String>, confidence: f64, bbox: BoundingBox) -> Self {
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
            bbox,
        }
    }
}

/// Accuracy/speed trade-off requested from the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionLevel {
    /// Full recognition with language correction. This is the default.
    #[default]
    Accurate,
    /// Faster recognition without language correction.
    Fast,
}

impl Display for RecognitionLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            RecognitionLevel::Accurate => f.write_str("accurate"),
            RecognitionLevel::Fast => f.write_str("fast"),
        }
    }
}

impl FromStr for RecognitionLevel {
    type Err = OcrvidError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "accurate" => Ok(RecognitionLevel::Accurate),
            "fast" => Ok(RecognitionLevel::Fast),
            other => Err(OcrvidError::InvalidConfig(format!(
                "unknown recognition level: {other} (expected accurate or fast)"
            ))),
        }
    }
}

/// Per-request detector settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectOptions {
    /// Preferred languages, highest priority first. Empty means auto-detect.
    pub languages: Vec<String>,
    /// Requested recognition level.
    pub recognition_level: RecognitionLevel,
}

impl DetectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = languages.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_recognition_level(mut self, level: RecognitionLevel) -> Self {
        self.recognition_level = level;
        self
    }
}

/// Failure reported by a [`TextDetector`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DetectorError {
    /// The capability cannot be used at all (engine missing, not
    /// installed, unsupported platform). Aborts a run.
    #[error("{0}")]
    Unavailable(String),
    /// Detection failed for this image only.
    #[error("{0}")]
    Failed(String),
}

impl DetectorError {
    /// Map onto the crate error for the frame at `frame_index`.
    pub fn into_frame_error(self, frame_index: u64) -> OcrvidError {
        match self {
            DetectorError::Unavailable(reason) => OcrvidError::DetectorUnavailable(reason),
            DetectorError::Failed(cause) => OcrvidError::DetectionFailed { frame_index, cause },
        }
    }
}

/// A text-recognition engine.
pub trait TextDetector {
    /// Recognize text in an encoded image (PNG, JPEG, ...).
    ///
    /// Observations are returned in the engine's reading order.
    fn detect(
        &self,
        image: &[u8],
        options: &DetectOptions,
    ) -> Result<Vec<TextObservation>, DetectorError>;

    /// Language tags the engine can recognize.
    fn supported_languages(&self) -> Result<Vec<String>, DetectorError>;
}

impl<D: TextDetector + ?Sized> TextDetector for &D {
    fn detect(
        &self,
        image: &[u8],
        options: &DetectOptions,
    ) -> Result<Vec<TextObservation>, DetectorError> {
        (**self).detect(image, options)
    }

    fn supported_languages(&self) -> Result<Vec<String>, DetectorError> {
        (**self).supported_languages()
    }
}

impl<D: TextDetector + ?Sized> TextDetector for Box<D> {
    fn detect(
        &self,
        image: &[u8],
        options: &DetectOptions,
    ) -> Result<Vec<TextObservation>, DetectorError> {
        (**self).detect(image, options)
    }

    fn supported_languages(&self) -> Result<Vec<String>, DetectorError> {
        (**self).supported_languages()
    }
}

/// Recognize text in a single still image held in memory.
///
/// A per-image failure is reported as [`OcrvidError::DetectionFailed`] with
/// `frame_index` 0.
pub fn detect_image<D: TextDetector + ?Sized>(
    detector: &D,
    image: &[u8],
    options: &DetectOptions,
) -> Result<Vec<TextObservation>, OcrvidError> {
    detector
        .detect(image, options)
        .map_err(|error| error.into_frame_error(0))
}

/// Recognize text in an image file.
///
/// # Example
///
/// ```no_run
/// use ocrvid::{DetectOptions, TesseractDetector, detect_image_file};
///
/// let detector = TesseractDetector::new();
/// let options = DetectOptions::new().with_languages(["en-US"]);
/// for observation in detect_image_file(&detector, "frame-0.png", &options)? {
///     println!("{} ({:.2})", observation.text, observation.confidence);
/// }
/// # Ok::<(), ocrvid::OcrvidError>(())
/// ```
pub fn detect_image_file<D: TextDetector + ?Sized, P: AsRef<Path>>(
    detector: &D,
    path: P,
    options: &DetectOptions,
) -> Result<Vec<TextObservation>, OcrvidError> {
    let bytes = std::fs::read(path.as_ref())?;
    detect_image(detector, &bytes, options)
}
