//! Error types for the `ocrvid` crate.
//!
//! [`OcrvidError`] is the unified error returned by every fallible operation.
//! Variants are grouped the way callers handle them: source errors, sampling
//! misconfiguration (user errors, reported before any frame is read),
//! detection errors (per frame or capability-wide), output errors, and the
//! external-API path (credentials, playlist, download).

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use serde_json::Error as JsonError;
use thiserror::Error;

/// The unified error type for all `ocrvid` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OcrvidError {
    /// The video could not be opened (missing path, corrupt container,
    /// unsupported codec, or no video stream).
    #[error("Failed to open video at {path}: {reason}")]
    SourceUnavailable {
        /// Path that was passed to [`crate::VideoFile::open`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// Both a fixed frame step and a time interval were requested.
    #[error("Conflicting sampling options: give either a frame step or a time interval, not both")]
    ConflictingSamplingSpec,

    /// Interval sampling was requested but the video reports no frame rate.
    #[error("Cannot sample by time interval: the video has no frame rate metadata")]
    MissingFpsMetadata,

    /// The interval is too small for the frame rate and would yield a step
    /// below one frame. A non-positive interval is degenerate at any rate
    /// and is reported without one.
    #[error("Interval of {interval_seconds}s gives a frame step below 1{}", fps_suffix(.fps))]
    DegenerateInterval {
        /// Frames per second reported by the video, if it was consulted.
        fps: Option<f64>,
        /// The requested interval in seconds.
        interval_seconds: f64,
    },

    /// A fixed frame step of zero was requested.
    #[error("Frame step must be at least 1")]
    InvalidFrameStep,

    /// The detector failed on one frame. The session absorbs this unless
    /// configured to abort.
    #[error("Text detection failed on frame {frame_index}: {cause}")]
    DetectionFailed {
        /// Index of the frame in the unsampled stream.
        frame_index: u64,
        /// Message reported by the detector.
        cause: String,
    },

    /// The detector capability cannot be used at all.
    #[error("Text detector unavailable: {0}")]
    DetectorUnavailable(String),

    /// Writing an output file failed.
    #[error("Failed to write {path}: {cause}")]
    WriteFailed {
        /// Destination that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        cause: IoError,
    },

    /// A frame was appended out of order.
    #[error("Frame {frame_index} is not after frame {last_index}")]
    FrameOutOfOrder {
        /// Index that was rejected.
        frame_index: u64,
        /// Last index already in the document.
        last_index: u64,
    },

    /// A file in a frame directory does not follow the `frame-<index>.png`
    /// naming contract.
    #[error("Not a frame file (expected frame-<index>.png): {0}")]
    InvalidFrameFile(PathBuf),

    /// The frame directory path exists but is not a directory.
    #[error("Frame directory path exists and is not a directory: {0}")]
    FrameSinkNotDirectory(PathBuf),

    /// A run configuration failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No API key could be resolved.
    #[error("No API key found (alias {alias:?}, environment variable {env_var:?})")]
    CredentialMissing {
        /// Alias looked up in the key file.
        alias: Option<String>,
        /// Environment variable consulted as a fallback.
        env_var: Option<String>,
    },

    /// The playlist API returned an error or an unexpected payload.
    #[error("Playlist request failed: {0}")]
    PlaylistError(String),

    /// Listing or downloading a video stream failed.
    #[error("Download failed: {0}")]
    DownloadError(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while encoding or decoding frames.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// JSON serialization or parsing failed.
    #[error("JSON error: {0}")]
    JsonError(#[from] JsonError),
}

impl From<FfmpegError> for OcrvidError {
    fn from(error: FfmpegError) -> Self {
        OcrvidError::FfmpegError(error.to_string())
    }
}

#[cfg(feature = "playlist")]
impl From<reqwest::Error> for OcrvidError {
    fn from(error: reqwest::Error) -> Self {
        OcrvidError::PlaylistError(error.to_string())
    }
}

fn fps_suffix(fps: &Option<f64>) -> String {
    fps.map(|fps| format!(" at {fps} fps")).unwrap_or_default()
}

impl OcrvidError {
    /// Returns `true` for sampling and configuration errors, which are the
    /// caller's to fix and are never retried.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            OcrvidError::ConflictingSamplingSpec
                | OcrvidError::MissingFpsMetadata
                | OcrvidError::DegenerateInterval { .. }
                | OcrvidError::InvalidFrameStep
                | OcrvidError::InvalidConfig(_)
        )
    }
}
