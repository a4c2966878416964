//! Video property types.
//!
//! [`VideoProperties`] is read once when a [`VideoFile`](crate::VideoFile) is
//! opened. Decoders report "unknown" as zero, so every property is optional
//! and a zero reading is stored as `None` rather than as a size of zero.

use serde::{Deserialize, Serialize};

/// Dimensions, frame rate and length of a video stream.
///
/// # Example
///
/// ```no_run
/// use ocrvid::VideoFile;
///
/// let video = VideoFile::open("input.mp4").unwrap();
/// let props = video.properties();
/// if let Some(fps) = props.fps {
///     println!("{fps:.2} fps");
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[must_use]
pub struct VideoProperties {
    /// Total number of frames, if the container reports or implies it.
    pub frame_count: Option<u64>,
    /// Frames per second (average rate for variable-frame-rate content).
    pub fps: Option<f64>,
    /// Length in seconds, `frame_count / fps` when both are known.
    pub duration_seconds: Option<f64>,
    /// Frame width in pixels.
    pub width: Option<u32>,
    /// Frame height in pixels.
    pub height: Option<u32>,
    /// Codec name (e.g. `"h264"`), if the decoder exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
}

impl VideoProperties {
    /// Build properties from raw decoder readings, treating zero (and any
    /// non-finite or negative rate) as unknown.
    pub fn from_raw(frame_count: u64, fps: f64, width: u32, height: u32) -> Self {
        let frame_count = positive_count(frame_count);
        let fps = positive_rate(fps);
        let duration_seconds = match (frame_count, fps) {
            (Some(count), Some(rate)) => Some(count as f64 / rate),
            _ => None,
        };

        Self {
            frame_count,
            fps,
            duration_seconds,
            width: positive_dimension(width),
            height: positive_dimension(height),
            codec: None,
        }
    }

    /// Attach a codec name.
    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = Some(codec.into());
        self
    }
}

fn positive_count(value: u64) -> Option<u64> {
    (value > 0).then_some(value)
}

fn positive_dimension(value: u32) -> Option<u32> {
    (value > 0).then_some(value)
}

fn positive_rate(value: f64) -> Option<f64> {
    (value.is_finite() && value > 0.0).then_some(value)
}
