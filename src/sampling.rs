//! Frame sampling cadence.
//!
//! A run examines every `step`-th physical frame, starting at frame 0. The
//! step comes either from a fixed frame count or from a time interval scaled
//! by the video's frame rate. Steps are never clamped: anything that would
//! give a step below 1 is an error.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

use crate::{error::OcrvidError, metadata::VideoProperties};

/// Frame step used when neither a step nor an interval is given.
pub const DEFAULT_FRAME_STEP: u64 = 100;

/// How a run chooses the frames it examines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sampling {
    /// Every Nth physical frame.
    FixedStep(u64),
    /// One frame per interval, in seconds, converted using the frame rate.
    Interval(f64),
}

impl Default for Sampling {
    fn default() -> Self {
        Sampling::FixedStep(DEFAULT_FRAME_STEP)
    }
}

impl Display for Sampling {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Sampling::FixedStep(step) => write!(f, "every {step} frames"),
            Sampling::Interval(seconds) => write!(f, "every {seconds}s"),
        }
    }
}

impl Sampling {
    /// Build a sampling choice from the two mutually exclusive options.
    ///
    /// # Errors
    ///
    /// Returns [`OcrvidError::ConflictingSamplingSpec`] if both are given.
    pub fn from_options(
        fixed_step: Option<u64>,
        time_interval_seconds: Option<f64>,
    ) -> Result<Self, OcrvidError> {
        match (fixed_step, time_interval_seconds) {
            (Some(_), Some(_)) => Err(OcrvidError::ConflictingSamplingSpec),
            (Some(step), None) => Ok(Sampling::FixedStep(step)),
            (None, Some(seconds)) => Ok(Sampling::Interval(seconds)),
            (None, None) => Ok(Sampling::default()),
        }
    }

    /// Resolve to a concrete frame step for a video.
    ///
    /// # Errors
    ///
    /// - [`OcrvidError::InvalidFrameStep`] for a fixed step of 0.
    /// - [`OcrvidError::MissingFpsMetadata`] for an interval on a video
    ///   without a frame rate.
    /// - [`OcrvidError::DegenerateInterval`] if `floor(fps * interval)` is
    ///   below 1.
    pub fn resolve(&self, props: &VideoProperties) -> Result<u64, OcrvidError> {
        match *self {
            Sampling::FixedStep(0) => Err(OcrvidError::InvalidFrameStep),
            Sampling::FixedStep(step) => Ok(step),
            Sampling::Interval(interval_seconds) => {
                let fps = props
                    .fps
                    .filter(|fps| *fps > 0.0)
                    .ok_or(OcrvidError::MissingFpsMetadata)?;

                // Truncate so the real-time gap never exceeds the request.
                let raw_step = (fps * interval_seconds).floor();
                if !raw_step.is_finite() || raw_step < 1.0 {
                    return Err(OcrvidError::DegenerateInterval {
                        fps: Some(fps),
                        interval_seconds,
                    });
                }

                let step = raw_step as u64;
                log::info!("Frame step {step} from {fps} fps * {interval_seconds}s");
                Ok(step)
            }
        }
    }
}

/// Resolve the sampling step from raw options.
///
/// Shorthand for [`Sampling::from_options`] followed by
/// [`Sampling::resolve`].
///
/// # Example
///
/// ```
/// use ocrvid::{VideoProperties, resolve_step};
///
/// let props = VideoProperties::from_raw(576, 24.0, 1280, 720);
/// assert_eq!(resolve_step(None, Some(1.0), &props).unwrap(), 24);
/// assert_eq!(resolve_step(None, None, &props).unwrap(), 100);
/// assert!(resolve_step(Some(50), Some(2.0), &props).is_err());
/// ```
pub fn resolve_step(
    fixed_step: Option<u64>,
    time_interval_seconds: Option<f64>,
    props: &VideoProperties,
) -> Result<u64, OcrvidError> {
    Sampling::from_options(fixed_step, time_interval_seconds)?.resolve(props)
}

/// Whether the frame at `index` is examined for the given step.
pub fn is_sampled(index: u64, step: u64) -> bool {
    step > 0 && index % step == 0
}

/// Candidate sampled indices for a video of `frame_count` frames.
pub fn sampled_indices(step: u64, frame_count: u64) -> impl Iterator<Item = u64> {
    (0..frame_count).step_by(step.max(1) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(fps: f64) -> VideoProperties {
        VideoProperties::from_raw(0, fps, 640, 480)
    }

    #[test]
    fn fixed_step_passes_through() {
        assert_eq!(Sampling::FixedStep(7).resolve(&props(0.0)).unwrap(), 7);
    }

    #[test]
    fn zero_step_is_rejected() {
        assert!(matches!(
            Sampling::FixedStep(0).resolve(&props(30.0)),
            Err(OcrvidError::InvalidFrameStep)
        ));
    }

    #[test]
    fn interval_truncates() {
        // 29.97 * 1.0 = 29.97 -> 29, never rounded up to 30.
        assert_eq!(Sampling::Interval(1.0).resolve(&props(29.97)).unwrap(), 29);
        assert_eq!(Sampling::Interval(2.5).resolve(&props(24.0)).unwrap(), 60);
    }

    #[test]
    fn sub_frame_interval_is_degenerate() {
        let result = Sampling::Interval(0.01).resolve(&props(30.0));
        assert!(matches!(result, Err(OcrvidError::DegenerateInterval { .. })));

        let negative = Sampling::Interval(-1.0).resolve(&props(30.0));
        assert!(matches!(negative, Err(OcrvidError::DegenerateInterval { .. })));

        let nan = Sampling::Interval(f64::NAN).resolve(&props(30.0));
        assert!(matches!(nan, Err(OcrvidError::DegenerateInterval { .. })));
    }

    #[test]
    fn sampled_indices_stay_in_range() {
        let indices: Vec<u64> = sampled_indices(24, 100).collect();
        assert_eq!(indices, vec![0, 24, 48, 72, 96]);
        assert!(indices.iter().all(|index| is_sampled(*index, 24)));
        assert!(!is_sampled(25, 24));
    }
}
