//! Sampling step resolution tests.
//!
//! These run against synthetic video properties and need no fixtures.

use ocrvid::{OcrvidError, Sampling, VideoProperties, resolve_step, sampling::sampled_indices};

fn properties(fps: f64) -> VideoProperties {
    VideoProperties::from_raw(576, fps, 1280, 720)
}

#[test]
fn default_is_every_hundredth_frame() {
    assert_eq!(resolve_step(None, None, &properties(24.0)).unwrap(), 100);
    assert_eq!(Sampling::default(), Sampling::FixedStep(100));
}

#[test]
fn fixed_step_ignores_frame_rate() {
    assert_eq!(resolve_step(Some(7), None, &VideoProperties::default()).unwrap(), 7);
}

#[test]
fn one_per_second_at_24_fps() {
    let props = properties(24.0);
    let step = resolve_step(None, Some(1.0), &props).unwrap();
    assert_eq!(step, 24);

    let indices: Vec<u64> = sampled_indices(step, props.frame_count.unwrap()).collect();
    assert_eq!(indices.len(), 24);
    assert_eq!(indices.first(), Some(&0));
    assert_eq!(indices.last(), Some(&552));
}

#[test]
fn interval_truncates() {
    // 29.97 * 2 = 59.94 frames.
    assert_eq!(resolve_step(None, Some(2.0), &properties(29.97)).unwrap(), 59);
    assert_eq!(resolve_step(None, Some(0.5), &properties(25.0)).unwrap(), 12);
}

#[test]
fn both_options_conflict_regardless_of_values() {
    for (step, interval) in [(50, 2.0), (1, 0.0), (0, -1.0)] {
        let result = resolve_step(Some(step), Some(interval), &properties(24.0));
        assert!(
            matches!(result, Err(OcrvidError::ConflictingSamplingSpec)),
            "step {step} + interval {interval} should conflict"
        );
    }
}

#[test]
fn zero_fps_is_missing_metadata() {
    let props = VideoProperties::from_raw(100, 0.0, 640, 480);
    assert_eq!(props.fps, None);
    assert!(matches!(
        resolve_step(None, Some(1.0), &props),
        Err(OcrvidError::MissingFpsMetadata)
    ));
}

#[test]
fn sub_frame_interval_is_degenerate() {
    let result = resolve_step(None, Some(0.01), &properties(24.0));
    assert!(matches!(result, Err(OcrvidError::DegenerateInterval { .. })));

    let result = resolve_step(None, Some(-3.0), &properties(24.0));
    assert!(matches!(result, Err(OcrvidError::DegenerateInterval { .. })));
}

#[test]
fn zero_step_is_rejected() {
    assert!(matches!(
        resolve_step(Some(0), None, &properties(24.0)),
        Err(OcrvidError::InvalidFrameStep)
    ));
}

#[test]
fn resolution_is_deterministic() {
    let props = properties(23.976);
    let first = resolve_step(None, Some(3.3), &props).unwrap();
    for _ in 0..10 {
        assert_eq!(resolve_step(None, Some(3.3), &props).unwrap(), first);
    }
}
