//! Error handling integration tests.
//!
//! These tests verify that meaningful errors are returned for various
//! failure conditions, before any frame is processed.

use std::fs;

use ocrvid::{
    DetectOptions, OcrvidError, RunConfig, Sampling, TesseractDetector, VideoFile,
    VideoProperties, detect_image_file,
};

#[test]
fn open_nonexistent_file() {
    let result = VideoFile::open("this_file_does_not_exist.mp4");
    let error = result.unwrap_err();
    assert!(
        matches!(error, OcrvidError::SourceUnavailable { .. }),
        "unexpected error: {error:?}"
    );

    let error_message = error.to_string();
    assert!(
        error_message.contains("this_file_does_not_exist.mp4"),
        "Error message should name the file: {error_message}",
    );
}

#[test]
fn open_invalid_file() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let invalid_file_path = temporary_directory.path().join("invalid.mp4");
    fs::write(&invalid_file_path, b"this is not a media file")
        .expect("Failed to write invalid file");

    let result = VideoFile::open(&invalid_file_path);
    assert!(
        matches!(result, Err(OcrvidError::SourceUnavailable { .. })),
        "Expected SourceUnavailable for invalid media file"
    );
}

#[test]
fn conflicting_cadence_fails_before_opening() {
    let result = Sampling::from_options(Some(50), Some(2.0));
    assert!(matches!(result, Err(OcrvidError::ConflictingSamplingSpec)));
    assert!(result.unwrap_err().is_user_error());
}

#[test]
fn config_rejects_zero_step() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let input = temporary_directory.path().join("talk.mp4");
    fs::write(&input, b"placeholder").expect("Failed to write input");

    let mut config = RunConfig::new(&input, temporary_directory.path().join("talk.json"));
    config.sampling = Sampling::FixedStep(0);
    assert!(matches!(config.validate(), Err(OcrvidError::InvalidFrameStep)));
}

#[test]
fn non_positive_interval_is_degenerate_everywhere() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let input = temporary_directory.path().join("talk.mp4");
    fs::write(&input, b"placeholder").expect("Failed to write input");
    let properties = VideoProperties::from_raw(240, 24.0, 320, 240);

    for interval_seconds in [0.0, -2.0] {
        let mut config = RunConfig::new(&input, temporary_directory.path().join("talk.json"));
        config.sampling = Sampling::Interval(interval_seconds);
        let error = config.validate().unwrap_err();
        assert!(
            matches!(error, OcrvidError::DegenerateInterval { .. }),
            "validate: unexpected error {error:?}"
        );
        assert!(error.is_user_error());

        let error = config.sampling.resolve(&properties).unwrap_err();
        assert!(
            matches!(error, OcrvidError::DegenerateInterval { .. }),
            "resolve: unexpected error {error:?}"
        );
    }
}

#[test]
fn missing_detector_is_unavailable() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let image_path = temporary_directory.path().join("frame-0.png");
    image::RgbImage::new(4, 4)
        .save(&image_path)
        .expect("Failed to write image");

    let detector = TesseractDetector::with_command("/nonexistent/tesseract-for-tests");
    let result = detect_image_file(&detector, &image_path, &DetectOptions::new());
    assert!(
        matches!(result, Err(OcrvidError::DetectorUnavailable(_))),
        "unexpected result: {result:?}"
    );
}

#[test]
fn missing_image_is_an_io_error() {
    let detector = TesseractDetector::with_command("/nonexistent/tesseract-for-tests");
    let result = detect_image_file(&detector, "no_such_image.png", &DetectOptions::new());
    assert!(matches!(result, Err(OcrvidError::IoError(_))));
}
