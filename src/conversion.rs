//! Internal conversion helpers.
//!
//! Pixel-plane copying out of FFmpeg frames, frame-rate arithmetic, and the
//! in-memory PNG encoding shared by the session and the frame sink.

use std::io::Cursor;

use ffmpeg_next::{Rational, frame::Video as VideoFrame};
use image::{ImageFormat, RgbImage};

use crate::error::OcrvidError;

/// Copy an RGB24 plane out of an FFmpeg frame into a tightly-packed buffer.
///
/// FFmpeg rows are often padded (stride > width * 3); the padding is dropped
/// so the result can go straight into [`RgbImage::from_raw`].
pub(crate) fn frame_to_rgb_buffer(video_frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let expected_stride = (width as usize) * 3;
    let data = video_frame.data(0);

    if stride == expected_stride {
        data[..expected_stride * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(expected_stride * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + expected_stride]);
        }
        buffer
    }
}

/// Frames per second for a rational rate, or `0.0` when the denominator is
/// zero (unknown).
pub(crate) fn rational_to_fps(rate: Rational) -> f64 {
    if rate.denominator() != 0 {
        rate.numerator() as f64 / rate.denominator() as f64
    } else {
        0.0
    }
}

/// Encode a frame as PNG in memory.
pub(crate) fn encode_png(image: &RgbImage) -> Result<Vec<u8>, OcrvidError> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}
