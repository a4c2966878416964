//! Lazy, pull-based frame iteration.
//!
//! [`FrameIterator`] walks every physical frame of a video exactly once,
//! decoding on demand. Frame indices start at 0 and count decoded frames in
//! stream order, independent of timestamps. A decode failure ends the
//! sequence instead of raising; the cause is kept and can be read back with
//! [`FrameStream::stop_reason`].

use ffmpeg_next::{
    Error as FfmpegError, Packet,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::RgbImage;

use crate::{conversion::frame_to_rgb_buffer, error::OcrvidError, video::VideoFile};

/// A finite, forward-only sequence of `(index, frame)` pairs.
///
/// The pipeline consumes frames through this trait so it does not depend on
/// FFmpeg directly.
pub trait FrameStream: Iterator<Item = (u64, RgbImage)> {
    /// Why the sequence ended before the end of the stream, if it did.
    fn stop_reason(&self) -> Option<&str> {
        None
    }
}

impl FrameStream for std::vec::IntoIter<(u64, RgbImage)> {}

/// Iterator over every decoded frame of a [`VideoFile`].
///
/// Owns the demuxer and decoder; both are released when the iterator is
/// dropped, whether the pass finished, was abandoned early, or stopped on a
/// decode failure.
pub struct FrameIterator {
    input_context: Input,
    decoder: VideoDecoder,
    scaler: Option<ScalingContext>,
    video_stream_index: usize,
    next_index: u64,
    decoded_frame: VideoFrame,
    rgb_frame: VideoFrame,
    eof_sent: bool,
    done: bool,
    stop_reason: Option<String>,
}

impl FrameIterator {
    pub(crate) fn new(video: VideoFile) -> Result<Self, OcrvidError> {
        let VideoFile {
            input_context,
            video_stream_index,
            ..
        } = video;

        let decoder = {
            let stream = input_context
                .stream(video_stream_index)
                .ok_or_else(|| OcrvidError::FfmpegError("video stream disappeared".to_string()))?;
            let decoder_context = CodecContext::from_parameters(stream.parameters())?;
            decoder_context.decoder().video()?
        };

        Ok(Self {
            input_context,
            decoder,
            scaler: None,
            video_stream_index,
            next_index: 0,
            decoded_frame: VideoFrame::empty(),
            rgb_frame: VideoFrame::empty(),
            eof_sent: false,
            done: false,
            stop_reason: None,
        })
    }

    /// Number of frames yielded so far.
    pub fn frames_read(&self) -> u64 {
        self.next_index
    }

    /// Convert the current `decoded_frame` to an RGB image.
    ///
    /// The scaler is built from the first decoded frame, since some codecs
    /// only report their pixel format once decoding has started.
    fn convert_current_frame(&mut self) -> Result<RgbImage, OcrvidError> {
        let width = self.decoded_frame.width();
        let height = self.decoded_frame.height();

        if self.scaler.is_none() {
            self.scaler = Some(ScalingContext::get(
                self.decoded_frame.format(),
                width,
                height,
                Pixel::RGB24,
                width,
                height,
                ScalingFlags::BILINEAR,
            )?);
        }
        if let Some(scaler) = self.scaler.as_mut() {
            scaler.run(&self.decoded_frame, &mut self.rgb_frame)?;
        }

        let buffer = frame_to_rgb_buffer(&self.rgb_frame, width, height);
        RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
            OcrvidError::FfmpegError(
                "Failed to construct RGB image from decoded frame data".to_string(),
            )
        })
    }

    fn stop(&mut self, reason: String) {
        log::warn!("Frame decoding stopped at frame {}: {reason}", self.next_index);
        self.stop_reason = Some(reason);
        self.done = true;
    }
}

impl FrameStream for FrameIterator {
    fn stop_reason(&self) -> Option<&str> {
        self.stop_reason.as_deref()
    }
}

impl Iterator for FrameIterator {
    type Item = (u64, RgbImage);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            // Drain frames the decoder has already produced.
            if self.decoder.receive_frame(&mut self.decoded_frame).is_ok() {
                return match self.convert_current_frame() {
                    Ok(image) => {
                        let index = self.next_index;
                        self.next_index += 1;
                        Some((index, image))
                    }
                    Err(error) => {
                        self.stop(error.to_string());
                        None
                    }
                };
            }

            if self.eof_sent {
                log::debug!("End of stream after {} frames", self.next_index);
                self.done = true;
                return None;
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input_context) {
                Ok(()) => {
                    if packet.stream() == self.video_stream_index {
                        if let Err(error) = self.decoder.send_packet(&packet) {
                            self.stop(format!("decoder rejected packet: {error}"));
                            return None;
                        }
                    }
                }
                Err(FfmpegError::Eof) => {
                    if let Err(error) = self.decoder.send_eof() {
                        self.stop(format!("failed to flush decoder: {error}"));
                        return None;
                    }
                    self.eof_sent = true;
                }
                Err(error) => {
                    self.stop(format!("failed to read packet: {error}"));
                    return None;
                }
            }
        }
    }
}

impl Drop for FrameIterator {
    fn drop(&mut self) {
        log::debug!("Releasing decoder after {} frames", self.next_index);
    }
}
