//! Opening videos.
//!
//! [`VideoFile`] is the frame source of the pipeline. It opens a container,
//! picks the best video stream, reads its [`VideoProperties`], and hands the
//! demuxer over to a [`FrameIterator`] for a single forward pass.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};

use ffmpeg_next::{codec::context::Context as CodecContext, format::context::Input, media::Type};

use crate::{
    conversion::rational_to_fps, error::OcrvidError, metadata::VideoProperties,
    video_iterator::FrameIterator,
};

/// An opened video file.
///
/// Created via [`VideoFile::open`]. Properties are read once at open time;
/// frames are read by converting the file into a [`FrameIterator`] with
/// [`into_frames`](VideoFile::into_frames), which consumes the handle so a
/// video can only be walked once.
///
/// # Example
///
/// ```no_run
/// use ocrvid::VideoFile;
///
/// let video = VideoFile::open("input.mp4")?;
/// println!("{:?}", video.properties());
///
/// for (index, frame) in video.into_frames()? {
///     if index % 100 == 0 {
///         frame.save(format!("frame-{index}.png"))?;
///     }
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct VideoFile {
    pub(crate) input_context: Input,
    pub(crate) properties: VideoProperties,
    pub(crate) video_stream_index: usize,
    pub(crate) file_path: PathBuf,
}

impl Debug for VideoFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoFile")
            .field("properties", &self.properties)
            .field("video_stream_index", &self.video_stream_index)
            .field("file_path", &self.file_path)
            .finish_non_exhaustive()
    }
}

impl VideoFile {
    /// Open a video file.
    ///
    /// Initializes FFmpeg (idempotent), opens the container, selects the best
    /// video stream and reads its properties.
    ///
    /// # Errors
    ///
    /// Returns [`OcrvidError::SourceUnavailable`] if the file is missing,
    /// cannot be demuxed, has no video stream, or its codec has no decoder.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, OcrvidError> {
        let path = path.as_ref();
        let file_path = path.to_path_buf();
        let unavailable = |reason: String| OcrvidError::SourceUnavailable {
            path: file_path.clone(),
            reason,
        };

        log::debug!("Opening video: {}", file_path.display());

        ffmpeg_next::init()
            .map_err(|error| unavailable(format!("FFmpeg initialisation failed: {error}")))?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| unavailable(error.to_string()))?;

        let (video_stream_index, properties) = {
            let stream = input_context
                .streams()
                .best(Type::Video)
                .ok_or_else(|| unavailable("no video stream found".to_string()))?;
            let index = stream.index();

            let decoder_context = CodecContext::from_parameters(stream.parameters())
                .map_err(|error| {
                    unavailable(format!(
                        "failed to read codec parameters for stream {index}: {error}"
                    ))
                })?;
            let decoder = decoder_context.decoder().video().map_err(|error| {
                unavailable(format!("failed to create decoder for stream {index}: {error}"))
            })?;

            let mut fps = rational_to_fps(stream.avg_frame_rate());
            if fps <= 0.0 {
                fps = rational_to_fps(stream.rate());
            }

            // Prefer the container's frame count; estimate from duration
            // otherwise.
            let frame_count = if stream.frames() > 0 {
                stream.frames() as u64
            } else {
                let duration_microseconds = input_context.duration();
                if duration_microseconds > 0 && fps > 0.0 {
                    (duration_microseconds as f64 / 1_000_000.0 * fps) as u64
                } else {
                    0
                }
            };

            let mut properties =
                VideoProperties::from_raw(frame_count, fps, decoder.width(), decoder.height());
            if let Some(codec) = decoder.codec() {
                properties = properties.with_codec(codec.name());
            }

            (index, properties)
        };

        log::info!(
            "Opened video: {} (stream={}, {}x{}, fps={:?}, frames={:?})",
            file_path.display(),
            video_stream_index,
            properties.width.unwrap_or(0),
            properties.height.unwrap_or(0),
            properties.fps,
            properties.frame_count,
        );

        Ok(Self {
            input_context,
            properties,
            video_stream_index,
            file_path,
        })
    }

    /// Properties read when the file was opened.
    pub fn properties(&self) -> &VideoProperties {
        &self.properties
    }

    /// Path the file was opened from.
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Start the single forward pass over every frame of the video.
    ///
    /// # Errors
    ///
    /// Returns [`OcrvidError::FfmpegError`] if a decoder cannot be created
    /// for the video stream.
    pub fn into_frames(self) -> Result<FrameIterator, OcrvidError> {
        FrameIterator::new(self)
    }
}
