//! # ocrvid
//!
//! Sample frames from a video, recognize the text on them, and save the
//! results as JSON.
//!
//! `ocrvid` decodes video with FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate, examines
//! every Nth frame (or one frame per time interval), hands each sampled
//! frame to a [`TextDetector`] as PNG bytes, and collects the frames that
//! contain text into an [`OcrDocument`] ordered by frame index.
//!
//! ## Quick Start
//!
//! ### Process a Video
//!
//! ```no_run
//! use ocrvid::{OcrSession, ResultStore, Sampling, SessionOptions, TesseractDetector, VideoFile};
//!
//! let video = VideoFile::open("talk.mp4")?;
//! let options = SessionOptions::new()
//!     .with_frame_sink(".frames/talk")
//!     .with_languages(["en-US"]);
//!
//! let session = OcrSession::new(TesseractDetector::new(), options);
//! let outcome = session.process_video(video, &Sampling::Interval(1.0))?;
//! ResultStore::write(&outcome.document, "talk.json")?;
//! # Ok::<(), ocrvid::OcrvidError>(())
//! ```
//!
//! ### Resolve a Sampling Step
//!
//! ```no_run
//! use ocrvid::{VideoFile, resolve_step};
//!
//! let video = VideoFile::open("talk.mp4")?;
//! // One frame every two seconds; 48 at 24 fps.
//! let step = resolve_step(None, Some(2.0), video.properties())?;
//! # Ok::<(), ocrvid::OcrvidError>(())
//! ```
//!
//! ### Detect Text in One Image
//!
//! ```no_run
//! use ocrvid::{DetectOptions, TesseractDetector, detect_image_file};
//!
//! let observations = detect_image_file(
//!     &TesseractDetector::new(),
//!     "frame-0.png",
//!     &DetectOptions::new(),
//! )?;
//! # Ok::<(), ocrvid::OcrvidError>(())
//! ```
//!
//! ## Features
//!
//! - **Lazy decoding**: frames are decoded one at a time and never buffered
//! - **Two cadences**: a fixed frame step or a time interval, never both
//! - **Pluggable detection**: anything implementing [`TextDetector`];
//!   [`TesseractDetector`] runs the Tesseract CLI
//! - **Frame sink**: sampled frames can be kept on disk as
//!   `frame-<index>.png` and re-examined later with
//!   [`detect_frame_directory`]
//! - **Atomic output**: documents are written through a temporary file
//! - **Observation port**: progress and per-frame warnings go to a
//!   [`SessionObserver`]; the default forwards to the `log` crate
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `playlist` | [`PlaylistClient`] for the YouTube Data API (default) |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed to build, and the
//! `tesseract` executable to use [`TesseractDetector`].

pub mod config;
mod conversion;
pub mod credentials;
pub mod detector;
pub mod document;
pub mod download;
pub mod error;
pub mod ffmpeg;
pub mod frame_sink;
pub mod metadata;
pub mod playlist;
pub mod progress;
pub mod sampling;
pub mod session;
pub mod store;
pub mod tesseract;
pub mod video;
pub mod video_iterator;

pub use config::{CONFIG_VERSION, DetectionFailurePolicy, RunConfig, SessionOptions};
pub use credentials::{CredentialStore, DEFAULT_KEY_ALIAS};
pub use detector::{
    BoundingBox, DetectOptions, DetectorError, RecognitionLevel, TextDetector, TextObservation,
    detect_image, detect_image_file,
};
pub use document::{FrameKey, FrameResult, OcrDocument};
pub use download::{DownloadClient, StreamInfo, StreamSelector};
pub use error::OcrvidError;
pub use ffmpeg::{DecoderLogLevel, set_decoder_log_level};
pub use frame_sink::{FrameSink, frame_file_name, parse_frame_index};
pub use metadata::VideoProperties;
pub use playlist::Playlist;
#[cfg(feature = "playlist")]
pub use playlist::PlaylistClient;
pub use progress::{LogObserver, ProgressInfo, SessionObserver, SessionWarning};
pub use sampling::{DEFAULT_FRAME_STEP, Sampling, resolve_step};
pub use session::{OcrSession, RunSummary, SessionOutcome, detect_frame_directory, run_video};
pub use store::ResultStore;
pub use tesseract::TesseractDetector;
pub use video::VideoFile;
pub use video_iterator::{FrameIterator, FrameStream};
