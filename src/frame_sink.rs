//! Materializing sampled frames on disk.
//!
//! A frame sink is a directory holding one `frame-<index>.png` per sampled
//! frame. The directory is created on demand and may be reused across runs;
//! files with the same index are overwritten (last write wins).
//!
//! The file name is a parsing contract: [`parse_frame_index`] accepts exactly
//! `frame-` followed by ASCII digits and `.png`, and anything else found in a
//! sink directory is an error rather than silently skipped.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::OcrvidError;

/// Prefix of every frame file name.
pub const FRAME_FILE_PREFIX: &str = "frame-";
/// Extension of every frame file name.
pub const FRAME_FILE_EXTENSION: &str = "png";

/// File name for the frame at `index`.
pub fn frame_file_name(index: u64) -> String {
    format!("{FRAME_FILE_PREFIX}{index}.{FRAME_FILE_EXTENSION}")
}

/// Recover the frame index from a `frame-<index>.png` path.
///
/// # Errors
///
/// Returns [`OcrvidError::InvalidFrameFile`] for any other file name.
///
/// # Example
///
/// ```
/// use ocrvid::parse_frame_index;
///
/// assert_eq!(parse_frame_index("frames/frame-240.png").unwrap(), 240);
/// assert!(parse_frame_index("frames/frame-.png").is_err());
/// assert!(parse_frame_index("frames/thumb-3.png").is_err());
/// ```
pub fn parse_frame_index<P: AsRef<Path>>(path: P) -> Result<u64, OcrvidError> {
    let path = path.as_ref();
    let invalid = || OcrvidError::InvalidFrameFile(path.to_path_buf());

    let name = path.file_name().and_then(|name| name.to_str()).ok_or_else(invalid)?;
    let digits = name
        .strip_prefix(FRAME_FILE_PREFIX)
        .and_then(|rest| rest.strip_suffix(".png"))
        .ok_or_else(invalid)?;

    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(invalid());
    }
    digits.parse::<u64>().map_err(|_| invalid())
}

/// A directory receiving sampled frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSink {
    directory: PathBuf,
}

impl FrameSink {
    /// Use `directory` as a frame sink, creating it (and its parents) if it
    /// does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`OcrvidError::FrameSinkNotDirectory`] if the path exists and
    /// is not a directory, or [`OcrvidError::IoError`] if it cannot be
    /// created.
    pub fn prepare<P: AsRef<Path>>(directory: P) -> Result<Self, OcrvidError> {
        let directory = directory.as_ref().to_path_buf();
        if directory.exists() && !directory.is_dir() {
            return Err(OcrvidError::FrameSinkNotDirectory(directory));
        }

        fs::create_dir_all(&directory)?;
        log::debug!("Writing sampled frames to {}", directory.display());
        Ok(Self { directory })
    }

    /// The sink directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Where the frame at `index` is written.
    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.directory.join(frame_file_name(index))
    }

    /// Write encoded PNG bytes for the frame at `index`, replacing any file
    /// left by an earlier run.
    ///
    /// # Errors
    ///
    /// Returns [`OcrvidError::WriteFailed`] if the file cannot be written.
    pub fn write(&self, index: u64, png: &[u8]) -> Result<PathBuf, OcrvidError> {
        let path = self.frame_path(index);
        fs::write(&path, png).map_err(|cause| OcrvidError::WriteFailed {
            path: path.clone(),
            cause,
        })?;
        Ok(path)
    }

    /// Frame files in the sink, ascending by index.
    ///
    /// Non-PNG entries and subdirectories are ignored; a PNG that does not
    /// follow the naming contract is an error, and so is a second file for
    /// an index already seen (`frame-7.png` next to `frame-007.png`).
    ///
    /// # Errors
    ///
    /// Returns [`OcrvidError::InvalidFrameFile`] for a non-conforming PNG
    /// name or a duplicate index, or [`OcrvidError::IoError`] if the
    /// directory cannot be read.
    pub fn frame_files(&self) -> Result<Vec<(u64, PathBuf)>, OcrvidError> {
        let mut frames = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let is_png = path
                .extension()
                .and_then(|extension| extension.to_str())
                .is_some_and(|extension| extension.eq_ignore_ascii_case(FRAME_FILE_EXTENSION));
            if !is_png {
                continue;
            }
            frames.push((parse_frame_index(&path)?, path));
        }

        // Sort by name within an index so the reported duplicate is stable.
        frames.sort();
        if let Some(pair) = frames.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(OcrvidError::InvalidFrameFile(pair[1].1.clone()));
        }
        Ok(frames)
    }
}
