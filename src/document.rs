//! The persisted OCR document.
//!
//! An [`OcrDocument`] lists, in ascending frame order, every sampled frame
//! that produced at least one [`TextObservation`]. A frame is keyed either by
//! its index in the unsampled stream or, for documents built from a frame
//! directory, by the frame file's path.
//!
//! ```json
//! {
//!     "video_file": "talk.mp4",
//!     "frames": [
//!         {
//!             "frame_index": 0,
//!             "results": [
//!                 { "text": "Welcome", "confidence": 0.98, "bbox": [0.1, 0.8, 0.3, 0.05] }
//!             ]
//!         }
//!     ]
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{detector::TextObservation, error::OcrvidError, frame_sink::parse_frame_index};

/// How a frame result identifies its frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKey {
    /// Zero-based index into the unsampled frame stream.
    FrameIndex(u64),
    /// Path of a materialized `frame-<index>.png` file.
    FrameFile(PathBuf),
}

impl FrameKey {
    /// The frame index, parsed from the file name for file keys.
    pub fn index(&self) -> Option<u64> {
        match self {
            FrameKey::FrameIndex(index) => Some(*index),
            FrameKey::FrameFile(path) => parse_frame_index(path).ok(),
        }
    }
}

/// Observations recognized on one frame, in detector order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameResult {
    #[serde(flatten)]
    pub frame: FrameKey,
    pub results: Vec<TextObservation>,
}

impl FrameResult {
    /// The frame index, if the key carries or encodes one.
    pub fn frame_index(&self) -> Option<u64> {
        self.frame.index()
    }
}

/// Ordered OCR results for one video (or one frame directory).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrDocument {
    /// Source video, absent for documents not tied to a video.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_file: Option<PathBuf>,
    /// Frames with text, ascending by frame index.
    #[serde(default)]
    pub frames: Vec<FrameResult>,
}

impl OcrDocument {
    /// An empty document for `video_file`.
    pub fn new(video_file: Option<PathBuf>) -> Self {
        Self {
            video_file,
            frames: Vec::new(),
        }
    }

    /// Append the results for `frame_index`.
    ///
    /// Frames without observations are not recorded; the return value says
    /// whether the frame was kept.
    ///
    /// # Errors
    ///
    /// Returns [`OcrvidError::FrameOutOfOrder`] unless `frame_index` is
    /// greater than every index already in the document.
    pub fn push_frame(
        &mut self,
        frame_index: u64,
        observations: Vec<TextObservation>,
    ) -> Result<bool, OcrvidError> {
        self.push(FrameKey::FrameIndex(frame_index), frame_index, observations)
    }

    /// Append the results for a frame file whose name encodes its index.
    ///
    /// # Errors
    ///
    /// Returns [`OcrvidError::InvalidFrameFile`] if the file name does not
    /// follow `frame-<index>.png`, or [`OcrvidError::FrameOutOfOrder`].
    pub fn push_frame_file(
        &mut self,
        frame_file: &Path,
        observations: Vec<TextObservation>,
    ) -> Result<bool, OcrvidError> {
        let frame_index = parse_frame_index(frame_file)?;
        self.push(
            FrameKey::FrameFile(frame_file.to_path_buf()),
            frame_index,
            observations,
        )
    }

    fn push(
        &mut self,
        frame: FrameKey,
        frame_index: u64,
        observations: Vec<TextObservation>,
    ) -> Result<bool, OcrvidError> {
        if let Some(last_index) = self.last_index() {
            if frame_index <= last_index {
                return Err(OcrvidError::FrameOutOfOrder {
                    frame_index,
                    last_index,
                });
            }
        }

        if observations.is_empty() {
            return Ok(false);
        }

        self.frames.push(FrameResult {
            frame,
            results: observations,
        });
        Ok(true)
    }

    fn last_index(&self) -> Option<u64> {
        self.frames.last().and_then(FrameResult::frame_index)
    }

    /// Frame indices in document order.
    pub fn frame_indices(&self) -> Vec<u64> {
        self.frames
            .iter()
            .filter_map(FrameResult::frame_index)
            .collect()
    }

    /// Total number of observations across all frames.
    pub fn observation_count(&self) -> usize {
        self.frames.iter().map(|frame| frame.results.len()).sum()
    }

    /// Check the ordering and non-empty invariants, e.g. after parsing a
    /// document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`OcrvidError::InvalidConfig`] describing the first frame
    /// that breaks an invariant.
    pub fn check_invariants(&self) -> Result<(), OcrvidError> {
        let mut previous: Option<u64> = None;
        for frame in &self.frames {
            let index = frame.frame_index().ok_or_else(|| {
                OcrvidError::InvalidConfig(format!("frame without an index: {:?}", frame.frame))
            })?;
            if previous.is_some_and(|previous| index <= previous) {
                return Err(OcrvidError::InvalidConfig(format!(
                    "frame {index} is out of order"
                )));
            }
            if frame.results.is_empty() {
                return Err(OcrvidError::InvalidConfig(format!(
                    "frame {index} has no results"
                )));
            }
            previous = Some(index);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::BoundingBox;

    fn observation(text: &str) -> TextObservation {
        TextObservation::new(text, 0.9, BoundingBox::new(0.1, 0.2, 0.3, 0.4))
    }

    #[test]
    fn empty_frames_are_dropped() {
        let mut document = OcrDocument::new(None);
        assert!(!document.push_frame(0, Vec::new()).unwrap());
        assert!(document.push_frame(10, vec![observation("a")]).unwrap());
        assert_eq!(document.frame_indices(), vec![10]);
    }

    #[test]
    fn rejects_out_of_order_frames() {
        let mut document = OcrDocument::new(None);
        document.push_frame(10, vec![observation("a")]).unwrap();
        assert!(matches!(
            document.push_frame(10, vec![observation("b")]),
            Err(OcrvidError::FrameOutOfOrder { .. })
        ));
        assert!(document.push_frame(5, vec![observation("b")]).is_err());
    }

    #[test]
    fn serializes_index_and_file_keys() {
        let mut document = OcrDocument::new(Some(PathBuf::from("talk.mp4")));
        document.push_frame(0, vec![observation("hello")]).unwrap();
        let value = serde_json::to_value(&document).unwrap();
        assert_eq!(value["video_file"], "talk.mp4");
        assert_eq!(value["frames"][0]["frame_index"], 0);
        assert_eq!(value["frames"][0]["results"][0]["text"], "hello");

        let mut on_disk = OcrDocument::new(None);
        on_disk
            .push_frame_file(Path::new("frames/frame-24.png"), vec![observation("x")])
            .unwrap();
        let value = serde_json::to_value(&on_disk).unwrap();
        assert!(value.get("video_file").is_none());
        assert_eq!(value["frames"][0]["frame_file"], "frames/frame-24.png");
        assert!(value["frames"][0].get("frame_index").is_none());
        assert_eq!(on_disk.frame_indices(), vec![24]);
    }

    #[test]
    fn parses_both_key_kinds() {
        let json = r#"{
            "frames": [
                {"frame_index": 3, "results": [{"text": "a", "confidence": 0.5, "bbox": [0, 0, 1, 1]}]},
                {"frame_file": "d/frame-7.png", "results": [{"text": "b", "confidence": 1.0, "bbox": [0.5, 0.5, 0.1, 0.1]}]}
            ]
        }"#;
        let document: OcrDocument = serde_json::from_str(json).unwrap();
        assert_eq!(document.video_file, None);
        assert_eq!(document.frame_indices(), vec![3, 7]);
        assert!(document.check_invariants().is_ok());
    }
}
