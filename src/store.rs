//! Writing and reading OCR documents.
//!
//! Documents are written as UTF-8 JSON with 4-space indentation. A write
//! goes to a temporary file next to the destination which is then renamed
//! over it, so a finished write is always a complete document and a failed
//! one leaves any previous file untouched.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tempfile::NamedTempFile;

use crate::{document::OcrDocument, error::OcrvidError};

const INDENT: &[u8] = b"    ";

/// Serialize any value as 4-space indented JSON.
pub fn to_json_pretty<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, OcrvidError> {
    let mut buffer = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(INDENT));
    value.serialize(&mut serializer)?;
    buffer.push(b'\n');
    Ok(buffer)
}

/// Atomically write `bytes` to `path`, creating parent directories.
///
/// # Errors
///
/// Returns [`OcrvidError::WriteFailed`] on any I/O error.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<PathBuf, OcrvidError> {
    let write_failed = |cause| OcrvidError::WriteFailed {
        path: path.to_path_buf(),
        cause,
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(write_failed)?;

    let mut temporary = NamedTempFile::new_in(&parent).map_err(write_failed)?;
    temporary.write_all(bytes).map_err(write_failed)?;
    temporary.as_file().sync_all().map_err(write_failed)?;
    temporary
        .persist(path)
        .map_err(|error| write_failed(error.error))?;

    Ok(path.to_path_buf())
}

/// Persists [`OcrDocument`]s as JSON files.
///
/// # Example
///
/// ```no_run
/// use ocrvid::{OcrDocument, ResultStore};
///
/// let document = OcrDocument::new(Some("talk.mp4".into()));
/// let written = ResultStore::write(&document, "out/talk.json")?;
/// let read_back = ResultStore::read(&written)?;
/// assert_eq!(document, read_back);
/// # Ok::<(), ocrvid::OcrvidError>(())
/// ```
pub struct ResultStore;

impl ResultStore {
    /// Write `document` to `output_path` and return the path written.
    ///
    /// # Errors
    ///
    /// Returns [`OcrvidError::WriteFailed`] if the directory or file cannot
    /// be written.
    pub fn write<P: AsRef<Path>>(
        document: &OcrDocument,
        output_path: P,
    ) -> Result<PathBuf, OcrvidError> {
        let output_path = output_path.as_ref();
        let bytes = to_json_pretty(document)?;
        let written = write_atomic(output_path, &bytes)?;

        log::info!(
            "Wrote {} frame(s) with text to {}",
            document.frames.len(),
            written.display()
        );
        Ok(written)
    }

    /// Read a document written by [`write`](ResultStore::write).
    ///
    /// # Errors
    ///
    /// Returns [`OcrvidError::IoError`] or [`OcrvidError::JsonError`] if the
    /// file cannot be read or parsed.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<OcrDocument, OcrvidError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{BoundingBox, TextObservation};

    #[test]
    fn uses_four_space_indent() {
        let mut document = OcrDocument::new(Some(PathBuf::from("v.mp4")));
        document
            .push_frame(
                0,
                vec![TextObservation::new("a", 1.0, BoundingBox::new(0.0, 0.0, 1.0, 1.0))],
            )
            .unwrap();

        let text = String::from_utf8(to_json_pretty(&document).unwrap()).unwrap();
        assert!(text.starts_with("{\n    \"video_file\": \"v.mp4\",\n    \"frames\": ["));
        assert!(text.contains("\n            \"results\": ["));
    }

    #[test]
    fn creates_parent_directories() {
        let temporary_directory = tempfile::tempdir().unwrap();
        let path = temporary_directory.path().join("nested/deeper/out.json");
        ResultStore::write(&OcrDocument::default(), &path).unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn failed_write_keeps_previous_file() {
        let temporary_directory = tempfile::tempdir().unwrap();
        let path = temporary_directory.path().join("out.json");
        fs::write(&path, b"previous").unwrap();

        // The destination's parent is a file, so nothing can be written there.
        let blocked = path.join("child.json");
        let result = ResultStore::write(&OcrDocument::default(), &blocked);
        assert!(matches!(result, Err(OcrvidError::WriteFailed { .. })));
        assert_eq!(fs::read(&path).unwrap(), b"previous");
    }
}
