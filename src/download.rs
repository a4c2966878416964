//! Video stream listing and download through `yt-dlp`.
//!
//! The executable is taken from `YTDLP_CMD`, falling back to `yt-dlp` on
//! `PATH`. Video ids are expanded to YouTube watch URLs; anything that
//! already looks like a URL is passed through.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    process::{Command, Output},
};

use serde::{Deserialize, Serialize};

use crate::error::OcrvidError;

/// Environment variable naming the `yt-dlp` executable.
pub const YTDLP_CMD_ENV: &str = "YTDLP_CMD";

/// One downloadable stream of a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub format_id: String,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub filesize: Option<u64>,
}

impl StreamInfo {
    /// Whether the stream carries video.
    pub fn has_video(&self) -> bool {
        self.vcodec.as_deref().is_some_and(|codec| codec != "none")
    }

    /// Whether the stream carries audio.
    pub fn has_audio(&self) -> bool {
        self.acodec.as_deref().is_some_and(|codec| codec != "none")
    }
}

#[derive(Debug, Deserialize)]
struct VideoInfo {
    #[serde(default)]
    formats: Vec<StreamInfo>,
}

/// Which stream to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSelector {
    /// A `format_id` from [`DownloadClient::list_streams`].
    FormatId(String),
    /// Best video no taller than this many pixels, merged with the best audio.
    MaxHeight(u32),
}

impl StreamSelector {
    /// `<height>p` (e.g. `720p`) is a height limit, anything else a format
    /// id. Bare numbers are format ids, since YouTube uses numeric ids.
    ///
    /// ```
    /// use ocrvid::StreamSelector;
    ///
    /// assert_eq!(StreamSelector::parse("720p"), StreamSelector::MaxHeight(720));
    /// assert_eq!(StreamSelector::parse("137"), StreamSelector::FormatId("137".into()));
    /// assert_eq!(
    ///     StreamSelector::parse("hls-1080p"),
    ///     StreamSelector::FormatId("hls-1080p".into())
    /// );
    /// ```
    pub fn parse(selector: &str) -> Self {
        let selector = selector.trim();
        let height = selector
            .strip_suffix('p')
            .filter(|digits| !digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit()))
            .and_then(|digits| digits.parse::<u32>().ok());
        match height {
            Some(height) => StreamSelector::MaxHeight(height),
            None => StreamSelector::FormatId(selector.to_string()),
        }
    }

    /// The `yt-dlp -f` expression.
    pub fn format_expression(&self) -> String {
        match self {
            StreamSelector::FormatId(id) => id.clone(),
            StreamSelector::MaxHeight(height) => {
                format!("bestvideo[height<={height}]+bestaudio/best[height<={height}]")
            }
        }
    }
}

/// Runs `yt-dlp` to list and fetch streams.
#[derive(Debug, Clone)]
pub struct DownloadClient {
    command: PathBuf,
}

impl Default for DownloadClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadClient {
    /// Use `$YTDLP_CMD`, or `yt-dlp` from `PATH`.
    pub fn new() -> Self {
        let command = std::env::var_os(YTDLP_CMD_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("yt-dlp"));
        Self::with_command(command)
    }

    pub fn with_command(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Streams available for `video_id`, in the order `yt-dlp` reports them
    /// (roughly worst to best).
    ///
    /// # Errors
    ///
    /// Returns [`OcrvidError::DownloadError`] if `yt-dlp` is missing, fails,
    /// or prints unexpected JSON.
    pub fn list_streams(&self, video_id: &str) -> Result<Vec<StreamInfo>, OcrvidError> {
        let output = self.execute(
            Command::new(&self.command)
                .arg("-J")
                .arg("--no-playlist")
                .arg(video_url(video_id)),
        )?;
        parse_streams(&String::from_utf8_lossy(&output.stdout))
    }

    /// Download the selected stream of `video_id` to `output`.
    ///
    /// # Errors
    ///
    /// Returns [`OcrvidError::DownloadError`] if `yt-dlp` fails or does not
    /// produce `output`.
    pub fn download(
        &self,
        video_id: &str,
        selector: &StreamSelector,
        output: &Path,
    ) -> Result<PathBuf, OcrvidError> {
        if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut command = Command::new(&self.command);
        command
            .arg("-f")
            .arg(selector.format_expression())
            .arg("--no-playlist")
            .arg("-o")
            .arg(output);
        if matches!(selector, StreamSelector::MaxHeight(_)) {
            if let Some(extension) = output.extension().and_then(|extension| extension.to_str()) {
                command.arg("--merge-output-format").arg(extension);
            }
        }
        command.arg(video_url(video_id));

        log::info!("Downloading {video_id} to {}", output.display());
        self.execute(&mut command)?;

        if !output.is_file() {
            return Err(OcrvidError::DownloadError(format!(
                "yt-dlp finished but {} was not created",
                output.display()
            )));
        }
        Ok(output.to_path_buf())
    }

    fn execute(&self, command: &mut Command) -> Result<Output, OcrvidError> {
        let output = command.output().map_err(|error| {
            if error.kind() == ErrorKind::NotFound {
                OcrvidError::DownloadError(format!(
                    "yt-dlp executable not found: {} (install yt-dlp or set {YTDLP_CMD_ENV})",
                    self.command.display()
                ))
            } else {
                OcrvidError::DownloadError(format!(
                    "failed to start {}: {error}",
                    self.command.display()
                ))
            }
        })?;

        if !output.status.success() {
            return Err(OcrvidError::DownloadError(format!(
                "yt-dlp exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output)
    }
}

fn video_url(video_id: &str) -> String {
    if video_id.contains("://") {
        video_id.to_string()
    } else {
        format!("https://www.youtube.com/watch?v={video_id}")
    }
}

/// Parse the `formats` array of `yt-dlp -J` output.
fn parse_streams(json: &str) -> Result<Vec<StreamInfo>, OcrvidError> {
    let info: VideoInfo = serde_json::from_str(json)
        .map_err(|error| OcrvidError::DownloadError(format!("unexpected yt-dlp output: {error}")))?;
    Ok(info.formats)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO: &str = r#"{
        "id": "abc",
        "title": "Talk",
        "formats": [
            {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2", "filesize": 1024},
            {"format_id": "137", "ext": "mp4", "width": 1920, "height": 1080, "fps": 30, "vcodec": "avc1.640028", "acodec": "none"},
            {"format_id": "sb0", "ext": "mhtml", "width": 48, "height": 27, "vcodec": "none", "acodec": "none", "filesize": null}
        ]
    }"#;

    #[test]
    fn parses_formats() {
        let streams = parse_streams(INFO).unwrap();
        assert_eq!(streams.len(), 3);
        assert!(streams[0].has_audio() && !streams[0].has_video());
        assert_eq!(streams[1].height, Some(1080));
        assert_eq!(streams[1].fps, Some(30.0));
        assert!(streams[1].has_video());
        assert_eq!(streams[2].filesize, None);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse_streams("not json"),
            Err(OcrvidError::DownloadError(_))
        ));
    }

    #[test]
    fn selector_expressions() {
        assert_eq!(
            StreamSelector::parse("720p").format_expression(),
            "bestvideo[height<=720]+bestaudio/best[height<=720]"
        );
        assert_eq!(StreamSelector::parse("22").format_expression(), "22");
        assert_eq!(
            StreamSelector::parse("bestvideo+bestaudio"),
            StreamSelector::FormatId("bestvideo+bestaudio".into())
        );
    }

    #[test]
    fn ids_become_urls() {
        assert_eq!(video_url("abc"), "https://www.youtube.com/watch?v=abc");
        assert_eq!(video_url("https://example.com/v"), "https://example.com/v");
    }

    #[test]
    fn missing_executable_is_reported() {
        let client = DownloadClient::with_command("/nonexistent/yt-dlp-for-tests");
        let error = client.list_streams("abc").unwrap_err();
        assert!(error.to_string().contains("not found"));
    }
}
