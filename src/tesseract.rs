//! Tesseract-backed [`TextDetector`].
//!
//! Runs the `tesseract` command-line engine with the image on stdin and TSV
//! on stdout, then folds word rows into line-level [`TextObservation`]s.
//! The executable is taken from the `TESSERACT_CMD` environment variable,
//! falling back to `tesseract` on `PATH`.

use std::{
    io::{ErrorKind, Write},
    path::PathBuf,
    process::{Command, Stdio},
};

use crate::detector::{
    BoundingBox, DetectOptions, DetectorError, RecognitionLevel, TextDetector, TextObservation,
};

/// Environment variable naming the Tesseract executable.
pub const TESSERACT_CMD_ENV: &str = "TESSERACT_CMD";

/// BCP-47 style tags mapped to Tesseract traineddata names. Matched on the
/// full tag first, then on the primary subtag.
const LANGUAGE_CODES: &[(&str, &str)] = &[
    ("zh-hans", "chi_sim"),
    ("zh-cn", "chi_sim"),
    ("zh-sg", "chi_sim"),
    ("zh-hant", "chi_tra"),
    ("zh-tw", "chi_tra"),
    ("zh-hk", "chi_tra"),
    ("zh", "chi_sim"),
    ("en", "eng"),
    ("ja", "jpn"),
    ("ko", "kor"),
    ("fr", "fra"),
    ("de", "deu"),
    ("es", "spa"),
    ("it", "ita"),
    ("pt", "por"),
    ("ru", "rus"),
    ("uk", "ukr"),
    ("ar", "ara"),
    ("hi", "hin"),
    ("nl", "nld"),
    ("pl", "pol"),
    ("sv", "swe"),
    ("tr", "tur"),
    ("vi", "vie"),
    ("th", "tha"),
];

/// Text detector that shells out to the Tesseract CLI.
#[derive(Debug, Clone)]
pub struct TesseractDetector {
    command: PathBuf,
    page_segmentation: Option<u8>,
}

impl Default for TesseractDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl TesseractDetector {
    /// Use `$TESSERACT_CMD`, or `tesseract` from `PATH`.
    pub fn new() -> Self {
        let command = std::env::var_os(TESSERACT_CMD_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("tesseract"));
        Self::with_command(command)
    }

    /// Use a specific executable.
    pub fn with_command(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            page_segmentation: None,
        }
    }

    /// Set Tesseract's page segmentation mode (`--psm`).
    #[must_use]
    pub fn with_page_segmentation(mut self, mode: u8) -> Self {
        self.page_segmentation = Some(mode);
        self
    }

    fn build_command(&self, options: &DetectOptions) -> Command {
        let mut command = Command::new(&self.command);
        command.arg("stdin").arg("stdout");

        let languages = tesseract_languages(&options.languages);
        if !languages.is_empty() {
            command.arg("-l").arg(languages.join("+"));
        }
        if let Some(mode) = self.page_segmentation {
            command.arg("--psm").arg(mode.to_string());
        }
        if options.recognition_level == RecognitionLevel::Fast {
            command
                .arg("-c")
                .arg("load_system_dawg=0")
                .arg("-c")
                .arg("load_freq_dawg=0");
        }
        command.arg("tsv");
        command
    }

    fn spawn_error(&self, error: std::io::Error) -> DetectorError {
        if error.kind() == ErrorKind::NotFound {
            DetectorError::Unavailable(format!(
                "tesseract executable not found: {} (install Tesseract or set {TESSERACT_CMD_ENV})",
                self.command.display()
            ))
        } else {
            DetectorError::Unavailable(format!(
                "failed to start {}: {error}",
                self.command.display()
            ))
        }
    }
}

impl TextDetector for TesseractDetector {
    fn detect(
        &self,
        image: &[u8],
        options: &DetectOptions,
    ) -> Result<Vec<TextObservation>, DetectorError> {
        let mut child = self
            .build_command(options)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|error| self.spawn_error(error))?;

        // Tesseract reads the whole image before writing, so the pipe can be
        // filled and closed before collecting output.
        let write_result = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(image),
            None => Ok(()),
        };

        let output = child
            .wait_with_output()
            .map_err(|error| DetectorError::Failed(format!("tesseract did not finish: {error}")))?;

        // An early exit closes the pipe; the exit status explains why.
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            // Missing traineddata affects every image, not just this one.
            if stderr.contains("Failed loading language") {
                return Err(DetectorError::Unavailable(stderr));
            }
            return Err(DetectorError::Failed(format!(
                "tesseract exited with {}: {stderr}",
                output.status
            )));
        }
        write_result
            .map_err(|error| DetectorError::Failed(format!("failed to send image: {error}")))?;

        let tsv = String::from_utf8_lossy(&output.stdout);
        parse_tsv(&tsv)
    }

    fn supported_languages(&self) -> Result<Vec<String>, DetectorError> {
        let output = Command::new(&self.command)
            .arg("--list-langs")
            .output()
            .map_err(|error| self.spawn_error(error))?;

        if !output.status.success() {
            return Err(DetectorError::Unavailable(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        // Older releases print the listing on stderr.
        let listing = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            String::from_utf8_lossy(&output.stdout).into_owned()
        };
        Ok(parse_language_list(&listing))
    }
}

/// Map preferred language tags onto Tesseract names, keeping order and
/// dropping duplicates. Unknown tags pass through unchanged.
pub fn tesseract_languages(tags: &[String]) -> Vec<String> {
    let mut codes: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let code = tesseract_language(tag);
        if !code.is_empty() && !codes.contains(&code) {
            codes.push(code);
        }
    }
    codes
}

fn tesseract_language(tag: &str) -> String {
    let normalized = tag.trim().replace('_', "-").to_ascii_lowercase();
    if let Some((_, code)) = LANGUAGE_CODES.iter().find(|(bcp, _)| *bcp == normalized) {
        return (*code).to_string();
    }

    let primary = normalized.split('-').next().unwrap_or_default();
    match LANGUAGE_CODES.iter().find(|(bcp, _)| *bcp == primary) {
        Some((_, code)) => (*code).to_string(),
        None => tag.trim().to_string(),
    }
}

fn parse_language_list(listing: &str) -> Vec<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.contains(' ') && !line.ends_with(':'))
        .map(str::to_string)
        .collect()
}

/// One word row of Tesseract TSV output.
struct Word<'a> {
    line_key: (u32, u32, u32, u32),
    left: u32,
    top: u32,
    width: u32,
    height: u32,
    confidence: f64,
    text: &'a str,
}

/// A line being assembled from its words.
struct Line {
    key: (u32, u32, u32, u32),
    words: Vec<String>,
    confidence_sum: f64,
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
}

/// Parse Tesseract TSV into line observations.
///
/// Word rows (level 5) are grouped by page, block, paragraph and line in the
/// order lines first appear. The page row (level 1) supplies the image size
/// used for normalization.
pub fn parse_tsv(tsv: &str) -> Result<Vec<TextObservation>, DetectorError> {
    let mut page_size: Option<(u32, u32)> = None;
    let mut lines: Vec<Line> = Vec::new();

    for row in tsv.lines().skip_while(|row| row.starts_with("level")) {
        let columns: Vec<&str> = row.split('\t').collect();
        if columns.len() < 11 {
            continue;
        }
        let number = |index: usize| columns[index].trim().parse::<u32>().ok();

        match number(0) {
            Some(1) if page_size.is_none() => {
                if let (Some(width), Some(height)) = (number(8), number(9)) {
                    page_size = Some((width, height));
                }
            }
            Some(5) => {
                let text = columns.get(11).map(|text| text.trim()).unwrap_or_default();
                let confidence = columns[10].trim().parse::<f64>().unwrap_or(-1.0);
                if text.is_empty() || confidence < 0.0 {
                    continue;
                }
                let (Some(page), Some(block), Some(paragraph), Some(line)) =
                    (number(1), number(2), number(3), number(4))
                else {
                    continue;
                };
                let (Some(left), Some(top), Some(width), Some(height)) =
                    (number(6), number(7), number(8), number(9))
                else {
                    continue;
                };

                add_word(
                    &mut lines,
                    Word {
                        line_key: (page, block, paragraph, line),
                        left,
                        top,
                        width,
                        height,
                        confidence,
                        text,
                    },
                );
            }
            _ => {}
        }
    }

    if lines.is_empty() {
        return Ok(Vec::new());
    }

    let (image_width, image_height) = page_size
        .ok_or_else(|| DetectorError::Failed("tesseract output has no page row".to_string()))?;

    lines
        .into_iter()
        .map(|line| {
            let bbox = BoundingBox::from_top_left_pixels(
                line.left,
                line.top,
                line.right - line.left,
                line.bottom - line.top,
                image_width,
                image_height,
            )
            .ok_or_else(|| DetectorError::Failed("image has zero size".to_string()))?;
            let confidence = line.confidence_sum / line.words.len() as f64 / 100.0;
            Ok(TextObservation::new(line.words.join(" "), confidence, bbox))
        })
        .collect()
}

fn add_word(lines: &mut Vec<Line>, word: Word<'_>) {
    let right = word.left + word.width;
    let bottom = word.top + word.height;

    if let Some(line) = lines.iter_mut().find(|line| line.key == word.line_key) {
        line.words.push(word.text.to_string());
        line.confidence_sum += word.confidence;
        line.left = line.left.min(word.left);
        line.top = line.top.min(word.top);
        line.right = line.right.max(right);
        line.bottom = line.bottom.max(bottom);
        return;
    }

    lines.push(Line {
        key: word.line_key,
        words: vec![word.text.to_string()],
        confidence_sum: word.confidence,
        left: word.left,
        top: word.top,
        right,
        bottom,
    });
}
