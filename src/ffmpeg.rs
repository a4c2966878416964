//! Verbosity of FFmpeg's own console output.
//!
//! FFmpeg logs to stderr on its own, independently of the `log` facade this
//! crate uses. Damaged streams can make it very chatty while frames are
//! decoded, so callers usually lower it before a run:
//!
//! ```no_run
//! use ocrvid::{DecoderLogLevel, set_decoder_log_level};
//!
//! set_decoder_log_level(DecoderLogLevel::Error);
//! let video = ocrvid::VideoFile::open("talk.mp4")?;
//! # Ok::<(), ocrvid::OcrvidError>(())
//! ```

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use ffmpeg_next::util::log::Level;

use crate::error::OcrvidError;

/// FFmpeg log threshold, from silent to most verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DecoderLogLevel {
    Quiet,
    Fatal,
    /// Recoverable errors only. This is the default.
    #[default]
    Error,
    Warning,
    Info,
    Verbose,
    Debug,
}

impl DecoderLogLevel {
    /// Every level, quietest first.
    pub const ALL: [DecoderLogLevel; 7] = [
        DecoderLogLevel::Quiet,
        DecoderLogLevel::Fatal,
        DecoderLogLevel::Error,
        DecoderLogLevel::Warning,
        DecoderLogLevel::Info,
        DecoderLogLevel::Verbose,
        DecoderLogLevel::Debug,
    ];

    fn name(self) -> &'static str {
        match self {
            DecoderLogLevel::Quiet => "quiet",
            DecoderLogLevel::Fatal => "fatal",
            DecoderLogLevel::Error => "error",
            DecoderLogLevel::Warning => "warning",
            DecoderLogLevel::Info => "info",
            DecoderLogLevel::Verbose => "verbose",
            DecoderLogLevel::Debug => "debug",
        }
    }

    fn to_ffmpeg_level(self) -> Level {
        match self {
            DecoderLogLevel::Quiet => Level::Quiet,
            DecoderLogLevel::Fatal => Level::Fatal,
            DecoderLogLevel::Error => Level::Error,
            DecoderLogLevel::Warning => Level::Warning,
            DecoderLogLevel::Info => Level::Info,
            DecoderLogLevel::Verbose => Level::Verbose,
            DecoderLogLevel::Debug => Level::Debug,
        }
    }
}

impl Display for DecoderLogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

impl FromStr for DecoderLogLevel {
    type Err = OcrvidError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim().to_ascii_lowercase();
        let value = if value == "warn" { "warning" } else { value.as_str() };
        DecoderLogLevel::ALL
            .into_iter()
            .find(|level| level.name() == value)
            .ok_or_else(|| {
                let names: Vec<&str> = DecoderLogLevel::ALL.iter().map(|level| level.name()).collect();
                OcrvidError::InvalidConfig(format!(
                    "unknown FFmpeg log level {value:?} (expected one of {})",
                    names.join(", ")
                ))
            })
    }
}

/// Set FFmpeg's console log threshold for the whole process.
pub fn set_decoder_log_level(level: DecoderLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!("quiet".parse::<DecoderLogLevel>().unwrap(), DecoderLogLevel::Quiet);
        assert_eq!("WARN".parse::<DecoderLogLevel>().unwrap(), DecoderLogLevel::Warning);
        assert!("loud".parse::<DecoderLogLevel>().is_err());
    }

    #[test]
    fn display_round_trips() {
        for level in DecoderLogLevel::ALL {
            assert_eq!(level.to_string().parse::<DecoderLogLevel>().unwrap(), level);
        }
    }
}
