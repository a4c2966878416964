use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use ocrvid::{
    CONFIG_VERSION, CredentialStore, DEFAULT_KEY_ALIAS, DecoderLogLevel, DetectOptions,
    DetectionFailurePolicy, DownloadClient, LogObserver, ProgressInfo, RecognitionLevel,
    RunConfig, Sampling, SessionObserver, SessionOptions, SessionWarning, StreamSelector,
    TesseractDetector, TextDetector, VideoFile, detect_frame_directory, detect_image_file,
    run_video, store::to_json_pretty,
};
use tracing_subscriber::EnvFilter;

const CLI_AFTER_HELP: &str = "Examples:\n  ocrvid run talk.mp4 --interval 1 -l en-US\n  ocrvid run talk.mp4 -d out --every 50 --no-frames --progress\n  ocrvid detect out/.frames/talk/frame-0.png\n  ocrvid props talk.mp4 --json\n  ocrvid completions zsh > _ocrvid";

#[derive(Debug, Parser)]
#[command(
    name = "ocrvid",
    version,
    about = "Recognize text in sampled video frames and save it as JSON",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show debug logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar while processing frames.
    #[arg(long, global = true)]
    progress: bool,

    /// FFmpeg log level (quiet, fatal, error, warning, info, verbose, debug).
    #[arg(long, global = true)]
    ffmpeg_log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run text recognition over a video and write a JSON document.
    #[command(
        about = "Write an OCR JSON file from a video",
        after_help = "Examples:\n  ocrvid run talk.mp4\n  ocrvid run talk.mp4 -o slides.json -d out --interval 2 -l ja -l en-US"
    )]
    Run {
        /// Input video path.
        input: PathBuf,
        /// Output JSON file name, placed in --directory. Defaults to `<input stem>.json`.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Directory for the output file.
        #[arg(short, long, default_value = ".")]
        directory: PathBuf,
        /// Directory receiving sampled frames. Defaults to `<directory>/.frames/<input stem>`.
        #[arg(long)]
        frames_dir: Option<PathBuf>,
        /// Do not keep sampled frames on disk.
        #[arg(long, conflicts_with = "frames_dir")]
        no_frames: bool,
        /// Examine every Nth frame (default 100).
        #[arg(long, conflicts_with = "interval")]
        every: Option<u64>,
        /// Examine one frame every SECONDS seconds.
        #[arg(long, value_name = "SECONDS")]
        interval: Option<f64>,
        /// Preferred language, highest priority first. Repeatable; auto-detect when absent.
        #[arg(short = 'l', long = "lang", value_name = "TAG")]
        languages: Vec<String>,
        /// Trade accuracy for speed.
        #[arg(long)]
        fast: bool,
        /// Stop at the first frame the detector fails on instead of skipping it.
        #[arg(long)]
        abort_on_failure: bool,
    },

    /// Detect text in one image and print the observations as JSON.
    #[command(about = "Detect text in a picture")]
    Detect {
        /// Input image path.
        image: PathBuf,
        #[arg(short = 'l', long = "lang", value_name = "TAG")]
        languages: Vec<String>,
        #[arg(long)]
        fast: bool,
    },

    /// Run text recognition over a directory of `frame-<index>.png` files.
    #[command(about = "Detect text in a frame directory")]
    DetectDir {
        /// Directory written by `ocrvid run`.
        directory: PathBuf,
        /// Write the document here instead of printing it.
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short = 'l', long = "lang", value_name = "TAG")]
        languages: Vec<String>,
        #[arg(long)]
        fast: bool,
    },

    /// Print video properties.
    #[command(
        about = "Show video properties",
        visible_alias = "info",
        after_help = "Examples:\n  ocrvid props talk.mp4\n  ocrvid props talk.mp4 --json"
    )]
    Props {
        /// Input video path.
        input: PathBuf,
        /// Output properties as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// List languages the text detector supports.
    #[command(about = "Show supported recognition languages")]
    Langs,

    /// Manage stored API keys.
    #[command(about = "Manage API keys")]
    Key {
        #[command(subcommand)]
        action: KeyCommand,
    },

    /// Fetch a YouTube playlist and save its items as JSON.
    #[cfg(feature = "playlist")]
    #[command(about = "Fetch playlist items")]
    Playlist {
        /// Playlist id.
        playlist_id: String,
        /// Output JSON file. Defaults to `<playlist id>.json`.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Stored key alias to use.
        #[arg(long, default_value = DEFAULT_KEY_ALIAS)]
        alias: String,
        /// Items requested per page (at most 50).
        #[arg(long, default_value_t = 50)]
        page_size: u32,
    },

    /// List downloadable streams of a video.
    #[command(about = "List video streams")]
    Streams {
        /// Video id or URL.
        video_id: String,
        #[arg(long)]
        json: bool,
    },

    /// Download one stream of a video.
    #[command(
        about = "Download a video",
        after_help = "Examples:\n  ocrvid download dQw4w9WgXcQ --format 720p -o talk.mp4\n  ocrvid download dQw4w9WgXcQ --format 22 -o talk.mp4"
    )]
    Download {
        /// Video id or URL.
        video_id: String,
        /// Format id from `ocrvid streams`, or `<height>p`.
        #[arg(long, default_value = "best")]
        format: String,
        /// Output file path.
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Subcommand)]
enum KeyCommand {
    /// Print the key file location.
    Path,
    /// Store an API key.
    Set {
        key: String,
        #[arg(long, default_value = DEFAULT_KEY_ALIAS)]
        alias: String,
    },
}

fn init_logging(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    let default_directive = if global.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|error| error.to_string())?;
    Ok(())
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(global)?;
    let level = match &global.ffmpeg_log_level {
        Some(level) => level.parse::<DecoderLogLevel>()?,
        None => DecoderLogLevel::default(),
    };
    ocrvid::set_decoder_log_level(level);
    Ok(())
}

fn recognition_level(fast: bool) -> RecognitionLevel {
    if fast {
        RecognitionLevel::Fast
    } else {
        RecognitionLevel::Accurate
    }
}

fn input_stem(input: &Path) -> String {
    input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "video".to_string())
}

/// `<directory>/<output>`, with a `.json` extension added when missing.
fn output_path(directory: &Path, output: Option<&Path>, input: &Path) -> PathBuf {
    let name = match output {
        Some(output) => output.to_path_buf(),
        None => PathBuf::from(input_stem(input)),
    };
    let mut path = directory.join(name);
    let has_json_extension = path
        .extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));
    if !has_json_extension {
        let mut file_name = path.file_name().unwrap_or_default().to_os_string();
        file_name.push(".json");
        path.set_file_name(file_name);
    }
    path
}

fn frame_sink_path(
    directory: &Path,
    frames_dir: Option<PathBuf>,
    no_frames: bool,
    input: &Path,
) -> Option<PathBuf> {
    if no_frames {
        return None;
    }
    Some(frames_dir.unwrap_or_else(|| directory.join(".frames").join(input_stem(input))))
}

fn warn(message: impl std::fmt::Display) {
    eprintln!(
        "{} {}",
        "warning:".yellow().bold(),
        message.to_string().yellow()
    );
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    print!("{}", String::from_utf8(to_json_pretty(value)?)?);
    Ok(())
}

/// Terminal progress bar fed by session progress reports.
struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} frames {msg} [{elapsed_precise}]",
        )?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl SessionObserver for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(total) = info.total_frames {
            self.bar.set_length(total.max(info.frames_read));
        }
        self.bar.set_position(info.frames_read);
        self.bar
            .set_message(format!("({} sampled)", info.frames_sampled));
    }

    fn on_warning(&self, warning: &SessionWarning) {
        self.bar.suspend(|| warn(warning));
    }
}

/// Session observer that prints warnings without a progress bar.
struct TerminalWarnings;

impl SessionObserver for TerminalWarnings {
    fn on_progress(&self, info: &ProgressInfo) {
        LogObserver.on_progress(info);
    }

    fn on_warning(&self, warning: &SessionWarning) {
        warn(warning);
    }
}

#[allow(clippy::too_many_arguments)]
fn run_command(
    global: &GlobalOptions,
    input: PathBuf,
    output: Option<PathBuf>,
    directory: PathBuf,
    frames_dir: Option<PathBuf>,
    no_frames: bool,
    sampling: Sampling,
    languages: Vec<String>,
    fast: bool,
    abort_on_failure: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = RunConfig {
        version: CONFIG_VERSION,
        output: output_path(&directory, output.as_deref(), &input),
        frame_sink: frame_sink_path(&directory, frames_dir, no_frames, &input),
        frame_source: input,
        sampling,
        languages,
        recognition_level: recognition_level(fast),
        detection_failure_policy: if abort_on_failure {
            DetectionFailurePolicy::Abort
        } else {
            DetectionFailurePolicy::Skip
        },
    };
    config.validate()?;
    log::debug!("Run config: {config:?}");

    let progress = if global.progress {
        Some(Arc::new(TerminalProgress::new()?))
    } else {
        None
    };
    let observer: Arc<dyn SessionObserver> = match &progress {
        Some(progress) => progress.clone(),
        None => Arc::new(TerminalWarnings),
    };

    let result = run_video(&config, TesseractDetector::new(), observer);
    if let Some(progress) = &progress {
        progress.finish();
    }
    let outcome = result?;

    let summary = &outcome.summary;
    println!(
        "{} {}",
        "success:".green().bold(),
        format!(
            "{} of {} sampled frame(s) had text (step {}), wrote {}",
            summary.frames_with_text,
            summary.frames_sampled,
            summary.step,
            config.output.display()
        )
        .green()
    );
    if let Some(sink) = &config.frame_sink {
        println!("frames: {}", sink.display());
    }
    if summary.detection_failures > 0 {
        warn(format!(
            "{} frame(s) skipped after detection failures",
            summary.detection_failures
        ));
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Run {
            input,
            output,
            directory,
            frames_dir,
            no_frames,
            every,
            interval,
            languages,
            fast,
            abort_on_failure,
        } => {
            let sampling = Sampling::from_options(every, interval)?;
            run_command(
                &cli.global,
                input,
                output,
                directory,
                frames_dir,
                no_frames,
                sampling,
                languages,
                fast,
                abort_on_failure,
            )?;
        }
        Commands::Detect {
            image,
            languages,
            fast,
        } => {
            let options = DetectOptions::new()
                .with_languages(languages)
                .with_recognition_level(recognition_level(fast));
            let observations = detect_image_file(&TesseractDetector::new(), &image, &options)?;
            print_json(&observations)?;
        }
        Commands::DetectDir {
            directory,
            output,
            languages,
            fast,
        } => {
            let options = SessionOptions::new()
                .with_languages(languages)
                .with_recognition_level(recognition_level(fast))
                .with_observer(Arc::new(TerminalWarnings));
            let document = detect_frame_directory(TesseractDetector::new(), &directory, &options)?;
            match output {
                Some(output) => {
                    let written = ocrvid::ResultStore::write(&document, &output)?;
                    println!("{} {}", "saved".green().bold(), written.display());
                }
                None => print_json(&document)?,
            }
        }
        Commands::Props { input, json } => {
            let video = VideoFile::open(&input)?;
            let properties = video.properties();
            if json {
                print_json(properties)?;
            } else {
                let unknown = || "unknown".to_string();
                println!("File: {}", video.path().display());
                println!(
                    "Resolution: {}",
                    match (properties.width, properties.height) {
                        (Some(width), Some(height)) => format!("{width}x{height}"),
                        _ => unknown(),
                    }
                );
                println!(
                    "Frame rate: {}",
                    properties.fps.map_or_else(unknown, |fps| format!("{fps:.3} fps"))
                );
                println!(
                    "Frames: {}",
                    properties.frame_count.map_or_else(unknown, |count| count.to_string())
                );
                println!(
                    "Duration: {}",
                    properties
                        .duration_seconds
                        .map_or_else(unknown, |seconds| format!("{seconds:.2}s"))
                );
                if let Some(codec) = &properties.codec {
                    println!("Codec: {codec}");
                }
            }
        }
        Commands::Langs => {
            for language in TesseractDetector::new().supported_languages()? {
                println!("{language}");
            }
        }
        Commands::Key { action } => {
            let store = CredentialStore::default_location()?;
            match action {
                KeyCommand::Path => println!("{}", store.path().display()),
                KeyCommand::Set { key, alias } => {
                    store.set(&alias, &key)?;
                    println!(
                        "{} {}",
                        "saved".green().bold(),
                        format!("{alias} in {}", store.path().display())
                    );
                }
            }
        }
        #[cfg(feature = "playlist")]
        Commands::Playlist {
            playlist_id,
            output,
            alias,
            page_size,
        } => {
            let api_key = CredentialStore::default_location()?
                .require(Some(&alias), Some(DEFAULT_KEY_ALIAS))?;
            let playlist = ocrvid::PlaylistClient::new(api_key)?.fetch(&playlist_id, page_size)?;
            let output = output.unwrap_or_else(|| PathBuf::from(format!("{playlist_id}.json")));
            let written = playlist.save(&output)?;
            for video_id in playlist.video_ids() {
                println!("{video_id}");
            }
            eprintln!(
                "{} {}",
                "saved".green().bold(),
                format!("{} item(s) to {}", playlist.items.len(), written.display())
            );
        }
        Commands::Streams { video_id, json } => {
            let streams = DownloadClient::new().list_streams(&video_id)?;
            if json {
                print_json(&streams)?;
            } else {
                for stream in streams {
                    let resolution = match (stream.width, stream.height) {
                        (Some(width), Some(height)) => format!("{width}x{height}"),
                        _ => "audio".to_string(),
                    };
                    println!(
                        "{:<12} {:<6} {:<10} {}",
                        stream.format_id,
                        stream.ext.as_deref().unwrap_or("?"),
                        resolution,
                        stream.vcodec.as_deref().unwrap_or("?"),
                    );
                }
            }
        }
        Commands::Download {
            video_id,
            format,
            output,
        } => {
            let selector = StreamSelector::parse(&format);
            let written = DownloadClient::new().download(&video_id, &selector, &output)?;
            println!("{} {}", "saved".green().bold(), written.display());
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "ocrvid", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
