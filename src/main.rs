use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{ArgAction, CommandFactory, ErrorKind, Parser, Subcommand};

use sizzle::audio;
use sizzle::clip::{CandidateConfig, Ranker, SceneWindow, ScoreConfig, TranscriptSegment};

#[derive(Debug, Subcommand)]
enum Commands {
    #[clap(after_help = "Displays info about sizzle and its dependencies.")]
    Info,

    #[clap(
        arg_required_else_help = true,
        after_help = "Measure windowed audio loudness for one or more media files. The loudness data is written to disk alongside each analyzed file, and is used by the 'rank' command to seed and score audio-peak candidates."
    )]
    Analyze {
        #[clap(
            required = true,
            multiple_values = true,
            value_parser = clap::value_parser!(PathBuf),
            help = "Media files or directories to analyze."
        )]
        paths: Vec<PathBuf>,

        #[clap(
            long,
            default_value_t = audio::DEFAULT_LOUDNESS_WINDOW_MS,
            value_parser = clap::value_parser!(u32),
            help = "RMS window, in milliseconds. For example, if set to 500, one loudness sample is measured for every 500 ms of audio."
        )]
        window_ms: u32,

        #[clap(
            long,
            default_value = "false",
            action(ArgAction::SetTrue),
            help = "Enable multi-threaded decoding in FFmpeg."
        )]
        threaded_decoding: bool,

        #[clap(
            long,
            default_value = "false",
            action(ArgAction::SetTrue),
            help = "Re-analyze all media and ignore any existing loudness data on disk."
        )]
        force: bool,
    },

    #[clap(
        arg_required_else_help = true,
        after_help = "Generate, fuse, score and rank highlight candidate windows for one video from its transcript, scene cuts and (optionally) audio loudness. The ranked list is emitted as JSON for the downstream selection step."
    )]
    Rank {
        #[clap(
            long,
            required = true,
            value_parser = clap::value_parser!(PathBuf),
            help = "Whisper-style transcript JSON for the video ({\"segments\": [{start, end, text}]})."
        )]
        transcript: PathBuf,

        #[clap(
            long,
            value_parser = clap::value_parser!(PathBuf),
            help = "Scene-cut windows as a JSON list of {start, end} records, in seconds. Omitting this skips the scene generator."
        )]
        scenes: Option<PathBuf>,

        #[clap(
            long,
            value_parser = clap::value_parser!(PathBuf),
            help = "Source media file. Used only for the audio loudness signal; when omitted or unreadable, ranking proceeds without audio and every energy score is zero."
        )]
        media: Option<PathBuf>,

        #[clap(
            long,
            value_parser = clap::value_parser!(PathBuf),
            help = "JSON preset overriding candidate-generation config fields (window band, hotspot lexicon, dedupe threshold, ...). Missing fields keep their defaults."
        )]
        candidate_preset: Option<PathBuf>,

        #[clap(
            long,
            value_parser = clap::value_parser!(PathBuf),
            help = "JSON preset overriding scoring config fields (weights, penalties, lexicons). Missing fields keep their defaults."
        )]
        score_preset: Option<PathBuf>,

        #[clap(
            long,
            value_parser = clap::value_parser!(u32),
            help = "Minimum clip length in seconds. Overrides both the candidate and scoring configs."
        )]
        min_len: Option<u32>,

        #[clap(
            long,
            value_parser = clap::value_parser!(u32),
            help = "Maximum clip length in seconds. Overrides both the candidate and scoring configs."
        )]
        max_len: Option<u32>,

        #[clap(
            long,
            value_parser = clap::value_parser!(f64),
            help = "Pairwise interval IOU at or above which overlapping candidates merge. The range is 0 (exclusive) to 1 (inclusive)."
        )]
        iou_dedupe_threshold: Option<f64>,

        #[clap(
            long,
            value_parser = clap::value_parser!(usize),
            help = "Cap on the fused candidate list before scoring."
        )]
        max_candidates: Option<usize>,

        #[clap(
            long,
            value_parser = clap::value_parser!(usize),
            help = "Emit only the best N candidates after ranking."
        )]
        top: Option<usize>,

        #[clap(
            long,
            value_parser = clap::value_parser!(u64),
            help = "Soft deadline in seconds. When it expires, remaining engine stages are skipped and the valid partial ranking is returned."
        )]
        timeout: Option<u64>,

        #[clap(
            long,
            default_value = "false",
            action(ArgAction::SetTrue),
            help = "Measure loudness in-place instead of looking for data precomputed with the 'analyze' command."
        )]
        analyze: bool,

        #[clap(
            long,
            default_value = "false",
            action(ArgAction::SetTrue),
            help = "Skip the audio loudness signal even if media is available."
        )]
        no_audio: bool,

        #[clap(
            long,
            value_parser = clap::value_parser!(PathBuf),
            help = "Write the ranked JSON to this file instead of stdout."
        )]
        output: Option<PathBuf>,
    },
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(
        long,
        global = true,
        default_value = "false",
        action(ArgAction::SetTrue),
        help = "By default, media files are validated using FFmpeg, which is extremely accurate. Setting this flag will switch to just checking file headers."
    )]
    file_headers_only: bool,
}

impl Cli {
    fn validate(&self) {
        let mut cmd = Cli::command();
        match self.command {
            Commands::Info => (),
            Commands::Analyze { window_ms, .. } => {
                if window_ms == 0 {
                    cmd.error(ErrorKind::InvalidValue, "window_ms must be a positive number")
                        .exit();
                }
            }
            Commands::Rank {
                min_len,
                max_len,
                iou_dedupe_threshold,
                max_candidates,
                top,
                ..
            } => {
                if let (Some(min), Some(max)) = (min_len, max_len) {
                    if max < min {
                        cmd.error(
                            ErrorKind::InvalidValue,
                            "max_len must not be less than min_len",
                        )
                        .exit();
                    }
                }
                if let Some(iou) = iou_dedupe_threshold {
                    if !(iou > 0.0 && iou <= 1.0) {
                        cmd.error(
                            ErrorKind::InvalidValue,
                            "iou_dedupe_threshold must be in (0, 1]",
                        )
                        .exit();
                    }
                }
                if max_candidates == Some(0) {
                    cmd.error(ErrorKind::InvalidValue, "max_candidates must be at least 1")
                        .exit();
                }
                if top == Some(0) {
                    cmd.error(ErrorKind::InvalidValue, "top must be at least 1")
                        .exit();
                }
            }
        }
    }

    fn find_media_files(&self, paths: &[PathBuf]) -> Vec<PathBuf> {
        match sizzle::util::find_media_files(paths, !self.file_headers_only, true) {
            Err(e) => {
                let mut cmd = Cli::command();
                cmd.error(ErrorKind::InvalidValue, e.to_string()).exit();
            }
            Ok(v) => v,
        }
    }
}

fn load_loudness(
    media: &PathBuf,
    analyze: bool,
    window_ms: u32,
    full_validation: bool,
) -> Option<audio::LoudnessSeries> {
    if !sizzle::util::is_valid_media_file(media, full_validation, true) {
        tracing::warn!(
            "no usable audio in {}, continuing without the loudness signal",
            media.display()
        );
        return None;
    }
    match audio::LoudnessSeries::from_media(media, analyze, window_ms) {
        Ok(series) => Some(series),
        Err(e) => {
            tracing::warn!(
                "loudness unavailable for {} ({}), continuing without it",
                media.display(),
                e
            );
            None
        }
    }
}

fn main() -> sizzle::Result<()> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(tracing::Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    ffmpeg_next::init().unwrap();

    let args = Cli::parse();
    args.validate();

    match args.command {
        Commands::Analyze {
            ref paths,
            window_ms,
            threaded_decoding,
            force,
        } => {
            let media = args.find_media_files(paths);
            if media.is_empty() {
                let mut cmd = Cli::command();
                cmd.error(
                    ErrorKind::InvalidValue,
                    "no valid media files found in provided paths",
                )
                .exit();
            }
            let extractor = audio::LoudnessExtractor::from_files(media, threaded_decoding, force);
            let data = extractor.run(window_ms, true, true)?;
            for (path, series) in extractor.media().iter().zip(&data) {
                println!(
                    "{}: {} loudness samples ({} ms windows)",
                    path.display(),
                    series.samples().len(),
                    series.window_ms()
                );
            }
        }
        Commands::Rank {
            ref transcript,
            ref scenes,
            ref media,
            ref candidate_preset,
            ref score_preset,
            min_len,
            max_len,
            iou_dedupe_threshold,
            max_candidates,
            top,
            timeout,
            analyze,
            no_audio,
            ref output,
        } => {
            let transcript = TranscriptSegment::load_json(transcript)?;
            let scenes = match scenes {
                Some(path) => SceneWindow::load_json(path)?,
                None => Vec::new(),
            };

            let mut candidate_cfg = match candidate_preset {
                Some(path) => CandidateConfig::from_preset(path)?,
                None => CandidateConfig::default(),
            };
            let mut score_cfg = match score_preset {
                Some(path) => ScoreConfig::from_preset(path)?,
                None => ScoreConfig::default(),
            };
            if let Some(min) = min_len {
                candidate_cfg.min_len_s = min;
                score_cfg.min_len_s = min;
            }
            if let Some(max) = max_len {
                candidate_cfg.max_len_s = max;
                score_cfg.max_len_s = max;
            }
            if let Some(iou) = iou_dedupe_threshold {
                candidate_cfg.iou_dedupe_threshold = iou;
            }
            if let Some(cap) = max_candidates {
                candidate_cfg.max_candidates = cap;
            }

            let loudness = match media {
                Some(media) if !no_audio => load_loudness(
                    media,
                    analyze,
                    candidate_cfg.audio_win_ms,
                    !args.file_headers_only,
                ),
                _ => None,
            };

            let mut ranker = Ranker::new(candidate_cfg, score_cfg)?;
            if let Some(secs) = timeout {
                ranker = ranker.with_deadline(Instant::now() + Duration::from_secs(secs));
            }

            let mut ranked = ranker.rank(
                &transcript,
                &scenes,
                loudness.as_ref().map(|series| series.samples()),
                true,
            );
            if let Some(top) = top {
                ranked.truncate(top);
            }

            match output {
                Some(path) => {
                    let mut f = std::fs::File::create(path)?;
                    serde_json::to_writer_pretty(&mut f, &ranked)?;
                    println!("Wrote {} ranked candidates to {}", ranked.len(), path.display());
                }
                None => {
                    let stdout = std::io::stdout();
                    serde_json::to_writer_pretty(stdout.lock(), &ranked)?;
                    println!();
                }
            }
        }
        Commands::Info => {
            println!("FFmpeg version: {}", sizzle::util::ffmpeg_version_string());
        }
    }

    Ok(())
}
