use std::path::PathBuf;

pub mod audio;
pub mod clip;
pub mod util;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("loudness data not found at: {0:?}")]
    LoudnessDataNotFound(PathBuf),
    #[error("no paths provided to extractor")]
    ExtractorMissingPaths,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid lexicon pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
    #[error("FFmpeg error: {0}")]
    FFmpegError(#[from] ffmpeg_next::Error),
    #[error("bincode error: {0}")]
    BincodeError(#[from] bincode::Error),
    #[error("serde_json error: {0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
