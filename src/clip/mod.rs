mod config;
mod fusion;
mod generator;
mod ranker;
mod scorer;
mod signal;

pub use config::{CandidateConfig, ScoreConfig};
pub use generator::{Candidate, CandidateSource};
pub use ranker::Ranker;
pub use scorer::{ComponentScores, SafetyFlags, ScoredCandidate};
pub use signal::{LoudnessSample, SceneWindow, TranscriptSegment};

/// Default minimum clip length (seconds).
///
/// Windows shorter than this are extended; together with the maximum it
/// defines the target duration band for short-form clips.
pub const DEFAULT_MIN_CLIP_LEN: u32 = 18; // seconds

/// Default maximum clip length (seconds).
///
/// Windows longer than this are truncated to the maximum, measured from
/// their start.
pub const DEFAULT_MAX_CLIP_LEN: u32 = 60; // seconds

/// Default minimum gap between transcript hotspots (seconds).
///
/// Triggers closer together than this collapse into the first of the
/// cluster, avoiding a flood of tiny near-duplicate windows.
pub const DEFAULT_HOTSPOT_MIN_GAP: u32 = 20; // seconds

/// Default padding around a hotspot timestamp (seconds).
pub const DEFAULT_HOTSPOT_WINDOW_PAD: u32 = 8; // seconds

/// Default number of loudest samples that seed audio candidates.
pub const DEFAULT_AUDIO_TOPK: usize = 12;

/// Default padding around a loud second (seconds).
pub const DEFAULT_AUDIO_PAD: u32 = 10; // seconds

/// Default interval IOU at or above which two candidates are considered
/// duplicates and merged. The range is 0 (no overlap) to 1 (identical).
pub const DEFAULT_IOU_DEDUPE_THRESHOLD: f64 = 0.5;

/// Default cap on the fused candidate list.
///
/// Keeps the scoring pass and the downstream oracle prompt small.
pub const DEFAULT_MAX_CANDIDATES: usize = 60;
