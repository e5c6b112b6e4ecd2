use regex::RegexSet;

use super::config::CandidateConfig;
use super::signal::{LoudnessSample, SceneWindow, TranscriptSegment};

/// A provisional highlight window, tagged with the signal that produced it.
///
/// Created by one of the [CandidateSource] generators; only the fusion pass
/// mutates it afterwards (bounds widen, sources concatenate with `+`).
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub start: u32,
    pub end: u32,
    pub source: String,
    pub text_preview: String,
}

impl Candidate {
    fn new(start: u32, end: u32, source: CandidateSource) -> Self {
        Self {
            start,
            end,
            source: source.as_str().to_owned(),
            text_preview: String::new(),
        }
    }
}

/// The closed set of signals that can seed candidates.
///
/// Each variant consumes exactly one signal source from the bundle. The audio
/// variant is strictly additive: with no loudness series it produces nothing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CandidateSource {
    Scene,
    Transcript,
    Audio,
}

impl CandidateSource {
    pub(crate) const ALL: [CandidateSource; 3] = [
        CandidateSource::Scene,
        CandidateSource::Transcript,
        CandidateSource::Audio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateSource::Scene => "scene",
            CandidateSource::Transcript => "transcript",
            CandidateSource::Audio => "audio",
        }
    }

    pub(crate) fn generate(
        &self,
        signals: &SignalBundle<'_>,
        hotspot_patterns: &RegexSet,
        cfg: &CandidateConfig,
    ) -> Vec<Candidate> {
        match self {
            CandidateSource::Scene => from_scene_windows(signals.scenes, cfg),
            CandidateSource::Transcript => {
                from_transcript_hotspots(signals.transcript, hotspot_patterns, cfg)
            }
            CandidateSource::Audio => signals
                .loudness
                .map(|series| from_loudness_peaks(series, cfg))
                .unwrap_or_default(),
        }
    }
}

impl std::fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The read-only per-video signals one engine invocation works from.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SignalBundle<'a> {
    pub transcript: &'a [TranscriptSegment],
    pub scenes: &'a [SceneWindow],
    pub loudness: Option<&'a [LoudnessSample]>,
}

/// Clamps a raw window into the configured duration band: short windows are
/// extended to `min_len_s`, long ones truncated to `max_len_s` from their
/// start. Bounds are already floored at zero by the callers.
pub(crate) fn normalize_window(start: u32, end: u32, cfg: &CandidateConfig) -> (u32, u32) {
    let dur = end as i64 - start as i64;
    let end = if dur < cfg.min_len_s as i64 {
        start + cfg.min_len_s
    } else if dur > cfg.max_len_s as i64 {
        start + cfg.max_len_s
    } else {
        end
    };
    (start, end)
}

fn from_scene_windows(scenes: &[SceneWindow], cfg: &CandidateConfig) -> Vec<Candidate> {
    let mut out = Vec::new();
    for scene in scenes {
        let (s, e) = normalize_window(scene.start, scene.end, cfg);
        if e > s {
            out.push(Candidate::new(s, e, CandidateSource::Scene));
        }
    }
    out
}

/// Finds moments with exclamations or excitement keywords and creates a
/// padded window around each. Triggers closer together than
/// `hotspot_min_gap_s` collapse into the first of the cluster.
fn from_transcript_hotspots(
    segments: &[TranscriptSegment],
    patterns: &RegexSet,
    cfg: &CandidateConfig,
) -> Vec<Candidate> {
    let mut events: Vec<u32> = Vec::new();
    for seg in segments {
        let text = seg.text.to_lowercase();
        let start = seg.start.max(0.0) as u32;
        if text.contains('!') || patterns.is_match(&text) {
            let far_enough = events
                .last()
                .map(|last| start as i64 - *last as i64 >= cfg.hotspot_min_gap_s as i64)
                .unwrap_or(true);
            if far_enough {
                events.push(start);
            }
        }
    }

    let mut out = Vec::new();
    for ts in events {
        let s = ts.saturating_sub(cfg.hotspot_window_pad_s);
        let e = ts + cfg.hotspot_window_pad_s + cfg.min_len_s / 2;
        let (s, e) = normalize_window(s, e, cfg);
        if e > s {
            out.push(Candidate::new(s, e, CandidateSource::Transcript));
        }
    }
    out
}

/// Seeds a window around each of the `audio_topk` loudest samples.
fn from_loudness_peaks(series: &[LoudnessSample], cfg: &CandidateConfig) -> Vec<Candidate> {
    if series.is_empty() {
        return Vec::new();
    }

    let mut by_level: Vec<&LoudnessSample> = series.iter().collect();
    by_level.sort_by(|a, b| {
        b.level_db
            .partial_cmp(&a.level_db)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut out = Vec::new();
    for sample in by_level.into_iter().take(cfg.audio_topk) {
        let s = sample.second.saturating_sub(cfg.audio_pad_s);
        let e = sample.second + cfg.audio_pad_s;
        let (s, e) = normalize_window(s, e, cfg);
        if e > s {
            out.push(Candidate::new(s, e, CandidateSource::Audio));
        }
    }
    out
}
