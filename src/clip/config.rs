use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Controls how raw candidate windows are generated and fused.
///
/// All durations are in seconds. Defaults target short-form clips; any field
/// can be overridden per content source through a JSON preset
/// (see [CandidateConfig::from_preset]).
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct CandidateConfig {
    /// Desired minimum clip length.
    pub min_len_s: u32,
    /// Desired maximum clip length.
    pub max_len_s: u32,
    /// Patterns that mark a transcript segment as a hotspot trigger.
    pub hotspot_keywords: Vec<String>,
    /// Triggers closer together than this collapse into one hotspot.
    pub hotspot_min_gap_s: u32,
    /// Padding applied around each hotspot timestamp.
    pub hotspot_window_pad_s: u32,
    /// RMS window used when extracting the loudness series.
    pub audio_win_ms: u32,
    /// How many of the loudest samples seed audio candidates.
    pub audio_topk: usize,
    /// Padding applied around each loud second.
    pub audio_pad_s: u32,
    /// Pairwise interval IOU at or above which two candidates merge.
    pub iou_dedupe_threshold: f64,
    /// Hard cap on the fused candidate list.
    pub max_candidates: usize,
}

impl Default for CandidateConfig {
    fn default() -> Self {
        Self {
            min_len_s: super::DEFAULT_MIN_CLIP_LEN,
            max_len_s: super::DEFAULT_MAX_CLIP_LEN,
            hotspot_keywords: default_excite_keywords(),
            hotspot_min_gap_s: super::DEFAULT_HOTSPOT_MIN_GAP,
            hotspot_window_pad_s: super::DEFAULT_HOTSPOT_WINDOW_PAD,
            audio_win_ms: crate::audio::DEFAULT_LOUDNESS_WINDOW_MS,
            audio_topk: super::DEFAULT_AUDIO_TOPK,
            audio_pad_s: super::DEFAULT_AUDIO_PAD,
            iou_dedupe_threshold: super::DEFAULT_IOU_DEDUPE_THRESHOLD,
            max_candidates: super::DEFAULT_MAX_CANDIDATES,
        }
    }
}

impl CandidateConfig {
    /// Loads a config from a JSON preset. Missing fields keep their defaults.
    pub fn from_preset(path: impl AsRef<Path>) -> Result<Self> {
        let f = std::fs::File::open(path.as_ref())?;
        let cfg: Self = serde_json::from_reader(&f)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects configurations that would silently corrupt candidate
    /// generation. Called once at engine construction.
    pub fn validate(&self) -> Result<()> {
        if self.max_len_s < self.min_len_s {
            return Err(Error::InvalidConfig(format!(
                "max_len_s ({}) must not be less than min_len_s ({})",
                self.max_len_s, self.min_len_s
            )));
        }
        if !(self.iou_dedupe_threshold > 0.0 && self.iou_dedupe_threshold <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "iou_dedupe_threshold ({}) must be in (0, 1]",
                self.iou_dedupe_threshold
            )));
        }
        if self.max_candidates == 0 {
            return Err(Error::InvalidConfig(
                "max_candidates must be at least 1".to_owned(),
            ));
        }
        if self.audio_win_ms == 0 {
            return Err(Error::InvalidConfig(
                "audio_win_ms must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Per-factor weights, penalties and lexicons for the scoring engine.
///
/// Lexicons are regex pattern sets matched against lower-cased window text;
/// one pattern counts once no matter how often it occurs. Like
/// [CandidateConfig], the whole struct is a pure value object loadable from a
/// JSON preset.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoreConfig {
    /// Sweet-spot clip length band used by the length-fit score.
    pub min_len_s: u32,
    pub max_len_s: u32,

    // Weights for the composite.
    pub w_exclaim: f64,
    pub w_question: f64,
    pub w_keywords: f64,
    pub w_laughter: f64,
    pub w_sentiment: f64,
    pub w_energy: f64,
    pub w_pace: f64,
    pub w_cohesion: f64,
    pub w_len_fit: f64,

    // Penalties subtracted after the weighted sum.
    pub penalty_nsfw: f64,
    pub penalty_banword: f64,

    // Lexicons. Kept generic here; brand presets extend them.
    pub excite_keywords: Vec<String>,
    pub laughter_tokens: Vec<String>,
    pub positive_words: Vec<String>,
    pub negative_words: Vec<String>,
    pub setup_cues: Vec<String>,
    pub ban_words: Vec<String>,
    pub nsfw_words: Vec<String>,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            min_len_s: super::DEFAULT_MIN_CLIP_LEN,
            max_len_s: super::DEFAULT_MAX_CLIP_LEN,
            w_exclaim: 0.6,
            w_question: 0.3,
            w_keywords: 1.2,
            w_laughter: 1.0,
            w_sentiment: 0.8,
            w_energy: 1.0,
            w_pace: 0.4,
            w_cohesion: 0.6,
            w_len_fit: 0.7,
            penalty_nsfw: 2.5,
            penalty_banword: 2.0,
            excite_keywords: default_excite_keywords(),
            laughter_tokens: vec![r"\b(lmao|lmfao|lol+|hahaha+|haha|rofl)\b".to_owned()],
            positive_words: vec![r"\b(awesome|amazing|win|victory|clutch|perfect)\b".to_owned()],
            negative_words: vec![r"\b(fail|lost|lose|trash|rage|mad|angry)\b".to_owned()],
            setup_cues: vec![r"\b(when|then|after|because|so|and then)\b".to_owned()],
            ban_words: vec![r"\b(kys|suicide)\b".to_owned()],
            nsfw_words: vec![r"\b(nsfw|porn)\b".to_owned()],
        }
    }
}

impl ScoreConfig {
    /// Loads a config from a JSON preset. Missing fields keep their defaults.
    pub fn from_preset(path: impl AsRef<Path>) -> Result<Self> {
        let f = std::fs::File::open(path.as_ref())?;
        let cfg: Self = serde_json::from_reader(&f)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects configurations that would corrupt every score, e.g. a
    /// zero-length target band. Called once at engine construction.
    pub fn validate(&self) -> Result<()> {
        if self.max_len_s <= self.min_len_s {
            return Err(Error::InvalidConfig(format!(
                "scoring length band [{}, {}] must have a positive span",
                self.min_len_s, self.max_len_s
            )));
        }
        Ok(())
    }
}

fn default_excite_keywords() -> Vec<String> {
    vec![r"\b(wtf|no way|omg|bro|dude|holy|let'?s go+|insane|crazy|what|yo+)\b".to_owned()]
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_configs_are_valid() {
        CandidateConfig::default().validate().unwrap();
        ScoreConfig::default().validate().unwrap();
    }

    #[test]
    fn test_inverted_length_band_rejected() {
        let cfg = CandidateConfig {
            min_len_s: 60,
            max_len_s: 18,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(crate::Error::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_length_scoring_band_rejected() {
        let cfg = ScoreConfig {
            min_len_s: 30,
            max_len_s: 30,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(crate::Error::InvalidConfig(_))));
    }

    #[test]
    fn test_iou_threshold_bounds() {
        for bad in [0.0, -0.5, 1.5] {
            let cfg = CandidateConfig {
                iou_dedupe_threshold: bad,
                ..Default::default()
            };
            assert!(cfg.validate().is_err(), "threshold {} accepted", bad);
        }
        let cfg = CandidateConfig {
            iou_dedupe_threshold: 1.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_preset_overrides_keep_defaults() {
        let json = r#"{"min_len_s": 20, "audio_topk": 4}"#;
        let cfg: CandidateConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.min_len_s, 20);
        assert_eq!(cfg.audio_topk, 4);
        assert_eq!(cfg.max_len_s, 60);
        assert_eq!(cfg.iou_dedupe_threshold, 0.5);
    }
}
