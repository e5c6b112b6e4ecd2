use regex::{Regex, RegexSet};
use serde::Serialize;

use super::config::ScoreConfig;
use super::generator::Candidate;
use super::signal::{self, LoudnessSample, TranscriptSegment};
use crate::Result;

/// Per-factor scores for a single candidate. Serializes as a name-to-float
/// mapping in the ranked output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ComponentScores {
    pub keywords: f64,
    pub laughter: f64,
    pub exclaim: f64,
    pub question: f64,
    pub sentiment: f64,
    pub pace: f64,
    pub cohesion: f64,
    pub energy: f64,
    pub len_fit: f64,
}

/// Safety lexicon hits. Flagged candidates are penalized, never removed;
/// filtering is the caller's decision.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct SafetyFlags {
    pub banword: bool,
    pub nsfw: bool,
}

/// A fully scored candidate window, ready for the selection oracle.
///
/// Immutable after creation. The final ranking orders by `total` descending;
/// component scores and the total are rounded to 3 decimals for output.
#[derive(Clone, Debug, Serialize)]
pub struct ScoredCandidate {
    pub start: u32,
    pub end: u32,
    pub duration: f64,
    pub source: String,
    pub text_preview: String,
    pub scores: ComponentScores,
    pub flags: SafetyFlags,
    pub total: f64,
}

/// All configured lexicons compiled into regex sets, once per engine
/// construction. One pattern scores one point no matter how often it occurs
/// in the window text.
struct Lexicons {
    excite: RegexSet,
    laughter: RegexSet,
    positive: RegexSet,
    negative: RegexSet,
    setup_cues: RegexSet,
    ban: RegexSet,
    nsfw: RegexSet,
}

impl Lexicons {
    fn compile(cfg: &ScoreConfig) -> Result<Self> {
        Ok(Self {
            excite: RegexSet::new(&cfg.excite_keywords)?,
            laughter: RegexSet::new(&cfg.laughter_tokens)?,
            positive: RegexSet::new(&cfg.positive_words)?,
            negative: RegexSet::new(&cfg.negative_words)?,
            setup_cues: RegexSet::new(&cfg.setup_cues)?,
            ban: RegexSet::new(&cfg.ban_words)?,
            nsfw: RegexSet::new(&cfg.nsfw_words)?,
        })
    }
}

/// Computes the multi-factor composite score for deduplicated candidates.
///
/// Pure per candidate: identical `(candidate, transcript, loudness, config)`
/// always produces an identical total.
pub(crate) struct Scorer {
    cfg: ScoreConfig,
    lex: Lexicons,
    sentence_split: Regex,
}

impl Scorer {
    pub fn new(cfg: ScoreConfig) -> Result<Self> {
        cfg.validate()?;
        let lex = Lexicons::compile(&cfg)?;
        // Unwrap is fine: the pattern is a compile-time constant.
        let sentence_split = Regex::new(r"[.!?]+").unwrap();
        Ok(Self {
            cfg,
            lex,
            sentence_split,
        })
    }

    pub fn score(
        &self,
        candidate: &Candidate,
        transcript: &[TranscriptSegment],
        loudness: Option<&[LoudnessSample]>,
    ) -> ScoredCandidate {
        let duration = (candidate.end as f64 - candidate.start as f64).max(0.0);
        let text = signal::window_text(transcript, candidate.start, candidate.end);
        let lower = text.to_lowercase();

        let (keywords, has_laugh) = self.keyword_score(&lower);
        let (exclaim, question) = punctuation_score(&text);
        let sentiment = self.sentiment_score(&lower);
        let pace = pace_score(&text, duration);
        let cohesion = self.cohesion_score(&text);
        let energy = loudness
            .map(|series| energy_score(series, candidate.start, candidate.end))
            .unwrap_or(0.0);
        let len_fit = length_fit_score(duration, &self.cfg);

        let flags = SafetyFlags {
            banword: self.lex.ban.is_match(&lower),
            nsfw: self.lex.nsfw.is_match(&lower),
        };

        let laughter = if has_laugh { 1.0 } else { 0.0 };
        let mut composite = self.cfg.w_keywords * keywords
            + self.cfg.w_laughter * laughter
            + self.cfg.w_exclaim * exclaim
            + self.cfg.w_question * question
            + self.cfg.w_sentiment * sentiment
            + self.cfg.w_pace * pace
            + self.cfg.w_cohesion * cohesion
            + self.cfg.w_energy * energy
            + self.cfg.w_len_fit * len_fit;

        // Penalties come off after the weighted sum, so a flagged window can
        // go negative and sink to the bottom without being removed.
        if flags.banword {
            composite -= self.cfg.penalty_banword;
        }
        if flags.nsfw {
            composite -= self.cfg.penalty_nsfw;
        }

        ScoredCandidate {
            start: candidate.start,
            end: candidate.end,
            duration,
            source: candidate.source.clone(),
            text_preview: candidate.text_preview.clone(),
            scores: ComponentScores {
                keywords: round3(keywords),
                laughter,
                exclaim: round3(exclaim),
                question: round3(question),
                sentiment: round3(sentiment),
                pace: round3(pace),
                cohesion: round3(cohesion),
                energy: round3(energy),
                len_fit: round3(len_fit),
            },
            flags,
            total: round3(composite),
        }
    }

    /// One point per matching excitement pattern, plus a small bonus when any
    /// laughter token matches. The laughter flag is also returned on its own
    /// for the separately weighted term.
    fn keyword_score(&self, lower: &str) -> (f64, bool) {
        let mut score = self.lex.excite.matches(lower).iter().count() as f64;
        let has_laugh = self.lex.laughter.is_match(lower);
        if has_laugh {
            score += 0.5;
        }
        (score, has_laugh)
    }

    /// Lightweight lexicon polarity. Strongly positive and strongly negative
    /// moments are both clippable, hence the absolute framing.
    fn sentiment_score(&self, lower: &str) -> f64 {
        let pos = self.lex.positive.matches(lower).iter().count() as f64;
        let neg = self.lex.negative.matches(lower).iter().count() as f64;
        ((pos - neg).abs() + 0.3 * (pos + neg)).min(3.0)
    }

    /// Self-contained-moment heuristic: a few medium-length sentences with a
    /// causal or sequencing cue read like a setup and payoff.
    fn cohesion_score(&self, text: &str) -> f64 {
        let sentences: Vec<&str> = self
            .sentence_split
            .split(text)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if sentences.is_empty() {
            return 0.0;
        }

        let total_words: usize = sentences
            .iter()
            .map(|s| s.split_whitespace().count())
            .sum();
        let avg_len = total_words as f64 / sentences.len() as f64;

        let mut score: f64 = if (6.0..=22.0).contains(&avg_len) {
            1.0
        } else {
            0.5
        };
        if sentences
            .iter()
            .any(|s| self.lex.setup_cues.is_match(&s.to_lowercase()))
        {
            score += 0.3;
        }
        score.min(1.5)
    }
}

/// Exclamation and question mark density per 100 characters, clamped so very
/// short or noisy text cannot dominate.
fn punctuation_score(text: &str) -> (f64, f64) {
    let n = text.chars().count().max(1) as f64;
    let exclaim = text.matches('!').count() as f64 / n * 100.0;
    let question = text.matches('?').count() as f64 / n * 100.0;
    (exclaim.min(1.5), question.min(1.0))
}

/// Words per second, scored with a Gaussian around an ideal speaking pace.
/// Both too-slow and too-fast windows score low; silent windows score zero.
fn pace_score(text: &str, duration_s: f64) -> f64 {
    if duration_s <= 0.0 || text.trim().is_empty() {
        return 0.0;
    }
    let words = text.split_whitespace().count().max(1) as f64;
    let wps = words / duration_s;
    const MU: f64 = 3.0;
    const SIGMA: f64 = 1.0;
    (-((wps - MU) * (wps - MU)) / (2.0 * SIGMA * SIGMA)).exp()
}

/// Average in-window loudness above a robust baseline (the 10th-percentile
/// level across the whole series), scaled to roughly 0..2.
fn energy_score(series: &[LoudnessSample], start_s: u32, end_s: u32) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    let window: Vec<f64> = series
        .iter()
        .filter(|s| s.second >= start_s && s.second <= end_s)
        .map(|s| s.level_db)
        .collect();
    if window.is_empty() {
        return 0.0;
    }
    let avg = window.iter().sum::<f64>() / window.len() as f64;

    let mut levels: Vec<f64> = series.iter().map(|s| s.level_db).collect();
    levels.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let idx = ((0.1 * levels.len() as f64) as usize).saturating_sub(1);
    let baseline = levels[idx];

    ((avg - baseline) / 10.0).max(0.0)
}

/// Full score inside the target band; outside it, a linear falloff from the
/// band midpoint over the band half-span, floored at 0.
fn length_fit_score(duration_s: f64, cfg: &ScoreConfig) -> f64 {
    let min = cfg.min_len_s as f64;
    let max = cfg.max_len_s as f64;
    if (min..=max).contains(&duration_s) {
        return 1.0;
    }
    let center = (min + max) / 2.0;
    let span = (max - min) / 2.0;
    (1.0 - (duration_s - center).abs() / span).max(0.0)
}

/// Final ranking: stable sort by total descending, so ties keep their
/// chronological fusion order.
pub(crate) fn rank(mut scored: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
    scored.sort_by(|a, b| {
        b.total
            .partial_cmp(&a.total)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod test {
    use super::*;

    fn seg(start: f64, end: f64, text: &str) -> TranscriptSegment {
        TranscriptSegment {
            start,
            end,
            text: text.to_owned(),
        }
    }

    fn cand(start: u32, end: u32) -> Candidate {
        Candidate {
            start,
            end,
            source: "scene".to_owned(),
            text_preview: String::new(),
        }
    }

    fn scorer() -> Scorer {
        Scorer::new(ScoreConfig::default()).unwrap()
    }

    #[test]
    fn test_keyword_and_exclaim_scores_on_hype_text() {
        let s = scorer();
        let transcript = vec![seg(0.0, 10.0, "This is insane! No way!")];
        let scored = s.score(&cand(0, 30), &transcript, None);

        assert!(scored.scores.keywords >= 1.0);
        assert!(scored.scores.exclaim > 0.0);
    }

    #[test]
    fn test_laughter_sets_flag_and_bonus() {
        let s = scorer();
        let transcript = vec![seg(0.0, 10.0, "hahaha that got me")];
        let scored = s.score(&cand(0, 30), &transcript, None);

        assert_eq!(scored.scores.laughter, 1.0);
        assert_eq!(scored.scores.keywords, 0.5);
    }

    #[test]
    fn test_sentiment_is_absolute_polarity() {
        let s = scorer();
        let positive = s.score(&cand(0, 30), &[seg(0.0, 10.0, "what a clutch win")], None);
        let negative = s.score(&cand(0, 30), &[seg(0.0, 10.0, "total fail, pure rage")], None);

        // One matching pattern each way: |1 - 0| + 0.3 * 1.
        assert_eq!(positive.scores.sentiment, 1.3);
        assert_eq!(negative.scores.sentiment, 1.3);
    }

    #[test]
    fn test_pace_peaks_at_ideal_words_per_second() {
        let ideal = "word ".repeat(90);
        assert!((pace_score(&ideal, 30.0) - 1.0).abs() < 1e-9);

        let slow = "word ".repeat(10);
        assert!(pace_score(&slow, 30.0) < 0.1);

        assert_eq!(pace_score("", 30.0), 0.0);
        assert_eq!(pace_score("words", 0.0), 0.0);
    }

    #[test]
    fn test_cohesion_band_and_cue_bonus() {
        let s = scorer();

        let flat = "one two three four five six seven eight. one two three four five six seven eight.";
        assert_eq!(s.cohesion_score(flat), 1.0);

        let with_cue =
            "we lined up the final jump carefully. then the whole thing fell apart on camera.";
        assert_eq!(s.cohesion_score(with_cue), 1.3);

        let choppy = "nope. not this. never.";
        assert_eq!(s.cohesion_score(choppy), 0.5);

        assert_eq!(s.cohesion_score(""), 0.0);
    }

    #[test]
    fn test_energy_uses_percentile_baseline() {
        let mut series: Vec<LoudnessSample> = (0..20)
            .map(|i| LoudnessSample {
                second: i,
                level_db: 10.0,
            })
            .collect();
        for s in series.iter_mut().filter(|s| s.second >= 5 && s.second <= 8) {
            s.level_db = 30.0;
        }

        // Baseline is the 10th-percentile level (10.0); window average is 30.0.
        assert!((energy_score(&series, 5, 8) - 2.0).abs() < 1e-9);
        // A window at the baseline gains nothing.
        assert_eq!(energy_score(&series, 12, 15), 0.0);
        // No overlap with the series: neutral.
        assert_eq!(energy_score(&series, 100, 130), 0.0);
        assert_eq!(energy_score(&[], 0, 30), 0.0);
    }

    #[test]
    fn test_length_fit_band_and_falloff() {
        let cfg = ScoreConfig::default();
        assert_eq!(length_fit_score(30.0, &cfg), 1.0);
        assert_eq!(length_fit_score(18.0, &cfg), 1.0);
        assert_eq!(length_fit_score(60.0, &cfg), 1.0);
        assert_eq!(length_fit_score(10.0, &cfg), 0.0);
        assert_eq!(length_fit_score(90.0, &cfg), 0.0);
    }

    #[test]
    fn test_empty_inputs_leave_only_length_fit() {
        let s = scorer();
        let scored = s.score(&cand(0, 30), &[], None);

        let expected = ScoreConfig::default().w_len_fit * 1.0;
        assert_eq!(scored.total, round3(expected));
        assert_eq!(scored.scores.keywords, 0.0);
        assert_eq!(scored.scores.sentiment, 0.0);
        assert_eq!(scored.scores.pace, 0.0);
        assert_eq!(scored.scores.cohesion, 0.0);
        assert_eq!(scored.scores.energy, 0.0);
    }

    #[test]
    fn test_ban_word_penalty_sinks_candidate() {
        let s = scorer();
        let transcript = vec![
            seg(0.0, 10.0, "an ordinary quiet moment"),
            seg(60.0, 70.0, "kys they said, unbelievable!"),
        ];

        let clean = s.score(&cand(0, 30), &transcript, None);
        let flagged = s.score(&cand(55, 85), &transcript, None);

        assert!(!clean.flags.banword);
        assert!(flagged.flags.banword);
        assert!(flagged.total < clean.total);
    }

    #[test]
    fn test_nsfw_flag_and_penalty() {
        let s = scorer();
        let transcript = vec![seg(0.0, 10.0, "this part is nsfw, skip it")];
        let scored = s.score(&cand(0, 30), &transcript, None);

        assert!(scored.flags.nsfw);
        assert!(!scored.flags.banword);
        assert!(scored.total < 0.0);
    }

    #[test]
    fn test_output_record_shape() {
        let s = scorer();
        let transcript = vec![seg(0.0, 10.0, "no way! that was amazing")];
        let mut candidate = cand(0, 30);
        candidate.text_preview = "no way! that was amazing".to_owned();

        let value = serde_json::to_value(s.score(&candidate, &transcript, None)).unwrap();

        assert_eq!(value["start"], 0);
        assert_eq!(value["end"], 30);
        assert_eq!(value["duration"], 30.0);
        assert_eq!(value["source"], "scene");
        assert_eq!(value["text_preview"], "no way! that was amazing");
        assert!(value["scores"]["keywords"].is_number());
        assert!(value["scores"]["len_fit"].is_number());
        assert_eq!(value["flags"]["banword"], false);
        assert!(value["total"].is_number());
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let s = scorer();
        let transcript = vec![seg(0.0, 12.0, "no way! that actually worked, lol")];
        let series: Vec<LoudnessSample> = (0..60)
            .map(|i| LoudnessSample {
                second: i,
                level_db: 20.0 + (i % 7) as f64,
            })
            .collect();

        let a = s.score(&cand(0, 30), &transcript, Some(&series));
        let b = s.score(&cand(0, 30), &transcript, Some(&series));

        assert_eq!(a.total, b.total);
        assert_eq!(a.scores, b.scores);
    }

    #[test]
    fn test_rank_orders_by_total_descending() {
        let s = scorer();
        let transcript = vec![
            seg(0.0, 10.0, "nothing to see here"),
            seg(100.0, 110.0, "INSANE! let's go! that was amazing!"),
        ];

        let scored = vec![
            s.score(&cand(0, 30), &transcript, None),
            s.score(&cand(95, 125), &transcript, None),
        ];
        let ranked = rank(scored);

        assert!(ranked[0].total >= ranked[1].total);
        assert_eq!(ranked[0].start, 95);
    }
}
