#[cfg(feature = "rayon")]
extern crate rayon;

use std::time::Instant;

use regex::RegexSet;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use super::config::{CandidateConfig, ScoreConfig};
use super::fusion;
use super::generator::{CandidateSource, SignalBundle};
use super::scorer::{self, ScoredCandidate, Scorer};
use super::signal::{LoudnessSample, SceneWindow, TranscriptSegment};
use crate::Result;

/// Turns the raw per-video signals into a ranked list of scored highlight
/// candidates: generate per source, fuse and deduplicate, score, sort.
///
/// Construction validates both configs and compiles every lexicon, so a
/// misconfiguration fails before any video is touched. A built [Ranker] is
/// pure and stateless per invocation: it holds no per-video data, performs no
/// I/O, and can be shared freely across worker threads.
///
/// # Example
///
/// ```
/// use sizzle::clip::{CandidateConfig, Ranker, SceneWindow, ScoreConfig};
///
/// let ranker = Ranker::new(CandidateConfig::default(), ScoreConfig::default()).unwrap();
/// let scenes = vec![SceneWindow { start: 0, end: 30 }];
/// let ranked = ranker.rank(&[], &scenes, None, false);
/// assert_eq!(ranked.len(), 1);
/// ```
pub struct Ranker {
    candidate_cfg: CandidateConfig,
    hotspot_patterns: RegexSet,
    scorer: Scorer,
    deadline: Option<Instant>,
}

impl Ranker {
    /// Builds a ranker from the two config value objects.
    ///
    /// Fails fast on invalid configuration or lexicon patterns; this is the
    /// only fatal error path in the engine.
    pub fn new(candidate_cfg: CandidateConfig, score_cfg: ScoreConfig) -> Result<Self> {
        candidate_cfg.validate()?;
        let hotspot_patterns = RegexSet::new(&candidate_cfg.hotspot_keywords)?;
        let scorer = Scorer::new(score_cfg)?;
        Ok(Self {
            candidate_cfg,
            hotspot_patterns,
            scorer,
            deadline: None,
        })
    }

    /// Returns a new [Ranker] that aborts cleanly at `deadline`, handing back
    /// whatever partial ranking is valid at that point.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    fn deadline_expired(&self) -> bool {
        self.deadline
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }

    /// Runs the engine over one video's signals.
    ///
    /// `loudness` is strictly additive: pass `None` when no audio backend is
    /// available and every energy score degrades to zero. If `threading` is
    /// set (and the `rayon` feature is enabled), the scoring pass fans out
    /// across candidates.
    ///
    /// Deterministic for identical inputs and config. Never fails: empty or
    /// malformed-as-empty inputs produce an empty ranking.
    pub fn rank(
        &self,
        transcript: &[TranscriptSegment],
        scenes: &[SceneWindow],
        loudness: Option<&[LoudnessSample]>,
        threading: bool,
    ) -> Vec<ScoredCandidate> {
        let span = tracing::span!(tracing::Level::TRACE, "rank");
        let _enter = span.enter();

        let signals = SignalBundle {
            transcript,
            scenes,
            loudness,
        };

        let mut raw = Vec::new();
        for source in CandidateSource::ALL {
            if self.deadline_expired() {
                tracing::debug!(
                    source = source.as_str(),
                    "deadline reached, skipping remaining generators"
                );
                break;
            }
            let generated = source.generate(&signals, &self.hotspot_patterns, &self.candidate_cfg);
            tracing::debug!(
                source = source.as_str(),
                candidates = generated.len(),
                "generator finished"
            );
            raw.extend(generated);
        }

        let fused = fusion::fuse(raw, transcript, &self.candidate_cfg);
        tracing::debug!(candidates = fused.len(), "fusion finished");

        let mut scored: Vec<ScoredCandidate> = Vec::new();
        if cfg!(feature = "rayon") && threading {
            #[cfg(feature = "rayon")]
            {
                scored = fused
                    .par_iter()
                    .filter_map(|c| {
                        if self.deadline_expired() {
                            None
                        } else {
                            Some(self.scorer.score(c, transcript, loudness))
                        }
                    })
                    .collect();
            }
        } else {
            for c in &fused {
                if self.deadline_expired() {
                    tracing::debug!(
                        scored = scored.len(),
                        remaining = fused.len() - scored.len(),
                        "deadline reached during scoring"
                    );
                    break;
                }
                scored.push(self.scorer.score(c, transcript, loudness));
            }
        }

        scorer::rank(scored)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    fn seg(start: f64, end: f64, text: &str) -> TranscriptSegment {
        TranscriptSegment {
            start,
            end,
            text: text.to_owned(),
        }
    }

    fn fixture() -> (Vec<TranscriptSegment>, Vec<SceneWindow>) {
        let transcript = vec![
            seg(0.0, 6.0, "welcome back to the channel"),
            seg(42.0, 48.0, "NO WAY! that was insane!"),
            seg(120.0, 126.0, "so then the whole bridge collapsed"),
        ];
        let scenes = vec![
            SceneWindow { start: 0, end: 35 },
            SceneWindow { start: 40, end: 70 },
            SceneWindow { start: 110, end: 150 },
        ];
        (transcript, scenes)
    }

    #[test]
    fn test_rank_end_to_end_without_audio() {
        let ranker = Ranker::new(CandidateConfig::default(), ScoreConfig::default()).unwrap();
        let (transcript, scenes) = fixture();

        let ranked = ranker.rank(&transcript, &scenes, None, false);

        assert!(!ranked.is_empty());
        for pair in ranked.windows(2) {
            assert!(pair[0].total >= pair[1].total);
        }
        for c in &ranked {
            assert!(c.start < c.end);
            assert_eq!(c.scores.energy, 0.0);
        }
        // The hype moment should outrank the intro scene.
        assert!(ranked[0].text_preview.to_lowercase().contains("insane"));
    }

    #[test]
    fn test_rank_is_deterministic() {
        let ranker = Ranker::new(CandidateConfig::default(), ScoreConfig::default()).unwrap();
        let (transcript, scenes) = fixture();
        let series: Vec<LoudnessSample> = (0..150)
            .map(|i| LoudnessSample {
                second: i,
                level_db: 30.0 + ((i * 13) % 17) as f64,
            })
            .collect();

        let a = ranker.rank(&transcript, &scenes, Some(&series), false);
        let b = ranker.rank(&transcript, &scenes, Some(&series), false);

        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!((x.start, x.end, x.total), (y.start, y.end, y.total));
        }
    }

    #[test]
    fn test_loudness_adds_candidates_and_energy() {
        let ranker = Ranker::new(CandidateConfig::default(), ScoreConfig::default()).unwrap();
        let (transcript, scenes) = fixture();
        let mut series: Vec<LoudnessSample> = (0..300)
            .map(|i| LoudnessSample {
                second: i,
                level_db: 20.0,
            })
            .collect();
        series[250].level_db = 60.0;

        let without = ranker.rank(&transcript, &scenes, None, false);
        let with = ranker.rank(&transcript, &scenes, Some(&series), false);

        assert!(with.len() > without.len());
        assert!(with.iter().any(|c| c.source.contains("audio")));
    }

    #[test]
    fn test_empty_inputs_produce_empty_ranking() {
        let ranker = Ranker::new(CandidateConfig::default(), ScoreConfig::default()).unwrap();
        assert!(ranker.rank(&[], &[], None, false).is_empty());
    }

    #[test]
    fn test_expired_deadline_aborts_cleanly() {
        let (transcript, scenes) = fixture();
        let ranker = Ranker::new(CandidateConfig::default(), ScoreConfig::default())
            .unwrap()
            .with_deadline(Instant::now() - Duration::from_secs(1));

        // All generator stages are skipped, so the ranking is empty rather
        // than an error.
        assert!(ranker.rank(&transcript, &scenes, None, false).is_empty());
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let cfg = CandidateConfig {
            min_len_s: 60,
            max_len_s: 18,
            ..Default::default()
        };
        assert!(Ranker::new(cfg, ScoreConfig::default()).is_err());

        let bad_patterns = CandidateConfig {
            hotspot_keywords: vec!["(unclosed".to_owned()],
            ..Default::default()
        };
        assert!(Ranker::new(bad_patterns, ScoreConfig::default()).is_err());
    }

    #[test]
    fn test_capped_candidate_list() {
        let cfg = CandidateConfig {
            max_candidates: 2,
            ..Default::default()
        };
        let ranker = Ranker::new(cfg, ScoreConfig::default()).unwrap();
        let scenes: Vec<SceneWindow> = (0..10)
            .map(|i| SceneWindow {
                start: i * 100,
                end: i * 100 + 30,
            })
            .collect();

        assert_eq!(ranker.rank(&[], &scenes, None, false).len(), 2);
    }
}
