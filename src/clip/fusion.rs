use super::config::CandidateConfig;
use super::generator::Candidate;
use super::signal::{self, TranscriptSegment};

/// Maximum preview length attached to fused candidates, in characters.
const PREVIEW_MAX_CHARS: usize = 180;

/// Interval intersection-over-union of two candidate windows.
///
/// Returns 0 when the combined span is empty.
pub(crate) fn interval_iou(a: &Candidate, b: &Candidate) -> f64 {
    let inter = (a.end.min(b.end) as i64 - a.start.max(b.start) as i64).max(0);
    let union = (a.end as i64 - a.start as i64) + (b.end as i64 - b.start as i64) - inter;
    if union <= 0 {
        0.0
    } else {
        inter as f64 / union as f64
    }
}

/// Merges the concatenated generator outputs into one deduplicated,
/// chronologically ordered candidate list.
///
/// Candidates are sorted by `(start, end)` and folded in a single greedy
/// pass: each one is compared only against the most recently emitted entry,
/// merging when their IOU reaches the configured threshold. Overlapping
/// windows separated by an intervening non-overlapping one are deliberately
/// left unmerged; downstream output depends on this exact behavior.
pub(crate) fn fuse(
    candidates: Vec<Candidate>,
    transcript: &[TranscriptSegment],
    cfg: &CandidateConfig,
) -> Vec<Candidate> {
    let mut candidates = candidates;
    candidates.sort_by_key(|c| (c.start, c.end));

    let mut out: Vec<Candidate> = Vec::new();
    for c in candidates {
        let merged = match out.last_mut() {
            Some(last) if interval_iou(last, &c) >= cfg.iou_dedupe_threshold => {
                // Expand to cover both, keeping the earlier start and later end.
                last.start = last.start.min(c.start);
                last.end = last.end.max(c.end);
                last.source = format!("{}+{}", last.source, c.source);
                true
            }
            _ => false,
        };
        if !merged {
            out.push(c);
        }
    }

    for c in &mut out {
        c.text_preview = signal::preview(
            &signal::window_text(transcript, c.start, c.end),
            PREVIEW_MAX_CHARS,
        );
    }

    // Keep the prompt for the downstream oracle small. The list stays in
    // chronological order here; ranking by quality happens after scoring.
    out.truncate(cfg.max_candidates);
    out
}
