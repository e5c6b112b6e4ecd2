use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// One time-stamped line of speech, as produced by the transcription service.
///
/// Segments are expected to be ordered by start time. The engine never mutates
/// them; a single slice is shared by all generators and the scorer.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TranscriptSegment {
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub end: f64,
    #[serde(default)]
    pub text: String,
}

/// A visual scene boundary, in whole seconds, from the scene-cut detector.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct SceneWindow {
    pub start: u32,
    pub end: u32,
}

/// A single loudness reading: the second the extraction window starts in and
/// its level on a dB-like scale (`20 * log10(rms)`, RMS floored at 1).
///
/// When the extraction window is shorter than one second, multiple samples
/// share the same `second` value.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub struct LoudnessSample {
    pub second: u32,
    pub level_db: f64,
}

/// Whisper-style transcript container: `{"segments": [...], ...}`.
///
/// Unknown fields (language, full text) are ignored; a missing `segments` key
/// is treated as an empty transcript rather than an error.
#[derive(Debug, Deserialize)]
struct TranscriptFile {
    #[serde(default)]
    segments: Vec<TranscriptSegment>,
}

impl TranscriptSegment {
    /// Loads transcript segments from a Whisper-style JSON file.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Vec<Self>> {
        let f = std::fs::File::open(path.as_ref())?;
        let data: TranscriptFile = serde_json::from_reader(&f)?;
        Ok(data.segments)
    }
}

impl SceneWindow {
    /// Loads scene windows from a JSON list of `{"start": s, "end": e}` records.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Vec<Self>> {
        let f = std::fs::File::open(path.as_ref())?;
        Ok(serde_json::from_reader(&f)?)
    }
}

/// Concatenates the text of all transcript segments whose span intersects
/// `[start_s, end_s]`. Relies on segments being ordered by start time.
pub(crate) fn window_text(segments: &[TranscriptSegment], start_s: u32, end_s: u32) -> String {
    let mut parts = Vec::new();
    for seg in segments {
        if seg.end < start_s as f64 {
            continue;
        }
        if seg.start > end_s as f64 {
            break;
        }
        let trimmed = seg.text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }
    parts.join(" ")
}

/// Truncates window text to a display preview of at most `max_chars`
/// characters, appending an ellipsis when text was dropped.
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let mut out: String = text.chars().take(max_chars).collect();
        out.push('…');
        out
    } else {
        text.to_owned()
    }
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

    #[test]
    fn test_window_text_selects_intersecting_segments() {
        let segments = vec![
            seg(0.0, 4.0, "before the window"),
            seg(5.0, 9.0, " inside one "),
            seg(10.0, 14.0, "inside two"),
            seg(20.0, 24.0, "after the window"),
        ];
        assert_eq!(window_text(&segments, 5, 15), "inside one inside two");
    }

    #[test]
    fn test_window_text_empty_transcript() {
        assert_eq!(window_text(&[], 0, 60), "");
    }

    #[test]
    fn test_preview_truncation() {
        let short = "hello";
        assert_eq!(preview(short, 180), "hello");

        let long = "x".repeat(200);
        let p = preview(&long, 180);
        assert_eq!(p.chars().count(), 181);
        assert!(p.ends_with('…'));
    }

    #[test]
    fn test_transcript_file_tolerates_missing_segments() {
        let data: TranscriptFile = serde_json::from_str(r#"{"language": "en"}"#).unwrap();
        assert!(data.segments.is_empty());
    }
}
