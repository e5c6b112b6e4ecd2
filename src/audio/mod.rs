mod extractor;
mod series;

pub use extractor::LoudnessExtractor;
pub use series::LoudnessSeries;

/// Default RMS window (milliseconds).
///
/// Loudness is measured over fixed windows of this size and stamped with the
/// second each window starts in. Windows shorter than 1s therefore produce
/// multiple samples per second.
pub const DEFAULT_LOUDNESS_WINDOW_MS: u32 = 500; // ms

static LOUDNESS_DATA_FILE_EXT: &str = "sizzle.bin";
