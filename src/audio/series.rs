use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::clip::LoudnessSample;
use crate::{Error, Result};

/// Windowed loudness data for a single media file. This is the result of
/// running a [LoudnessExtractor](super::LoudnessExtractor) on the file.
///
/// The struct contains the raw samples as well as metadata about how they
/// were generated. An MD5 of the media header is included so that cached
/// data can be invalidated when the file changes.
#[derive(Debug, Deserialize, Serialize)]
pub struct LoudnessSeries {
    pub(crate) window_ms: u32,
    pub(crate) samples: Vec<LoudnessSample>,
    pub(crate) md5: String,
}

impl LoudnessSeries {
    /// The RMS window the series was extracted with, in milliseconds.
    pub fn window_ms(&self) -> u32 {
        self.window_ms
    }

    /// The per-window loudness samples, ordered by time.
    pub fn samples(&self) -> &[LoudnessSample] {
        &self.samples
    }

    /// Load a loudness series from a path.
    fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::LoudnessDataNotFound(path.to_owned()));
        }
        let f = std::fs::File::open(path)?;
        Ok(bincode::deserialize_from(&f)?)
    }

    /// Load loudness data using a media path.
    ///
    /// If `analyze` is set, the media is analyzed in-place. Otherwise, the
    /// series is loaded from the data file stored alongside the media.
    pub fn from_media(media: impl AsRef<Path>, analyze: bool, window_ms: u32) -> Result<Self> {
        let media = media.as_ref();

        if !analyze {
            let path = media
                .to_owned()
                .with_extension(super::LOUDNESS_DATA_FILE_EXT);
            Self::from_path(&path)
        } else {
            tracing::debug!(
                "starting in-place loudness extraction for {}...",
                media.display()
            );
            let extractor = super::LoudnessExtractor::<&Path>::default().with_force(true);
            let series = extractor.run_single(media, window_ms, false)?;
            tracing::debug!(
                "completed in-place loudness extraction for {}",
                media.display()
            );
            Ok(series)
        }
    }
}
