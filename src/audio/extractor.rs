extern crate ffmpeg_next;
#[cfg(feature = "rayon")]
extern crate rayon;

use std::path::Path;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use super::LoudnessSeries;
use crate::clip::LoudnessSample;
use crate::{Error, Result};

/// Sample rate the decoded audio is resampled to before RMS measurement.
/// Loudness is scale-invariant enough that a fixed low rate keeps decoding
/// cheap without changing the ranking.
const RESAMPLE_RATE: u32 = 16_000;

/// Thin wrapper around the native `FFmpeg` audio decoder.
struct Decoder {
    decoder: ffmpeg_next::codec::decoder::Audio,
}

impl Decoder {
    fn build_threading_config() -> ffmpeg_next::codec::threading::Config {
        let mut config = ffmpeg_next::codec::threading::Config::default();
        config.count = std::thread::available_parallelism()
            .expect("unable to determine available parallelism")
            .get();
        config.kind = ffmpeg_next::codec::threading::Type::Frame;
        config
    }

    fn from_stream(stream: ffmpeg_next::format::stream::Stream, threaded: bool) -> Result<Self> {
        let ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let mut decoder = ctx.decoder();

        if threaded {
            decoder.set_threading(Self::build_threading_config());
        }

        let decoder = decoder.audio()?;

        Ok(Self { decoder })
    }

    fn send_packet(&mut self, packet: &ffmpeg_next::packet::Packet) -> Result<()> {
        Ok(self.decoder.send_packet(packet)?)
    }

    fn receive_frame(&mut self, frame: &mut ffmpeg_next::frame::Audio) -> Result<()> {
        Ok(self.decoder.receive_frame(frame)?)
    }
}

/// Accumulates mono samples into fixed windows and emits one loudness
/// reading per window: `20 * log10(rms)`, RMS floored at 1.
struct WindowAccumulator {
    window_len: usize,
    window_ms: u32,
    sum_squares: f64,
    count: usize,
    emitted: u32,
    samples: Vec<LoudnessSample>,
}

impl WindowAccumulator {
    fn new(window_ms: u32) -> Self {
        let window_len = (RESAMPLE_RATE as u64 * window_ms as u64 / 1000).max(1) as usize;
        Self {
            window_len,
            window_ms,
            sum_squares: 0.0,
            count: 0,
            emitted: 0,
            samples: Vec::new(),
        }
    }

    fn push(&mut self, samples: &[i16]) {
        for &v in samples {
            let v = v as f64;
            self.sum_squares += v * v;
            self.count += 1;
            if self.count == self.window_len {
                self.flush();
            }
        }
    }

    /// Emits the current window, including a trailing partial one at the end
    /// of the stream.
    fn flush(&mut self) {
        if self.count == 0 {
            return;
        }
        let rms = (self.sum_squares / self.count as f64).sqrt().max(1.0);
        let start_ms = self.emitted as u64 * self.window_ms as u64;
        self.samples.push(LoudnessSample {
            second: (start_ms / 1000) as u32,
            level_db: 20.0 * rms.log10(),
        });
        self.sum_squares = 0.0;
        self.count = 0;
        self.emitted += 1;
    }

    fn finish(mut self) -> Vec<LoudnessSample> {
        self.flush();
        self.samples
    }
}

/// Measures one or more media files and converts them into
/// [LoudnessSeries](super::LoudnessSeries).
///
/// If `threaded_decoding` is set to `true`, FFmpeg will decode each file
/// using multiple threads. If `force` is set, any existing loudness data on
/// disk will be **ignored**.
///
/// At a high-level, the extractor does the following for a given file:
///
/// 1. Extracts the most suitable audio stream
/// 2. Decodes the audio frame-by-frame and resamples it to mono
/// 3. Measures RMS loudness over fixed windows and converts it to a dB-like
///    scale
/// 4. Returns a [LoudnessSeries] instance that contains the samples and
///    (optionally) writes it to disk alongside the media
#[derive(Debug)]
pub struct LoudnessExtractor<P: AsRef<Path>> {
    pub(crate) media: Vec<P>,
    threaded_decoding: bool,
    force: bool,
}

impl<P: AsRef<Path>> Default for LoudnessExtractor<P> {
    fn default() -> Self {
        Self {
            media: Default::default(),
            threaded_decoding: false,
            force: false,
        }
    }
}

impl<P: AsRef<Path>> LoudnessExtractor<P> {
    /// Constructs a new [LoudnessExtractor] from a list of media paths.
    pub fn from_files(media: impl Into<Vec<P>>, threaded_decoding: bool, force: bool) -> Self {
        let mut extractor = Self::default()
            .with_threaded_decoding(threaded_decoding)
            .with_force(force);
        extractor.media = media.into();
        extractor
    }

    /// Returns the media paths used by this extractor.
    pub fn media(&self) -> &[P] {
        &self.media
    }

    /// Returns a new [LoudnessExtractor] with `threaded_decoding` set to the
    /// provided value.
    pub fn with_threaded_decoding(mut self, threaded_decoding: bool) -> Self {
        self.threaded_decoding = threaded_decoding;
        self
    }

    /// Returns a new [LoudnessExtractor] with `force` set to the provided
    /// value.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    // Decodes the selected audio stream and accumulates windowed RMS
    // loudness over the resampled mono samples.
    fn process_frames(
        ctx: &mut ffmpeg_next::format::context::Input,
        stream_idx: usize,
        window_ms: u32,
        threaded: bool,
    ) -> Result<Vec<LoudnessSample>> {
        let span = tracing::span!(tracing::Level::TRACE, "process_frames");
        let _enter = span.enter();

        let stream = ctx.stream(stream_idx).unwrap();
        let mut decoder = Decoder::from_stream(stream, threaded).unwrap();

        let mut accumulator = WindowAccumulator::new(window_ms);
        let mut frame = ffmpeg_next::frame::Audio::empty();
        let mut frame_resampled = ffmpeg_next::frame::Audio::empty();

        // Setup the audio resampler; everything is downmixed to mono for a
        // stable RMS measurement.
        let mut resampler = decoder
            .decoder
            .resampler(
                ffmpeg_next::format::Sample::I16(ffmpeg_next::format::sample::Type::Packed),
                ffmpeg_next::ChannelLayout::MONO,
                RESAMPLE_RATE,
            )
            .unwrap();

        // We are only interested in packets for the selected stream.
        let audio_packets = ctx
            .packets()
            .filter(|(s, _)| s.index() == stream_idx)
            .map(|(_, p)| p);

        for p in audio_packets {
            if p.pts().unwrap_or(-1) < 0 {
                // Skip packets with an invalid PTS. This can happen if, e.g.,
                // the video was trimmed.
                // See: https://stackoverflow.com/a/41032346/845275
                continue;
            }

            decoder.send_packet(&p).unwrap();
            while decoder.receive_frame(&mut frame).is_ok() {
                // Resample the frame to S16 mono and return the frame delay.
                let mut delay = match resampler.run(&frame, &mut frame_resampled) {
                    Ok(v) => v,
                    // If resampling fails due to changed input, construct a new local resampler for this frame
                    // and swap out the global resampler.
                    Err(ffmpeg_next::Error::InputChanged) => {
                        let mut local_resampler = frame
                            .resampler(
                                ffmpeg_next::format::Sample::I16(
                                    ffmpeg_next::format::sample::Type::Packed,
                                ),
                                ffmpeg_next::ChannelLayout::MONO,
                                RESAMPLE_RATE,
                            )
                            .unwrap();
                        let delay = local_resampler
                            .run(&frame, &mut frame_resampled)
                            .expect("failed to resample frame");

                        resampler = local_resampler;

                        delay
                    }
                    // We don't expect any other errors to occur.
                    Err(_) => unreachable!("unexpected error"),
                };

                loop {
                    // Obtain a slice of raw bytes for the actual sample data.
                    // `data` is a fixed-size buffer; the real length is
                    // sample count * channel count * bytes per S16 sample.
                    let raw_samples = &frame_resampled.data(0)
                        [..frame_resampled.samples() * frame_resampled.channels() as usize * 2];

                    // Transmute the raw byte slice into a slice of i16 samples.
                    //
                    // SAFETY: We know for a fact that the returned buffer contains i16 samples
                    // because we explicitly told the resampler to return S16 samples (see above).
                    let (_, samples, _) = unsafe { raw_samples.align_to() };

                    accumulator.push(samples);

                    if delay.is_none() {
                        break;
                    } else {
                        delay = resampler.flush(&mut frame_resampled).unwrap();
                    }
                }
            }
        }

        Ok(accumulator.finish())
    }

    pub(crate) fn run_single(
        &self,
        path: impl AsRef<Path>,
        window_ms: u32,
        persist: bool,
    ) -> Result<LoudnessSeries> {
        let span = tracing::span!(tracing::Level::TRACE, "run");
        let _enter = span.enter();

        let path = path.as_ref();
        let loudness_path = path.with_extension(super::LOUDNESS_DATA_FILE_EXT);

        // Check if we've already measured this file by comparing MD5 hashes.
        let md5 = crate::util::compute_header_md5sum(path)?;
        if !self.force {
            if let Ok(f) = std::fs::File::open(&loudness_path) {
                let data: LoudnessSeries = bincode::deserialize_from(&f).unwrap();
                if data.md5 == md5 {
                    println!("Skipping extraction for {}...", path.display());
                    return Ok(data);
                }
            }
        }

        let mut ctx = ffmpeg_next::format::input(&path)?;
        let stream = ctx
            .streams()
            .best(ffmpeg_next::media::Type::Audio)
            .ok_or(Error::FFmpegError(ffmpeg_next::Error::StreamNotFound))?;
        let stream_idx = stream.index();
        let threaded = self.threaded_decoding;

        tracing::debug!("starting loudness measurement for {}", path.display());

        let samples = Self::process_frames(&mut ctx, stream_idx, window_ms, threaded)?;

        tracing::debug!(
            samples = samples.len(),
            "completed loudness measurement for {}",
            path.display(),
        );

        let series = LoudnessSeries {
            window_ms,
            samples,
            md5,
        };

        // Write results to disk.
        if persist {
            let mut f = std::fs::File::create(&loudness_path)?;
            bincode::serialize_into(&mut f, &series)?;
        }

        Ok(series)
    }
}

impl<P: AsRef<Path> + Sync> LoudnessExtractor<P> {
    /// Runs this extractor.
    pub fn run(
        &self,
        window_ms: u32,
        persist: bool,
        threading: bool,
    ) -> Result<Vec<LoudnessSeries>> {
        if self.media.is_empty() {
            return Err(Error::ExtractorMissingPaths);
        }

        let mut data = Vec::new();

        if cfg!(feature = "rayon") && threading {
            #[cfg(feature = "rayon")]
            {
                data = self
                    .media
                    .par_iter()
                    .map(|path| self.run_single(path, window_ms, persist).unwrap())
                    .collect::<Vec<_>>();
            }
        } else {
            data.extend(
                self.media
                    .iter()
                    .map(|path| self.run_single(path, window_ms, persist).unwrap()),
            );
        }

        Ok(data)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_window_accumulator_rms_to_db() {
        // One full 500 ms window of a constant 100-amplitude signal:
        // rms = 100, level = 20 * log10(100) = 40 dB.
        let mut acc = WindowAccumulator::new(500);
        let window_len = acc.window_len;
        acc.push(&vec![100i16; window_len]);

        let samples = acc.finish();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].second, 0);
        assert!((samples[0].level_db - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_window_accumulator_floors_silence_at_zero_db() {
        let mut acc = WindowAccumulator::new(500);
        let window_len = acc.window_len;
        acc.push(&vec![0i16; window_len]);

        let samples = acc.finish();
        // RMS is floored at 1, so silence measures 0 dB instead of -inf.
        assert_eq!(samples[0].level_db, 0.0);
    }

    #[test]
    fn test_window_timestamps_collapse_to_seconds() {
        let mut acc = WindowAccumulator::new(500);
        let window_len = acc.window_len;
        // Four full windows and one trailing partial.
        acc.push(&vec![50i16; window_len * 4 + window_len / 2]);

        let samples = acc.finish();
        assert_eq!(samples.len(), 5);
        let seconds: Vec<u32> = samples.iter().map(|s| s.second).collect();
        assert_eq!(seconds, vec![0, 0, 1, 1, 2]);
    }

    #[test]
    fn test_empty_stream_produces_no_samples() {
        let acc = WindowAccumulator::new(500);
        assert!(acc.finish().is_empty());
    }

    #[test]
    fn test_run_requires_paths() {
        let extractor = LoudnessExtractor::<&Path>::default();
        assert!(matches!(
            extractor.run(500, false, false),
            Err(Error::ExtractorMissingPaths)
        ));
    }
}
