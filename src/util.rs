use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Formats the given [Duration] as "MM:SSs"
pub fn format_time(t: Duration) -> String {
    let minutes = t.as_secs() / 60;
    let seconds = t.as_secs() % 60;
    format!("{:02}:{:02}s", minutes, seconds)
}

/// Checks if the given path points to a valid media file.
///
/// If `full` is set to **false**, only the file header will be checked. This
/// is a very cheap operation, but it does not guarantee validity. If set to
/// **true**, FFmpeg will be used to check the contents - note that this is
/// more expensive, but much more accurate.
///
/// If `audio` is set to true, this function will ensure that the file contains
/// *at least* one audio stream. This flag is only used when `full` is set to
/// **true**.
pub fn is_valid_media_file(path: impl AsRef<Path>, full: bool, audio: bool) -> bool {
    if !full {
        let mut buf = [0u8; 8192];
        let mut f = match std::fs::File::open(path.as_ref()) {
            Ok(f) => f,
            Err(_) => return false,
        };
        let n = match f.read(&mut buf) {
            Ok(n) => n,
            Err(_) => return false,
        };
        return infer::is_video(&buf[..n]) || infer::is_audio(&buf[..n]);
    }

    if let Ok(input) = ffmpeg_next::format::input(&path.as_ref()) {
        let num_audio_streams = input
            .streams()
            .filter(|s| s.parameters().medium() == ffmpeg_next::util::media::Type::Audio)
            .count();
        !audio || num_audio_streams > 0
    } else {
        false
    }
}

/// Expands the given paths into a sorted list of valid media files,
/// descending into directories.
pub fn find_media_files(
    paths: &[PathBuf],
    full_validation: bool,
    require_audio: bool,
) -> crate::Result<Vec<PathBuf>> {
    let mut media = Vec::new();
    for path in paths {
        if !path.exists() {
            return Err(crate::Error::IOError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("path not found: {}", path.display()),
            )));
        }
        collect_media_files(path, full_validation, require_audio, &mut media)?;
    }
    media.sort();
    Ok(media)
}

fn collect_media_files(
    path: &Path,
    full_validation: bool,
    require_audio: bool,
    out: &mut Vec<PathBuf>,
) -> crate::Result<()> {
    if path.is_dir() {
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            collect_media_files(&entry.path(), full_validation, require_audio, out)?;
        }
    } else if is_valid_media_file(path, full_validation, require_audio) {
        out.push(path.to_owned());
    }
    Ok(())
}

pub(crate) fn compute_header_md5sum(media: impl AsRef<Path>) -> crate::Result<String> {
    let mut buf = [0u8; 8192];
    let mut f = std::fs::File::open(media.as_ref())?;
    let n = f.read(&mut buf)?;
    let hash = format!("{:x}", md5::compute(&buf[..n]));
    Ok(hash)
}

/// Returns the underlying FFmpeg version integer used by sizzle.
pub fn ffmpeg_version() -> u32 {
    ffmpeg_next::util::version()
}

/// Returns the underlying FFmpeg version string used by sizzle.
pub fn ffmpeg_version_string() -> String {
    let version_int = ffmpeg_version();

    // Reference: https://github.com/FFmpeg/FFmpeg/blob/130d19bf2044ac76372d1b97ab87ab283c8b37f8/libavutil/version.h#L64
    format!(
        "{}.{}.{}",
        version_int >> 16, // MAJOR
        (version_int & 0x00FF00) >> 8, // MINOR
        version_int & 0xFF // MICRO
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(Duration::from_secs(0)), "00:00s");
        assert_eq!(format_time(Duration::from_secs(75)), "01:15s");
        assert_eq!(format_time(Duration::from_secs(600)), "10:00s");
    }
}
