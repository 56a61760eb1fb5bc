use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::probe::{FfprobeOutput, MediaProber, ProbeReport};
use crate::tags::{AudioTags, TagParser, cover_data_uri};
use crate::MediaError;

/// Adapter over the ffprobe/ffmpeg binaries.
///
/// Binary paths come from config (`COVE_FFPROBE`/`COVE_FFMPEG`), defaulting
/// to whatever is on PATH. All invocations are blocking; async callers go
/// through `spawn_blocking`.
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    ffprobe: PathBuf,
    ffmpeg: PathBuf,
}

impl FfmpegTool {
    pub fn new(ffprobe: PathBuf, ffmpeg: PathBuf) -> Self {
        Self { ffprobe, ffmpeg }
    }

    fn probe_path(&self, path: &Path) -> Result<FfprobeOutput, MediaError> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .output()?;
        if !output.status.success() {
            return Err(MediaError::Tool(format!(
                "ffprobe exited with {} for {}",
                output.status,
                path.display()
            )));
        }
        FfprobeOutput::parse(&output.stdout)
    }

    /// Copy out an embedded picture stream without re-encoding.
    fn extract_picture(&self, path: &Path, stream_index: i64) -> Result<Vec<u8>, MediaError> {
        let output = Command::new(&self.ffmpeg)
            .args(["-v", "quiet", "-i"])
            .arg(path)
            .args([
                "-map",
                &format!("0:{stream_index}"),
                "-c",
                "copy",
                "-f",
                "image2pipe",
                "pipe:1",
            ])
            .output()?;
        if !output.status.success() || output.stdout.is_empty() {
            return Err(MediaError::Tool(format!(
                "ffmpeg cover extraction exited with {}",
                output.status
            )));
        }
        Ok(output.stdout)
    }
}

impl TagParser for FfmpegTool {
    fn parse(&self, bytes: &[u8], kind: &str) -> Result<AudioTags, MediaError> {
        // ffprobe wants a file; spool the bytes to a scratch path.
        let mut spool = tempfile::NamedTempFile::new()?;
        spool.write_all(bytes)?;
        spool.flush()?;

        let probed = self.probe_path(spool.path())?;
        debug!(kind, "parsed audio container tags");

        let cover = probed.attached_picture().and_then(|pic| {
            let index = pic.index?;
            let mime = match pic.codec_name.as_deref() {
                Some("png") => "image/png",
                _ => "image/jpeg",
            };
            self.extract_picture(spool.path(), index)
                .map(|bytes| cover_data_uri(mime, &bytes))
                .ok()
        });

        Ok(AudioTags {
            title: probed.tag("title"),
            artist: probed.tag("artist"),
            album: probed.tag("album"),
            cover,
        })
    }
}

impl MediaProber for FfmpegTool {
    fn probe(&self, path: &Path) -> Result<ProbeReport, MediaError> {
        Ok(self.probe_path(path)?.report())
    }

    fn thumbnail(&self, path: &Path, at_secs: f64) -> Result<Vec<u8>, MediaError> {
        let output = Command::new(&self.ffmpeg)
            .args(["-v", "quiet", "-ss", &format!("{at_secs}"), "-i"])
            .arg(path)
            .args([
                "-frames:v",
                "1",
                "-vf",
                "scale=320:-2",
                "-f",
                "image2pipe",
                "-vcodec",
                "mjpeg",
                "pipe:1",
            ])
            .output()?;
        if !output.status.success() || output.stdout.is_empty() {
            return Err(MediaError::Tool(format!(
                "ffmpeg thumbnail exited with {} for {}",
                output.status,
                path.display()
            )));
        }
        Ok(output.stdout)
    }
}
