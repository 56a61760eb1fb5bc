use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::MediaError;

/// What the drive keeps from probing a video: whole-second duration,
/// `WxH` resolution, and the codec of the first video stream.
#[derive(Debug, Clone, Default)]
pub struct ProbeReport {
    pub duration_secs: Option<i64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub codec: Option<String>,
}

impl ProbeReport {
    pub fn resolution(&self) -> Option<String> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(format!("{w}x{h}")),
            _ => None,
        }
    }
}

/// Probes container metadata and renders still frames.
///
/// Runs after the upload response is already sent, so implementations may be
/// slow; they must never be load-bearing for upload success.
pub trait MediaProber: Send + Sync {
    fn probe(&self, path: &Path) -> Result<ProbeReport, MediaError>;

    /// Render one frame at `at_secs` as JPEG bytes, 320px wide.
    fn thumbnail(&self, path: &Path, at_secs: f64) -> Result<Vec<u8>, MediaError>;
}

// ── ffprobe JSON output (the subset this crate reads) ───────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct FfprobeOutput {
    pub format: Option<FfprobeFormat>,
    #[serde(default)]
    pub streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FfprobeFormat {
    pub duration: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FfprobeStream {
    pub index: Option<i64>,
    pub codec_type: Option<String>,
    pub codec_name: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    #[serde(default)]
    pub disposition: FfprobeDisposition,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FfprobeDisposition {
    #[serde(default)]
    pub attached_pic: i64,
}

impl FfprobeOutput {
    pub(crate) fn parse(json: &[u8]) -> Result<Self, MediaError> {
        Ok(serde_json::from_slice(json)?)
    }

    /// ffprobe reports duration as a decimal string; the stored value is the
    /// floor in whole seconds.
    pub(crate) fn duration_secs(&self) -> Option<i64> {
        self.format
            .as_ref()
            .and_then(|f| f.duration.as_deref())
            .and_then(|d| d.parse::<f64>().ok())
            .map(|d| d.floor() as i64)
    }

    pub(crate) fn first_video_stream(&self) -> Option<&FfprobeStream> {
        self.streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video") && s.disposition.attached_pic == 0)
    }

    pub(crate) fn attached_picture(&self) -> Option<&FfprobeStream> {
        self.streams.iter().find(|s| s.disposition.attached_pic == 1)
    }

    /// Container tag lookup; ffprobe casing varies by format (`title` in mp3,
    /// `TITLE` in flac/ogg).
    pub(crate) fn tag(&self, name: &str) -> Option<String> {
        self.format.as_ref().and_then(|f| {
            f.tags
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.clone())
        })
    }

    pub(crate) fn report(&self) -> ProbeReport {
        let video = self.first_video_stream();
        ProbeReport {
            duration_secs: self.duration_secs(),
            width: video.and_then(|s| s.width),
            height: video.and_then(|s| s.height),
            codec: video.and_then(|s| s.codec_name.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIDEO_JSON: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "video", "codec_name": "h264",
             "width": 1920, "height": 1080, "disposition": {"attached_pic": 0}},
            {"index": 1, "codec_type": "audio", "codec_name": "aac",
             "disposition": {"attached_pic": 0}}
        ],
        "format": {"duration": "13.976000", "tags": {"title": "clip"}}
    }"#;

    const AUDIO_JSON: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "audio", "codec_name": "mp3",
             "disposition": {"attached_pic": 0}},
            {"index": 1, "codec_type": "video", "codec_name": "mjpeg",
             "width": 500, "height": 500, "disposition": {"attached_pic": 1}}
        ],
        "format": {"duration": "201.3", "tags": {"TITLE": "Song A", "ARTIST": "Band B"}}
    }"#;

    #[test]
    fn duration_is_floored() {
        let out = FfprobeOutput::parse(VIDEO_JSON.as_bytes()).unwrap();
        assert_eq!(out.duration_secs(), Some(13));
    }

    #[test]
    fn report_takes_first_real_video_stream() {
        let out = FfprobeOutput::parse(VIDEO_JSON.as_bytes()).unwrap();
        let report = out.report();
        assert_eq!(report.resolution().as_deref(), Some("1920x1080"));
        assert_eq!(report.codec.as_deref(), Some("h264"));
    }

    // An embedded cover is a video stream too, but flagged attached_pic —
    // it must not masquerade as the file's video track.
    #[test]
    fn attached_picture_is_not_a_video_stream() {
        let out = FfprobeOutput::parse(AUDIO_JSON.as_bytes()).unwrap();
        assert!(out.first_video_stream().is_none());
        assert_eq!(
            out.attached_picture().and_then(|s| s.codec_name.as_deref()),
            Some("mjpeg")
        );
    }

    #[test]
    fn tag_lookup_ignores_case() {
        let out = FfprobeOutput::parse(AUDIO_JSON.as_bytes()).unwrap();
        assert_eq!(out.tag("title").as_deref(), Some("Song A"));
        assert_eq!(out.tag("artist").as_deref(), Some("Band B"));
        assert_eq!(out.tag("album"), None);
    }

    #[test]
    fn missing_streams_yield_empty_report() {
        let out = FfprobeOutput::parse(br#"{"format": {"duration": "2.5"}}"#).unwrap();
        let report = out.report();
        assert_eq!(report.duration_secs, Some(2));
        assert_eq!(report.resolution(), None);
        assert_eq!(report.codec, None);
    }
}
