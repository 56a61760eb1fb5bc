//! cove-media: descriptive metadata extraction for uploads.
//!
//! Audio uploads yield common tags (title/artist/album) and an embedded cover
//! re-encoded as a data URI; video uploads yield duration, resolution, codec
//! and a still-frame thumbnail. Both run against the ffprobe/ffmpeg binaries
//! named in config. Extraction always operates on plaintext bytes — callers
//! decrypt first when the stored form is ciphertext.
//!
//! Everything here is best-effort from the drive's point of view: a probe
//! failure is logged by the pipeline and the metadata row is simply omitted.

pub mod ffmpeg;
pub mod probe;
pub mod tags;

mod error;

pub use error::MediaError;
pub use ffmpeg::FfmpegTool;
pub use probe::{MediaProber, ProbeReport};
pub use tags::{AudioTags, TagParser, cover_data_uri};
