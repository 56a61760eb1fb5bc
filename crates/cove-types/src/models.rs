use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The plain-text media kind. Only payloads declared exactly as this kind
/// are encrypted at rest; every other kind is stored as its native bytes.
pub const TEXT_KIND: &str = "text/plain";
/// Prefix gating audio tag extraction.
pub const AUDIO_KIND_PREFIX: &str = "audio/";
/// Prefix gating the asynchronous video probe.
pub const VIDEO_KIND_PREFIX: &str = "video/";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// A file record as the drive sees it.
///
/// `encrypted == true` implies `nonce` and `tag` are both present; the pair
/// is rewritten on every content save. `size` is the byte length of the
/// payload as uploaded, before any encryption — the stored blob for an
/// encrypted file is base64 ciphertext and longer than this number.
#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub id: Uuid,
    pub name: String,
    pub kind: String,
    pub size: i64,
    #[serde(skip_serializing)]
    pub storage_key: String,
    #[serde(skip_serializing)]
    pub nonce: Option<String>,
    #[serde(skip_serializing)]
    pub tag: Option<String>,
    pub encrypted: bool,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredFile {
    pub fn is_text(&self) -> bool {
        self.kind == TEXT_KIND
    }

    /// True when the content route must decrypt: the flag is set and both
    /// cipher fields survived storage.
    pub fn has_cipher_fields(&self) -> bool {
        self.encrypted
            && self.nonce.as_deref().is_some_and(|n| !n.is_empty())
            && self.tag.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Access level carried by a grant. The owner always holds `Write`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
        }
    }
}

/// Tags extracted from an audio upload, one row per file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioMetadata {
    pub file_id: Uuid,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Embedded cover art as a `data:<mime>;base64,<payload>` URI.
    pub cover: Option<String>,
    pub lyrics: Option<String>,
}

/// Probe results for a video upload, written by the detached tail task —
/// absence of this row never blocks or fails the upload itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub file_id: Uuid,
    pub title: String,
    /// Whole seconds, floor of the probed duration.
    pub duration: Option<i64>,
    /// `"WxH"`, absent when no video stream was found.
    pub resolution: Option<String>,
    /// Object-store key of the generated still frame.
    pub thumbnail: Option<String>,
    pub codec: Option<String>,
}
