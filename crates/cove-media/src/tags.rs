use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::MediaError;

/// Common tags read from an audio payload. Missing tags are absent fields,
/// never errors.
#[derive(Debug, Clone, Default)]
pub struct AudioTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// First embedded picture, as a `data:<mime>;base64,<payload>` URI.
    pub cover: Option<String>,
}

/// Extracts audio tags from raw (already decrypted) bytes.
///
/// A trait so the pipeline can run against a stub in tests, including one
/// that always fails — tag extraction must never decide an upload's fate.
pub trait TagParser: Send + Sync {
    fn parse(&self, bytes: &[u8], kind: &str) -> Result<AudioTags, MediaError>;
}

/// Re-encode an embedded picture as a self-describing data URI.
pub fn cover_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, BASE64.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cover_uri_is_self_describing() {
        let uri = cover_data_uri("image/jpeg", &[0xff, 0xd8, 0xff]);
        assert!(uri.starts_with("data:image/jpeg;base64,"));
        let payload = uri.strip_prefix("data:image/jpeg;base64,").unwrap();
        assert_eq!(BASE64.decode(payload).unwrap(), vec![0xff, 0xd8, 0xff]);
    }
}
