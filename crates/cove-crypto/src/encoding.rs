//! Tolerant decoding for persisted cipher fields.
//!
//! New records always store nonce, tag and ciphertext as base64. Rows written
//! by earlier deployments stored the nonce and tag as hex, and ciphertext
//! occasionally as raw text, so the read path auto-detects the encoding:
//! a value made purely of hex digits decodes as hex, anything else as base64.
//!
//! Known ambiguity, kept for compatibility: a valid base64 string that
//! happens to consist only of hex-digit characters misclassifies as hex.
//! This is pinned by a test below rather than silently "fixed"; writing an
//! explicit encoding marker per field is the way out if it ever bites.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::CryptoError;

fn is_hex(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Decode a stored nonce or tag field, accepting either convention.
pub fn decode_field(value: &str) -> Result<Vec<u8>, CryptoError> {
    if is_hex(value) {
        hex::decode(value).map_err(|e| CryptoError::Integrity(format!("bad hex field: {e}")))
    } else {
        BASE64
            .decode(value)
            .map_err(|e| CryptoError::Integrity(format!("bad base64 field: {e}")))
    }
}

/// Decode a stored ciphertext body.
///
/// Inverted heuristic relative to [`decode_field`]: an all-hex-digit value is
/// treated as literal text bytes (legacy rows stored short plaintexts raw),
/// anything else decodes as base64 ciphertext.
pub fn decode_ciphertext(value: &str) -> Result<Vec<u8>, CryptoError> {
    if is_hex(value) {
        Ok(value.as_bytes().to_vec())
    } else {
        BASE64
            .decode(value)
            .map_err(|e| CryptoError::Integrity(format!("bad base64 ciphertext: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_accepts_hex_and_base64() {
        let raw: &[u8] = &[0xde, 0xad, 0xbe, 0xef, 0x00, 0x11];
        let from_hex = decode_field(&hex::encode(raw)).unwrap();
        let from_b64 = decode_field(&BASE64.encode(raw)).unwrap();
        assert_eq!(from_hex, raw);
        assert_eq!(from_b64, raw);
    }

    #[test]
    fn field_rejects_garbage() {
        assert!(decode_field("not!valid!either!").is_err());
        assert!(decode_field("").is_err());
    }

    #[test]
    fn ciphertext_base64_decodes() {
        let raw = b"some ciphertext bytes";
        assert_eq!(decode_ciphertext(&BASE64.encode(raw)).unwrap(), raw);
    }

    // Pins the documented legacy ambiguity: "deadbeef" is valid base64 AND
    // valid hex, and the heuristic picks the hex branch (literal bytes).
    #[test]
    fn ciphertext_all_hex_string_is_taken_literally() {
        let decoded = decode_ciphertext("deadbeef").unwrap();
        assert_eq!(decoded, b"deadbeef");
        assert_ne!(decoded, BASE64.decode("deadbeef").unwrap());
    }
}
