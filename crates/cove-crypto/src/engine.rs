use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit, OsRng, rand_core::RngCore},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::encoding::{decode_ciphertext, decode_field};
use crate::{CryptoError, KEY_LEN, NONCE_LEN, TAG_LEN};

/// Output of one encryption: nonce, ciphertext and tag, each base64.
///
/// The three parts are stored separately (nonce and tag in the file row,
/// ciphertext as the blob) and rejoined at decrypt time.
#[derive(Debug, Clone)]
pub struct EncryptedContent {
    pub nonce: String,
    pub ciphertext: String,
    pub tag: String,
}

/// AES-256-GCM engine over the process-wide content key.
///
/// Construction validates the key once; per-call failures are all
/// `CryptoError::Integrity`.
#[derive(Clone, Debug)]
pub struct CipherEngine {
    key: [u8; KEY_LEN],
}

impl CipherEngine {
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Build the engine from a 64-char hex key string (the `.env` format).
    pub fn from_hex(hex_key: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_key.trim())
            .map_err(|e| CryptoError::Configuration(format!("key is not valid hex: {e}")))?;
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|b: Vec<u8>| {
            CryptoError::Configuration(format!("{} bytes (expected {})", b.len(), KEY_LEN))
        })?;
        Ok(Self::new(key))
    }

    /// Encrypt a text payload with a fresh random 12-byte nonce.
    ///
    /// Every call draws new nonce bytes, including rewrites of the same
    /// logical file; a repeated nonce under one GCM key breaks the scheme.
    pub fn encrypt(&self, plaintext: &str) -> Result<EncryptedContent, CryptoError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        // aes-gcm appends the 16-byte tag to the ciphertext; split it back
        // out so the two can be stored in separate fields.
        let mut combined = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::Integrity("encryption failed".into()))?;
        let tag = combined.split_off(combined.len() - TAG_LEN);

        Ok(EncryptedContent {
            nonce: BASE64.encode(nonce_bytes),
            ciphertext: BASE64.encode(&combined),
            tag: BASE64.encode(&tag),
        })
    }

    /// Decrypt a stored record, verifying the authentication tag.
    ///
    /// Field values may be hex or base64 (legacy rows); see the encoding
    /// module. Any tampering with ciphertext, nonce or tag, or a wrong key,
    /// surfaces as `CryptoError::Integrity` — never as garbage plaintext.
    pub fn decrypt(&self, nonce: &str, ciphertext: &str, tag: &str) -> Result<String, CryptoError> {
        let nonce_bytes = decode_field(nonce)?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(CryptoError::Integrity(format!(
                "nonce is {} bytes (expected {})",
                nonce_bytes.len(),
                NONCE_LEN
            )));
        }
        let tag_bytes = decode_field(tag)?;
        if tag_bytes.len() != TAG_LEN {
            return Err(CryptoError::Integrity(format!(
                "tag is {} bytes (expected {})",
                tag_bytes.len(),
                TAG_LEN
            )));
        }

        let mut combined = decode_ciphertext(ciphertext)?;
        combined.extend_from_slice(&tag_bytes);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), combined.as_ref())
            .map_err(|_| CryptoError::Integrity("authentication tag mismatch".into()))?;

        String::from_utf8(plaintext)
            .map_err(|_| CryptoError::Integrity("plaintext is not valid UTF-8".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn test_engine() -> CipherEngine {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        CipherEngine::new(key)
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let engine = test_engine();
        let enc = engine.encrypt("hello from the drive").unwrap();

        let plain = engine.decrypt(&enc.nonce, &enc.ciphertext, &enc.tag).unwrap();
        assert_eq!(plain, "hello from the drive");
    }

    #[test]
    fn nonce_and_tag_have_expected_lengths() {
        let engine = test_engine();
        let enc = engine.encrypt("hello-123").unwrap();

        assert_eq!(BASE64.decode(&enc.nonce).unwrap().len(), NONCE_LEN);
        assert_eq!(BASE64.decode(&enc.tag).unwrap().len(), TAG_LEN);
    }

    #[test]
    fn nonces_are_unique_across_calls() {
        let engine = test_engine();
        let nonces: HashSet<String> =
            (0..64).map(|_| engine.encrypt("same text").unwrap().nonce).collect();
        assert_eq!(nonces.len(), 64);
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let engine = test_engine();
        let enc = engine.encrypt("tamper with me").unwrap();

        let mut raw = BASE64.decode(&enc.ciphertext).unwrap();
        raw[0] ^= 0x01;
        let flipped = BASE64.encode(&raw);

        let err = engine.decrypt(&enc.nonce, &flipped, &enc.tag).unwrap_err();
        assert!(matches!(err, CryptoError::Integrity(_)));
    }

    #[test]
    fn tampered_tag_is_rejected() {
        let engine = test_engine();
        let enc = engine.encrypt("tamper with me").unwrap();

        let mut raw = BASE64.decode(&enc.tag).unwrap();
        raw[TAG_LEN - 1] ^= 0x80;
        let flipped = BASE64.encode(&raw);

        let err = engine.decrypt(&enc.nonce, &enc.ciphertext, &flipped).unwrap_err();
        assert!(matches!(err, CryptoError::Integrity(_)));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let enc = test_engine().encrypt("secret").unwrap();
        let other = test_engine();
        assert!(other.decrypt(&enc.nonce, &enc.ciphertext, &enc.tag).is_err());
    }

    #[test]
    fn hex_encoded_fields_decrypt_identically() {
        let engine = test_engine();
        let enc = engine.encrypt("legacy row").unwrap();

        let nonce_hex = hex::encode(BASE64.decode(&enc.nonce).unwrap());
        let tag_hex = hex::encode(BASE64.decode(&enc.tag).unwrap());

        let plain = engine.decrypt(&nonce_hex, &enc.ciphertext, &tag_hex).unwrap();
        assert_eq!(plain, "legacy row");
    }

    #[test]
    fn wrong_length_nonce_is_integrity_error() {
        let engine = test_engine();
        let enc = engine.encrypt("short nonce").unwrap();

        let err = engine
            .decrypt(&BASE64.encode([0u8; 8]), &enc.ciphertext, &enc.tag)
            .unwrap_err();
        assert!(matches!(err, CryptoError::Integrity(_)));
    }

    #[test]
    fn wrong_length_tag_is_integrity_error() {
        let engine = test_engine();
        let enc = engine.encrypt("short tag").unwrap();

        let err = engine
            .decrypt(&enc.nonce, &enc.ciphertext, &BASE64.encode([0u8; 4]))
            .unwrap_err();
        assert!(matches!(err, CryptoError::Integrity(_)));
    }

    #[test]
    fn key_must_be_32_bytes() {
        assert!(matches!(
            CipherEngine::from_hex("deadbeef").unwrap_err(),
            CryptoError::Configuration(_)
        ));
        assert!(matches!(
            CipherEngine::from_hex("zz".repeat(32).as_str()).unwrap_err(),
            CryptoError::Configuration(_)
        ));
        assert!(CipherEngine::from_hex(&"ab".repeat(32)).is_ok());
    }
}
