use thiserror::Error;

/// Failures from the cipher engine.
///
/// `Configuration` means the process was started with an unusable key and is
/// fatal at startup. `Integrity` covers everything that can go wrong with a
/// stored record: tag mismatch, malformed nonce/tag encoding, wrong field
/// lengths. Callers must be able to tell corruption apart from "no access"
/// and "not found", so this never degrades into a generic error.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid encryption key: {0}")]
    Configuration(String),

    #[error("integrity check failed: {0}")]
    Integrity(String),
}
