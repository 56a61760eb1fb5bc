/// Cove Crypto Library
///
/// Symmetric content encryption for the drive: AES-256-GCM under a single
/// process-wide key. Plain-text file content is encrypted before it reaches
/// the object store; the authentication tag makes any bit-flip in storage or
/// transit detectable at read time instead of silently decrypting garbage.
///
/// Nonce, ciphertext and tag travel as three separate base64 strings. Rows
/// written by earlier deployments used hex for the nonce/tag fields, so the
/// read path accepts both (see [`encoding`]).

pub mod encoding;
pub mod engine;
mod error;

pub use engine::{CipherEngine, EncryptedContent};
pub use error::CryptoError;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;
/// GCM nonce length in bytes (96-bit, the recommended size).
pub const NONCE_LEN: usize = 12;
/// GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;
