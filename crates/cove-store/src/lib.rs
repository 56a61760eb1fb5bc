//! cove-store: the object-store capability behind the drive.
//!
//! Blobs live under opaque keys in whatever backend the deployment picks:
//! a local directory by default, any S3-compatible endpoint in production,
//! memory in tests. Everything above this crate talks to an OpenDAL
//! `Operator` and never sees the backend choice.

use anyhow::{Context, Result};
use opendal::Operator;
use std::path::PathBuf;

/// Backend selection, resolved from env config at startup.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// Local directory (the default for single-node deployments).
    Fs { root: PathBuf },
    /// S3-compatible object storage. Path-style addressing, which MinIO and
    /// SeaweedFS require.
    S3 {
        endpoint: String,
        region: String,
        bucket: String,
        access_key_id: String,
        secret_access_key: String,
    },
    /// In-memory, for tests.
    Memory,
}

/// Build the operator for the configured backend, with logging and retries.
pub fn build_operator(cfg: &StorageConfig) -> Result<Operator> {
    let op = match cfg {
        StorageConfig::Fs { root } => {
            let builder = opendal::services::Fs::default().root(&root.to_string_lossy());
            Operator::new(builder)
                .context("creating OpenDAL fs operator")?
                .finish()
        }
        StorageConfig::S3 {
            endpoint,
            region,
            bucket,
            access_key_id,
            secret_access_key,
        } => {
            let builder = opendal::services::S3::default()
                .endpoint(endpoint)
                .region(region)
                .bucket(bucket)
                .access_key_id(access_key_id)
                .secret_access_key(secret_access_key);
            Operator::new(builder)
                .context("creating OpenDAL S3 operator")?
                .finish()
        }
        StorageConfig::Memory => {
            let builder = opendal::services::Memory::default();
            Operator::new(builder)
                .context("creating OpenDAL memory operator")?
                .finish()
        }
    };

    Ok(op
        .layer(opendal::layers::LoggingLayer::default())
        .layer(
            opendal::layers::RetryLayer::new()
                .with_max_times(3)
                .with_jitter(),
        ))
}

/// An in-memory operator for tests.
pub fn memory_operator() -> Operator {
    build_operator(&StorageConfig::Memory).expect("memory operator construction cannot fail")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_operator_builds() {
        let dir = tempfile::tempdir().unwrap();
        let op = build_operator(&StorageConfig::Fs {
            root: dir.path().to_path_buf(),
        });
        assert!(op.is_ok());
    }

    #[tokio::test]
    async fn memory_roundtrip() {
        let op = memory_operator();
        op.write("abc123.txt", b"payload".to_vec()).await.unwrap();
        let read = op.read("abc123.txt").await.unwrap();
        assert_eq!(read.to_vec(), b"payload");
    }
}
