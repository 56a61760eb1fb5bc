use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use cove_store::StorageConfig;

/// Server configuration, read once from the environment at startup.
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub staging_dir: PathBuf,
    pub storage: StorageConfig,
    pub jwt_secret: String,
    /// 64-char hex string for the 32-byte AES key; validated by the engine.
    pub encryption_key: String,
    pub ffprobe: PathBuf,
    pub ffmpeg: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let host = env_or("COVE_HOST", "0.0.0.0");
        let port: u16 = env_or("COVE_PORT", "3001")
            .parse()
            .context("COVE_PORT is not a valid port")?;

        let storage = match env_or("COVE_STORAGE_BACKEND", "fs").as_str() {
            "fs" => StorageConfig::Fs {
                root: env_or("COVE_STORAGE_DIR", "./storage").into(),
            },
            "s3" => StorageConfig::S3 {
                endpoint: require("COVE_S3_ENDPOINT")?,
                region: env_or("COVE_S3_REGION", "us-east-1"),
                bucket: require("COVE_S3_BUCKET")?,
                access_key_id: require("COVE_S3_ACCESS_KEY_ID")?,
                secret_access_key: require("COVE_S3_SECRET_ACCESS_KEY")?,
            },
            other => bail!("unknown COVE_STORAGE_BACKEND: {other}"),
        };

        Ok(Self {
            host,
            port,
            db_path: env_or("COVE_DB_PATH", "cove.db").into(),
            staging_dir: env_or("COVE_STAGING_DIR", "./staging").into(),
            storage,
            jwt_secret: std::env::var("COVE_JWT_SECRET").unwrap_or_default(),
            encryption_key: std::env::var("COVE_ENCRYPTION_KEY").unwrap_or_default(),
            ffprobe: env_or("COVE_FFPROBE", "ffprobe").into(),
            ffmpeg: env_or("COVE_FFMPEG", "ffmpeg").into(),
        })
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

fn require(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{name} must be set"))
}
