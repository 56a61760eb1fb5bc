//! cove-api: the drive's pipelines and their HTTP surface.
//!
//! The interesting machinery is in [`pipeline`] — the upload sequence
//! (conditional encryption, transient decryption for tag extraction, blob
//! persist, record persist, staging cleanup) and the two read paths with
//! their different decrypt policies. The handler modules are thin wrappers
//! that map pipeline results onto status codes.

pub mod auth;
pub mod error;
pub mod files;
pub mod metadata;
pub mod middleware;
pub mod pipeline;
pub mod share;

use std::path::PathBuf;
use std::sync::Arc;

use cove_crypto::CipherEngine;
use cove_db::Database;
use cove_media::{MediaProber, TagParser};
use opendal::Operator;

pub use error::DriveError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    /// Object-store capability: blobs by opaque key.
    pub store: Operator,
    pub engine: CipherEngine,
    pub tags: Arc<dyn TagParser>,
    pub prober: Arc<dyn MediaProber>,
    pub jwt_secret: String,
    /// Spool directory for uploads in flight; entries are removed once the
    /// blob is persisted (or by the detached video task once probing ends).
    pub staging_dir: PathBuf,
}
