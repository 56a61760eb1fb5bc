//! The content pipelines.
//!
//! Upload runs a fixed sequence per file: stage to the spool dir, encrypt in
//! place when the kind is plain text, extract audio tags from (transiently
//! decrypted) plaintext, persist the blob under a fresh opaque key, commit
//! the file row and owner grant together, write the audio metadata row, then
//! clean the spool entry. Video probing detaches after the record commit and
//! never touches the caller's result.
//!
//! The two read paths gate decryption differently: the content route trusts
//! the `encrypted` flag (plus the presence of both cipher fields), while
//! download additionally requires the plain-text kind — binary payloads are
//! never run through the text decrypt path, whatever the flag says.

use std::path::{Path, PathBuf};

use anyhow::anyhow;
use bytes::Bytes;
use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use cove_crypto::EncryptedContent;
use cove_db::models::{AudioMetadataRow, FileRow};
use cove_media::AudioTags;
use cove_types::models::{AUDIO_KIND_PREFIX, StoredFile, TEXT_KIND, VIDEO_KIND_PREFIX};

use crate::{AppState, DriveError, metadata};

pub struct UploadRequest {
    pub bytes: Bytes,
    pub kind: String,
    pub name: String,
    pub owner_id: Uuid,
}

pub struct DownloadPayload {
    pub bytes: Vec<u8>,
    pub kind: String,
    pub name: String,
}

#[derive(Debug)]
pub enum DeleteOutcome {
    /// Owner delete: blob and row (with cascades) are gone.
    Deleted,
    /// Non-owner delete: only the caller's grant was removed.
    Revoked,
}

/// Run a blocking database call off the async executor.
pub(crate) async fn db_call<T, F>(state: &AppState, f: F) -> Result<T, DriveError>
where
    F: FnOnce(&cove_db::Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| DriveError::Internal(anyhow!("task join error: {e}")))?
        .map_err(DriveError::Internal)
}

// ── Upload ──────────────────────────────────────────────────────────────

pub async fn handle_upload(state: &AppState, req: UploadRequest) -> Result<StoredFile, DriveError> {
    let file_id = Uuid::new_v4();
    let staging = state
        .staging_dir
        .join(format!("{file_id}{}", extension_of(&req.name)));

    tokio::fs::write(&staging, &req.bytes)
        .await
        .map_err(|e| DriveError::UploadFailed(anyhow!("staging write failed: {e}")))?;

    match run_upload(state, &req, file_id, &staging).await {
        Ok(stored) => Ok(stored),
        Err(e) => {
            // Best-effort spool cleanup, then surface the original cause.
            discard_staging(&staging).await;
            Err(e)
        }
    }
}

async fn run_upload(
    state: &AppState,
    req: &UploadRequest,
    file_id: Uuid,
    staging: &Path,
) -> Result<StoredFile, DriveError> {
    // MAYBE_ENCRYPT — only the plain-text kind is ever encrypted. The spool
    // file is overwritten with base64 ciphertext; the recorded size stays
    // the plaintext length.
    let mut cipher: Option<EncryptedContent> = None;
    if req.kind == TEXT_KIND {
        let plaintext = String::from_utf8_lossy(&req.bytes);
        let enc = state
            .engine
            .encrypt(&plaintext)
            .map_err(|e| DriveError::UploadFailed(anyhow!(e)))?;
        tokio::fs::write(staging, enc.ciphertext.as_bytes())
            .await
            .map_err(|e| DriveError::UploadFailed(anyhow!("ciphertext spool write failed: {e}")))?;
        cipher = Some(enc);
    }

    // MAYBE_EXTRACT_METADATA — tag parsing wants plaintext; if the previous
    // step encrypted the spool file, decrypt transiently in memory only.
    let audio_tags = if req.kind.starts_with(AUDIO_KIND_PREFIX) {
        extract_audio_tags(state, req, cipher.as_ref(), staging).await
    } else {
        None
    };

    // PERSIST_BLOB — fresh opaque key, never derived from the user's name.
    let storage_key = format!("{}{}", Uuid::new_v4(), extension_of(&req.name));
    let disk_bytes = tokio::fs::read(staging)
        .await
        .map_err(|e| DriveError::UploadFailed(anyhow!("spool read failed: {e}")))?;
    state
        .store
        .write(&storage_key, disk_bytes)
        .await
        .map_err(|e| DriveError::UploadFailed(anyhow!("object store write failed: {e}")))?;

    // PERSIST_RECORD — the file row and the owner's write grant commit in
    // one transaction.
    let now = Utc::now();
    let row = FileRow {
        id: file_id.to_string(),
        name: req.name.clone(),
        kind: req.kind.clone(),
        size: req.bytes.len() as i64,
        storage_key: storage_key.clone(),
        nonce: cipher.as_ref().map(|c| c.nonce.clone()),
        auth_tag: cipher.as_ref().map(|c| c.tag.clone()),
        encrypted: cipher.is_some(),
        owner_id: req.owner_id.to_string(),
        created_at: now.to_rfc3339(),
        updated_at: now.to_rfc3339(),
    };
    {
        let state = state.clone();
        tokio::task::spawn_blocking(move || state.db.insert_file_with_owner(&row))
            .await
            .map_err(|e| DriveError::Internal(anyhow!("task join error: {e}")))?
            .map_err(|e| DriveError::UploadFailed(anyhow!("file record insert failed: {e}")))?;
    }

    // MAYBE_PERSIST_METADATA — the file exists without its metadata row if
    // this fails; degraded, not rolled back.
    if let Some(tags) = audio_tags {
        let meta = AudioMetadataRow {
            file_id: file_id.to_string(),
            title: tags.title,
            artist: tags.artist,
            album: tags.album,
            cover: tags.cover,
            lyrics: None,
        };
        if let Err(e) = db_call(state, move |db| db.upsert_audio_metadata(&meta)).await {
            warn!("audio metadata insert failed for {file_id}: {e}");
        }
    }

    if req.kind.starts_with(VIDEO_KIND_PREFIX) {
        // The detached probe task takes over the spool file and removes it
        // once probing ends.
        metadata::spawn_video_probe(
            state.clone(),
            file_id,
            req.name.clone(),
            staging.to_path_buf(),
        );
    } else {
        // CLEANUP
        discard_staging(staging).await;
    }

    Ok(StoredFile {
        id: file_id,
        name: req.name.clone(),
        kind: req.kind.clone(),
        size: req.bytes.len() as i64,
        storage_key,
        nonce: cipher.as_ref().map(|c| c.nonce.clone()),
        tag: cipher.as_ref().map(|c| c.tag.clone()),
        encrypted: cipher.is_some(),
        owner_id: req.owner_id,
        created_at: now,
        updated_at: now,
    })
}

async fn extract_audio_tags(
    state: &AppState,
    req: &UploadRequest,
    cipher: Option<&EncryptedContent>,
    staging: &Path,
) -> Option<AudioTags> {
    let disk = match tokio::fs::read(staging).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("spool read for tag extraction failed: {e}");
            return None;
        }
    };

    // The spool file holds base64 ciphertext when encryption ran; recover
    // the original bytes in memory, never writing them anywhere.
    let plain = match cipher {
        Some(c) => {
            let text = String::from_utf8_lossy(&disk);
            match state.engine.decrypt(&c.nonce, &text, &c.tag) {
                Ok(p) => p.into_bytes(),
                Err(e) => {
                    warn!("transient decrypt for tag extraction failed: {e}");
                    return None;
                }
            }
        }
        None => disk,
    };

    let parser = state.tags.clone();
    let kind = req.kind.clone();
    match tokio::task::spawn_blocking(move || parser.parse(&plain, &kind)).await {
        Ok(Ok(tags)) => Some(tags),
        Ok(Err(e)) => {
            warn!("tag extraction failed for {}: {e}", req.name);
            None
        }
        Err(e) => {
            warn!("tag extraction task failed: {e}");
            None
        }
    }
}

// ── Content read / write ────────────────────────────────────────────────

pub async fn handle_content_read(
    state: &AppState,
    file_id: Uuid,
    user_id: Uuid,
) -> Result<String, DriveError> {
    let row = fetch_for_user(state, file_id, user_id).await?;
    let data = read_blob(state, &row.storage_key).await?;
    let text = String::from_utf8_lossy(&data).into_owned();

    match (&row.nonce, &row.auth_tag) {
        (Some(nonce), Some(tag)) if row.encrypted && !nonce.is_empty() && !tag.is_empty() => state
            .engine
            .decrypt(nonce, &text, tag)
            .map_err(DriveError::DecryptionFailed),
        _ => Ok(text),
    }
}

/// Every save re-encrypts with a fresh nonce and tag — there is no
/// unencrypted write path, even for files uploaded before encryption.
pub async fn handle_content_write(
    state: &AppState,
    file_id: Uuid,
    user_id: Uuid,
    content: &str,
) -> Result<(), DriveError> {
    let (fid, uid) = (file_id.to_string(), user_id.to_string());
    let row = db_call(state, move |db| db.get_file_for_writer(&fid, &uid))
        .await?
        .ok_or(DriveError::AccessDenied)?;

    let enc = state
        .engine
        .encrypt(content)
        .map_err(|e| DriveError::Internal(anyhow!(e)))?;

    state
        .store
        .write(&row.storage_key, enc.ciphertext.into_bytes())
        .await
        .map_err(|e| DriveError::Internal(anyhow!("object store update failed: {e}")))?;

    let fid = file_id.to_string();
    let now = Utc::now().to_rfc3339();
    db_call(state, move |db| {
        db.update_cipher_fields(&fid, &enc.nonce, &enc.tag, &now)
    })
    .await
}

// ── Download ────────────────────────────────────────────────────────────

pub async fn handle_download(
    state: &AppState,
    file_id: Uuid,
    user_id: Uuid,
) -> Result<DownloadPayload, DriveError> {
    let row = fetch_for_user(state, file_id, user_id).await?;
    let data = read_blob(state, &row.storage_key).await?;

    // Kind-gated, not flag-gated: binary formats stream back untouched even
    // if a stray encrypted flag were set on the row.
    let decrypt = row.kind == TEXT_KIND
        && row.encrypted
        && row.nonce.as_deref().is_some_and(|n| !n.is_empty())
        && row.auth_tag.as_deref().is_some_and(|t| !t.is_empty());

    let bytes = if decrypt {
        let text = String::from_utf8_lossy(&data);
        let nonce = row.nonce.as_deref().unwrap_or_default();
        let tag = row.auth_tag.as_deref().unwrap_or_default();
        state
            .engine
            .decrypt(nonce, &text, tag)
            .map_err(DriveError::DecryptionFailed)?
            .into_bytes()
    } else {
        data
    };

    Ok(DownloadPayload {
        bytes,
        kind: row.kind,
        name: row.name,
    })
}

// ── Delete ──────────────────────────────────────────────────────────────

pub async fn handle_delete(
    state: &AppState,
    file_id: Uuid,
    user_id: Uuid,
) -> Result<DeleteOutcome, DriveError> {
    let (fid, uid) = (file_id.to_string(), user_id.to_string());
    let owned = db_call(state, move |db| db.get_file_owned(&fid, &uid)).await?;

    if let Some(row) = owned {
        // Blob and thumbnail first; a failed object delete leaves orphaned
        // garbage, not a dangling row.
        if let Err(e) = state.store.delete(&row.storage_key).await {
            warn!("blob delete failed for {file_id}: {e}");
        }
        let fid = file_id.to_string();
        if let Some(video) = db_call(state, move |db| db.get_video_metadata(&fid)).await? {
            if let Some(thumb) = video.thumbnail {
                if let Err(e) = state.store.delete(&thumb).await {
                    warn!("thumbnail delete failed for {file_id}: {e}");
                }
            }
        }
        let fid = file_id.to_string();
        db_call(state, move |db| db.delete_file(&fid)).await?;
        return Ok(DeleteOutcome::Deleted);
    }

    let (fid, uid) = (file_id.to_string(), user_id.to_string());
    if db_call(state, move |db| db.has_grant(&fid, &uid)).await? {
        let (fid, uid) = (file_id.to_string(), user_id.to_string());
        db_call(state, move |db| db.delete_grant(&fid, &uid)).await?;
        return Ok(DeleteOutcome::Revoked);
    }

    Err(DriveError::AccessDenied)
}

// ── Shared helpers ──────────────────────────────────────────────────────

pub(crate) async fn fetch_for_user(
    state: &AppState,
    file_id: Uuid,
    user_id: Uuid,
) -> Result<FileRow, DriveError> {
    let (fid, uid) = (file_id.to_string(), user_id.to_string());
    db_call(state, move |db| db.get_file_for_user(&fid, &uid))
        .await?
        .ok_or(DriveError::AccessDenied)
}

async fn read_blob(state: &AppState, storage_key: &str) -> Result<Vec<u8>, DriveError> {
    match state.store.read(storage_key).await {
        Ok(buf) => Ok(buf.to_vec()),
        Err(e) if e.kind() == opendal::ErrorKind::NotFound => Err(DriveError::NotFound),
        Err(e) => Err(DriveError::Internal(anyhow!("object store read failed: {e}"))),
    }
}

async fn discard_staging(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("spool cleanup failed for {}: {e}", path.display()),
    }
}

fn extension_of(name: &str) -> String {
    PathBuf::from(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default()
}
