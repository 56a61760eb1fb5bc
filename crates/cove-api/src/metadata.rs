//! Out-of-band metadata: the detached video probe and the explicit audio
//! metadata endpoint.

use std::path::PathBuf;

use anyhow::{Context, anyhow};
use axum::{Extension, Json, extract::{Path, State}, http::StatusCode, response::IntoResponse};
use tracing::warn;
use uuid::Uuid;

use cove_db::models::{AudioMetadataRow, VideoMetadataRow};
use cove_types::api::{AudioMetadataRequest, Claims};

use crate::pipeline::db_call;
use crate::{AppState, DriveError};

/// Kick off the fire-and-forget video tail: probe, thumbnail, metadata row.
///
/// Runs after the upload response is already on the wire. Owns the spool
/// file and removes it at the end; any failure is logged and the metadata
/// row is simply absent. Nothing here can affect the upload's outcome.
pub(crate) fn spawn_video_probe(state: AppState, file_id: Uuid, title: String, spool: PathBuf) {
    tokio::spawn(async move {
        if let Err(e) = probe_and_record(&state, file_id, &title, &spool).await {
            warn!("video metadata extraction failed for {file_id}: {e:#}");
        }
        match tokio::fs::remove_file(&spool).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("spool cleanup failed for {}: {e}", spool.display()),
        }
    });
}

async fn probe_and_record(
    state: &AppState,
    file_id: Uuid,
    title: &str,
    spool: &std::path::Path,
) -> anyhow::Result<()> {
    let prober = state.prober.clone();
    let path = spool.to_path_buf();
    let report = tokio::task::spawn_blocking(move || prober.probe(&path))
        .await
        .map_err(|e| anyhow!("probe task join error: {e}"))?
        .context("probing video")?;

    let prober = state.prober.clone();
    let path = spool.to_path_buf();
    let frame = tokio::task::spawn_blocking(move || prober.thumbnail(&path, 1.0))
        .await
        .map_err(|e| anyhow!("thumbnail task join error: {e}"))?
        .context("rendering thumbnail")?;

    let thumb_key = format!("thumbs/{file_id}.jpg");
    state
        .store
        .write(&thumb_key, frame)
        .await
        .context("storing thumbnail")?;

    let meta = VideoMetadataRow {
        file_id: file_id.to_string(),
        title: title.to_string(),
        duration: report.duration_secs,
        resolution: report.resolution(),
        thumbnail: Some(thumb_key),
        codec: report.codec.clone(),
    };
    db_call(state, move |db| db.insert_video_metadata(&meta))
        .await
        .map_err(|e| anyhow!("video metadata insert failed: {e}"))?;

    Ok(())
}

/// POST /files/{id}/audio-metadata — owner-only create-or-overwrite.
pub async fn update_audio_metadata(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<Uuid>,
    Json(req): Json<AudioMetadataRequest>,
) -> Result<impl IntoResponse, DriveError> {
    let (fid, uid) = (file_id.to_string(), claims.sub.to_string());
    db_call(&state, move |db| db.get_file_owned(&fid, &uid))
        .await?
        .ok_or(DriveError::AccessDenied)?;

    let meta = AudioMetadataRow {
        file_id: file_id.to_string(),
        title: req.title,
        artist: req.artist,
        album: req.album,
        cover: req.cover,
        lyrics: req.lyrics,
    };
    db_call(&state, move |db| db.upsert_audio_metadata(&meta)).await?;

    Ok(StatusCode::NO_CONTENT)
}
