use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use cove_types::api::{Claims, ContentResponse, FileSummary, ListFilesResponse, WriteContentRequest};

use crate::pipeline::{self, DeleteOutcome, UploadRequest, db_call};
use crate::{AppState, DriveError};

/// 50 MB upload limit for files
const MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

/// GET /files — files the caller owns or was granted, newest-updated first.
pub async fn list_files(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, DriveError> {
    let uid = claims.sub.to_string();
    let rows = db_call(&state, move |db| db.list_files_for_user(&uid)).await?;

    let files = rows
        .into_iter()
        .map(|row| {
            Ok(FileSummary {
                id: parse_uuid(&row.file.id)?,
                name: row.file.name,
                kind: row.file.kind,
                size: row.file.size,
                owner_id: parse_uuid(&row.file.owner_id)?,
                created_at: parse_ts(&row.file.created_at),
                updated_at: parse_ts(&row.file.updated_at),
                is_shared: row.is_shared,
            })
        })
        .collect::<Result<Vec<_>, DriveError>>()?;

    Ok(Json(ListFilesResponse { files }))
}

/// POST /files — multipart upload, one `file` field per request.
pub async fn upload(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, DriveError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DriveError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let name = field.file_name().unwrap_or("unnamed").to_string();
        let kind = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| DriveError::BadRequest(format!("failed to read upload: {e}")))?;

        if bytes.is_empty() {
            return Err(DriveError::BadRequest("no file uploaded".into()));
        }
        if bytes.len() > MAX_FILE_SIZE {
            return Err(DriveError::TooLarge);
        }

        let stored = pipeline::handle_upload(
            &state,
            UploadRequest {
                bytes,
                kind,
                name,
                owner_id: claims.sub,
            },
        )
        .await?;

        return Ok((StatusCode::CREATED, Json(stored)));
    }

    Err(DriveError::BadRequest("no file uploaded".into()))
}

/// GET /files/{id}/content — the editor's read path; decrypts when flagged.
pub async fn get_content(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<Uuid>,
) -> Result<impl IntoResponse, DriveError> {
    let content = pipeline::handle_content_read(&state, file_id, claims.sub).await?;
    Ok(Json(ContentResponse { content }))
}

/// PUT /files/{id}/content — the editor's save path; always re-encrypts.
pub async fn put_content(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<Uuid>,
    Json(req): Json<WriteContentRequest>,
) -> Result<impl IntoResponse, DriveError> {
    if req.content.is_empty() {
        return Err(DriveError::BadRequest("content is required".into()));
    }
    pipeline::handle_content_write(&state, file_id, claims.sub, &req.content).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /files/{id}/download — attachment retrieval; decrypts plain text only.
pub async fn download(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<Uuid>,
) -> Result<impl IntoResponse, DriveError> {
    let payload = pipeline::handle_download(&state, file_id, claims.sub).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{}\"", payload.name.replace('"', ""))
            .parse()
            .map_err(|e| DriveError::Internal(anyhow::anyhow!("header build failed: {e}")))?,
    );
    headers.insert(
        header::CONTENT_TYPE,
        payload
            .kind
            .parse()
            .unwrap_or(header::HeaderValue::from_static("application/octet-stream")),
    );

    Ok((headers, payload.bytes))
}

/// DELETE /files/{id} — owner delete destroys; a grantee revokes themselves.
pub async fn delete(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<Uuid>,
) -> Result<impl IntoResponse, DriveError> {
    let message = match pipeline::handle_delete(&state, file_id, claims.sub).await? {
        DeleteOutcome::Deleted => "file deleted permanently by owner",
        DeleteOutcome::Revoked => "access revoked; file remains intact",
    };
    Ok(Json(json!({ "message": message })))
}

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid, DriveError> {
    value
        .parse()
        .map_err(|e| DriveError::Internal(anyhow::anyhow!("bad uuid in database: {e}")))
}

pub(crate) fn parse_ts(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_default()
}
