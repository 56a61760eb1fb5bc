//! Share tokens: one opaque token per file, minted once and reused, redeemed
//! by other users for a write grant.

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use cove_types::api::{Claims, JoinRequest, ShareResponse};
use cove_types::models::Permission;

use crate::pipeline::db_call;
use crate::{AppState, DriveError};

const TOKEN_PREFIX: &str = "cove_share?";

/// GET /files/{id}/share — the existing token, if one was ever minted.
pub async fn get_share(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<Uuid>,
) -> Result<impl IntoResponse, DriveError> {
    require_owner(&state, file_id, claims.sub).await?;

    let fid = file_id.to_string();
    let token = db_call(&state, move |db| db.get_share_token(&fid))
        .await?
        .ok_or(DriveError::NotFound)?;

    Ok(Json(ShareResponse { token }))
}

/// POST /files/{id}/share — mint the file's token, or return the existing one.
pub async fn create_share(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<Uuid>,
) -> Result<impl IntoResponse, DriveError> {
    require_owner(&state, file_id, claims.sub).await?;

    let fid = file_id.to_string();
    if let Some(token) = db_call(&state, move |db| db.get_share_token(&fid)).await? {
        return Ok(Json(ShareResponse { token }));
    }

    let token = format!("{TOKEN_PREFIX}{}", hex::encode(rand::random::<[u8; 16]>()));
    let share_id = Uuid::new_v4().to_string();
    let fid = file_id.to_string();
    let stored = token.clone();
    db_call(&state, move |db| db.insert_share(&share_id, &fid, &stored)).await?;

    Ok(Json(ShareResponse { token }))
}

/// POST /files/join — redeem a token for a write grant on its file.
pub async fn join(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<JoinRequest>,
) -> Result<impl IntoResponse, DriveError> {
    if req.token.is_empty() {
        return Err(DriveError::BadRequest("token is required".into()));
    }

    let token = req.token.clone();
    let share = db_call(&state, move |db| db.get_share_by_token(&token))
        .await?
        .ok_or(DriveError::NotFound)?;

    let (fid, uid) = (share.file_id.clone(), claims.sub.to_string());
    if db_call(&state, move |db| db.has_grant(&fid, &uid)).await? {
        return Err(DriveError::Conflict("you already have access to this file".into()));
    }

    let uid = claims.sub.to_string();
    db_call(&state, move |db| {
        db.insert_grant(&uid, &share.file_id, Permission::Write.as_str())
    })
    .await?;

    Ok(Json(serde_json::json!({ "message": "successfully joined the team" })))
}

async fn require_owner(state: &AppState, file_id: Uuid, user_id: Uuid) -> Result<(), DriveError> {
    let (fid, uid) = (file_id.to_string(), user_id.to_string());
    db_call(state, move |db| db.get_file_owned(&fid, &uid))
        .await?
        .ok_or(DriveError::AccessDenied)?;
    Ok(())
}
