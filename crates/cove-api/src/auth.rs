use anyhow::anyhow;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use cove_types::api::{
    Claims, LoginRequest, LoginResponse, MeResponse, RegisterRequest, RegisterResponse,
};

use crate::{AppState, DriveError};

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, DriveError> {
    if req.name.is_empty() || req.name.len() > 64 {
        return Err(DriveError::BadRequest("invalid name".into()));
    }
    if !req.email.contains('@') {
        return Err(DriveError::BadRequest("invalid email".into()));
    }
    if req.password.len() < 8 {
        return Err(DriveError::BadRequest("password must be at least 8 characters".into()));
    }

    let state2 = state.clone();
    let email = req.email.clone();
    let existing = tokio::task::spawn_blocking(move || state2.db.get_user_by_email(&email))
        .await
        .map_err(|e| anyhow!("join error: {e}"))??;
    if existing.is_some() {
        return Err(DriveError::Conflict("user with this email already exists".into()));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| anyhow!("password hashing failed: {e}"))?
        .to_string();

    let user_id = Uuid::new_v4();
    let state2 = state.clone();
    let (name, email) = (req.name.clone(), req.email.clone());
    tokio::task::spawn_blocking(move || {
        state2
            .db
            .create_user(&user_id.to_string(), &name, &email, &password_hash)
    })
    .await
    .map_err(|e| anyhow!("join error: {e}"))??;

    let token = create_token(&state.jwt_secret, user_id, &req.name)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { user_id, token }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, DriveError> {
    let state2 = state.clone();
    let email = req.email.clone();
    let user = tokio::task::spawn_blocking(move || state2.db.get_user_by_email(&email))
        .await
        .map_err(|e| anyhow!("join error: {e}"))??
        .ok_or(DriveError::AccessDenied)?;

    let parsed_hash =
        PasswordHash::new(&user.password).map_err(|e| anyhow!("stored hash unreadable: {e}"))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| DriveError::AccessDenied)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| anyhow!("stored user id unreadable: {e}"))?;
    let token = create_token(&state.jwt_secret, user_id, &user.name)?;

    Ok(Json(LoginResponse {
        user_id,
        name: user.name,
        token,
    }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, DriveError> {
    let user_id = claims.sub;
    let user = tokio::task::spawn_blocking(move || state.db.get_user_by_id(&user_id.to_string()))
        .await
        .map_err(|e| anyhow!("join error: {e}"))??
        .ok_or(DriveError::NotFound)?;

    Ok(Json(MeResponse {
        id: user_id,
        name: user.name,
        email: user.email,
    }))
}

fn create_token(secret: &str, user_id: Uuid, name: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        name: name.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(7)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
