mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use cove_api::middleware::require_auth;
use cove_api::{AppState, AppStateInner, auth, files, metadata, share};
use cove_crypto::CipherEngine;
use cove_media::FfmpegTool;

use crate::config::Config;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cove=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    if config.jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&config.jwt_secret.as_str()) {
        eprintln!("FATAL: COVE_JWT_SECRET is unset or still a placeholder.");
        eprintln!("       Set it in your .env file and restart.");
        std::process::exit(1);
    }

    // Key problems are fatal before any request is served — a drive that
    // cannot decrypt what it encrypts must not come up.
    let engine = match CipherEngine::from_hex(&config.encryption_key) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("FATAL: COVE_ENCRYPTION_KEY is unusable: {e}");
            eprintln!("       Provide 64 hex chars (32 bytes) and restart.");
            std::process::exit(1);
        }
    };

    let db = cove_db::Database::open(&config.db_path)?;
    let store = cove_store::build_operator(&config.storage)?;
    tokio::fs::create_dir_all(&config.staging_dir).await?;
    info!("Staging directory: {}", config.staging_dir.display());

    let media = Arc::new(FfmpegTool::new(config.ffprobe.clone(), config.ffmpeg.clone()));

    let state: AppState = Arc::new(AppStateInner {
        db,
        store,
        engine,
        tags: media.clone(),
        prober: media,
        jwt_secret: config.jwt_secret.clone(),
        staging_dir: config.staging_dir.clone(),
    });

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/files", get(files::list_files))
        .route("/files", post(files::upload))
        .route("/files/{id}/content", get(files::get_content))
        .route("/files/{id}/content", put(files::put_content))
        .route("/files/{id}/download", get(files::download))
        .route("/files/{id}", delete(files::delete))
        .route("/files/{id}/share", get(share::get_share))
        .route("/files/{id}/share", post(share::create_share))
        .route("/files/join", post(share::join))
        .route("/files/{id}/audio-metadata", post(metadata::update_audio_metadata))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(64 * 1024 * 1024)) // 50 MB files + form overhead
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Cove server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
