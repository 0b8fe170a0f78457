mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use dongsung_api::middleware::SessionKeys;
use dongsung_api::uploads::{UPLOADS_ROUTE, UploadStore};
use dongsung_api::{AppState, AppStateInner, Policy, router};
use dongsung_crypto::Hasher;
use dongsung_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dongsung=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::load()?;

    let db = Database::open(&config.db_path)
        .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?;

    let hasher = match (config.hash_memory_kib, config.hash_iterations) {
        (None, None) => Hasher::default(),
        (memory, iterations) => Hasher::new(
            memory.unwrap_or(Hasher::DEFAULT_MEMORY_KIB),
            iterations.unwrap_or(Hasher::DEFAULT_ITERATIONS),
        )?,
    };

    let uploads = UploadStore::new(&config.uploads_dir)
        .await
        .with_context(|| format!("Failed to create uploads dir {}", config.uploads_dir.display()))?;

    if config.allow_username_reset {
        warn!("Password reset by username is enabled");
    }

    let state: AppState = Arc::new(AppStateInner {
        db,
        hasher,
        sessions: SessionKeys::new(&config.jwt_secret, chrono::Duration::hours(config.token_ttl_hours)),
        uploads,
        policy: Policy {
            photo_replace: config.photo_replace,
            allow_username_reset: config.allow_username_reset,
            max_upload_bytes: config.max_upload_bytes(),
        },
    });

    let app = router(state)
        .nest_service(UPLOADS_ROUTE, ServeDir::new(&config.uploads_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Dongsung server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
