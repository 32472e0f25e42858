use std::future::Future;
use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::api::{self, AppState, SharedState};
use super::auth::{SessionStore, session_ttl};
use super::db::{DbHandle, DocumentDb};

/// Configuration for the reference server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// JSON file backing the store; `None` keeps everything in memory.
    pub data_path: Option<PathBuf>,
    /// Install the demo equipment/team catalog into an empty store.
    pub seed: bool,
    pub dev_mode: bool,
    /// Token signing secret. Without one the store keeps a generated secret.
    pub jwt_secret: Option<String>,
    pub password_cost: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3000,
            data_path: None,
            seed: true,
            dev_mode: false,
            jwt_secret: None,
            password_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Open (and optionally seed) the document store described by `config`,
/// restoring the session signing key and logged-out tokens it holds.
pub fn open_state(config: &ServerConfig) -> Result<SharedState> {
    let mut db = match &config.data_path {
        Some(path) => DocumentDb::open(path).context("Failed to open document store")?,
        None => DocumentDb::new_in_memory(),
    };
    if config.seed && db.seed_reference_data()? {
        tracing::info!("seeded demo equipment and teams");
    }
    let secret = match &config.jwt_secret {
        Some(secret) => secret.clone(),
        None => db
            .signing_secret()
            .context("Failed to store session signing secret")?,
    };
    let sessions = SessionStore::new(&secret, session_ttl()).with_revoked(db.revoked_sessions());
    Ok(AppState::new(DbHandle::new(db), sessions, config.password_cost))
}

/// Build the full application router.
pub fn build_router(state: SharedState, dev_mode: bool) -> Router {
    let app = api::api_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http());
    if dev_mode {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Serve `app` on an already-bound listener until `shutdown` resolves.
pub async fn serve_on(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")
}

/// Start the reference server and run until Ctrl+C.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let state = open_state(&config)?;
    let app = build_router(state, config.dev_mode);

    let addr = config.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    let local_addr = listener.local_addr()?;
    tracing::info!(%local_addr, data = ?config.data_path, "GearGuard API listening");

    serve_on(listener, app, shutdown_signal()).await?;
    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutting down"),
        Err(e) => {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}
