//! Read-only JSON API over committed graph runs.
//!
//! Graphs are served in Graphology's serialized format so they can be
//! loaded straight into Sigma.js or any viewer that imports Graphology.
//!
//! # Module Structure
//!
//! - `handlers` - HTTP route handlers
//! - `models` - API response types (DTOs)
//! - `graph` - Conversion from stored graphs to viewer format

mod graph;
mod handlers;
mod models;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{routing::get, Router};
use color_eyre::eyre::Result;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use taxograph_core::store::SqliteStore;

/// Shared application state for the server.
pub struct AppState {
    /// The store is a single SQLite connection, so requests take turns.
    pub store: Mutex<SqliteStore>,
}

/// Configuration for the viewer API.
pub struct ServeConfig {
    /// Address to bind.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Path to the SQLite database.
    pub db_path: PathBuf,
}

/// Build the API router over an opened store.
pub fn router(store: SqliteStore) -> Router {
    let state = Arc::new(AppState {
        store: Mutex::new(store),
    });

    Router::new()
        .route("/api/runs", get(handlers::api_runs))
        .route("/api/graph", get(handlers::api_latest_graph))
        .route("/api/graph/{run_id}", get(handlers::api_graph))
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}

/// Start the viewer API and serve until the process is stopped.
pub async fn start_server(config: ServeConfig) -> Result<()> {
    let store = SqliteStore::open(&config.db_path)?;
    let app = router(store);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!(addr = %listener.local_addr()?, "viewer API listening");

    println!("Serving graphs at http://{}:{}/api/graph", config.host, config.port);
    println!("Press Ctrl+C to stop\n");

    axum::serve(listener, app).await?;
    Ok(())
}
