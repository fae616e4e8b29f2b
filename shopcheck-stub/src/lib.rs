use std::net::SocketAddr;

use axum::{extract::State, response::Json, routing::get, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;

use db::Database;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    database_connected: bool,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database_connected = state.db.conn().is_ok();
    Json(HealthResponse {
        status: if database_connected { "ok" } else { "error" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database_connected,
    })
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .nest("/api", routes::api_router())
        .fallback(error::not_found)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    axum::serve(listener, app(state)).await?;
    Ok(())
}

/// Binds an ephemeral local port, serves in the background and returns the
/// bound address.
pub async fn spawn(state: AppState) -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = serve(listener, state).await {
            tracing::error!(error = %e, "stub server stopped");
        }
    });
    info!("Stub listening on http://{}", addr);
    Ok(addr)
}
