use std::net::SocketAddr;

use shopcheck_stub::{db, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("shopcheck_stub=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    info!("Starting shop stub...");

    let db = db::init()?;
    db::seed::run(&db)?;
    let expired = db.cleanup_expired_sessions()?;
    info!("Database initialized, {} expired session(s) removed", expired);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on http://{}/api", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    shopcheck_stub::serve(listener, AppState { db }).await
}
