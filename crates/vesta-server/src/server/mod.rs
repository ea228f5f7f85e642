// Server module - HTTP server setup and routing
pub mod handlers;
pub mod response;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tracing::info;

use self::state::AppState;

/// Create the Axum application router with all routes
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", post(handlers::handle_event))
        .route("/events", post(handlers::handle_event))
        .route("/health", get(handlers::health_check))
        .with_state(state)
}

/// Run the server on the specified address
pub async fn run_server(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    info!("Server listening on {}", addr);
    info!("- Push endpoint: http://{}/", addr);
    info!("- Health endpoint: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
