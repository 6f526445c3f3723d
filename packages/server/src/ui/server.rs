//! Server execution logic.

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use super::{
    handler::{conversation_messages, health_check, online_users, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};

/// Build the router with every endpoint of the chat server.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // WebSocket エンドポイント
        .route("/ws", get(websocket_handler))
        // HTTP エンドポイント
        .route("/api/health", get(health_check))
        .route("/api/online-users", get(online_users))
        .route(
            "/api/conversations/{patient_id}/{doctor_id}/messages",
            get(conversation_messages),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Chat server
///
/// # Example
///
/// ```ignore
/// let server = Server::new(app_state);
/// server.run("127.0.0.1".to_string(), 8080).await?;
/// ```
pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Run the chat server until a shutdown signal arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let app = router(self.state);

        let bind_addr = format!("{}:{}", host, port);
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

        tracing::info!("Chat server listening on {}", listener.local_addr()?);
        tracing::info!("Connect to: ws://{}/ws?user_id=<id>&role=<patient|doctor>", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }
}
