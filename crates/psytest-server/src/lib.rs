//! psytest-server - HTTP surface for the assignment lifecycle engine.
//!
//! This crate owns the axum router and the shared application state. The
//! engine, catalog, store, and roster are injected so tests and the CLI can
//! compose them freely.

mod error;
pub mod routes;
mod state;

use std::sync::Arc;

use tokio::net::TcpListener;

pub use error::{ApiError, ServerError};
pub use routes::create_router;
pub use state::AppState;

/// The psytest HTTP server.
pub struct PsytestServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl PsytestServer {
    /// Create a server over an already-composed application state.
    pub fn new(config: ServerConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the shared application state.
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Run the server, binding to the configured address.
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.clone(),
                source: e,
            })?;

        tracing::info!("psytest server listening on {}", addr);

        let router = create_router(self.state);
        axum::serve(listener, router).await?;

        Ok(())
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7433,
        }
    }
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Returns the socket address string (e.g., "0.0.0.0:7433").
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
