//! HTTP server assembly for Manifold
//!
//! Builds the provider pool, mounts the completion routes, and serves
//! them with graceful shutdown. All routing decisions live in
//! `manifold-llm`; this crate only wires the pieces together.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod health;

use std::net::SocketAddr;

use axum::Router;
use manifold_config::Config;
use manifold_llm::Engine;
use tower_http::trace::TraceLayer;

/// Assembled server with all routes and middleware
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
}

impl Server {
    /// Build the server from configuration
    ///
    /// Constructs every configured provider eagerly; an empty surviving
    /// pool is fatal here, not at first request.
    ///
    /// # Errors
    ///
    /// Returns an error when no provider could be initialized.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let listen_address = config
            .server
            .listen_address
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8000)));

        let engine = Engine::from_config(&config.providers).await?;

        let router = Router::new()
            .route("/health", axum::routing::get(health::health_handler))
            .merge(manifold_llm::llm_router(engine))
            .layer(TraceLayer::new_for_http());

        Ok(Self {
            router,
            listen_address,
        })
    }

    /// Serve until the cancellation token fires
    pub async fn serve(self, shutdown: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        Ok(())
    }
}
