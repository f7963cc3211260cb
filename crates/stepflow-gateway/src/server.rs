use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use stepflow_core::config::AppConfig;
use stepflow_core::event::EventBus;
use stepflow_tools::ToolRegistry;

use crate::routes;
use crate::state::AppState;

/// Build the HTTP router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/api/health", get(routes::health))
        .route("/graph/create", post(routes::create_graph))
        .route("/graph/run", post(routes::run_graph))
        .route("/graph/state/{run_id}", get(routes::get_run_state))
        .route("/graphs", get(routes::list_graphs))
        .route("/tools", get(routes::list_tools))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// HTTP gateway for creating and running graphs, built on axum.
pub struct GatewayServer {
    config: AppConfig,
    registry: Arc<ToolRegistry>,
    event_bus: Arc<EventBus>,
}

impl GatewayServer {
    pub fn new(config: AppConfig, registry: Arc<ToolRegistry>, event_bus: Arc<EventBus>) -> Self {
        Self {
            config,
            registry,
            event_bus,
        }
    }

    /// Run the gateway server until the cancellation token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let state = Arc::new(AppState::new(
            self.config.clone(),
            self.registry.clone(),
            self.event_bus.clone(),
        ));

        // Mirror run events into the log
        let mut events = self.event_bus.subscribe();
        let events_shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = events_shutdown.cancelled() => break,
                    event = events.recv() => match event {
                        Ok(event) => {
                            if let Ok(json) = serde_json::to_string(&event) {
                                debug!(event = %json, "Flow event");
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            debug!(skipped = n, "Flow event subscriber lagged");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });

        let app = router(state);
        let bind = &self.config.gateway.bind;
        let listener = TcpListener::bind(bind).await?;
        info!(bind = %bind, "Gateway listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway shut down");
        Ok(())
    }
}
