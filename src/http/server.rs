//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, body limit, auth)
//! - Apply reloaded configuration to the module registry
//! - Serve until shutdown is signalled

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    extract::{MatchedPath, Request},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::client::SHARING_SETTINGS_PATH;
use crate::config::ServerConfig;
use crate::http::handlers;
use crate::http::request::{request_id, UuidRequestId};
use crate::observability::metrics;
use crate::sharing::SharingService;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<ArcSwap<ServerConfig>>,
    pub service: Arc<SharingService>,
}

impl AppState {
    pub fn new(config: ServerConfig, service: Arc<SharingService>) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(config)),
            service,
        }
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<ServerConfig> {
        self.inner.load_full()
    }

    /// Swap in a reloaded configuration.
    ///
    /// Modules that became inactive lose their sharing settings. Listener,
    /// timeout and body limit changes take effect on restart.
    pub fn apply_config(&self, config: ServerConfig) {
        let deactivated = self.service.registry().reload(&config.modules);
        if let Err(e) = self.service.unset_modules(&deactivated) {
            tracing::error!(error = %e, "Failed to unset sharing settings of deactivated modules");
        }
        for slug in &deactivated {
            tracing::info!(module = %slug, "Module deactivated by config reload");
        }

        self.service.set_roles(config.shareable_roles());
        self.inner.store(Arc::new(config));
        tracing::info!("Configuration reloaded");
    }
}

/// HTTP server for the sharing settings endpoint.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    pub fn new(config: ServerConfig, service: Arc<SharingService>) -> Self {
        let state = AppState::new(config, service);
        let router = build_router(state.clone());
        Self { router, state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve on `listener` until `shutdown` fires, applying every config
    /// received on `config_updates`.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: Option<mpsc::UnboundedReceiver<ServerConfig>>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        if let Some(mut updates) = config_updates {
            let state = self.state.clone();
            tokio::spawn(async move {
                while let Some(config) = updates.recv().await {
                    state.apply_config(config);
                }
            });
        }

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: AppState) -> Router {
    let config = state.config();

    let protected = Router::new()
        .route(
            SHARING_SETTINGS_PATH,
            get(handlers::get_sharing_settings).post(handlers::save_sharing_settings),
        )
        .merge(admin::router())
        .route_layer(middleware::from_fn_with_state(state.clone(), admin::auth::require_api_key));

    Router::new()
        .route("/healthz", get(healthz))
        .merge(protected)
        .route_layer(middleware::from_fn(track_metrics))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                path = %request.uri().path(),
                request_id = %request_id(request.headers()),
            )
        }))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());

    let response = next.run(request).await;
    metrics::record_request(&route, response.status().as_u16(), start);
    response
}
