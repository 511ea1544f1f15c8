use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;
use time::OffsetDateTime;
use tokio::{net::TcpListener, task::JoinHandle, time::MissedTickBehavior};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use warden_auth::{AuthState, TokenService};

use crate::{
    bootstrap::{BootstrapError, build_auth},
    config::AppConfig,
    middleware as app_middleware,
};

pub struct WardenServer {
    addr: SocketAddr,
    app: Router,
    token_service: Arc<TokenService>,
    cleanup_interval: Option<Duration>,
}

#[derive(Serialize)]
struct HealthResponse<'a> {
    status: &'a str,
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

pub fn build_app(cfg: &AppConfig, state: AuthState) -> Router {
    let body_limit = cfg.server.body_limit_bytes;
    Router::new()
        .route("/healthz", get(healthz))
        .merge(warden_auth::router(state))
        // Layers run outermost-last: request id -> trace -> cors -> body limit
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .headers()
                        .get(warden_auth::http::REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri().path(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = latency.as_millis() as u64,
                            "request handled"
                        );
                    },
                ),
        )
        .layer(middleware::from_fn(app_middleware::request_id))
}

/// Periodically deletes expired codes and tokens.
///
/// Reads never rely on this; every lookup still checks expiry.
pub fn spawn_cleanup_task(token_service: Arc<TokenService>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match token_service
                .cleanup_expired(OffsetDateTime::now_utc())
                .await
            {
                Ok(report) => tracing::debug!(
                    codes = report.codes,
                    tokens = report.tokens,
                    "expired records removed"
                ),
                Err(e) => tracing::warn!(error = %e, "expired record cleanup failed"),
            }
        }
    })
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub async fn build(self) -> Result<WardenServer, BootstrapError> {
        let components = build_auth(&self.config).await?;
        let app = build_app(&self.config, components.state);
        let cleanup = &self.config.auth.cleanup;

        Ok(WardenServer {
            addr: self.addr,
            app,
            token_service: components.token_service,
            cleanup_interval: cleanup.enabled.then_some(cleanup.interval),
        })
    }
}

impl WardenServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener).await
    }

    /// Serves on an already bound listener until Ctrl+C.
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        let local = listener.local_addr()?;
        tracing::info!("listening on {}", local);

        let cleanup = self
            .cleanup_interval
            .map(|every| spawn_cleanup_task(self.token_service.clone(), every));

        let result = axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        if let Some(task) = cleanup {
            task.abort();
        }
        result?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
