use std::net::SocketAddr;
use std::sync::{Mutex, OnceLock, PoisonError};

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::error::BridgeError;
use crate::metrics::{self, MetricsRegistry};

/// Liveness body, served unconditionally.
pub const HEALTHZ_BODY: &str = r#"{"ok":true}"#;

// ═══════════════════════════════════════════════════════════════
//  Router
// ═══════════════════════════════════════════════════════════════

/// `GET /healthz` always; `GET /metrics` only for an enabled registry.
/// Everything else falls through to 404. No access logging.
pub fn router(metrics: MetricsRegistry) -> Router {
    let mut app: Router<MetricsRegistry> = Router::new().route("/healthz", get(handle_healthz));
    if metrics.is_enabled() {
        app = app.route("/metrics", get(handle_metrics));
    }
    app.with_state(metrics)
}

async fn handle_healthz() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/json")], HEALTHZ_BODY)
}

async fn handle_metrics(State(registry): State<MetricsRegistry>) -> impl IntoResponse {
    match registry.render() {
        Some(body) => ([(header::CONTENT_TYPE, metrics::content_type())], body).into_response(),
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

// ═══════════════════════════════════════════════════════════════
//  MetricsServer
// ═══════════════════════════════════════════════════════════════

/// Owner of the single metrics listener.
pub struct MetricsServer {
    metrics: MetricsRegistry,
    bind_addr: String,
    bound: Mutex<Option<SocketAddr>>,
}

impl MetricsServer {
    pub fn new(metrics: MetricsRegistry) -> Self {
        Self {
            metrics,
            bind_addr: "0.0.0.0".into(),
            bound: Mutex::new(None),
        }
    }

    pub fn with_bind_addr(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Server over `MetricsRegistry::global()`.
    pub fn global() -> &'static MetricsServer {
        static GLOBAL: OnceLock<MetricsServer> = OnceLock::new();
        GLOBAL.get_or_init(|| MetricsServer::new(MetricsRegistry::global().clone()))
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.bound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind `bind_addr:port` and serve.
    ///
    /// Idempotent: once a listener is bound, later calls return its
    /// address and do nothing else. `background = true` serves on a
    /// dedicated thread and returns at once; `false` blocks the caller
    /// until Ctrl+C.
    pub fn start(&self, port: u16, background: bool) -> Result<SocketAddr, BridgeError> {
        let addr = format!("{}:{port}", self.bind_addr);
        let (listener, local) = {
            let mut bound = self.bound.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = *bound {
                return Ok(existing);
            }
            let bind_err = |source: std::io::Error| BridgeError::Bind { addr: addr.clone(), source };
            let listener = std::net::TcpListener::bind(&addr).map_err(bind_err)?;
            listener.set_nonblocking(true).map_err(bind_err)?;
            let local = listener.local_addr().map_err(bind_err)?;
            *bound = Some(local);
            (listener, local)
        };

        tracing::info!(addr = %local, "metrics server listening");
        let app = router(self.metrics.clone());

        if !background {
            serve_blocking(listener, app, true)?;
            return Ok(local);
        }

        let spawned = std::thread::Builder::new()
            .name("metrics-http".into())
            .spawn(move || {
                if let Err(e) = serve_blocking(listener, app, false) {
                    tracing::error!(error = %e, "metrics server stopped");
                }
            });
        if let Err(e) = spawned {
            *self.bound.lock().unwrap_or_else(PoisonError::into_inner) = None;
            return Err(BridgeError::Runtime(e));
        }
        Ok(local)
    }
}

fn serve_blocking(
    listener: std::net::TcpListener,
    app: Router,
    until_ctrl_c: bool,
) -> Result<(), BridgeError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(BridgeError::Runtime)?;

    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::from_std(listener).map_err(BridgeError::Serve)?;
        let served = if until_ctrl_c {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
        } else {
            axum::serve(listener, app).await
        };
        served.map_err(BridgeError::Serve)
    })
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down...");
}
