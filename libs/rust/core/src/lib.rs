//! Core shared utilities for SnapClass services.

use anyhow::Result;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};

pub mod metrics;

pub use metrics::{
    encode_metrics, init_metrics, record_inference_latency, record_login, record_prediction,
    record_registration,
};

/// Environment prefix for layered settings, e.g. `SNAPCLASS__SERVER__BIND_ADDR`.
pub const ENV_PREFIX: &str = "SNAPCLASS";
/// Names an optional settings file (yaml/toml/json) layered under the environment.
pub const CONFIG_FILE_ENV: &str = "SNAPCLASS_CONFIG_FILE";
/// `1`/`true` switches log output to JSON lines.
pub const JSON_LOG_ENV: &str = "SNAPCLASS_JSON_LOG";

static TRACING_INIT: OnceCell<()> = OnceCell::new();
static SERVICE_NAME: OnceCell<String> = OnceCell::new();
static NODE_LIVENESS: AtomicBool = AtomicBool::new(true);
static NODE_READINESS: AtomicBool = AtomicBool::new(false);

pub fn mark_ready() { NODE_READINESS.store(true, Ordering::SeqCst); }
pub fn clear_ready() { NODE_READINESS.store(false, Ordering::SeqCst); }

pub fn init_tracing(service: &str) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| -> Result<()> {
        let json = std::env::var(JSON_LOG_ENV).ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
        let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = if json {
            tracing_subscriber::fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(false)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_line_number(true)
                .boxed()
        };
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::registry().with(fmt_layer).with(env_filter).try_init()?;
        Ok(())
    })?;
    let _ = SERVICE_NAME.set(service.to_string());
    info!(target: "snapclass-core", service, "tracing initialized");
    Ok(())
}

/// Load settings for `service`: defaults < optional file < `SNAPCLASS__*` environment.
///
/// Sections missing from every source fall back to the target type's serde defaults.
pub fn load_settings<T: DeserializeOwned>(service: &str) -> Result<T> {
    let mut builder = config::Config::builder().set_default("service_name", service)?;
    if let Ok(file) = std::env::var(CONFIG_FILE_ENV) {
        builder = builder.add_source(config::File::with_name(&file).required(false));
    }
    builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"));
    let cfg = builder.build()?;
    Ok(cfg.try_deserialize()?)
}

pub fn health_router() -> Router {
    Router::new()
        .route("/live", get(|| async { Json(serde_json::json!({"live": NODE_LIVENESS.load(Ordering::SeqCst)})) }))
        .route("/ready", get(|| async { Json(serde_json::json!({"ready": NODE_READINESS.load(Ordering::SeqCst)})) }))
        .route("/status", get(|| async {
            Json(serde_json::json!({
                "live": NODE_LIVENESS.load(Ordering::SeqCst),
                "ready": NODE_READINESS.load(Ordering::SeqCst),
                "service": SERVICE_NAME.get(),
            }))
        }))
        .route("/metrics", get(metrics_handler))
}

/// Serve the health router on its own port. Returns the bound address.
pub async fn start_health_server(port: u16) -> Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
    let addr = listener.local_addr()?;
    info!(?addr, "Health server listening");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, health_router()).await {
            tracing::error!(error=?e, "Health server failed");
        }
    });
    Ok(addr)
}

async fn metrics_handler() -> Response {
    match encode_metrics() {
        Ok(Some(buf)) => ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], buf).into_response(),
        Ok(None) => (StatusCode::SERVICE_UNAVAILABLE, "metrics not initialized").into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("encode error: {e}")).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Default)]
    #[serde(default)]
    struct Probe { service_name: String, probe: ProbeSection }

    #[derive(Debug, Deserialize)]
    #[serde(default)]
    struct ProbeSection { port: u16, label: String }

    impl Default for ProbeSection {
        fn default() -> Self { Self { port: 1, label: "fallback".into() } }
    }

    #[test]
    fn settings_layer_env_over_defaults() {
        std::env::set_var("SNAPCLASS__PROBE__PORT", "4242");
        let cfg: Probe = load_settings("probe-svc").unwrap();
        std::env::remove_var("SNAPCLASS__PROBE__PORT");
        assert_eq!(cfg.service_name, "probe-svc");
        assert_eq!(cfg.probe.port, 4242);
        assert_eq!(cfg.probe.label, "fallback");
    }

    #[tokio::test]
    async fn health_endpoints_report_readiness() {
        init_metrics().unwrap();
        let addr = start_health_server(0).await.unwrap();
        mark_ready();
        let body: serde_json::Value = reqwest::get(format!("http://127.0.0.1:{}/ready", addr.port()))
            .await.unwrap().json().await.unwrap();
        assert_eq!(body["ready"], true);
        let metrics = reqwest::get(format!("http://127.0.0.1:{}/metrics", addr.port()))
            .await.unwrap();
        assert_eq!(metrics.status(), 200);
        clear_ready();
    }
}
