//! Prometheus metrics shared by SnapClass services.
//!
//! Metrics live in a dedicated registry created by [`init_metrics`]. The `record_*`
//! helpers are no-ops until then, so library code can call them unconditionally.

use anyhow::Result;
use once_cell::sync::OnceCell;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use std::time::Duration;

static METRICS: OnceCell<ServiceMetrics> = OnceCell::new();

struct ServiceMetrics {
    registry: Registry,
    predictions_total: IntCounterVec,
    inference_latency_ms: Histogram,
    login_attempts_total: IntCounterVec,
    registrations_total: IntCounterVec,
}

impl ServiceMetrics {
    fn new() -> Result<Self> {
        let registry = Registry::new();
        let predictions_total = IntCounterVec::new(
            Opts::new("snapclass_predictions_total", "Image predictions by outcome"),
            &["outcome"],
        )?;
        let inference_latency_ms = Histogram::with_opts(
            HistogramOpts::new("snapclass_inference_latency_ms", "Preprocess + forward pass latency (ms)")
                .buckets(vec![5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0]),
        )?;
        let login_attempts_total = IntCounterVec::new(
            Opts::new("snapclass_login_attempts_total", "Login attempts by outcome"),
            &["outcome"],
        )?;
        let registrations_total = IntCounterVec::new(
            Opts::new("snapclass_registrations_total", "Registration attempts by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(predictions_total.clone()))?;
        registry.register(Box::new(inference_latency_ms.clone()))?;
        registry.register(Box::new(login_attempts_total.clone()))?;
        registry.register(Box::new(registrations_total.clone()))?;
        Ok(Self { registry, predictions_total, inference_latency_ms, login_attempts_total, registrations_total })
    }
}

/// Create and register the service metrics (idempotent).
pub fn init_metrics() -> Result<()> {
    METRICS.get_or_try_init(ServiceMetrics::new)?;
    Ok(())
}

pub fn record_prediction(outcome: &str) {
    if let Some(m) = METRICS.get() { m.predictions_total.with_label_values(&[outcome]).inc(); }
}

pub fn record_inference_latency(elapsed: Duration) {
    if let Some(m) = METRICS.get() { m.inference_latency_ms.observe(elapsed.as_secs_f64() * 1000.0); }
}

pub fn record_login(outcome: &str) {
    if let Some(m) = METRICS.get() { m.login_attempts_total.with_label_values(&[outcome]).inc(); }
}

pub fn record_registration(outcome: &str) {
    if let Some(m) = METRICS.get() { m.registrations_total.with_label_values(&[outcome]).inc(); }
}

/// Render the registry in the Prometheus text exposition format.
pub fn encode_metrics() -> Result<Option<Vec<u8>>> {
    let Some(m) = METRICS.get() else { return Ok(None) };
    let mut buf = Vec::new();
    TextEncoder::new().encode(&m.registry.gather(), &mut buf)?;
    Ok(Some(buf))
}
