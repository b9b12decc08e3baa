//! Prometheus collectors for the gateway, all under the `wa_gateway` namespace.
//!
//! Besides per-route HTTP traffic the registry tracks the session lifecycle:
//! the current state as a gauge, automatic reconnects, credential wipes by
//! cause and outbound messages by result.

use once_cell::sync::Lazy;
use prometheus::{
    core::Collector, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    Opts, Registry, TextEncoder,
};

const NAMESPACE: &str = "wa_gateway";

pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// HTTP request counter - tracks total requests by method, path, and status code
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests").namespace(NAMESPACE),
        &["method", "path", "status"],
    )
    .expect("Failed to create HTTP_REQUESTS_TOTAL metric")
});

/// HTTP request latency histogram - tracks request duration in seconds
pub static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];
    HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        )
        .namespace(NAMESPACE)
        .buckets(buckets),
        &["method", "path"],
    )
    .expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric")
});

/// Session state: 0 disconnected, 1 connecting, 2 pairing required, 3 connected
pub static SESSION_STATE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new("session_state", "Current session lifecycle state").namespace(NAMESPACE),
    )
    .expect("Failed to create SESSION_STATE metric")
});

/// Reconnect attempts started by the supervisor
pub static RECONNECT_ATTEMPTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new("reconnect_attempts_total", "Automatic reconnect attempts").namespace(NAMESPACE),
    )
    .expect("Failed to create RECONNECT_ATTEMPTS_TOTAL metric")
});

/// Credential wipes, labelled by cause ("logged_out", "retries_exhausted", "cleared")
pub static CREDENTIAL_WIPES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("credential_wipes_total", "Credential store wipes").namespace(NAMESPACE),
        &["cause"],
    )
    .expect("Failed to create CREDENTIAL_WIPES_TOTAL metric")
});

/// Outbound text messages by result ("sent", "not_connected", "not_found", "failed")
pub static MESSAGES_SENT_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("messages_sent_total", "Outbound text messages").namespace(NAMESPACE),
        &["result"],
    )
    .expect("Failed to create MESSAGES_SENT_TOTAL metric")
});

fn register_metrics(registry: &Registry) {
    let collectors: [Box<dyn Collector>; 6] = [
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()),
        Box::new(SESSION_STATE.clone()),
        Box::new(RECONNECT_ATTEMPTS_TOTAL.clone()),
        Box::new(CREDENTIAL_WIPES_TOTAL.clone()),
        Box::new(MESSAGES_SENT_TOTAL.clone()),
    ];
    for collector in collectors {
        registry
            .register(collector)
            .expect("Gateway metric registered twice");
    }
}

/// Text exposition of every registered collector.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration_secs);
}

pub fn set_session_state(value: i64) {
    SESSION_STATE.set(value);
}

pub fn record_reconnect_attempt() {
    RECONNECT_ATTEMPTS_TOTAL.inc();
}

pub fn record_credential_wipe(cause: &str) {
    CREDENTIAL_WIPES_TOTAL.with_label_values(&[cause]).inc();
}

pub fn record_message(result: &str) {
    MESSAGES_SENT_TOTAL.with_label_values(&[result]).inc();
}
