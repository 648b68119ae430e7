use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static PERMISSION_CHECKS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static TEMPORARY_GRANT_EVENTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static CLEANUP_SWEEPS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

fn counter(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    match IntCounterVec::new(Opts::new(name, help), labels) {
        Ok(metric) => metric,
        Err(e) => {
            tracing::error!("Failed to create {} metric: {}", name, e);
            panic!("Failed to initialize metrics: {}", e);
        }
    }
}

fn register<C: prometheus::core::Collector + Clone + 'static>(registry: &Registry, name: &str, metric: &C) {
    if let Err(e) = registry.register(Box::new(metric.clone())) {
        tracing::error!("Failed to register {} collector: {}", name, e);
        panic!("Failed to initialize metrics: {}", e);
    }
}

/// Build the registry once. Later calls are no-ops.
pub fn init_metrics() {
    if REGISTRY.get().is_some() {
        return;
    }

    let registry = Registry::new();

    let requests_total = counter(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"],
    );

    let request_duration = match HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        ),
        &["method", "path", "status"],
    ) {
        Ok(metric) => metric,
        Err(e) => {
            tracing::error!("Failed to create http_request_duration_seconds metric: {}", e);
            panic!("Failed to initialize metrics: {}", e);
        }
    };

    let permission_checks = counter(
        "permission_checks_total",
        "Capability checks by outcome",
        &["permission", "outcome"],
    );
    let grant_events = counter(
        "temporary_grant_events_total",
        "Temporary permission lifecycle transitions",
        &["action"],
    );
    let cleanup_sweeps = counter(
        "cleanup_sweeps_total",
        "Rows changed by cleanup sweeps",
        &["kind"],
    );

    register(&registry, "http_requests_total", &requests_total);
    register(&registry, "http_request_duration_seconds", &request_duration);
    register(&registry, "permission_checks_total", &permission_checks);
    register(&registry, "temporary_grant_events_total", &grant_events);
    register(&registry, "cleanup_sweeps_total", &cleanup_sweeps);

    let _ = REGISTRY.set(registry);
    let _ = HTTP_REQUESTS_TOTAL.set(requests_total);
    let _ = HTTP_REQUEST_DURATION_SECONDS.set(request_duration);
    let _ = PERMISSION_CHECKS_TOTAL.set(permission_checks);
    let _ = TEMPORARY_GRANT_EVENTS_TOTAL.set(grant_events);
    let _ = CLEANUP_SWEEPS_TOTAL.set(cleanup_sweeps);
}

pub fn record_permission_check(permission: &str, allowed: bool) {
    if let Some(c) = PERMISSION_CHECKS_TOTAL.get() {
        let outcome = if allowed { "allowed" } else { "denied" };
        c.with_label_values(&[permission, outcome]).inc();
    }
}

pub fn record_grant_event(action: &str) {
    if let Some(c) = TEMPORARY_GRANT_EVENTS_TOTAL.get() {
        c.with_label_values(&[action]).inc();
    }
}

pub fn record_cleanup(kind: &str, rows: u64) {
    if let Some(c) = CLEANUP_SWEEPS_TOTAL.get() {
        c.with_label_values(&[kind]).inc_by(rows);
    }
}

pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let metric_families = registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Metrics output was not UTF-8: {}", e);
            format!("# Failed to encode metrics: {}\n", e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_exposition() {
        init_metrics();
        record_permission_check("view_roles", true);
        record_grant_event("granted");
        record_cleanup("temporary_permissions", 3);

        let text = get_metrics();
        assert!(text.contains("permission_checks_total"));
        assert!(text.contains("temporary_grant_events_total"));
        assert!(text.contains("cleanup_sweeps_total"));
    }
}
