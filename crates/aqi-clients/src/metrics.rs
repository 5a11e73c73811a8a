//! Thin `metrics` crate wrappers so every client records fetch outcomes
//! the same way.

pub fn record_fetch(source: &'static str, outcome: &'static str) {
    metrics::counter!("aqi_client_fetch_total", "source" => source, "outcome" => outcome)
        .increment(1);
}

pub fn record_fetch_duration(source: &'static str, seconds: f64) {
    metrics::histogram!("aqi_client_fetch_duration_seconds", "source" => source).record(seconds);
}
