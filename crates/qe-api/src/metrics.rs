//! Prometheus collectors for the query pipeline
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use qe_core::QueryOutput;
use serde_json::Value;
use std::time::Duration;

pub struct Metrics {
    registry: Registry,
    requests: IntCounterVec,
    cache_hits: IntCounter,
    fallbacks: IntCounter,
    processing: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("qe_requests_total", "Query requests by final status"),
            &["status"],
        )?;
        let cache_hits = IntCounter::new("qe_cache_hits_total", "Requests served from the result cache")?;
        let fallbacks = IntCounter::new("qe_fallback_total", "Requests answered with fallback rows")?;
        let processing = Histogram::with_opts(HistogramOpts::new(
            "qe_processing_seconds",
            "End-to-end pipeline processing time",
        ))?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(cache_hits.clone()))?;
        registry.register(Box::new(fallbacks.clone()))?;
        registry.register(Box::new(processing.clone()))?;

        Ok(Self {
            registry,
            requests,
            cache_hits,
            fallbacks,
            processing,
        })
    }

    /// Record one processed request
    pub fn observe(&self, output: &QueryOutput, elapsed: Duration) {
        let flag = |key: &str| output.metadata.get(key) == Some(&Value::Bool(true));

        self.requests
            .with_label_values(&[output.status().unwrap_or("unknown")])
            .inc();
        if flag("cache_hit") {
            self.cache_hits.inc();
        }
        if flag("fallback_used") {
            self.fallbacks.inc();
        }
        self.processing.observe(elapsed.as_secs_f64());
    }

    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}
