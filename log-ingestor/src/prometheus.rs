use prometheus::{IntCounter, IntCounterVec, Registry, TextEncoder, opts};

/// Counters describing ingestion runs, served on `/metrics`.
pub struct PromMetrics {
    pub runs: IntCounterVec,
    pub lines_accepted: IntCounter,
    pub lines_rejected: IntCounterVec,
    pub registry: Registry,
}

impl PromMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let runs = IntCounterVec::new(
            opts!("ingest_runs_total", "Ingestion runs by outcome"),
            &["outcome"],
        )?;
        let lines_accepted = IntCounter::with_opts(opts!(
            "ingest_lines_accepted_total",
            "Lines parsed and committed to the store"
        ))?;
        let lines_rejected = IntCounterVec::new(
            opts!("ingest_lines_rejected_total", "Lines rejected by the parser"),
            &["reason"],
        )?;

        registry.register(Box::new(runs.clone()))?;
        registry.register(Box::new(lines_accepted.clone()))?;
        registry.register(Box::new(lines_rejected.clone()))?;

        Ok(Self {
            runs,
            lines_accepted,
            lines_rejected,
            registry,
        })
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = String::new();
        TextEncoder::new().encode_utf8(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}
