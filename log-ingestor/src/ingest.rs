use std::{path::Path, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tryhard::{RetryFutureConfig, retry_fn};

use crate::{
    error::{IngestError, ParseError, StoreError},
    models::LogRecord,
    parser::parse_line,
    prometheus::PromMetrics,
    store::RecordSink,
};

/// A line the parser refused, numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedLine {
    pub line_number: usize,
    pub error: ParseError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub accepted: usize,
    pub rejected: Vec<RejectedLine>,
}

impl IngestSummary {
    pub fn total_lines(&self) -> usize {
        self.accepted + self.rejected.len()
    }
}

/// Bounded exponential backoff for a rejected batch write.
#[derive(Debug, Clone, Copy)]
pub struct StoreRetry {
    pub retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for StoreRetry {
    fn default() -> Self {
        Self {
            retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

/// Reads an access log, parses every line, and writes the good ones as one batch.
///
/// Runs are serialized: a second `run` waits until the first has returned.
pub struct Ingestor {
    sink: Arc<dyn RecordSink>,
    metrics: Arc<PromMetrics>,
    retry: StoreRetry,
    run_lock: Mutex<()>,
}

impl Ingestor {
    pub fn new(sink: Arc<dyn RecordSink>, metrics: Arc<PromMetrics>, retry: StoreRetry) -> Self {
        Self {
            sink,
            metrics,
            retry,
            run_lock: Mutex::new(()),
        }
    }

    pub async fn run(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<IngestSummary, IngestError> {
        let _guard = self.run_lock.lock().await;
        let result = self.run_exclusive(path, cancel).await;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.outcome(),
        };
        self.metrics.runs.with_label_values(&[outcome]).inc();
        result
    }

    async fn run_exclusive(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<IngestSummary, IngestError> {
        if cancel.is_cancelled() {
            return Err(IngestError::Cancelled);
        }
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| IngestError::FileUnavailable {
                path: path.to_path_buf(),
                source,
            })?;
        let text = String::from_utf8_lossy(&bytes);

        let mut batch = Vec::new();
        let mut rejected = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if cancel.is_cancelled() {
                return Err(IngestError::Cancelled);
            }
            match parse_line(line) {
                Ok(record) => batch.push(record),
                Err(error) => {
                    let line_number = index + 1;
                    warn!(path = %path.display(), line_number, %error, "rejected log line");
                    self.metrics
                        .lines_rejected
                        .with_label_values(&[error.kind()])
                        .inc();
                    rejected.push(RejectedLine { line_number, error });
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(IngestError::Cancelled);
        }
        let accepted = if batch.is_empty() {
            0
        } else {
            self.write_batch(batch)
                .await
                .map_err(IngestError::StoreWriteFailed)?
        };
        self.metrics.lines_accepted.inc_by(accepted as u64);

        let summary = IngestSummary { accepted, rejected };
        info!(
            path = %path.display(),
            lines = summary.total_lines(),
            accepted,
            rejected = summary.rejected.len(),
            "ingestion run complete"
        );
        Ok(summary)
    }

    // Every attempt is a whole transaction, so a retry never duplicates rows.
    async fn write_batch(&self, batch: Vec<LogRecord>) -> Result<usize, StoreError> {
        let batch = Arc::new(batch);
        let config = RetryFutureConfig::new(self.retry.retries)
            .exponential_backoff(self.retry.base_delay)
            .max_delay(self.retry.max_delay)
            .on_retry(|attempt: u32, next_delay: Option<Duration>, error: &StoreError| {
                let error = error.to_string();
                async move {
                    warn!(attempt, ?next_delay, %error, "batch write failed, retrying");
                }
            });
        retry_fn(|| {
            let sink = self.sink.clone();
            let batch = batch.clone();
            async move {
                let written =
                    tokio::task::spawn_blocking(move || sink.insert_batch(&batch)).await??;
                Ok::<_, StoreError>(written)
            }
        })
        .with_config(config)
        .await
    }
}
