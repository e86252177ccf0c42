use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::ingest::{IngestSummary, Ingestor};

#[derive(Debug, Clone)]
pub struct Schedule {
    pub path: PathBuf,
    pub interval: Duration,
}

/// Fires an ingestion run every `schedule.interval` until `cancel` trips.
///
/// The first fire is one interval after start. A slow run delays the next fire instead of
/// stacking up behind it.
pub fn start(
    ingestor: Arc<Ingestor>,
    schedule: Schedule,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(path = %schedule.path.display(), interval = ?schedule.interval, "scheduler started");
        let mut ticker = interval_at(Instant::now() + schedule.interval, schedule.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    run_once(&ingestor, &schedule.path, &cancel).await;
                }
            }
        }
        info!("scheduler stopped");
    })
}

/// One run whose failure is logged rather than returned, so the caller keeps going.
pub async fn run_once(
    ingestor: &Ingestor,
    path: &Path,
    cancel: &CancellationToken,
) -> Option<IngestSummary> {
    match ingestor.run(path, cancel).await {
        Ok(summary) => Some(summary),
        Err(e) => {
            error!(path = %path.display(), error = %e, "ingestion run failed");
            None
        }
    }
}
