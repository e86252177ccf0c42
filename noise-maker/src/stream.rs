use std::path::Path;

use crate::generator::{generate_combined_log, generate_malformed_log};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tokio::{
    fs::OpenOptions,
    io::AsyncWriteExt,
    time::{Duration, sleep},
};

const MAX_RATE_BEFORE_DISABLING_THROTTLING: u64 = 10_000;

/// Appends generated lines to `log_file` in batches until `count` lines are written, or forever.
pub async fn run_log_stream(
    log_file: &Path,
    rate: u64,
    batch_size: usize,
    count: Option<u64>,
    malformed_ratio: f64,
) -> std::io::Result<u64> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .await?;

    let mut rng = StdRng::from_os_rng();
    let batch_size = batch_size.max(1);
    let malformed_ratio = malformed_ratio.clamp(0.0, 1.0);
    let delay = if rate < MAX_RATE_BEFORE_DISABLING_THROTTLING {
        Some(Duration::from_secs_f64(batch_size as f64 / rate as f64))
    } else {
        None
    };

    let mut written = 0u64;
    loop {
        let remaining = count.map_or(batch_size as u64, |c| c - written);
        let lines = remaining.min(batch_size as u64);
        if lines == 0 {
            break;
        }
        let mut buffer = String::with_capacity(batch_size * 160);
        for _ in 0..lines {
            let log_line = if rng.random_bool(malformed_ratio) {
                generate_malformed_log(&mut rng)
            } else {
                generate_combined_log(&mut rng)
            };
            buffer.push_str(&log_line);
            buffer.push('\n');
        }
        file.write_all(buffer.as_bytes()).await?;
        file.flush().await?;
        written += lines;

        if count.is_some_and(|c| written >= c) {
            break;
        }
        if let Some(d) = delay {
            sleep(d).await;
        }
    }
    Ok(written)
}
