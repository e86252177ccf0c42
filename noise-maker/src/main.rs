mod args;
mod generator;
mod stream;

use args::CliArgs;
use clap::Parser;
use stream::run_log_stream;
use tokio::signal;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> std::io::Result<()> {
    let args = CliArgs::parse();
    println!(
        "Writing logs to {} at {} lines/sec",
        args.log_file().display(),
        args.rate()
    );

    let stream = run_log_stream(
        args.log_file(),
        *args.rate(),
        *args.batch_size(),
        *args.count(),
        *args.malformed_ratio(),
    );

    tokio::select! {
        written = stream => {
            println!("Wrote {} lines", written?);
        }
        _ = signal::ctrl_c() => {
            println!("\nStopping log generation...");
        }
    }
    Ok(())
}
