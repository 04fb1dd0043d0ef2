use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use clap::Parser;
use httpsnap::runner::{Runner, RunnerOptions};
use log::debug;
use signal_hook::consts::{SIGINT, SIGTERM};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Fetch and screenshot a list of URLs into an HTML report", long_about = None)]
struct Args {
    /// Input file containing URLs, one per line
    #[arg(short = 'i', long, default_value = "file.txt")]
    input: PathBuf,
    /// Output folder for the report, screenshots and responses
    #[arg(short = 'o', long, default_value = "output")]
    output: PathBuf,
    /// Number of URLs processed concurrently
    #[arg(short = 't', long, default_value_t = 20, value_parser = clap::value_parser!(u32).range(1..))]
    threads: u32,
    /// Delay in milliseconds a worker waits before freeing its slot
    #[arg(long = "rl", default_value_t = 500)]
    rate_limit: u64,
    /// Deadline in seconds for fetching or rendering a single URL
    #[arg(long, default_value_t = 45)]
    timeout: u64,
    /// Only fetch, do not launch a browser
    #[arg(long)]
    skip_screenshots: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();

    if let Ok(env) = std::env::var("RUST_LOG") {
        if env == "debug" {
            println!("{number:/>width$}", number = "", width = 20);
            println!("Debug mode enabled");
            println!("{number:/>width$}", number = "", width = 20);
            println!();
        }
    }

    debug!("Starting with {:#?}", args.clone());

    let options = RunnerOptions::default_builder()
        .input(args.input)
        .output_dir(args.output)
        .concurrency(args.threads as usize)
        .pacing_ms(args.rate_limit)
        .timeout(args.timeout)
        .screenshots(!args.skip_screenshots)
        .build()?;

    let cancel = CancellationToken::new();
    watch_signals(cancel.clone())?;

    let runner = Runner::new(options)?;
    let summary = runner.run(cancel).await?;

    println!(
        "{} urls, {} responded, {} captured",
        summary.results.len(),
        summary.fetched(),
        summary.captured()
    );
    println!("Report generated: {}", summary.report_path.display());

    Ok(())
}

// SIGINT/SIGTERM stop new work; whatever finished still lands in the report.
fn watch_signals(cancel: CancellationToken) -> anyhow::Result<()> {
    let should_terminate = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGTERM, Arc::clone(&should_terminate))?;
    signal_hook::flag::register(SIGINT, Arc::clone(&should_terminate))?;

    tokio::spawn(async move {
        while !should_terminate.load(Ordering::Relaxed) {
            sleep(Duration::from_millis(100)).await;
        }
        debug!("termination requested, cancelling batch");
        cancel.cancel();
    });
    Ok(())
}
