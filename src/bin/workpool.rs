use std::process::exit;
use std::time::Duration;

use clap::Parser;
use log::{error, info};

use workpool::demo::{hash_process, increment, random_resources};
use workpool::{PoolConfig, Result, WorkerPool};

const DEFAULT_WORKERS: u32 = 73;
const DEFAULT_RESOURCES: usize = 150;

#[derive(Parser)]
#[command(
    name = "workpool",
    version,
    about = "Hash a batch of random strings on a bounded worker pool"
)]
struct Cli {
    /// Number of workers, also the capacity of both queues
    #[arg(long, default_value_t = DEFAULT_WORKERS, value_name = "N")]
    workers: u32,

    /// Number of random strings to process
    #[arg(long, default_value_t = DEFAULT_RESOURCES, value_name = "COUNT")]
    resources: usize,

    /// Length of each random string
    #[arg(long, default_value_t = 8, value_name = "LEN")]
    length: usize,

    /// Simulated processing time per job, in milliseconds
    #[arg(long, default_value_t = 1000, value_name = "MS")]
    process_delay_ms: u64,

    /// Simulated post-processing time per result, in milliseconds
    #[arg(long, default_value_t = 15, value_name = "MS")]
    post_delay_ms: u64,

    /// Give up on a single call after this many milliseconds
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Seed for generating the strings
    #[arg(long)]
    seed: Option<u64>,

    /// Print a JSON summary to stdout
    #[arg(long)]
    json: bool,
}

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .target(env_logger::Target::Stderr)
        .parse_default_env()
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!("{}", e);
        exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    info!("workpool {}", env!("CARGO_PKG_VERSION"));

    let mut config = PoolConfig::builder().workers(cli.workers);
    if let Some(ms) = cli.timeout_ms {
        config = config.job_timeout(Duration::from_millis(ms));
    }
    let pool = WorkerPool::with_config(config.build())?;

    let resources = random_resources(cli.resources, cli.length, cli.seed);
    let report = pool.begin_work(
        resources,
        hash_process(Duration::from_millis(cli.process_delay_ms)),
        increment(Duration::from_millis(cli.post_delay_ms)),
    )?;

    let summary = report.summary();
    info!(
        "{} jobs, {} succeeded, {} failed",
        summary.jobs, summary.succeeded, summary.failed
    );
    if cli.json {
        println!("{}", serde_json::to_string(&summary)?);
    }

    Ok(())
}
