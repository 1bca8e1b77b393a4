// src/main.rs
use crate::miner::algorithm::{keccak::Keccak256Algo, kheavyhash::KHeavyHash};
use crate::types::AlgorithmType;
use crate::utils::logging::init_bench_logging;
use clap::Parser;
use kas_miner_rs::{self, *};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::runtime::Runtime;

/// Main entry point for the KAS miner
///
/// # Returns
/// - `Ok(())` on successful execution
/// - `Err(MinerError)` if any operation fails
///
/// # Flow
/// 1. Parses command line arguments
/// 2. Delegates to appropriate subcommand handler
/// 3. Propagates any errors upward
fn main() -> Result<(), MinerError> {
    let cli = cli::Commands::parse();

    match cli.action {
        cli::Action::Start(opts) => start_mining(opts),
        cli::Action::Benchmark(opts) => run_benchmark(opts),
        cli::Action::Config(opts) => generate_config(opts),
    }
}

/// Starts the mining operation with given configuration options
///
/// # Arguments
/// * `opts` - Command line options for mining operation
///
/// # Operations
/// 1. Initializes logging
/// 2. Loads and validates configuration
/// 3. Sets up statistics reporting and the reward ledger
/// 4. Wires the hashing engine and supervisor to the node client
/// 5. Runs the supervisor alongside the price refresher until interrupted
fn start_mining(opts: cli::StartOptions) -> Result<(), MinerError> {
    utils::init_logging();

    let mut config = config::load(&opts.config)?;
    // Apply CLI overrides
    if let Some(workers) = opts.workers {
        config.worker_threads = workers;
    }
    if let Some(algo) = opts.algorithm {
        config.algorithm = algo.to_string();
    }
    if let Some(address) = opts.address {
        config.node.wallet_address = address;
    }
    config.validate()?;

    let algorithm = create_algorithm(&config)?;
    let ledger = Arc::new(rewards::RewardLedger::new(config.reward_config()));

    // Statistics reporting
    let reporter =
        stats::StatsReporter::new(Duration::from_secs(config.stats.report_interval_secs));
    let hash_sender = reporter.hash_sender();
    let submission_sender = reporter.submission_sender();

    // Mining setup
    let engine = miner::HashingEngine::new(algorithm, config.staleness_check_interval)
        .with_hash_counter(hash_sender);
    let connector = network::NodeClient::new(config.node.clone())?;
    let mut supervisor =
        miner::JobSupervisor::new(connector, engine, ledger.clone(), config.supervisor_config())
            .with_submission_feed(submission_sender);

    reporter
        .with_context(ledger.clone(), supervisor.job_snapshot())
        .start_reporting();

    let shutdown = supervisor.shutdown_handle();
    let oracle = rewards::HttpPriceOracle::new(
        &config.rewards.price_url,
        &config.rewards.price_asset_id,
    )?;
    let price_interval = Duration::from_secs(config.rewards.price_poll_secs);

    // Runtime setup
    let rt = Runtime::new()?;
    rt.block_on(async {
        tokio::select! {
            result = supervisor.run() => result,
            _ = rewards::run_price_refresh(oracle, ledger.clone(), price_interval) => Ok(()),
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupt received, shutting down");
                shutdown.store(true, Ordering::SeqCst);
                Ok(())
            }
        }
    })
}

/// Runs hash algorithm benchmarks
///
/// # Arguments
/// * `opts` - Benchmark configuration options
///
/// # Operations
/// 1. Initializes benchmark-specific logging
/// 2. Creates specified algorithm instance
/// 3. Spawns worker threads
/// 4. Collects and reports performance statistics
fn run_benchmark(opts: cli::BenchmarkOptions) -> Result<(), MinerError> {
    init_bench_logging();

    let algorithm = create_bench_algorithm(opts.algorithm)?;
    let reporter = stats::StatsReporter::new(Duration::from_secs(5));
    let hash_sender = reporter.hash_sender();

    log::info!(
        "Starting {} benchmark for {} seconds",
        opts.algorithm,
        opts.duration
    );
    log::logger().flush();

    let start_time = std::time::Instant::now();
    let handles: Vec<_> = (0..opts.threads)
        .map(|_| {
            let algo = algorithm.clone();
            let sender = hash_sender.clone();
            std::thread::spawn(move || {
                let mut nonce = 0;
                let mut last_log = std::time::Instant::now();
                let mut hashes = 0;

                while start_time.elapsed().as_secs() < opts.duration {
                    let _ = algo.hash(&[0u8; 72], nonce);
                    nonce += 1;
                    hashes += 1;
                    sender.send(1).unwrap();

                    // Log progress every second
                    if last_log.elapsed().as_secs() >= 1 {
                        log::debug!(
                            "Thread {:?}: {:.1} H/s",
                            std::thread::current().id(),
                            hashes as f64 / last_log.elapsed().as_secs_f64()
                        );
                        hashes = 0;
                        last_log = std::time::Instant::now();
                    }
                }
            })
        })
        .collect();

    // Wait for all threads to complete
    for handle in handles {
        handle.join().map_err(|_| {
            MinerError::TaskError("Benchmark thread panicked".to_string())
        })?;
    }

    // Report final results
    let stats = reporter.get_stats();
    log::info!("Benchmark results:");
    log::info!("Total hashes: {}", stats.hashes_total);
    log::info!("Average hashrate: {:.2} H/s", stats.avg_hashrate_1m);
    log::logger().flush();

    Ok(())
}

/// Generates configuration template file
///
/// # Arguments
/// * `opts` - Configuration generation options
///
/// # Operations
/// 1. Generates template content
/// 2. Writes template to specified output file
fn generate_config(opts: cli::ConfigOptions) -> Result<(), MinerError> {
    let config = config::generate_template();
    std::fs::write(opts.output, config)?;
    Ok(())
}

/// Creates algorithm instance based on configuration
///
/// # Arguments
/// * `config` - Mining configuration
///
/// # Returns
/// - `Ok(Arc<dyn Algorithm>)` on success
/// - `Err(MinerError)` if algorithm is invalid
fn create_algorithm(config: &config::Config) -> Result<Arc<dyn Algorithm>, MinerError> {
    // Parse string to AlgorithmType
    let algo_type = config
        .algorithm
        .parse()
        .map_err(|_| MinerError::ConfigError(format!("Invalid algorithm: {}", config.algorithm)))?;

    match algo_type {
        AlgorithmType::KHeavyHash => Ok(Arc::new(KHeavyHash::new())),
        AlgorithmType::Keccak256 => Ok(Arc::new(Keccak256Algo::new())),
    }
}

/// Creates algorithm instance for benchmarking
///
/// # Arguments
/// * `algo` - Algorithm type to benchmark
fn create_bench_algorithm(algo: AlgorithmType) -> Result<Arc<dyn Algorithm>, MinerError> {
    match algo {
        AlgorithmType::KHeavyHash => Ok(Arc::new(KHeavyHash::new())),
        AlgorithmType::Keccak256 => Ok(Arc::new(Keccak256Algo::new())),
    }
}
