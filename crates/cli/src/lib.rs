//! Command-line surface for schedtune.
//!
//! The demo workload is a tiled matmul tuned against the simulated device in
//! [`schedtune_measure::sim`]; everything else (spaces, measurement, cost
//! model, search, record log) is the real pipeline.

pub mod session;

use anyhow::Result;
use clap::{Parser, Subcommand};
use session::{SessionOptions, TuningSession};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "schedtune", about = "Measurement-guided schedule auto-tuner")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Tune a demo matmul workload on the simulated device.
    Tune {
        #[arg(long, default_value_t = 256)]
        m: usize,
        #[arg(long, default_value_t = 256)]
        n: usize,
        #[arg(long, default_value_t = 256)]
        k: usize,
        /// Trial budget for this session.
        #[arg(long, default_value_t = 128)]
        trials: usize,
        /// Early-stopping window (consecutive trials without improvement).
        #[arg(long, default_value_t = 64)]
        early_stopping: usize,
        #[arg(long, default_value_t = 8)]
        batch_size: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Record log to append to (and resume from, if it exists).
        #[arg(long, default_value = "schedtune.jsonl")]
        log: PathBuf,
        #[arg(long, default_value_t = 3)]
        repeat: usize,
        #[arg(long, default_value_t = 4)]
        number: usize,
        #[arg(long, default_value_t = 20)]
        min_repeat_ms: u64,
        #[arg(long, default_value_t = 10_000)]
        timeout_ms: u64,
        /// Flush cache state before each repetition.
        #[arg(long, default_value_t = false)]
        flush_cache: bool,
        /// Simulated measurement noise amplitude (0 = deterministic).
        #[arg(long, default_value_t = 0.0)]
        noise: f64,
    },
    /// Print the best recorded configuration for a demo workload.
    Best {
        #[arg(long, default_value_t = 256)]
        m: usize,
        #[arg(long, default_value_t = 256)]
        n: usize,
        #[arg(long, default_value_t = 256)]
        k: usize,
        #[arg(long, default_value = "schedtune.jsonl")]
        log: PathBuf,
    },
    /// Summarize trial outcomes per task in a record log.
    Stats {
        #[arg(long, default_value = "schedtune.jsonl")]
        log: PathBuf,
    },
}

pub fn run_cli(cli: Cli) -> Result<()> {
    tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    match cli.command {
        Command::Tune {
            m,
            n,
            k,
            trials,
            early_stopping,
            batch_size,
            seed,
            log,
            repeat,
            number,
            min_repeat_ms,
            timeout_ms,
            flush_cache,
            noise,
        } => {
            let options = SessionOptions {
                trials,
                early_stopping,
                batch_size,
                seed,
                repeat,
                number,
                min_repeat_ms,
                timeout_ms,
                flush_cache,
                noise,
            };
            let mut session = TuningSession::for_demo_matmul(m, n, k, &log, options)?;
            let status = session.run()?;
            tracing::info!(?status, "session finished");

            match session.best() {
                Some(record) => {
                    println!("best config: {}", record.input.entity);
                    if let Some(mean) = record.result.mean_latency() {
                        println!("mean latency: {:.3} ms", mean * 1e3);
                    }
                }
                None => println!("no successful trial this session"),
            }
        }
        Command::Best { m, n, k, log } => {
            let task = session::demo_matmul_task(m, n, k);
            let record = schedtune_records::best(&log, &task.key())?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Stats { log } => {
            let mut per_task: BTreeMap<String, (usize, usize)> = BTreeMap::new();
            for record in schedtune_records::read_all(&log)? {
                let entry = per_task.entry(record.task_key()).or_default();
                entry.0 += 1;
                if record.result.is_success() {
                    entry.1 += 1;
                }
            }
            for (task, (trials, successes)) in per_task {
                println!(
                    "{}: {} trials, {} ok, {} failed",
                    task,
                    trials,
                    successes,
                    trials - successes
                );
            }
        }
    }
    Ok(())
}
