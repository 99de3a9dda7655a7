//! Session orchestration: glue one task, the simulated device, and the
//! tuning loop together.

use anyhow::Result;
use schedtune_measure::sim::{matmul_space, SimBuilder, SimDeviceProfile};
use schedtune_measure::{DevicePool, MeasureOptions, Measurer, RunOptions, Runner};
use schedtune_model::NearestNeighborModel;
use schedtune_records::{Record, RecordStore};
use schedtune_space::{Target, Task, Workload};
use schedtune_tuner::{PolicyOptions, ProgressLogger, TuneOptions, Tuner, TunerStatus};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub trials: usize,
    pub early_stopping: usize,
    pub batch_size: usize,
    pub seed: u64,
    pub repeat: usize,
    pub number: usize,
    pub min_repeat_ms: u64,
    pub timeout_ms: u64,
    pub flush_cache: bool,
    pub noise: f64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            trials: 128,
            early_stopping: 64,
            batch_size: 8,
            seed: 0,
            repeat: 3,
            number: 4,
            min_repeat_ms: 20,
            timeout_ms: 10_000,
            flush_cache: false,
            noise: 0.0,
        }
    }
}

/// The demo task tuned by the CLI.
pub fn demo_matmul_task(m: usize, n: usize, k: usize) -> Task {
    Task::new(Workload::matmul(m, n, k), Target::cpu(), Arc::new(matmul_space))
}

/// One runnable tuning session: tuner + measurer + open record store.
pub struct TuningSession {
    tuner: Tuner,
    measurer: Measurer,
    store: RecordStore,
}

impl TuningSession {
    /// Build a session for the demo matmul, resuming from `log` if it
    /// already holds records for this task.
    pub fn for_demo_matmul(
        m: usize,
        n: usize,
        k: usize,
        log: &Path,
        options: SessionOptions,
    ) -> Result<Self> {
        let task = demo_matmul_task(m, n, k);
        let builder = Arc::new(SimBuilder::new(SimDeviceProfile {
            noise: options.noise,
            seed: options.seed,
            ..SimDeviceProfile::default()
        }));
        let runner = Runner::new(
            DevicePool::single("sim0"),
            RunOptions {
                repeat: options.repeat,
                number: options.number,
                min_repeat_ms: options.min_repeat_ms,
                timeout: Duration::from_millis(options.timeout_ms),
                flush_cache: options.flush_cache,
            },
        );
        let measurer = Measurer::new(builder, runner, MeasureOptions::default())?;

        let tune_opts = TuneOptions {
            trials: options.trials,
            early_stopping: options.early_stopping,
            policy: PolicyOptions {
                batch_size: options.batch_size,
                seed: options.seed,
                ..PolicyOptions::default()
            },
            repropose_mismatch: false,
        };
        let model = Box::new(NearestNeighborModel::default());
        let tuner = if log.exists() {
            Tuner::resume(task, model, tune_opts, log)?
        } else {
            Tuner::new(task, model, tune_opts)
        };
        let store = RecordStore::open(log)?;

        Ok(Self {
            tuner,
            measurer,
            store,
        })
    }

    pub fn run(&mut self) -> Result<TunerStatus> {
        let mut progress = ProgressLogger::new();
        self.tuner
            .tune(&self.measurer, &mut self.store, &mut [&mut progress])
    }

    pub fn best(&self) -> Option<&Record> {
        self.tuner.best()
    }

    pub fn task(&self) -> &Task {
        self.tuner.task()
    }
}
