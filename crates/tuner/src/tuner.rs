//! The per-task tuning loop.
//!
//! State machine per session:
//! `Initializing -> Proposing -> AwaitingMeasurement -> Updating ->
//! (Proposing | EarlyStopped | Exhausted)`. Terminal states are final; a new
//! session resumes from the record log instead.

use crate::observer::TuneObserver;
use crate::policy::{PolicyOptions, SearchPolicy};
use crate::state::TuningState;
use anyhow::{Context, Result};
use schedtune_measure::{FailureKind, MeasureInput, Measurer};
use schedtune_model::CostModel;
use schedtune_records::{Record, RecordStore};
use schedtune_space::Task;
use std::path::Path;

/// Why a session terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunerStatus {
    /// Trial budget spent (capped at the space size).
    Exhausted,
    /// No strict improvement within the early-stopping window.
    EarlyStopped,
}

#[derive(Debug, Clone)]
pub struct TuneOptions {
    /// Trial budget for this session; effective budget is
    /// `min(trials, space.size())`.
    pub trials: usize,
    /// Stop after this many consecutive trials without strict improvement.
    pub early_stopping: usize,
    pub policy: PolicyOptions,
    /// Whether a `ResultMismatch` config from a previous session may be
    /// re-proposed after resume.
    pub repropose_mismatch: bool,
}

impl Default for TuneOptions {
    fn default() -> Self {
        Self {
            trials: 128,
            early_stopping: 64,
            policy: PolicyOptions::default(),
            repropose_mismatch: false,
        }
    }
}

/// Owns one task's search: policy, cost model, and state. No hidden
/// process-global state; everything lives here and in the record log.
pub struct Tuner {
    task: Task,
    model: Box<dyn CostModel>,
    policy: SearchPolicy,
    state: TuningState,
    opts: TuneOptions,
}

impl Tuner {
    pub fn new(task: Task, model: Box<dyn CostModel>, opts: TuneOptions) -> Self {
        let policy = SearchPolicy::new(opts.policy.clone());
        Self {
            task,
            model,
            policy,
            state: TuningState::new(),
            opts,
        }
    }

    /// Initialize a session from prior history in `log`, replaying each
    /// proposal round against its recorded results. The policy RNG, cost
    /// model, and state end up exactly where an uninterrupted session with
    /// the same seed would be, so continuing is deterministic.
    pub fn resume(
        task: Task,
        model: Box<dyn CostModel>,
        opts: TuneOptions,
        log: impl AsRef<Path>,
    ) -> Result<Self> {
        let records = schedtune_records::load_task(&log, &task.key())
            .context("failed to read record log for resume")?;
        let mut tuner = Self::new(task, model, opts);

        let batch = tuner.opts.policy.batch_size.max(1);
        let budget = tuner.effective_budget();
        for chunk in records.chunks(batch) {
            // Advance the RNG exactly as the original round did.
            let _ = tuner.policy.propose(
                tuner.task.space(),
                tuner.model.as_ref(),
                &tuner.state,
                budget.saturating_sub(tuner.state.trials),
            );
            for record in chunk {
                tuner.state.observe(record);
            }
            tuner.model.update(tuner.task.space(), chunk);
        }

        if tuner.opts.repropose_mismatch {
            for record in &records {
                if record.result.failure_kind() == Some(FailureKind::ResultMismatch) {
                    tuner.state.visited.remove(&record.input.entity.index);
                }
            }
        }

        tracing::info!(
            task = %tuner.task.key(),
            resumed_trials = tuner.state.trials,
            best_ms = tuner.state.best_latency().map(|l| l * 1e3),
            "session resumed from log"
        );
        Ok(tuner)
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn state(&self) -> &TuningState {
        &self.state
    }

    pub fn best(&self) -> Option<&Record> {
        self.state.best.as_ref()
    }

    fn effective_budget(&self) -> usize {
        let space = self.task.space().size();
        self.opts.trials.min(space.min(usize::MAX as u64) as usize)
    }

    /// Run the search until the budget is spent or the early-stopping window
    /// closes. Appends every trial to `store`; storage failures are fatal,
    /// per-trial failures are not.
    pub fn tune(
        &mut self,
        measurer: &Measurer,
        store: &mut RecordStore,
        observers: &mut [&mut dyn TuneObserver],
    ) -> Result<TunerStatus> {
        let budget = self.effective_budget();
        tracing::debug!(task = %self.task.key(), budget, "session initialized");

        loop {
            if self.state.trials >= budget {
                tracing::info!(task = %self.task.key(), trials = self.state.trials, "budget exhausted");
                return Ok(TunerStatus::Exhausted);
            }
            if self.state.since_improvement >= self.opts.early_stopping {
                tracing::info!(
                    task = %self.task.key(),
                    stalled = self.state.since_improvement,
                    "early stopping"
                );
                return Ok(TunerStatus::EarlyStopped);
            }

            // Proposing.
            let batch = self.policy.propose(
                self.task.space(),
                self.model.as_ref(),
                &self.state,
                budget - self.state.trials,
            );
            if batch.is_empty() {
                tracing::info!(task = %self.task.key(), "config space fully measured");
                return Ok(TunerStatus::Exhausted);
            }

            // AwaitingMeasurement.
            let inputs: Vec<MeasureInput> = batch
                .into_iter()
                .map(|entity| MeasureInput::new(&self.task, entity))
                .collect();
            let results = measurer.measure_batch(&inputs);

            // Updating.
            let mut round = Vec::with_capacity(inputs.len());
            for (input, result) in inputs.into_iter().zip(results) {
                let record = Record::new(input, result);
                store
                    .append(&record)
                    .context("failed to append trial record")?;
                self.state.observe(&record);
                for observer in observers.iter_mut() {
                    observer.on_trial_complete(&record);
                }
                round.push(record);
            }
            self.model.update(self.task.space(), &round);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schedtune_measure::sim::{matmul_space, SimBuilder, SimDeviceProfile};
    use schedtune_measure::{
        Artifact, BuildError, Builder, DevicePool, Executable, MeasureOptions, RunOptions, Runner,
    };
    use schedtune_model::NearestNeighborModel;
    use schedtune_space::{Target, Task, Workload};
    use std::sync::Arc;

    fn sim_task() -> Task {
        Task::new(
            Workload::matmul(256, 256, 256),
            Target::cpu(),
            Arc::new(matmul_space),
        )
    }

    fn sim_measurer(builder: Arc<dyn Builder>) -> Measurer {
        let runner = Runner::new(
            DevicePool::single("sim0"),
            RunOptions {
                repeat: 2,
                number: 1,
                min_repeat_ms: 0,
                ..RunOptions::default()
            },
        );
        Measurer::new(builder, runner, MeasureOptions { build_parallelism: 2 }).unwrap()
    }

    fn opts(trials: usize, seed: u64) -> TuneOptions {
        TuneOptions {
            trials,
            early_stopping: 10_000,
            policy: PolicyOptions {
                batch_size: 5,
                seed,
                ..PolicyOptions::default()
            },
            repropose_mismatch: false,
        }
    }

    #[test]
    fn test_best_is_monotone_within_session() {
        struct BestTracker {
            history: Vec<Option<f64>>,
            best: Option<f64>,
        }
        impl TuneObserver for BestTracker {
            fn on_trial_complete(&mut self, record: &Record) {
                if let Some(mean) = record.result.mean_latency() {
                    if self.best.map_or(true, |b| mean < b) {
                        self.best = Some(mean);
                    }
                }
                self.history.push(self.best);
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let mut store = RecordStore::open(dir.path().join("log.jsonl")).unwrap();
        let measurer = sim_measurer(Arc::new(SimBuilder::new(SimDeviceProfile::default())));
        let mut tuner = Tuner::new(
            sim_task(),
            Box::new(NearestNeighborModel::default()),
            opts(20, 11),
        );
        let mut tracker = BestTracker {
            history: Vec::new(),
            best: None,
        };
        tuner
            .tune(&measurer, &mut store, &mut [&mut tracker])
            .unwrap();

        let mut last = f64::INFINITY;
        for best in tracker.history.iter().flatten() {
            assert!(*best <= last);
            last = *best;
        }
    }

    #[test]
    fn test_early_stopping_window() {
        // Every config measures identically, so only the very first trial
        // improves the best; ties do not reset the stall counter.
        struct FlatExe;
        impl Executable for FlatExe {
            fn execute(&self, number: usize) -> Result<std::time::Duration, String> {
                Ok(std::time::Duration::from_micros(100) * number as u32)
            }
        }
        struct FlatBuilder;
        impl Builder for FlatBuilder {
            fn build(&self, _input: &MeasureInput) -> Result<Artifact, BuildError> {
                Ok(Artifact::new(Box::new(FlatExe)))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let mut store = RecordStore::open(dir.path().join("log.jsonl")).unwrap();
        let measurer = sim_measurer(Arc::new(FlatBuilder));
        let mut tuner = Tuner::new(
            sim_task(),
            Box::new(NearestNeighborModel::default()),
            TuneOptions {
                trials: 10_000,
                early_stopping: 15,
                policy: PolicyOptions {
                    batch_size: 5,
                    seed: 2,
                    ..PolicyOptions::default()
                },
                repropose_mismatch: false,
            },
        );
        let status = tuner.tune(&measurer, &mut store, &mut []).unwrap();
        assert_eq!(status, TunerStatus::EarlyStopped);
        // Stall counter crosses 15 during the fourth 5-trial round.
        assert_eq!(tuner.state().trials, 20);
    }

    #[test]
    fn test_all_infeasible_space_yields_no_best() {
        struct NeverBuilds;
        impl Builder for NeverBuilds {
            fn build(&self, _input: &MeasureInput) -> Result<Artifact, BuildError> {
                Err(BuildError::Infeasible("always rejected".into()))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("log.jsonl");
        let mut store = RecordStore::open(&log).unwrap();
        let measurer = sim_measurer(Arc::new(NeverBuilds));
        let task = sim_task();
        let mut tuner = Tuner::new(
            task.clone(),
            Box::new(NearestNeighborModel::default()),
            opts(10, 5),
        );
        let status = tuner.tune(&measurer, &mut store, &mut []).unwrap();
        assert_eq!(status, TunerStatus::Exhausted);
        assert!(tuner.best().is_none());
        assert!(matches!(
            schedtune_records::best(&log, &task.key()),
            Err(schedtune_records::StoreError::NoSuccessfulTrial { .. })
        ));
    }

    #[test]
    fn test_resume_matches_uninterrupted_run() {
        let builder: Arc<dyn Builder> =
            Arc::new(SimBuilder::new(SimDeviceProfile::default()));
        let seed = 42;

        // Uninterrupted: 10 trials in one session.
        let dir_a = tempfile::tempdir().unwrap();
        let mut store_a = RecordStore::open(dir_a.path().join("log.jsonl")).unwrap();
        let measurer = sim_measurer(Arc::clone(&builder));
        let mut uninterrupted = Tuner::new(
            sim_task(),
            Box::new(NearestNeighborModel::default()),
            opts(10, seed),
        );
        uninterrupted.tune(&measurer, &mut store_a, &mut []).unwrap();

        // Interrupted: 5 trials, then resume for 5 more against one log.
        let dir_b = tempfile::tempdir().unwrap();
        let log_b = dir_b.path().join("log.jsonl");
        let mut store_b = RecordStore::open(&log_b).unwrap();
        let mut first_half = Tuner::new(
            sim_task(),
            Box::new(NearestNeighborModel::default()),
            opts(5, seed),
        );
        first_half.tune(&measurer, &mut store_b, &mut []).unwrap();
        drop(first_half);

        let mut second_half = Tuner::resume(
            sim_task(),
            Box::new(NearestNeighborModel::default()),
            opts(10, seed),
            &log_b,
        )
        .unwrap();
        assert_eq!(second_half.state().trials, 5);
        second_half.tune(&measurer, &mut store_b, &mut []).unwrap();

        let best_a = uninterrupted.best().expect("run A found a best");
        let best_b = second_half.best().expect("run B found a best");
        assert_eq!(best_a.input.entity.index, best_b.input.entity.index);
        assert_eq!(
            best_a.result.mean_latency(),
            best_b.result.mean_latency()
        );

        // The split log holds exactly the 10 trials of the single run.
        let records: Vec<Record> = schedtune_records::read_all(&log_b)
            .unwrap()
            .collect();
        assert_eq!(records.len(), 10);
    }
}
