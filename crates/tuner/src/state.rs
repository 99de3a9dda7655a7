//! Per-task session state, rebuildable from the record log.

use schedtune_records::Record;
use std::collections::HashSet;

/// Mutable state for one task's tuning session: trial counter, best record
/// so far, visited config indices, and the improvement stall counter that
/// drives early stopping.
#[derive(Debug, Default)]
pub struct TuningState {
    pub trials: usize,
    pub best: Option<Record>,
    pub visited: HashSet<u64>,
    pub since_improvement: usize,
}

impl TuningState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one completed trial in. Returns whether best-so-far strictly
    /// improved; anything else (including ties) bumps the stall counter.
    pub fn observe(&mut self, record: &Record) -> bool {
        self.trials += 1;
        self.visited.insert(record.input.entity.index);

        let improved = record.result.is_eligible_best()
            && self
                .best
                .as_ref()
                .map_or(true, |current| record.better_than(current));
        if improved {
            self.best = Some(record.clone());
            self.since_improvement = 0;
        } else {
            self.since_improvement += 1;
        }
        improved
    }

    /// Best mean latency seen so far, if any trial succeeded.
    pub fn best_latency(&self) -> Option<f64> {
        self.best.as_ref().and_then(|r| r.result.mean_latency())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schedtune_measure::{FailureKind, MeasureInput, MeasureResult};
    use schedtune_space::{ConfigSpace, Target, Task, Workload};
    use std::sync::Arc;

    fn record(index: u64, result: MeasureResult) -> Record {
        let task = Task::new(
            Workload::matmul(32, 32, 32),
            Target::cpu(),
            Arc::new(|w: &Workload, _t: &Target| {
                ConfigSpace::builder().split("tile", w.shape[0]).build()
            }),
        );
        Record::new(
            MeasureInput::new(&task, task.space().get(index).unwrap()),
            result,
        )
    }

    #[test]
    fn test_best_updates_on_strict_improvement_only() {
        let mut state = TuningState::new();
        assert!(state.observe(&record(0, MeasureResult::success(vec![0.5]))));
        assert!(!state.observe(&record(1, MeasureResult::success(vec![0.5]))));
        assert!(state.observe(&record(2, MeasureResult::success(vec![0.4]))));
        assert_eq!(state.best_latency(), Some(0.4));
        assert_eq!(state.trials, 3);
    }

    #[test]
    fn test_failures_never_become_best() {
        let mut state = TuningState::new();
        assert!(!state.observe(&record(
            0,
            MeasureResult::failure(FailureKind::Timeout, "hung")
        )));
        assert!(state.best.is_none());
        assert_eq!(state.since_improvement, 1);
    }

    #[test]
    fn test_stall_counter_resets_on_improvement() {
        let mut state = TuningState::new();
        state.observe(&record(0, MeasureResult::success(vec![0.9])));
        state.observe(&record(1, MeasureResult::success(vec![1.9])));
        state.observe(&record(2, MeasureResult::success(vec![1.5])));
        assert_eq!(state.since_improvement, 2);
        state.observe(&record(3, MeasureResult::success(vec![0.1])));
        assert_eq!(state.since_improvement, 0);
    }

    #[test]
    fn test_visited_tracks_indices() {
        let mut state = TuningState::new();
        state.observe(&record(3, MeasureResult::success(vec![1.0])));
        state.observe(&record(3, MeasureResult::success(vec![1.0])));
        assert_eq!(state.visited.len(), 1);
        assert!(state.visited.contains(&3));
    }
}
