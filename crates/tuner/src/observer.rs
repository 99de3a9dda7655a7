//! Trial-completion observers, decoupled from the search loop.

use schedtune_records::Record;

/// Invoked after every Updating step with the completed trial's record.
/// Progress reporting, custom logging, and live dashboards hang off this
/// instead of being woven into the loop.
pub trait TuneObserver {
    fn on_trial_complete(&mut self, record: &Record);
}

/// Structured-log progress reporter. Failed trials are reported as
/// zero-score attempts rather than hidden.
#[derive(Debug, Default)]
pub struct ProgressLogger {
    trials: usize,
    best_latency: Option<f64>,
}

impl ProgressLogger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TuneObserver for ProgressLogger {
    fn on_trial_complete(&mut self, record: &Record) {
        self.trials += 1;
        match record.result.mean_latency() {
            Some(mean) => {
                let improved = self.best_latency.map_or(true, |b| mean < b);
                if improved {
                    self.best_latency = Some(mean);
                }
                tracing::info!(
                    trial = self.trials,
                    config = record.input.entity.index,
                    latency_ms = mean * 1e3,
                    best_ms = self.best_latency.unwrap_or(mean) * 1e3,
                    improved,
                    "trial complete"
                );
            }
            None => {
                let kind = record
                    .result
                    .failure_kind()
                    .map(|k| k.to_string())
                    .unwrap_or_default();
                tracing::info!(
                    trial = self.trials,
                    config = record.input.entity.index,
                    score = 0.0,
                    failure = %kind,
                    "trial failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schedtune_measure::{FailureKind, MeasureInput, MeasureResult};
    use schedtune_space::{ConfigSpace, Target, Task, Workload};
    use std::sync::Arc;

    struct Collector(Vec<u64>);

    impl TuneObserver for Collector {
        fn on_trial_complete(&mut self, record: &Record) {
            self.0.push(record.input.entity.index);
        }
    }

    #[test]
    fn test_observer_sees_every_trial() {
        let task = Task::new(
            Workload::matmul(16, 16, 16),
            Target::cpu(),
            Arc::new(|w: &Workload, _t: &Target| {
                ConfigSpace::builder().split("tile", w.shape[0]).build()
            }),
        );
        let mut collector = Collector(Vec::new());
        for (i, result) in [
            MeasureResult::success(vec![1.0]),
            MeasureResult::failure(FailureKind::Timeout, "hung"),
        ]
        .into_iter()
        .enumerate()
        {
            let record = Record::new(
                MeasureInput::new(&task, task.space().get(i as u64).unwrap()),
                result,
            );
            collector.on_trial_complete(&record);
        }
        assert_eq!(collector.0, vec![0, 1]);
    }
}
