//! One durable trial entry.

use schedtune_measure::{MeasureInput, MeasureResult};
use serde::{Deserialize, Serialize};

/// Log format version, bumped on incompatible schema changes so old logs
/// remain detectable.
pub const RECORD_VERSION: u32 = 1;

/// The durable pairing of one trial's input and result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    #[serde(default = "default_version")]
    pub version: u32,
    pub input: MeasureInput,
    pub result: MeasureResult,
}

fn default_version() -> u32 {
    RECORD_VERSION
}

impl Record {
    pub fn new(input: MeasureInput, result: MeasureResult) -> Self {
        Self {
            version: RECORD_VERSION,
            input,
            result,
        }
    }

    pub fn task_key(&self) -> String {
        self.input.task_key()
    }

    /// Lexicographic order over (success, mean latency, timestamp); see
    /// [`MeasureResult::better_than`].
    pub fn better_than(&self, other: &Record) -> bool {
        self.result.better_than(&other.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schedtune_measure::MeasureResult;
    use schedtune_space::{ConfigSpace, Target, Task, Workload};
    use std::sync::Arc;

    fn record(index: u64, result: MeasureResult) -> Record {
        let task = Task::new(
            Workload::matmul(4, 4, 4),
            Target::cpu(),
            Arc::new(|w: &Workload, _t: &Target| {
                ConfigSpace::builder().split("tile_m", w.shape[0]).build()
            }),
        );
        let entity = task.space().get(index).unwrap();
        Record::new(MeasureInput::new(&task, entity), result)
    }

    #[test]
    fn test_record_roundtrip() {
        let rec = record(1, MeasureResult::success(vec![0.5, 0.6]));
        let line = serde_json::to_string(&rec).unwrap();
        assert!(!line.contains('\n'));
        let parsed: Record = serde_json::from_str(&line).unwrap();
        assert_eq!(rec, parsed);
    }

    #[test]
    fn test_version_defaults_when_missing() {
        let rec = record(0, MeasureResult::success(vec![1.0]));
        let mut value: serde_json::Value = serde_json::to_value(&rec).unwrap();
        value.as_object_mut().unwrap().remove("version");
        let parsed: Record = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.version, RECORD_VERSION);
    }

    #[test]
    fn test_better_than_delegates_to_result() {
        let fast = record(0, MeasureResult::success(vec![0.1]));
        let slow = record(1, MeasureResult::success(vec![0.9]));
        assert!(fast.better_than(&slow));
    }
}
