//! Measurement inputs, outcomes, and the failure taxonomy.

use schedtune_space::{ConfigEntity, Target, Task, Workload};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// The unit of work submitted to the measurer: one config entity for one
/// task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeasureInput {
    pub workload: Workload,
    pub target: Target,
    pub entity: ConfigEntity,
}

impl MeasureInput {
    pub fn new(task: &Task, entity: ConfigEntity) -> Self {
        Self {
            workload: task.workload.clone(),
            target: task.target.clone(),
            entity,
        }
    }

    /// Task identity this input belongs to, matching [`Task::key`].
    pub fn task_key(&self) -> String {
        format!("{}@{}", self.workload.key(), self.target.key())
    }
}

/// Why a trial produced no usable latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Build rejected the point as structurally infeasible. Expected and
    /// frequent.
    InvalidConfiguration,
    /// Build raised an unexpected internal error.
    CompilerFault,
    /// Run exceeded the per-trial budget.
    Timeout,
    /// Device/driver error during the run.
    RuntimeFault,
    /// Output failed the correctness check; the config is excluded from
    /// "best" even if fast.
    ResultMismatch,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::InvalidConfiguration => write!(f, "invalid-configuration"),
            FailureKind::CompilerFault => write!(f, "compiler-fault"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RuntimeFault => write!(f, "runtime-fault"),
            FailureKind::ResultMismatch => write!(f, "result-mismatch"),
        }
    }
}

/// Per-repetition latency samples (seconds) with derived summary statistics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LatencySummary {
    pub samples: Vec<f64>,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
}

impl LatencySummary {
    pub fn from_samples(samples: Vec<f64>) -> Self {
        assert!(!samples.is_empty(), "latency summary needs samples");
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;

        let mut sorted = samples.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let median = if sorted.len() % 2 == 1 {
            sorted[sorted.len() / 2]
        } else {
            (sorted[sorted.len() / 2 - 1] + sorted[sorted.len() / 2]) / 2.0
        };

        Self {
            samples,
            mean,
            median,
            std_dev: variance.sqrt(),
        }
    }
}

/// Outcome of one trial: usable latency statistics or a classified failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status")]
pub enum MeasureOutcome {
    Success { latency: LatencySummary },
    Failure { kind: FailureKind, detail: String },
}

/// Outcome plus the wall-clock timestamp it was produced at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeasureResult {
    pub outcome: MeasureOutcome,
    pub timestamp_ms: u64,
}

impl MeasureResult {
    pub fn success(samples: Vec<f64>) -> Self {
        Self {
            outcome: MeasureOutcome::Success {
                latency: LatencySummary::from_samples(samples),
            },
            timestamp_ms: now_ms(),
        }
    }

    pub fn failure(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            outcome: MeasureOutcome::Failure {
                kind,
                detail: detail.into(),
            },
            timestamp_ms: now_ms(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, MeasureOutcome::Success { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.outcome {
            MeasureOutcome::Failure { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Mean latency in seconds, if the trial succeeded.
    pub fn mean_latency(&self) -> Option<f64> {
        match &self.outcome {
            MeasureOutcome::Success { latency } => Some(latency.mean),
            _ => None,
        }
    }

    /// Whether this result qualifies for "best config" selection: a success
    /// that passed any correctness check.
    pub fn is_eligible_best(&self) -> bool {
        self.is_success()
    }

    /// Total order over results: a success with lower mean latency beats any
    /// other success; any success beats any failure; ties break toward the
    /// earlier timestamp.
    pub fn better_than(&self, other: &MeasureResult) -> bool {
        match (self.mean_latency(), other.mean_latency()) {
            (Some(a), Some(b)) => {
                if a != b {
                    a < b
                } else {
                    self.timestamp_ms < other.timestamp_ms
                }
            }
            (Some(_), None) => true,
            _ => false,
        }
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
