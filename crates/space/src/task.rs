//! Tasks - one tunable workload bound to one target device.

use crate::space::ConfigSpace;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Identity of one compute-intensive workload: name plus shape/dtype
/// parameters. Structurally identical workloads compare equal and share a
/// task.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub name: String,
    pub shape: Vec<usize>,
    pub dtype: String,
}

impl Workload {
    pub fn matmul(m: usize, n: usize, k: usize) -> Self {
        Self {
            name: "matmul".into(),
            shape: vec![m, n, k],
            dtype: "f32".into(),
        }
    }

    pub fn conv2d(n: usize, c: usize, h: usize, w: usize, k: usize, r: usize, s: usize) -> Self {
        Self {
            name: "conv2d".into(),
            shape: vec![n, c, h, w, k, r, s],
            dtype: "f32".into(),
        }
    }

    /// Stable key for log filtering and deduplication.
    pub fn key(&self) -> String {
        let dims: Vec<String> = self.shape.iter().map(|d| d.to_string()).collect();
        format!("{}[{}]{}", self.name, dims.join("x"), self.dtype)
    }
}

/// Kind of target device.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Cpu,
    Gpu,
    Accel,
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceKind::Cpu => write!(f, "cpu"),
            DeviceKind::Gpu => write!(f, "gpu"),
            DeviceKind::Accel => write!(f, "accel"),
        }
    }
}

/// Target descriptor: device kind plus capability flags.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub kind: DeviceKind,
    pub features: Vec<String>,
}

impl Target {
    pub fn cpu() -> Self {
        Self {
            kind: DeviceKind::Cpu,
            features: Vec::new(),
        }
    }

    pub fn gpu() -> Self {
        Self {
            kind: DeviceKind::Gpu,
            features: Vec::new(),
        }
    }

    pub fn with_feature(mut self, feature: &str) -> Self {
        self.features.push(feature.into());
        self
    }

    pub fn key(&self) -> String {
        if self.features.is_empty() {
            self.kind.to_string()
        } else {
            format!("{}+{}", self.kind, self.features.join("+"))
        }
    }
}

/// Derives the config space for a workload on a target. Implementations must
/// be deterministic in (workload, target); the space is derived once and
/// cached on the task.
pub trait SpaceGenerator: Send + Sync {
    fn generate(&self, workload: &Workload, target: &Target) -> ConfigSpace;
}

impl<F> SpaceGenerator for F
where
    F: Fn(&Workload, &Target) -> ConfigSpace + Send + Sync,
{
    fn generate(&self, workload: &Workload, target: &Target) -> ConfigSpace {
        self(workload, target)
    }
}

/// External graph/IR analyzer that enumerates the tunable sub-workloads of a
/// computation graph. The graph representation itself is opaque to the tuner.
pub trait WorkloadAnalyzer {
    fn tunable_workloads(&self) -> Vec<Workload>;
}

/// One workload+target pairing with its own config space, built lazily on
/// first access. Identity is immutable once created.
#[derive(Clone)]
pub struct Task {
    pub workload: Workload,
    pub target: Target,
    generator: Arc<dyn SpaceGenerator>,
    space: OnceCell<ConfigSpace>,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("workload", &self.workload)
            .field("target", &self.target)
            .field("space_built", &self.space.get().is_some())
            .finish()
    }
}

impl Task {
    pub fn new(workload: Workload, target: Target, generator: Arc<dyn SpaceGenerator>) -> Self {
        Self {
            workload,
            target,
            generator,
            space: OnceCell::new(),
        }
    }

    /// Identity string used to match records in a shared log.
    pub fn key(&self) -> String {
        format!("{}@{}", self.workload.key(), self.target.key())
    }

    /// The task's config space, derived on first access.
    pub fn space(&self) -> &ConfigSpace {
        self.space
            .get_or_init(|| self.generator.generate(&self.workload, &self.target))
    }
}

/// Decompose a computation graph into independently tunable tasks, one per
/// structurally distinct workload. Duplicate workloads share a single task.
pub fn extract_tasks(
    analyzer: &dyn WorkloadAnalyzer,
    target: &Target,
    generator: Arc<dyn SpaceGenerator>,
) -> Vec<Task> {
    let mut seen = std::collections::HashSet::new();
    let mut tasks = Vec::new();
    for workload in analyzer.tunable_workloads() {
        if seen.insert(workload.key()) {
            tasks.push(Task::new(workload, target.clone(), Arc::clone(&generator)));
        }
    }
    tasks
}
