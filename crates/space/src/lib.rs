//! Configuration spaces for schedule autotuning.
//!
//! A [`Task`](task::Task) pairs one tunable workload with one target device
//! and owns a [`ConfigSpace`](space::ConfigSpace): the Cartesian product of a
//! fixed set of [`Knob`](knob::Knob)s, each with a finite domain. Every index
//! in `0..size()` decodes to a structurally valid
//! [`ConfigEntity`](space::ConfigEntity); whether a point actually compiles
//! and fits the device is only discovered at build/measure time.

pub mod knob;
pub mod space;
pub mod task;

pub use knob::{Knob, KnobDomain, KnobValue};
pub use space::{ConfigEntity, ConfigSpace, ConfigSpaceBuilder, SpaceError};
pub use task::{
    extract_tasks, DeviceKind, SpaceGenerator, Target, Task, Workload, WorkloadAnalyzer,
};
