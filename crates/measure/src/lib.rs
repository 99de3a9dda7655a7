//! Measurement pipeline: compile candidate configurations and time them on a
//! target device.
//!
//! The [`Measurer`](measurer::Measurer) orchestrates a [`Builder`]
//! (parallel, CPU-bound compilation) and a [`Runner`](runner::Runner)
//! (serialized, device-exclusive timing). Per-candidate failures are data -
//! every input yields exactly one [`MeasureResult`], classified by
//! [`FailureKind`]; nothing a single candidate does can abort the session.

pub mod builder;
pub mod measurer;
pub mod result;
pub mod runner;
pub mod sim;

pub use builder::{Artifact, BuildError, Builder, Executable};
pub use measurer::{MeasureOptions, Measurer};
pub use result::{
    FailureKind, LatencySummary, MeasureInput, MeasureOutcome, MeasureResult,
};
pub use runner::{DevicePool, RunOptions, Runner};
