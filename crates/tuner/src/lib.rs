//! Search policy and tuning loop.
//!
//! One [`Tuner`] owns the per-task mutable state for a session: the
//! [`TuningState`], the cost model, and the seeded [`SearchPolicy`]. Nothing
//! is process-global; a session is constructed explicitly, and its state can
//! always be rebuilt from the record log.

pub mod observer;
pub mod policy;
pub mod state;
pub mod tuner;

pub use observer::{ProgressLogger, TuneObserver};
pub use policy::{PolicyOptions, SearchPolicy};
pub use state::TuningState;
pub use tuner::{TuneOptions, Tuner, TunerStatus};
