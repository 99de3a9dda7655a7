//! Durable trial history.
//!
//! Every trial is persisted as one [`Record`] - the pairing of a
//! [`MeasureInput`](schedtune_measure::MeasureInput) with its
//! [`MeasureResult`](schedtune_measure::MeasureResult) - appended to a
//! newline-delimited JSON log. The log is the single source of truth for
//! resuming a search and for offline best-config queries; records are never
//! mutated or deleted.

pub mod record;
pub mod store;

pub use record::{Record, RECORD_VERSION};
pub use store::{best, load_task, read_all, RecordStore, StoreError};
