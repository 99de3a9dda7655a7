//! Measurer - batch orchestration of builds and runs.

use crate::builder::{Artifact, BuildError, Builder};
use crate::result::{FailureKind, MeasureInput, MeasureResult};
use crate::runner::Runner;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Concurrency settings for the measurer.
#[derive(Debug, Clone)]
pub struct MeasureOptions {
    /// Size of the build worker pool. Builds are CPU work with no shared
    /// hardware resource, so this can exceed 1.
    pub build_parallelism: usize,
}

impl Default for MeasureOptions {
    fn default() -> Self {
        Self {
            build_parallelism: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

/// Dispatches candidate batches through build then run, classifying every
/// outcome. One result per input, in input order, always.
pub struct Measurer {
    builder: Arc<dyn Builder>,
    runner: Runner,
    pool: rayon::ThreadPool,
}

impl Measurer {
    pub fn new(builder: Arc<dyn Builder>, runner: Runner, opts: MeasureOptions) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(opts.build_parallelism.max(1))
            .build()
            .context("failed to create build worker pool")?;
        Ok(Self {
            builder,
            runner,
            pool,
        })
    }

    pub fn runner(&self) -> &Runner {
        &self.runner
    }

    /// Measure a batch of candidates. Builds run on the bounded worker pool;
    /// runs are serialized against the device pool. A build failure for
    /// input `i` short-circuits its run.
    pub fn measure_batch(&self, inputs: &[MeasureInput]) -> Vec<MeasureResult> {
        let builder = Arc::clone(&self.builder);
        let built: Vec<Result<Artifact, BuildError>> = self.pool.install(|| {
            inputs
                .par_iter()
                .map(|input| build_guarded(builder.as_ref(), input))
                .collect()
        });

        built
            .into_iter()
            .zip(inputs)
            .map(|(outcome, input)| match outcome {
                Ok(artifact) => self.runner.run(artifact),
                Err(BuildError::Infeasible(detail)) => {
                    tracing::debug!(config = %input.entity, %detail, "infeasible configuration");
                    MeasureResult::failure(FailureKind::InvalidConfiguration, detail)
                }
                Err(BuildError::Internal(detail)) => {
                    tracing::warn!(config = %input.entity, %detail, "compiler fault");
                    MeasureResult::failure(FailureKind::CompilerFault, detail)
                }
            })
            .collect()
    }
}

/// Run one build, converting a panic inside the external compiler into an
/// internal fault instead of tearing down the session.
fn build_guarded(builder: &dyn Builder, input: &MeasureInput) -> Result<Artifact, BuildError> {
    match catch_unwind(AssertUnwindSafe(|| builder.build(input))) {
        Ok(result) => result,
        Err(panic) => {
            let detail = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "builder panicked".into());
            Err(BuildError::Internal(detail))
        }
    }
}
