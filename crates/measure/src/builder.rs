//! Builder - compiles a (task, config) pair into a runnable artifact.

use crate::result::MeasureInput;
use std::time::Duration;
use thiserror::Error;

/// Build failures. Infeasible configurations are expected and frequent;
/// internal faults are surfaced as warnings. Neither aborts the session.
#[derive(Debug, Clone, Error)]
pub enum BuildError {
    #[error("infeasible configuration: {0}")]
    Infeasible(String),
    #[error("internal compiler fault: {0}")]
    Internal(String),
}

/// Handle to one compiled schedule, ready to execute on the device. The
/// actual execution contract is opaque: `execute(number)` runs the artifact
/// `number` times back to back and reports the total wall time.
pub trait Executable: Send {
    fn execute(&self, number: usize) -> Result<Duration, String>;

    /// Invalidate warm cache state before a repetition. No-op by default;
    /// backends that can flush override this.
    fn flush_cache(&self) {}
}

/// A built artifact. Thin wrapper so the runner owns a concrete type.
pub struct Artifact {
    exe: Box<dyn Executable>,
}

impl Artifact {
    pub fn new(exe: Box<dyn Executable>) -> Self {
        Self { exe }
    }

    pub fn executable(&self) -> &dyn Executable {
        self.exe.as_ref()
    }
}

/// Compiles a measure input into an artifact by delegating to the external
/// schedule compiler.
///
/// Implementations must be stateless across calls (no shared mutable state),
/// so builds for many candidates can run concurrently on a worker pool.
pub trait Builder: Send + Sync {
    fn build(&self, input: &MeasureInput) -> Result<Artifact, BuildError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ConstantExe(Duration);

    impl Executable for ConstantExe {
        fn execute(&self, number: usize) -> Result<Duration, String> {
            Ok(self.0 * number as u32)
        }
    }

    #[test]
    fn test_executable_scales_with_number() {
        let artifact = Artifact::new(Box::new(ConstantExe(Duration::from_millis(2))));
        let elapsed = artifact.executable().execute(5).unwrap();
        assert_eq!(elapsed, Duration::from_millis(10));
    }

    #[test]
    fn test_build_error_display() {
        let err = BuildError::Infeasible("tile exceeds shared memory".into());
        assert!(err.to_string().contains("infeasible"));
    }
}
