//! Simulated device backend.
//!
//! An analytical performance model stands in for real hardware: latency is a
//! deterministic function of the workload shape and the chosen knob values,
//! with optional seeded noise. Configurations whose tiles exceed the modeled
//! on-chip buffer fail to build, so the tuner sees genuine infeasible points.
//! Backs the CLI demo and the end-to-end tests.

use crate::builder::{Artifact, BuildError, Builder, Executable};
use crate::result::MeasureInput;
use schedtune_space::{KnobValue, Workload};
use std::time::Duration;

/// Modeled device limits and noise.
#[derive(Debug, Clone)]
pub struct SimDeviceProfile {
    /// On-chip buffer limit in elements; tile_m * tile_n above this is
    /// infeasible.
    pub buffer_elems: usize,
    /// Preferred tile edge; efficiency falls off with distance from it.
    pub sweet_spot: f64,
    /// Relative measurement noise amplitude (0.0 for deterministic runs).
    pub noise: f64,
    /// Noise seed.
    pub seed: u64,
}

impl Default for SimDeviceProfile {
    fn default() -> Self {
        Self {
            buffer_elems: 64 * 64,
            sweet_spot: 5.0, // log2 scale: tiles near 32 are ideal
            noise: 0.0,
            seed: 0,
        }
    }
}

/// Builder for the simulated device.
pub struct SimBuilder {
    profile: SimDeviceProfile,
}

impl SimBuilder {
    pub fn new(profile: SimDeviceProfile) -> Self {
        Self { profile }
    }

    fn tile_product(input: &MeasureInput) -> usize {
        input
            .entity
            .values
            .iter()
            .filter_map(|v| match v {
                KnobValue::Split(f) => Some(*f),
                _ => None,
            })
            .product()
    }
}

impl Builder for SimBuilder {
    fn build(&self, input: &MeasureInput) -> Result<Artifact, BuildError> {
        let tile_elems = Self::tile_product(input);
        if tile_elems > self.profile.buffer_elems {
            return Err(BuildError::Infeasible(format!(
                "tile footprint {} elems exceeds on-chip buffer of {}",
                tile_elems, self.profile.buffer_elems
            )));
        }
        let latency = model_latency(&input.workload, input, &self.profile);
        Ok(Artifact::new(Box::new(SimExecutable {
            latency,
            noise: self.profile.noise,
            rng_seed: self.profile.seed ^ input.entity.index,
        })))
    }
}

/// Analytical latency for one configuration, in seconds.
fn model_latency(workload: &Workload, input: &MeasureInput, profile: &SimDeviceProfile) -> f64 {
    let flops: f64 = 2.0 * workload.shape.iter().map(|&d| d as f64).product::<f64>();
    let base = flops / 50e9; // ~50 GFLOP/s reference machine

    // Each split knob contributes a penalty growing with its log2 distance
    // from the sweet spot; flags give a flat speedup when enabled;
    // permutations prefer identity order (innermost axis contiguous).
    let mut penalty = 1.0;
    for value in &input.entity.values {
        match value {
            KnobValue::Split(f) => {
                let dist = ((*f as f64).max(1.0).log2() - profile.sweet_spot).abs();
                penalty *= 1.0 + 0.35 * dist;
            }
            KnobValue::Flag(enabled) => {
                if *enabled {
                    penalty *= 0.8;
                }
            }
            KnobValue::Permutation(order) => {
                let misorder: usize = order
                    .iter()
                    .enumerate()
                    .filter(|(pos, axis)| pos != *axis)
                    .count();
                penalty *= 1.0 + 0.15 * misorder as f64;
            }
            KnobValue::Choice(_) => {}
        }
    }
    base * penalty
}

struct SimExecutable {
    latency: f64,
    noise: f64,
    rng_seed: u64,
}

impl Executable for SimExecutable {
    fn execute(&self, number: usize) -> Result<Duration, String> {
        let mut total = 0.0;
        if self.noise > 0.0 {
            let mut rng = fastrand::Rng::with_seed(self.rng_seed);
            for _ in 0..number {
                let jitter = 1.0 + self.noise * (rng.f64() * 2.0 - 1.0);
                total += self.latency * jitter;
            }
        } else {
            total = self.latency * number as f64;
        }
        Ok(Duration::from_secs_f64(total))
    }
}

/// The demo search space for a tiled matmul on the simulated device:
/// split factors for each output dimension, a loop-order permutation, and a
/// vectorize toggle.
pub fn matmul_space(
    workload: &Workload,
    _target: &schedtune_space::Target,
) -> schedtune_space::ConfigSpace {
    schedtune_space::ConfigSpace::builder()
        .split("tile_m", workload.shape[0])
        .split("tile_n", workload.shape[1])
        .permutation("loop_order", &["m", "n", "k"])
        .flag("vectorize")
        .build()
}
