//! Cost models - learned predictors that rank unmeasured configurations.
//!
//! The search policy depends only on [`CostModel::predict`] and
//! [`CostModel::update`], so any regression or ranking backend can be
//! substituted. Features are exactly
//! [`ConfigSpace::encode`](schedtune_space::ConfigSpace::encode), keeping the
//! model agnostic to any one task's transformation vocabulary.

pub mod knn;

pub use knn::NearestNeighborModel;

use schedtune_records::Record;
use schedtune_space::{ConfigEntity, ConfigSpace};

/// A predictor trained on (config, measurement) history.
///
/// Scores only need to order candidates consistently with which would
/// measure faster - higher score means expected faster. Prediction must be
/// usable before any training data exists; cold models return an
/// uninformative prior so the policy falls back to pure exploration.
pub trait CostModel: Send {
    fn predict(&self, space: &ConfigSpace, entities: &[ConfigEntity]) -> Vec<f64>;

    /// Fold a batch of new trial records into the model.
    fn update(&mut self, space: &ConfigSpace, records: &[Record]);

    /// Number of training samples absorbed so far.
    fn num_samples(&self) -> usize;
}

/// Uninformative prior: every candidate scores the same. The cold-start
/// model, and a useful baseline for pure random search.
#[derive(Debug, Default)]
pub struct UniformModel;

impl CostModel for UniformModel {
    fn predict(&self, _space: &ConfigSpace, entities: &[ConfigEntity]) -> Vec<f64> {
        vec![0.0; entities.len()]
    }

    fn update(&mut self, _space: &ConfigSpace, _records: &[Record]) {}

    fn num_samples(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schedtune_space::ConfigSpace;

    #[test]
    fn test_uniform_model_is_flat() {
        let space = ConfigSpace::builder().split("tile", 16).build();
        let entities: Vec<ConfigEntity> =
            (0..space.size()).map(|i| space.get(i).unwrap()).collect();
        let scores = UniformModel.predict(&space, &entities);
        assert_eq!(scores.len(), entities.len());
        assert!(scores.iter().all(|&s| s == 0.0));
    }
}
