//! Distance-weighted nearest-neighbour cost model.
//!
//! Not a gradient-boosted ranker, but the same shape of dependency: it only
//! has to order candidates. Failed trials train in as a worst-case penalty
//! cost so the model steers away from regions that time out or reject.

use crate::CostModel;
use ndarray::Array1;
use schedtune_records::Record;
use schedtune_space::{ConfigEntity, ConfigSpace};

/// Multiplier over the worst observed latency used as the training cost of a
/// failed trial.
const FAILURE_PENALTY: f64 = 4.0;

#[derive(Debug)]
pub struct NearestNeighborModel {
    k: usize,
    features: Vec<Array1<f64>>,
    costs: Vec<f64>,
    worst_seen: f64,
}

impl NearestNeighborModel {
    pub fn new(k: usize) -> Self {
        Self {
            k: k.max(1),
            features: Vec::new(),
            costs: Vec::new(),
            worst_seen: 0.0,
        }
    }
}

impl Default for NearestNeighborModel {
    fn default() -> Self {
        Self::new(5)
    }
}

impl CostModel for NearestNeighborModel {
    fn predict(&self, space: &ConfigSpace, entities: &[ConfigEntity]) -> Vec<f64> {
        if self.features.is_empty() {
            // Cold start: uninformative prior.
            return vec![0.0; entities.len()];
        }
        entities
            .iter()
            .map(|entity| {
                let feat = match space.encode(entity) {
                    Ok(f) => Array1::from_vec(f),
                    Err(e) => {
                        tracing::warn!(error = %e, "entity does not encode in this space");
                        return f64::MIN;
                    }
                };
                // k nearest by Euclidean distance, inverse-distance weighted.
                let mut dists: Vec<(f64, f64)> = self
                    .features
                    .iter()
                    .zip(&self.costs)
                    .map(|(f, &c)| {
                        let d = (&feat - f).mapv(|x| x * x).sum().sqrt();
                        (d, c)
                    })
                    .collect();
                dists.sort_by(|a, b| a.0.total_cmp(&b.0));
                let mut weight_sum = 0.0;
                let mut cost_sum = 0.0;
                for &(d, c) in dists.iter().take(self.k) {
                    let w = 1.0 / (d + 1e-9);
                    weight_sum += w;
                    cost_sum += w * c;
                }
                // Higher score = expected faster.
                -(cost_sum / weight_sum)
            })
            .collect()
    }

    fn update(&mut self, space: &ConfigSpace, records: &[Record]) {
        for record in records {
            if let Some(mean) = record.result.mean_latency() {
                self.worst_seen = self.worst_seen.max(mean);
            }
        }
        for record in records {
            let feat = match space.encode(&record.input.entity) {
                Ok(f) => Array1::from_vec(f),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping record with foreign entity");
                    continue;
                }
            };
            let cost = record.result.mean_latency().unwrap_or_else(|| {
                // Timeouts and other failures learn in as worst-case cost.
                if self.worst_seen > 0.0 {
                    self.worst_seen * FAILURE_PENALTY
                } else {
                    1.0
                }
            });
            self.features.push(feat);
            self.costs.push(cost);
        }
    }

    fn num_samples(&self) -> usize {
        self.features.len()
    }
}
