//! Batch proposal: cost-model exploitation plus random exploration.

use crate::state::TuningState;
use schedtune_model::CostModel;
use schedtune_space::{ConfigEntity, ConfigSpace};
use std::collections::HashSet;

/// Spaces at or below this size are enumerated instead of rejection-sampled
/// when drawing unvisited candidates.
const ENUMERATE_THRESHOLD: u64 = 8192;

#[derive(Debug, Clone)]
pub struct PolicyOptions {
    /// Candidates proposed per round.
    pub batch_size: usize,
    /// Fraction of the batch filled from the cost model's top-ranked
    /// candidates once the model has training data.
    pub exploit_share: f64,
    /// Random pool size the model ranks per round.
    pub candidate_pool: usize,
    /// RNG seed; the whole proposal sequence is deterministic in it.
    pub seed: u64,
}

impl Default for PolicyOptions {
    fn default() -> Self {
        Self {
            batch_size: 8,
            exploit_share: 0.5,
            candidate_pool: 64,
            seed: 0,
        }
    }
}

/// Proposes candidate batches, never re-proposing a measured index. When the
/// exploitation and exploration draws collide, the exploitation draw wins
/// and exploration redraws.
pub struct SearchPolicy {
    opts: PolicyOptions,
    rng: fastrand::Rng,
}

impl SearchPolicy {
    pub fn new(opts: PolicyOptions) -> Self {
        let rng = fastrand::Rng::with_seed(opts.seed);
        Self { opts, rng }
    }

    /// Propose the next batch, at most `budget_left` candidates. Empty when
    /// the space is fully measured.
    pub fn propose(
        &mut self,
        space: &ConfigSpace,
        model: &dyn CostModel,
        state: &TuningState,
        budget_left: usize,
    ) -> Vec<ConfigEntity> {
        let unvisited = space.size().saturating_sub(state.visited.len() as u64);
        let want = self
            .opts
            .batch_size
            .min(budget_left)
            .min(unvisited.min(usize::MAX as u64) as usize);
        if want == 0 {
            return Vec::new();
        }

        let mut chosen: Vec<u64> = Vec::with_capacity(want);
        let mut taken: HashSet<u64> = HashSet::new();

        // Exploitation: rank a random pool of unvisited points, keep the top
        // slice. Skipped while the model is cold.
        let n_exploit = if model.num_samples() > 0 {
            ((want as f64) * self.opts.exploit_share).round() as usize
        } else {
            0
        };
        if n_exploit > 0 {
            let pool =
                self.draw_unvisited(space, &state.visited, &taken, self.opts.candidate_pool);
            let entities: Vec<ConfigEntity> = pool
                .iter()
                .map(|&i| space.get(i).expect("drawn index in range"))
                .collect();
            let scores = model.predict(space, &entities);
            let mut ranked: Vec<(f64, u64)> =
                scores.into_iter().zip(pool.iter().copied()).collect();
            // Descending score; ascending index keeps ties deterministic.
            ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
            for (_, index) in ranked.into_iter().take(n_exploit.min(want)) {
                if taken.insert(index) {
                    chosen.push(index);
                }
            }
        }

        // Exploration: random unvisited points, redrawn on collision with
        // the exploitation picks.
        let explore = self.draw_unvisited(space, &state.visited, &taken, want - chosen.len());
        for index in explore {
            if taken.insert(index) {
                chosen.push(index);
            }
        }

        chosen
            .into_iter()
            .map(|i| space.get(i).expect("chosen index in range"))
            .collect()
    }

    /// Draw up to `count` distinct indices that are neither visited nor
    /// already taken this round.
    fn draw_unvisited(
        &mut self,
        space: &ConfigSpace,
        visited: &HashSet<u64>,
        taken: &HashSet<u64>,
        count: usize,
    ) -> Vec<u64> {
        let size = space.size();
        if count == 0 {
            return Vec::new();
        }
        if size <= ENUMERATE_THRESHOLD {
            let mut free: Vec<u64> = (0..size)
                .filter(|i| !visited.contains(i) && !taken.contains(i))
                .collect();
            self.rng.shuffle(&mut free);
            free.truncate(count);
            return free;
        }
        // Large space: rejection sampling with a bounded attempt budget.
        let mut out = Vec::with_capacity(count);
        let mut drawn: HashSet<u64> = HashSet::new();
        let mut attempts = 0usize;
        let max_attempts = count.saturating_mul(64).max(1024);
        while out.len() < count && attempts < max_attempts {
            attempts += 1;
            let index = self.rng.u64(0..size);
            if visited.contains(&index) || taken.contains(&index) || !drawn.insert(index) {
                continue;
            }
            out.push(index);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schedtune_model::{CostModel, NearestNeighborModel, UniformModel};
    use schedtune_measure::{MeasureInput, MeasureResult};
    use schedtune_records::Record;
    use schedtune_space::{Target, Task, Workload};
    use std::sync::Arc;

    fn task_10x10() -> Task {
        // 10 x 10 factorable knob pair.
        Task::new(
            Workload {
                name: "demo".into(),
                shape: vec![512, 512],
                dtype: "f32".into(),
            },
            Target::cpu(),
            Arc::new(|_w: &Workload, _t: &Target| {
                ConfigSpace::builder()
                    .split("a", 512) // 10 divisors
                    .split("b", 512)
                    .build()
            }),
        )
    }

    #[test]
    fn test_proposals_unique_and_unvisited() {
        let task = task_10x10();
        let space = task.space();
        assert_eq!(space.size(), 100);

        let mut policy = SearchPolicy::new(PolicyOptions {
            batch_size: 10,
            seed: 7,
            ..PolicyOptions::default()
        });
        let mut state = TuningState::new();
        for i in 0..50 {
            state.visited.insert(i);
        }
        let batch = policy.propose(space, &UniformModel, &state, 100);
        assert_eq!(batch.len(), 10);
        let mut seen = HashSet::new();
        for entity in &batch {
            assert!(!state.visited.contains(&entity.index));
            assert!(seen.insert(entity.index));
        }
    }

    #[test]
    fn test_budget_caps_batch() {
        let task = task_10x10();
        let mut policy = SearchPolicy::new(PolicyOptions::default());
        let state = TuningState::new();
        let batch = policy.propose(task.space(), &UniformModel, &state, 3);
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn test_exhausted_space_proposes_nothing() {
        let task = task_10x10();
        let space = task.space();
        let mut policy = SearchPolicy::new(PolicyOptions::default());
        let mut state = TuningState::new();
        for i in 0..space.size() {
            state.visited.insert(i);
        }
        assert!(policy.propose(space, &UniformModel, &state, 100).is_empty());
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let task = task_10x10();
        let space = task.space();
        let state = TuningState::new();
        let opts = PolicyOptions {
            seed: 99,
            ..PolicyOptions::default()
        };
        let a: Vec<u64> = SearchPolicy::new(opts.clone())
            .propose(space, &UniformModel, &state, 100)
            .iter()
            .map(|e| e.index)
            .collect();
        let b: Vec<u64> = SearchPolicy::new(opts)
            .propose(space, &UniformModel, &state, 100)
            .iter()
            .map(|e| e.index)
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_exploitation_prefers_model_favorites() {
        let task = task_10x10();
        let space = task.space();
        let mut model = NearestNeighborModel::new(1);
        // Teach the model that index 0 is fast and index 99 is slow.
        let mk = |index: u64, mean: f64| {
            Record::new(
                MeasureInput::new(&task, space.get(index).unwrap()),
                MeasureResult::success(vec![mean]),
            )
        };
        model.update(space, &[mk(0, 0.001), mk(99, 5.0)]);

        let mut state = TuningState::new();
        state.visited.insert(0);
        state.visited.insert(99);

        let mut policy = SearchPolicy::new(PolicyOptions {
            batch_size: 10,
            exploit_share: 1.0,
            candidate_pool: 98,
            seed: 3,
        });
        let batch = policy.propose(space, &model, &state, 100);
        // With full exploitation over (almost) the whole space, proposals
        // should cluster near the known-fast corner rather than the slow one.
        let near_fast = batch.iter().filter(|e| e.index < 50).count();
        assert!(near_fast >= batch.len() / 2, "batch: {:?}", batch);
    }
}
