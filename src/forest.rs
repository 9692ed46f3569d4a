//! `CoarseMondrianForest`: wires the arena and every engine together behind
//! the public `train`/`predict` surface. §6.
//!
//! Grounded on `mondrian_coarse.hpp`'s `CoarseMondrianForest::train`/`predict`
//! top-level bodies: fading-average bookkeeping, the trim/fade scheduling
//! cadence, the optional `update_posterior_count` skip under ghost-style
//! policies, and `Utils::index_max`-style argmax.

use crate::arena::Arena;
use crate::budget::BudgetPolicy;
use crate::config::{CmfConfig, CounterMaintenance, DontDelete, StatisticsKind};
use crate::counters;
use crate::error::CmfError;
use crate::extend;
use crate::math::RandomSource;
use crate::posterior;
use crate::reshape::{self, DEFAULT_FADE_DECAY};
use crate::statistics::Statistics;
use crate::types::Index;

/// The classifier. `F` is the feature count, `L` the label count, both const
/// generics (kept in sync with `config.feature_count`/`label_count`, validated
/// at construction — see SPEC_FULL §6).
pub struct CoarseMondrianForest<const F: usize, const L: usize, IDX: Index = u32> {
    arena: Arena<F, L, IDX>,
    config: CmfConfig,
    budget: BudgetPolicy,
    rng: RandomSource,
    points_seen: u64,
    /// Running sums feeding `SplitHelper::Avg`'s global-mean barycentre
    /// estimate, faded by `config.fading_count` on every `train()` call. §4.E.
    sum_features: [f64; F],
    count_points: f64,
}

impl<const F: usize, const L: usize, IDX: Index> CoarseMondrianForest<F, L, IDX> {
    /// Builds a forest from an explicit, validated [`CmfConfig`]. §6, §7
    /// `InvalidConfig`.
    pub fn new(config: CmfConfig) -> Result<Self, CmfError> {
        config.validate()?;
        if config.feature_count != F {
            return Err(CmfError::InvalidConfig {
                reason: format!(
                    "feature_count {} does not match const generic F={}",
                    config.feature_count, F
                ),
            });
        }
        if config.label_count != L {
            return Err(CmfError::InvalidConfig {
                reason: format!(
                    "label_count {} does not match const generic L={}",
                    config.label_count, L
                ),
            });
        }

        let node_size = std::mem::size_of::<f64>() * (2 * F + L) + std::mem::size_of::<u32>() * 3;
        let node_count_limit = crate::budget::node_count_limit_for(
            config.tree_management,
            config.cap_bytes,
            node_size,
            config.tree_count,
            config.size_limit,
        );
        let tree_base_size = std::mem::size_of::<f64>() * 2 + std::mem::size_of::<u32>() * 3;
        let capacity_nodes =
            (config.cap_bytes.saturating_sub(config.tree_count * tree_base_size)) / node_size.max(1);
        let capacity_nodes = capacity_nodes.max(config.tree_count);

        let stats_kind = config.statistics;
        let label_count = config.label_count;
        let seed = config.seed;
        let statistics_factory = move || match stats_kind {
            StatisticsKind::ErrorRate => Statistics::error_rate(),
            StatisticsKind::Kappa => Statistics::kappa(label_count),
            StatisticsKind::Reservoir => Statistics::reservoir(256, seed),
        };

        let arena = Arena::new(
            capacity_nodes,
            config.tree_count,
            node_count_limit,
            statistics_factory,
        );
        let budget = BudgetPolicy::new(config.tree_management, config.size_type, config.size_limit);
        let rng = RandomSource::new(config.seed);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            capacity_nodes,
            tree_count = config.tree_count,
            node_count_limit,
            "constructed CoarseMondrianForest"
        );

        let mut forest = CoarseMondrianForest {
            arena,
            config,
            budget,
            rng,
            points_seen: 0,
            sum_features: [0.0; F],
            count_points: 0.0,
        };
        if forest.config.reset_once {
            forest.reset();
        }
        Ok(forest)
    }

    /// Re-initialises every tree to an empty root, without reallocating the
    /// arena. §6 "Added operations".
    pub fn reset(&mut self) {
        for t in 0..self.arena.tree_count() {
            let root = self.arena.tree(t).root;
            if !root.is_none() {
                reshape::tree_delete(&mut self.arena, t);
            }
        }
        self.points_seen = 0;
        self.sum_features = [0.0; F];
        self.count_points = 0.0;
    }

    /// `train(features[F], label) -> bool`. §6.
    pub fn train(&mut self, features: &[f64; F], label: usize) -> bool {
        self.points_seen += 1;
        let mut all_absorbed = true;

        // Fading global running mean, consulted by `SplitHelper::Avg`'s
        // barycentre estimate. Updated once per point, ahead of the per-tree
        // loop, so every tree sees the same estimate for this point.
        let fading = self.config.fading_count;
        for d in 0..F {
            if !features[d].is_nan() {
                self.sum_features[d] = self.sum_features[d] * fading + features[d];
            }
        }
        self.count_points = self.count_points * fading + 1.0;

        if self.config.generate_full_point {
            debug_assert!(
                features.iter().all(|v| !v.is_nan()),
                "generate_full_point requires fully-populated feature vectors"
            );
        }

        for t in 0..self.arena.tree_count() {
            let absorbed = match extend::extend(
                &mut self.arena,
                t,
                features,
                label,
                &self.config,
                &self.budget,
                &mut self.rng,
                &self.sum_features,
                self.count_points,
            ) {
                Ok(v) => v,
                Err(CmfError::OutOfArena { .. }) => false,
                Err(CmfError::DegenerateSplit { .. }) => true,
                Err(_) => false,
            };
            all_absorbed &= absorbed;

            if absorbed && self.config.counter_maintenance == CounterMaintenance::Eager {
                let touched_leaf = self.find_leaf(t, features);
                if let Some(leaf) = touched_leaf {
                    counters::eager_update(&mut self.arena, leaf);
                }
            }

            if absorbed {
                let predicted = self.predict_single_tree(t, features);
                let statistics = &mut self.arena.tree_mut(t).statistics;
                statistics.update(label, predicted);
            }
        }

        reshape::fade_counts_all(&mut self.arena, DEFAULT_FADE_DECAY);
        self.maybe_trim();

        all_absorbed
    }

    fn predict_single_tree(&self, t: usize, x: &[f64; F]) -> usize {
        let means =
            posterior::predict_tree(&self.arena, t, x, self.config.base_measure, self.config.discount_factor);
        let mut best = 0usize;
        for l in 1..L {
            if means[l] > means[best] {
                best = l;
            }
        }
        best
    }

    fn find_leaf(&self, t: usize, x: &[f64; F]) -> Option<IDX> {
        let root = self.arena.tree(t).root;
        if root.is_none() {
            return None;
        }
        let mut current = root;
        loop {
            let n = self.arena.node(current);
            if n.is_leaf() {
                return Some(current);
            }
            current = if x[n.split_dimension.as_usize()] <= n.split_value {
                n.child_left
            } else {
                n.child_right
            };
        }
    }

    fn maybe_trim(&mut self) {
        if self.config.trim_type == crate::config::TrimType::None {
            return;
        }
        // Cadence grounded on the original's periodic trim/fade scheduling in
        // `train()`: every 50 points, attempt a trim on each tree.
        if self.points_seen % 50 != 0 {
            return;
        }
        for t in 0..self.arena.tree_count() {
            let _ = reshape::trim(
                &mut self.arena,
                t,
                self.config.trim_type,
                self.config.maximum_trim_size,
                &mut self.rng,
            );
        }
    }

    /// `predict(features[F], scores[L]?) -> label`. §6.
    pub fn predict(&mut self, features: &[f64; F]) -> (usize, [f64; L]) {
        if self.config.counter_maintenance == CounterMaintenance::Lazy {
            counters::lazy_recompute_all(&mut self.arena);
        }
        posterior::predict_forest(
            &self.arena,
            features,
            self.config.base_measure,
            self.config.discount_factor,
        )
    }

    pub fn node_available(&self) -> usize {
        self.arena.node_available()
    }

    pub fn tree_sizes(&self) -> Vec<usize> {
        (0..self.arena.tree_count())
            .map(|t| self.arena.tree(t).size)
            .collect()
    }

    /// Mean per-tree statistics score across the ensemble. §6.
    pub fn score(&self) -> f64 {
        let n = self.arena.tree_count().max(1);
        let total: f64 = (0..self.arena.tree_count())
            .map(|t| self.arena.tree(t).statistics.score())
            .sum();
        total / n as f64
    }

    /// Adds one tree to the ensemble (§4.H Tree-add, exposed for hosts that
    /// want to grow the ensemble at runtime).
    pub fn tree_add(&mut self) {
        let node_size = std::mem::size_of::<f64>() * (2 * F + L) + std::mem::size_of::<u32>() * 3;
        let node_count_limit = crate::budget::node_count_limit_for(
            self.config.tree_management,
            self.config.cap_bytes,
            node_size,
            self.arena.tree_count() + 1,
            self.config.size_limit,
        );
        let stats = match self.config.statistics {
            StatisticsKind::ErrorRate => Statistics::error_rate(),
            StatisticsKind::Kappa => Statistics::kappa(self.config.label_count),
            StatisticsKind::Reservoir => Statistics::reservoir(256, self.config.seed),
        };
        reshape::tree_add(&mut self.arena, node_count_limit, stats);
    }

    /// Removes a tree from the ensemble (§4.H Tree-delete). A no-op when
    /// `config.dont_delete` is set, per §9's "implementations that silently
    /// accept unknown values violate the contract" — this switch is honoured
    /// rather than merely parsed.
    pub fn tree_delete(&mut self, t: usize) {
        if self.config.dont_delete == DontDelete::DontDelete {
            return;
        }
        reshape::tree_delete(&mut self.arena, t);
    }

    /// Verifies every universal invariant from §8. Exposed for tests and for
    /// hosts that want to assert forest health after a batch of training.
    pub fn check_invariants(&self) -> Result<(), CmfError> {
        self.arena.check_invariants()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CmfConfig;

    fn scenario_config() -> CmfConfig {
        CmfConfig::new(0.6, 0.0001, 0.0, 10, 4, 2, 6000, 1)
    }

    #[test]
    fn scenario_1_empty_prediction() {
        let mut forest: CoarseMondrianForest<4, 2, u32> =
            CoarseMondrianForest::new(scenario_config()).unwrap();
        let (label, scores) = forest.predict(&[2.0, 2.0, 1.0, 0.0]);
        assert_eq!(label, 0);
        assert!((scores[0] - 0.0001).abs() < 1e-9);
        assert!((scores[1] - 0.0001).abs() < 1e-9);
    }

    #[test]
    fn scenario_2_single_class_training_favours_trained_label() {
        let mut forest: CoarseMondrianForest<4, 2, u32> =
            CoarseMondrianForest::new(scenario_config()).unwrap();
        forest.train(&[2.0, 2.0, 1.0, 0.0], 0);
        forest.train(&[1.0, 2.0, 1.0, 0.0], 1);
        let (label, _scores) = forest.predict(&[2.0, 2.0, 1.0, 0.0]);
        assert_eq!(label, 0);
    }

    #[test]
    fn prior_on_empty_holds_for_every_label() {
        let mut forest: CoarseMondrianForest<4, 2, u32> =
            CoarseMondrianForest::new(scenario_config()).unwrap();
        let (_label, scores) = forest.predict(&[0.0, 0.0, 0.0, 0.0]);
        for s in scores {
            assert!((s - 0.0001).abs() < 1e-9);
        }
    }

    #[test]
    fn idempotent_predict() {
        let mut forest: CoarseMondrianForest<4, 2, u32> =
            CoarseMondrianForest::new(scenario_config()).unwrap();
        forest.train(&[2.0, 2.0, 1.0, 0.0], 0);
        let a = forest.predict(&[2.0, 2.0, 1.0, 0.0]);
        let b = forest.predict(&[2.0, 2.0, 1.0, 0.0]);
        assert_eq!(a, b);
    }

    #[test]
    fn no_arena_regression_with_extend_none() {
        let mut config = scenario_config();
        config.extend_type = crate::config::ExtendType::None;
        config.cap_bytes = 600;
        let mut forest: CoarseMondrianForest<4, 2, u32> =
            CoarseMondrianForest::new(config).unwrap();
        forest.train(&[1.0, 1.0, 1.0, 1.0], 0);
        let before = forest.predict(&[1.0, 1.0, 1.0, 1.0]);
        forest.train(&[9.0, 9.0, 9.0, 9.0], 1);
        let after = forest.predict(&[1.0, 1.0, 1.0, 1.0]);
        assert_eq!(before, after);
    }

    #[test]
    fn invariants_hold_after_a_training_stream() {
        let config = CmfConfig::new(1.0, 0.01, 0.1, 5, 3, 3, 20_000, 42);
        let mut forest: CoarseMondrianForest<3, 3, u32> =
            CoarseMondrianForest::new(config).unwrap();
        let mut rng = crate::math::RandomSource::new(99);
        for i in 0..500 {
            let x = [rng.uniform(), rng.uniform(), rng.uniform()];
            forest.train(&x, i % 3);
        }
        forest.check_invariants().unwrap();
        let owned: usize = forest.tree_sizes().iter().sum();
        assert_eq!(forest.node_available() + owned, forest.arena.capacity());
    }
}
