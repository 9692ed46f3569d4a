//! Component F: the posterior engine. §4.F.
//!
//! Grounded on `mondrian_coarse.hpp`'s `compute_posterior_mean`, `predict_tree`
//! and `predict()`. Uses [`crate::math::expm1`] (numerically stable) rather
//! than the original's naive `exp(a)-1`, per the numerical note in SPEC_FULL
//! §4.F.

use crate::arena::Arena;
use crate::math::expm1;
use crate::types::Index;

/// Walks one tree root-to-leaf, returning the smoothed posterior mean vector.
/// An empty tree, or a leaf with no counts, returns the prior (`base_measure`
/// per label) — §4.F edge cases.
pub fn predict_tree<const F: usize, const L: usize, IDX: Index>(
    arena: &Arena<F, L, IDX>,
    tree_idx: usize,
    x: &[f64; F],
    base_measure: f64,
    discount_factor: f64,
) -> [f64; L] {
    let tree = arena.tree(tree_idx);
    if tree.is_empty() {
        return [base_measure; L];
    }

    let mut posterior_means = [base_measure; L];
    let mut smoothed = [0.0f64; L];
    let mut not_sep_yet = 1.0f64;
    let mut parent_tau = 0.0f64;
    let mut current = tree.root;

    loop {
        let n = arena.node(current);
        let delta_tau = (n.tau - parent_tau).max(0.0);

        let mut eta = 0.0f64;
        for d in 0..F {
            eta += (x[d] - n.bound_upper[d]).max(0.0) + (n.bound_lower[d] - x[d]).max(0.0);
        }

        let branch = 1.0 - (-delta_tau * eta).exp();

        let c_sum: f64 = n
            .counters
            .iter()
            .map(|&c| if c > 0 { 1.0 } else { 0.0 })
            .sum();

        if branch > 0.0 && c_sum > 0.0 {
            let gamma = discount_factor;
            let denom = -expm1(-eta * delta_tau);
            let new_node_discount = if denom.abs() > f64::EPSILON {
                (eta / (eta + gamma)) * (-expm1(-(eta + gamma) * delta_tau) / denom)
            } else {
                0.0
            };
            for l in 0..L {
                let c_l = if n.counters[l] > 0 { 1.0 } else { 0.0 };
                smoothed[l] += not_sep_yet
                    * branch
                    * ((c_l - new_node_discount * c_l + c_sum * posterior_means[l]) / c_sum);
            }
        }

        // Mondrian posterior recursion update, in place.
        let node_discount = (-discount_factor * delta_tau).exp();
        let sum_counter: f64 = n.counters.iter().map(|&c| c as f64).sum();
        if sum_counter > 0.0 {
            let sum_tab: f64 = n
                .counters
                .iter()
                .map(|&c| if c > 0 { 1.0 } else { 0.0 })
                .sum();
            for l in 0..L {
                if n.counters[l] > 0 {
                    let tab_l = 1.0f64;
                    posterior_means[l] = (n.counters[l] as f64 - node_discount * tab_l)
                        / sum_counter
                        + node_discount * sum_tab * posterior_means[l] / sum_counter;
                }
            }
        }

        if n.is_leaf() {
            for l in 0..L {
                posterior_means[l] = smoothed[l] + not_sep_yet * (1.0 - branch) * posterior_means[l];
            }
            break;
        }

        not_sep_yet *= 1.0 - branch;
        let go_left = x[n.split_dimension.as_usize()] <= n.split_value;
        parent_tau = n.tau;
        current = if go_left { n.child_left } else { n.child_right };
    }

    posterior_means
}

/// Forest-level prediction: arithmetic mean across trees, argmax label.
/// §4.F: "The forest prediction is the arithmetic mean of each tree's
/// `posterior_means`; the returned label is the argmax."
pub fn predict_forest<const F: usize, const L: usize, IDX: Index>(
    arena: &Arena<F, L, IDX>,
    x: &[f64; F],
    base_measure: f64,
    discount_factor: f64,
) -> (usize, [f64; L]) {
    let tree_count = arena.tree_count().max(1);
    let mut means = [0.0f64; L];
    for t in 0..arena.tree_count() {
        let tree_means = predict_tree(arena, t, x, base_measure, discount_factor);
        for l in 0..L {
            means[l] += tree_means[l];
        }
    }
    for m in means.iter_mut() {
        *m /= tree_count as f64;
    }

    let mut best = 0usize;
    for l in 1..L {
        if means[l] > means[best] {
            best = l;
        }
    }
    (best, means)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::Statistics;

    #[test]
    fn empty_forest_returns_prior() {
        let arena: Arena<4, 2, u32> = Arena::new(60, 10, 6, Statistics::error_rate);
        let (label, scores) = predict_forest(&arena, &[2.0, 2.0, 1.0, 0.0], 0.0001, 0.0);
        assert_eq!(label, 0);
        assert!((scores[0] - 0.0001).abs() < 1e-12);
        assert!((scores[1] - 0.0001).abs() < 1e-12);
    }
}
