//! Component D: the split sampler. §4.B.
//!
//! Grounded on `mondrian_coarse.hpp`'s excess/dimension sampling inlined in its
//! `extend_block*` functions, and `utils.hpp`'s distribution helpers
//! (`pick_from_distribution`, `turn_array_into_probability`,
//! `rand_exponential`).

use crate::math::RandomSource;

/// Outcome of sampling a Mondrian split time at a node, before the budget/
/// arena-space gate is applied.
#[derive(Debug, Clone, Copy)]
pub struct SplitDraw {
    /// `E ~ Exponential(rate=S)`, or a negative sentinel meaning "no split
    /// attempted" (point was inside the box, `S == 0`).
    pub exponential: f64,
    pub sum_excess: f64,
}

/// Step 1-2 of §4.B: per-dimension excess, summed, then the exponential draw.
pub fn sample_split_time<const F: usize>(
    lower: &[f64; F],
    upper: &[f64; F],
    x: &[f64; F],
    rng: &mut RandomSource,
) -> SplitDraw {
    let mut e_lower = [0.0f64; F];
    let mut e_upper = [0.0f64; F];
    let mut sum = 0.0f64;
    for d in 0..F {
        if x[d].is_nan() {
            continue;
        }
        e_lower[d] = (lower[d] - x[d]).max(0.0);
        e_upper[d] = (x[d] - upper[d]).max(0.0);
        sum += e_lower[d] + e_upper[d];
    }
    if sum == 0.0 {
        SplitDraw {
            exponential: -1.0,
            sum_excess: 0.0,
        }
    } else {
        SplitDraw {
            exponential: rng.exponential(sum),
            sum_excess: sum,
        }
    }
}

/// Whether the split actually fires at this node, per §4.B step 3 (budget and
/// free-slot checks are applied by the caller; this only covers the
/// `parent_tau + E < N.tau` time condition).
pub fn time_condition_met(parent_tau: f64, exponential: f64, node_tau: f64) -> bool {
    exponential >= 0.0 && parent_tau + exponential < node_tau
}

/// Which side of the cut a value falls: `true` = left (`<= split_value`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Result of step 4: the chosen split dimension, value, and which side `x`
/// lands on.
#[derive(Debug, Clone, Copy)]
pub struct ChosenSplit {
    pub dimension: usize,
    pub value: f64,
    pub side_of_x: Side,
}

/// §4.B step 4: choose `d*` proportional to excess, then the split value
/// between `x[d*]` and the nearer face.
pub fn choose_split<const F: usize>(
    lower: &[f64; F],
    upper: &[f64; F],
    x: &[f64; F],
    rng: &mut RandomSource,
) -> ChosenSplit {
    let mut excess = [0.0f64; F];
    let mut sum = 0.0f64;
    for d in 0..F {
        if x[d].is_nan() {
            continue;
        }
        let e = (lower[d] - x[d]).max(0.0) + (x[d] - upper[d]).max(0.0);
        excess[d] = e;
        sum += e;
    }

    let dimension = if sum > 0.0 {
        let mut cumulative = excess;
        crate::math::turn_array_into_probability(&mut cumulative);
        let u = rng.uniform();
        crate::math::pick_from_distribution(&cumulative, u, rng).min(F - 1)
    } else {
        // Tie-break (§4.B): numerical collapse falls back to a uniform choice.
        rng.uniform_index(F)
    };

    let x_d = x[dimension];
    let (lo, hi) = if x_d < lower[dimension] {
        (x_d, lower[dimension])
    } else if x_d > upper[dimension] {
        (upper[dimension], x_d)
    } else {
        (lower[dimension], upper[dimension])
    };
    let value = rng.uniform_range(lo, hi);
    let side_of_x = if x_d <= value { Side::Left } else { Side::Right };

    ChosenSplit {
        dimension,
        value,
        side_of_x,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inside_box_yields_no_split() {
        let mut rng = RandomSource::new(1);
        let lower = [0.0, 0.0];
        let upper = [5.0, 5.0];
        let x = [2.0, 2.0];
        let draw = sample_split_time(&lower, &upper, &x, &mut rng);
        assert_eq!(draw.exponential, -1.0);
        assert!(!time_condition_met(0.0, draw.exponential, 1.0));
    }

    #[test]
    fn outside_box_yields_positive_sum_excess() {
        let mut rng = RandomSource::new(1);
        let lower = [0.0, 0.0];
        let upper = [5.0, 5.0];
        let x = [7.0, 2.0];
        let draw = sample_split_time(&lower, &upper, &x, &mut rng);
        assert!(draw.sum_excess > 0.0);
        assert!(draw.exponential >= 0.0);
    }
}
