//! The single tagged Node record. §3, §9 ("model Node as a tagged variant with
//! the tag derived from `split_dimension` being a sentinel, not as two distinct
//! record types with dynamic dispatch").
//!
//! Grounded field-for-field on `mondrian_coarse.hpp`'s `MondrianNode` struct.
//! Field layout style (arrays of `A`, optional serde derive) follows kiddo's
//! `StemNode`/`LeafNode`.

use crate::types::Index;

/// A single arena-resident node: leaf and internal fields share one record.
/// `split_dimension.is_none()` marks a leaf, per §9.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node<const F: usize, const L: usize, IDX: Index> {
    /// Splitting feature index, or `IDX::none()` for a leaf.
    pub split_dimension: IDX,
    /// Threshold on `split_dimension`; points with `feature <= split_value` go left.
    pub split_value: f64,

    /// Smallest axis-aligned box enclosing every point that reached this node.
    pub bound_lower: [f64; F],
    pub bound_upper: [f64; F],

    /// Lifetime parameter (split time). Negative means "available" (§3).
    pub tau: f64,

    pub parent: IDX,
    pub child_left: IDX,
    pub child_right: IDX,

    /// Per-label counts; real counts at a leaf, `min(1,left)+min(1,right)` sums
    /// at internal nodes once the counter maintainer has run.
    pub counters: [u32; L],

    /// Incremented when a desired split was denied for lack of arena space.
    pub forced_extend: u32,
    /// Decayed each training point; incremented when a point lands at this leaf.
    pub fading_score: f64,
}

impl<const F: usize, const L: usize, IDX: Index> Node<F, L, IDX> {
    /// A freshly released / never-allocated node: negative tau, all sentinels.
    pub fn empty() -> Self {
        Node {
            split_dimension: IDX::none(),
            split_value: 0.0,
            bound_lower: [0.0; F],
            bound_upper: [0.0; F],
            tau: -1.0,
            parent: IDX::none(),
            child_left: IDX::none(),
            child_right: IDX::none(),
            counters: [0u32; L],
            forced_extend: 0,
            fading_score: 0.0,
        }
    }

    pub fn is_available(&self) -> bool {
        self.tau < 0.0
    }

    pub fn is_leaf(&self) -> bool {
        self.split_dimension.is_none()
    }

    /// Resets a node back to the "available" state (§4.A `release`).
    pub fn release(&mut self) {
        *self = Node::empty();
    }

    /// Initialises a freshly allocated node as a leaf rooted at `tau`, with the
    /// given box and parent.
    pub fn init_leaf(&mut self, tau: f64, parent: IDX, lower: [f64; F], upper: [f64; F]) {
        self.split_dimension = IDX::none();
        self.split_value = 0.0;
        self.bound_lower = lower;
        self.bound_upper = upper;
        self.tau = tau;
        self.parent = parent;
        self.child_left = IDX::none();
        self.child_right = IDX::none();
        self.counters = [0u32; L];
        self.forced_extend = 0;
        self.fading_score = 0.0;
    }

    /// Enlarges the box so that it contains `x` (used by every extend policy's
    /// "enlarge box" step). A `NaN` dimension is treated as "missing" (§6
    /// `generate_full_point`) and left untouched rather than propagated.
    pub fn enlarge_box(&mut self, x: &[f64; F]) {
        for d in 0..F {
            if x[d].is_nan() {
                continue;
            }
            if x[d] < self.bound_lower[d] {
                self.bound_lower[d] = x[d];
            }
            if x[d] > self.bound_upper[d] {
                self.bound_upper[d] = x[d];
            }
        }
    }

    /// Bumps this node's counter for `label` and its fading score (used at
    /// leaves by several extend policies).
    pub fn bump(&mut self, label: usize) {
        if label < L {
            self.counters[label] = self.counters[label].saturating_add(1);
        }
        self.fading_score += 1.0;
    }

    pub fn box_width(&self, d: usize) -> f64 {
        (self.bound_upper[d] - self.bound_lower[d]).max(0.0)
    }

    pub fn total_count(&self) -> u32 {
        self.counters.iter().sum()
    }
}
