//! `TreeBase`: one per-tree record, packed at the arena's tail region. §3.
//!
//! Grounded on `mondrian_coarse.hpp`'s `TreeBase` struct and the
//! `average_tree_size`/`tree_depth` helpers that read it.

use crate::statistics::Statistics;
use crate::types::Index;

/// Per-tree bookkeeping record: root pointer, node budget, size, and the
/// pluggable statistics scorer.
#[derive(Debug, Clone)]
pub struct TreeBase<IDX: Index> {
    /// Root node index, or `IDX::none()` for an empty tree.
    pub root: IDX,
    /// Policy-imposed maximum node count for this tree.
    pub node_count_limit: usize,
    /// Current node count owned by this tree.
    pub size: usize,
    /// Pluggable scorer (error-rate / kappa / reservoir-sampling accuracy).
    pub statistics: Statistics,
    /// Fading aggregate of this tree's marginal contribution to ensemble loss.
    pub sum_contribution: f64,
    pub count_contribution: f64,
}

impl<IDX: Index> TreeBase<IDX> {
    pub fn new(node_count_limit: usize, statistics: Statistics) -> Self {
        TreeBase {
            root: IDX::none(),
            node_count_limit,
            size: 0,
            statistics,
            sum_contribution: 0.0,
            count_contribution: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Resets this tree to empty, keeping its node budget and statistics
    /// configuration. Used by `reset()` and by `tree_reset`-style cycles under
    /// Pausing-Phoenix.
    pub fn reset(&mut self) {
        self.root = IDX::none();
        self.size = 0;
        self.sum_contribution = 0.0;
        self.count_contribution = 0.0;
        self.statistics.reset();
    }
}
