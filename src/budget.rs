//! Component I: budget policy. §4.I.
//!
//! Grounded on `mondrian_coarse.hpp`'s constructor defaults and the size/limit
//! checks inlined at the top of its `extend_block*` / `train_tree` functions.

use crate::arena::tree_base::TreeBase;
use crate::config::{SizeType, TreeManagement};
use crate::types::Index;

/// Per-tree node budget derivation at construction time (§4.I Cobble/Robur).
pub fn node_count_limit_for(
    management: TreeManagement,
    cap_bytes: usize,
    node_size: usize,
    tree_count: usize,
    size_limit: i64,
) -> usize {
    match management {
        TreeManagement::Cobble | TreeManagement::OptimisticCobble => {
            (cap_bytes / node_size.max(1)) / tree_count.max(1)
        }
        TreeManagement::Robur => {
            let raw = if size_limit > 0 {
                size_limit as usize
            } else {
                (cap_bytes / node_size.max(1)) / tree_count.max(1)
            };
            // nearest odd integer, rounding up on ties
            if raw % 2 == 0 {
                raw + 1
            } else {
                raw
            }
        }
        TreeManagement::Phoenix | TreeManagement::PausingPhoenix => {
            if size_limit > 0 {
                size_limit as usize
            } else {
                cap_bytes / node_size.max(1)
            }
        }
    }
}

/// `pause_expansion(tree, node)`: one predicate per regime, consulted once per
/// descent step by the extend engine.
pub struct BudgetPolicy {
    management: TreeManagement,
    size_type: SizeType,
    size_limit: i64,
}

impl BudgetPolicy {
    pub fn new(management: TreeManagement, size_type: SizeType, size_limit: i64) -> Self {
        BudgetPolicy {
            management,
            size_type,
            size_limit,
        }
    }

    /// `remaining_depth` is `lifetime`-derived headroom the caller estimates for
    /// the node being visited; `distance_to_root` is the node's current depth;
    /// `global_available` is the whole-arena free-slot count.
    pub fn pause_expansion<IDX: Index>(
        &self,
        tree: &TreeBase<IDX>,
        remaining_depth: usize,
        distance_to_root: usize,
        global_available: usize,
    ) -> bool {
        // `size_type == Depth` reinterprets a positive `size_limit` as a depth
        // bound rather than a node-count one, on top of whichever management
        // regime is in force.
        if self.size_type == SizeType::Depth
            && self.size_limit > 0
            && distance_to_root + 1 > self.size_limit as usize
        {
            return true;
        }
        match self.management {
            TreeManagement::Cobble => {
                remaining_depth + distance_to_root + 1 > tree.node_count_limit
            }
            TreeManagement::OptimisticCobble => {
                let over_limit = remaining_depth + distance_to_root + 1 > tree.node_count_limit;
                over_limit && global_available < 2
            }
            TreeManagement::Robur => tree.size >= tree.node_count_limit,
            TreeManagement::Phoenix => false,
            TreeManagement::PausingPhoenix => tree.size >= tree.node_count_limit,
        }
    }

    /// Whether, once paused, the extend engine should degrade to a
    /// box-update-only step (Phoenix family) rather than simply refusing.
    pub fn degrades_to_box_update_only(&self) -> bool {
        matches!(
            self.management,
            TreeManagement::Phoenix | TreeManagement::PausingPhoenix
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn robur_rounds_limit_to_nearest_odd() {
        assert_eq!(
            node_count_limit_for(TreeManagement::Robur, 0, 1, 1, 10),
            11
        );
        assert_eq!(
            node_count_limit_for(TreeManagement::Robur, 0, 1, 1, 7),
            7
        );
    }

    #[test]
    fn cobble_divides_capacity_by_tree_count() {
        assert_eq!(
            node_count_limit_for(TreeManagement::Cobble, 600, 20, 10, -1),
            3
        );
    }
}
