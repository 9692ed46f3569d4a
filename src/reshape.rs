//! Component H: the reshape engine. §4.H.
//!
//! Grounded on `mondrian_coarse.hpp`'s `tree_trim`, `cut_block`, `split_leaf`,
//! `tree_chop`/`trees_chop`, `tree_add`, `tree_delete`, `tree_fade_counts`.
//! All operations here allocate (where needed) before performing any
//! destructive rewiring, per §4.H's idempotence requirement.

use crate::arena::Arena;
use crate::config::TrimType;
use crate::error::CmfError;
use crate::math::RandomSource;
use crate::statistics::Statistics;
use crate::types::Index;

/// Collects every leaf index in a tree via an iterative (stack-based) walk.
fn collect_leaves<const F: usize, const L: usize, IDX: Index>(
    arena: &Arena<F, L, IDX>,
    root: IDX,
) -> Vec<IDX> {
    let mut leaves = Vec::new();
    let mut stack = vec![root];
    while let Some(idx) = stack.pop() {
        if idx.is_none() {
            continue;
        }
        let n = arena.node(idx);
        if n.is_leaf() {
            leaves.push(idx);
        } else {
            stack.push(n.child_left);
            stack.push(n.child_right);
        }
    }
    leaves
}

/// Picks a leaf to trim per the configured [`TrimType`], refusing (returning
/// `None`) when the best candidate exceeds `maximum_trim_size` of the tree's
/// total leaf mass.
fn pick_trim_target<const F: usize, const L: usize, IDX: Index>(
    arena: &Arena<F, L, IDX>,
    leaves: &[IDX],
    trim_type: TrimType,
    maximum_trim_size: f64,
    rng: &mut RandomSource,
) -> Option<IDX> {
    if leaves.is_empty() {
        return None;
    }
    let total_mass: f64 = leaves
        .iter()
        .map(|&l| arena.node(l).total_count() as f64)
        .sum();

    let candidate = match trim_type {
        TrimType::None => return None,
        TrimType::Random => leaves[rng.uniform_index(leaves.len())],
        TrimType::Fading => *leaves
            .iter()
            .min_by(|a, b| {
                arena.node(**a)
                    .fading_score
                    .partial_cmp(&arena.node(**b).fading_score)
                    .unwrap()
            })
            .unwrap(),
        TrimType::Count => *leaves
            .iter()
            .min_by_key(|&&l| arena.node(l).total_count())
            .unwrap(),
    };

    if total_mass > 0.0 {
        let mass = arena.node(candidate).total_count() as f64;
        if mass / total_mass > maximum_trim_size {
            return None;
        }
    }
    Some(candidate)
}

/// `cut_block`: replace the leaf's parent with the leaf's sibling, release
/// both the leaf and its former parent. Frees exactly two slots.
fn cut_block<const F: usize, const L: usize, IDX: Index>(
    arena: &mut Arena<F, L, IDX>,
    tree_idx: usize,
    leaf: IDX,
) -> Result<(), CmfError> {
    let parent = arena.node(leaf).parent;
    if parent.is_none() {
        // Trimming the sole root node would empty the tree; refuse rather
        // than violate "every non-available node belongs to exactly one tree".
        return Ok(());
    }
    let (left, right) = {
        let p = arena.node(parent);
        (p.child_left, p.child_right)
    };
    let sibling = if left == leaf { right } else { left };
    let grandparent = arena.node(parent).parent;

    arena.node_mut(sibling).parent = grandparent;
    if grandparent.is_none() {
        arena.tree_mut(tree_idx).root = sibling;
    } else {
        let g = arena.node_mut(grandparent);
        if g.child_left == parent {
            g.child_left = sibling;
        } else {
            g.child_right = sibling;
        }
    }

    arena.release(leaf);
    arena.release(parent);
    arena.tree_mut(tree_idx).size = arena.tree(tree_idx).size.saturating_sub(2);
    Ok(())
}

/// **Trim(tree)**: picks a leaf per `trim_type`, then `cut_block`s it.
/// Returns `true` if a trim was performed.
pub fn trim<const F: usize, const L: usize, IDX: Index>(
    arena: &mut Arena<F, L, IDX>,
    tree_idx: usize,
    trim_type: TrimType,
    maximum_trim_size: f64,
    rng: &mut RandomSource,
) -> Result<bool, CmfError> {
    let root = arena.tree(tree_idx).root;
    if root.is_none() {
        return Ok(false);
    }
    let leaves = collect_leaves(arena, root);
    let target = pick_trim_target(arena, &leaves, trim_type, maximum_trim_size, rng);
    match target {
        Some(leaf) => {
            cut_block(arena, tree_idx, leaf)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// **Split-leaf(L)**: splits a leaf on the dimension with the largest box
/// width, value chosen uniformly, apportioning its counters by that fraction.
/// Consumes two slots.
pub fn split_leaf<const F: usize, const L: usize, IDX: Index>(
    arena: &mut Arena<F, L, IDX>,
    tree_idx: usize,
    leaf: IDX,
    lifetime: f64,
    rng: &mut RandomSource,
) -> Result<(), CmfError> {
    let (lower, upper, counters) = {
        let n = arena.node(leaf);
        (n.bound_lower, n.bound_upper, n.counters)
    };

    let mut dimension = 0usize;
    let mut best_width = -1.0f64;
    for d in 0..F {
        let w = upper[d] - lower[d];
        if w > best_width {
            best_width = w;
            dimension = d;
        }
    }
    if best_width <= 0.0 {
        return Err(CmfError::DegenerateSplit {
            node: leaf.as_usize(),
        });
    }
    let value = rng.uniform_range(lower[dimension], upper[dimension]);
    let fraction_left = (value - lower[dimension]) / (upper[dimension] - lower[dimension]);

    let left_idx = arena.allocate().ok_or(CmfError::OutOfArena {
        node: leaf.as_usize(),
    })?;
    let right_idx = match arena.allocate() {
        Some(i) => i,
        None => {
            arena.release(left_idx);
            return Err(CmfError::OutOfArena {
                node: leaf.as_usize(),
            });
        }
    };

    let mut left_upper = upper;
    left_upper[dimension] = value;
    let mut right_lower = lower;
    right_lower[dimension] = value;

    {
        let left = arena.node_mut(left_idx);
        left.init_leaf(lifetime, leaf, lower, left_upper);
        for l in 0..L {
            left.counters[l] = ((counters[l] as f64) * fraction_left).round() as u32;
        }
    }
    {
        let right = arena.node_mut(right_idx);
        right.init_leaf(lifetime, leaf, right_lower, upper);
        for l in 0..L {
            let left_c = arena.node(left_idx).counters[l];
            right.counters[l] = counters[l].saturating_sub(left_c);
        }
    }

    let n = arena.node_mut(leaf);
    n.split_dimension = IDX::from_usize(dimension);
    n.split_value = value;
    n.child_left = left_idx;
    n.child_right = right_idx;
    n.counters = [0u32; L];

    arena.tree_mut(tree_idx).size += 2;
    Ok(())
}

/// **Chop(tree, depth)**: at every node reached at the given depth, release
/// both children (if any) and turn the node into a leaf.
pub fn chop<const F: usize, const L: usize, IDX: Index>(
    arena: &mut Arena<F, L, IDX>,
    tree_idx: usize,
    depth: usize,
) {
    let root = arena.tree(tree_idx).root;
    if root.is_none() {
        return;
    }
    let mut stack = vec![(root, 0usize)];
    let mut to_chop = Vec::new();
    while let Some((idx, d)) = stack.pop() {
        if idx.is_none() {
            continue;
        }
        if d == depth {
            to_chop.push(idx);
            continue;
        }
        let n = arena.node(idx);
        stack.push((n.child_left, d + 1));
        stack.push((n.child_right, d + 1));
    }
    for idx in to_chop {
        let (left, right) = {
            let n = arena.node(idx);
            (n.child_left, n.child_right)
        };
        if left.is_none() && right.is_none() {
            continue;
        }
        let mut released = 0usize;
        for child in [left, right] {
            if !child.is_none() {
                released += release_subtree(arena, child);
            }
        }
        let n = arena.node_mut(idx);
        n.split_dimension = IDX::none();
        n.split_value = 0.0;
        n.child_left = IDX::none();
        n.child_right = IDX::none();
        arena.tree_mut(tree_idx).size = arena.tree(tree_idx).size.saturating_sub(released);
    }
}

pub(crate) fn release_subtree<const F: usize, const L: usize, IDX: Index>(
    arena: &mut Arena<F, L, IDX>,
    root: IDX,
) -> usize {
    let mut stack = vec![root];
    let mut count = 0usize;
    while let Some(idx) = stack.pop() {
        if idx.is_none() {
            continue;
        }
        let n = arena.node(idx);
        let (l, r) = (n.child_left, n.child_right);
        arena.release(idx);
        count += 1;
        stack.push(l);
        stack.push(r);
    }
    count
}

/// **Tree-add**: appends a fresh, empty tree-base record. In this crate's
/// `Vec`-backed arena (see `arena` module docs) this never needs to relocate
/// existing nodes, since tree-bases live in their own `Vec`.
pub fn tree_add<const F: usize, const L: usize, IDX: Index>(
    arena: &mut Arena<F, L, IDX>,
    node_count_limit: usize,
    statistics: Statistics,
) {
    arena.grow_tail(1, node_count_limit, statistics);
}

/// **Tree-delete(t)**: releases every node owned by tree `t`, then removes its
/// tree-base record, sliding later records down by one.
pub fn tree_delete<const F: usize, const L: usize, IDX: Index>(
    arena: &mut Arena<F, L, IDX>,
    t: usize,
) {
    let root = arena.tree(t).root;
    if !root.is_none() {
        release_subtree(arena, root);
    }
    arena.tree_bases.remove(t);
}

/// **Fade-counts**: multiplies every leaf's `fading_score` by a fixed decay
/// factor once per training point.
pub fn fade_counts<const F: usize, const L: usize, IDX: Index>(
    arena: &mut Arena<F, L, IDX>,
    tree_idx: usize,
    decay: f64,
) {
    let root = arena.tree(tree_idx).root;
    if root.is_none() {
        return;
    }
    for leaf in collect_leaves(arena, root) {
        arena.node_mut(leaf).fading_score *= decay;
    }
}

/// Runs [`fade_counts`] across every tree in the arena; called once per
/// training point from the forest's `train` path.
pub fn fade_counts_all<const F: usize, const L: usize, IDX: Index>(
    arena: &mut Arena<F, L, IDX>,
    decay: f64,
) {
    for t in 0..arena.tree_count() {
        fade_counts(arena, t, decay);
    }
}

/// Default fade-count decay factor per §4.H ("≈ 0.995").
pub const DEFAULT_FADE_DECAY: f64 = 0.995;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::Statistics;

    fn small_tree() -> Arena<1, 2, u32> {
        let mut arena: Arena<1, 2, u32> = Arena::new(8, 1, 8, Statistics::error_rate);
        let root = arena.allocate().unwrap();
        let left = arena.allocate().unwrap();
        let right = arena.allocate().unwrap();
        arena.node_mut(root).init_leaf(1.0, u32::none(), [0.0], [1.0]);
        arena.node_mut(root).split_dimension = 0;
        arena.node_mut(root).split_value = 0.5;
        arena.node_mut(root).child_left = left;
        arena.node_mut(root).child_right = right;
        arena.node_mut(left).init_leaf(2.0, root, [0.0], [0.5]);
        arena.node_mut(left).bump(0);
        arena.node_mut(right).init_leaf(2.0, root, [0.5], [1.0]);
        arena.node_mut(right).bump(1);
        arena.tree_mut(0).root = root;
        arena.tree_mut(0).size = 3;
        arena
    }

    #[test]
    fn trim_count_removes_smaller_leaf_and_frees_two_slots() {
        let mut arena = small_tree();
        let available_before = arena.node_available();
        let mut rng = RandomSource::new(1);
        let trimmed = trim(&mut arena, 0, TrimType::Count, 1.0, &mut rng).unwrap();
        assert!(trimmed);
        assert_eq!(arena.node_available(), available_before + 2);
        arena.check_invariants().unwrap();
    }

    #[test]
    fn chop_at_depth_zero_collapses_to_single_leaf() {
        let mut arena = small_tree();
        chop(&mut arena, 0, 0);
        let root = arena.tree(0).root;
        assert!(arena.node(root).is_leaf());
    }

    #[test]
    fn tree_delete_frees_all_owned_nodes() {
        let mut arena = small_tree();
        let available_before = arena.node_available();
        tree_delete(&mut arena, 0);
        assert_eq!(arena.node_available(), available_before + 3);
    }
}
