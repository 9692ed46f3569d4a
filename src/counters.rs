//! Component G: the counter maintainer. §4.G.
//!
//! Grounded on `mondrian_coarse.hpp`'s `update_posterior_count` overloads
//! (per-point eager update, recursive full-tree update). `counter[l] =
//! min(1, left.counter[l]) + min(1, right.counter[l])` for every internal node
//! and label.

use crate::arena::Arena;
use crate::types::Index;

fn min1(c: u32) -> u32 {
    c.min(1)
}

/// **Eager**: climb from the touched leaf to the root, re-deriving each
/// ancestor's counter. Stops early once a counter is already correct, per
/// §4.G ("stop once the counter value becomes stable").
pub fn eager_update<const F: usize, const L: usize, IDX: Index>(
    arena: &mut Arena<F, L, IDX>,
    leaf: IDX,
) {
    let mut current = arena.node(leaf).parent;
    while !current.is_none() {
        let (left, right) = {
            let n = arena.node(current);
            (n.child_left, n.child_right)
        };
        let mut changed = false;
        for l in 0..L {
            let left_c = if left.is_none() {
                0
            } else {
                min1(arena.node(left).counters[l])
            };
            let right_c = if right.is_none() {
                0
            } else {
                min1(arena.node(right).counters[l])
            };
            let derived = left_c + right_c;
            let n = arena.node_mut(current);
            if n.counters[l] != derived {
                n.counters[l] = derived;
                changed = true;
            }
        }
        if !changed {
            break;
        }
        current = arena.node(current).parent;
    }
}

/// **Lazy**: re-derive every tree's internal counters bottom-up via an
/// iterative post-order traversal, run once before prediction.
pub fn lazy_recompute_all<const F: usize, const L: usize, IDX: Index>(
    arena: &mut Arena<F, L, IDX>,
) {
    for t in 0..arena.tree_count() {
        let root = arena.tree(t).root;
        if root.is_none() {
            continue;
        }
        lazy_recompute_tree(arena, root);
    }
}

fn lazy_recompute_tree<const F: usize, const L: usize, IDX: Index>(
    arena: &mut Arena<F, L, IDX>,
    root: IDX,
) {
    // Iterative post-order: push (node, visited) pairs on an explicit stack.
    let mut stack: Vec<(IDX, bool)> = vec![(root, false)];
    while let Some((idx, visited)) = stack.pop() {
        if visited {
            let (left, right) = {
                let n = arena.node(idx);
                (n.child_left, n.child_right)
            };
            if left.is_none() && right.is_none() {
                continue; // leaf: counters are the real training counts.
            }
            for l in 0..L {
                let left_c = if left.is_none() {
                    0
                } else {
                    min1(arena.node(left).counters[l])
                };
                let right_c = if right.is_none() {
                    0
                } else {
                    min1(arena.node(right).counters[l])
                };
                arena.node_mut(idx).counters[l] = left_c + right_c;
            }
        } else {
            stack.push((idx, true));
            let n = arena.node(idx);
            if !n.child_left.is_none() {
                stack.push((n.child_left, false));
            }
            if !n.child_right.is_none() {
                stack.push((n.child_right, false));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::Statistics;
    use crate::types::Index;

    #[test]
    fn lazy_recompute_derives_internal_counters_from_leaves() {
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

        lazy_recompute_all(&mut arena);
        assert_eq!(arena.node(root).counters, [1, 1]);
    }
}
