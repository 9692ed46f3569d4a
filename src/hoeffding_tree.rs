//! Hoeffding tree (VFDT-style incremental decision tree). Peer component
//! (§1: "does not interact with CMF").
//!
//! Grounded on `examples/original_source/src/hoeffding_tree.hpp`: each leaf
//! bins every feature into `features_size[f]` equal-width bins derived from
//! the box it has observed, keeps a `[label][feature][bin]` occurrence
//! counter, and periodically evaluates the information gain of splitting on
//! each bin boundary, firing a split once the gap between the best and
//! second-best candidate clears the Hoeffding bound. The original hand-packs
//! nodes and their counters into one `char buffer[max_size]` with manual
//! offset arithmetic (`operator new` into the buffer, counters on the
//! opposite end growing toward the middle); this is a from-scratch-but-
//! grounded simplification into a plain `Vec<Node>` arena, since Rust has no
//! reason to hand-roll a bump allocator where a `Vec` already gives
//! amortized O(1) growth and safe indexing.

const EMPTY: i64 = -1;

#[derive(Debug, Clone)]
struct Node {
    split_feature: Option<usize>,
    split_value: f64,
    lower: Vec<f64>,
    upper: Vec<f64>,
    children: [i64; 2],
    count: u64,
    // counters[label][feature][bin]
    counters: Vec<Vec<Vec<u64>>>,
    info_sum: Vec<f64>,
    limits: Vec<Vec<f64>>,
}

impl Node {
    fn new_root(feature_count: usize, label_count: usize, features_size: &[usize]) -> Self {
        Node {
            split_feature: None,
            split_value: 0.0,
            lower: vec![f64::NEG_INFINITY; feature_count],
            upper: vec![f64::INFINITY; feature_count],
            children: [EMPTY, EMPTY],
            count: 0,
            counters: (0..label_count)
                .map(|_| features_size.iter().map(|&s| vec![0u64; s]).collect())
                .collect(),
            info_sum: vec![0.0; features_size.iter().sum()],
            limits: features_size.iter().map(|&s| vec![0.0; s.saturating_sub(1)]).collect(),
        }
    }

    fn child_with_bounds(parent: &Node, label_count: usize, features_size: &[usize]) -> Self {
        Node {
            split_feature: None,
            split_value: 0.0,
            lower: parent.lower.clone(),
            upper: parent.upper.clone(),
            children: [EMPTY, EMPTY],
            count: 0,
            counters: (0..label_count)
                .map(|_| features_size.iter().map(|&s| vec![0u64; s]).collect())
                .collect(),
            info_sum: vec![0.0; features_size.iter().sum()],
            limits: features_size.iter().map(|&s| vec![0.0; s.saturating_sub(1)]).collect(),
        }
    }

    fn is_leaf(&self) -> bool {
        self.split_feature.is_none()
    }

    fn select_split_values(&mut self, features_size: &[usize]) {
        for f in 0..self.lower.len() {
            let width = self.upper[f] - self.lower[f];
            let bins = features_size[f];
            if !width.is_finite() || bins < 2 {
                continue;
            }
            let step = width / bins as f64;
            for i in 1..bins {
                self.limits[f][i - 1] = self.lower[f] + i as f64 * step;
            }
        }
    }

    fn bin_of(&self, f: usize, value: f64) -> usize {
        let limits = &self.limits[f];
        for (i, &limit) in limits.iter().enumerate() {
            if value < limit {
                return i;
            }
        }
        limits.len()
    }
}

/// A Hoeffding tree over `feature_count` real-valued features, each binned
/// into `features_size[f]` equal-width bins, classifying into `label_count`
/// labels. `delta` is the Hoeffding bound's allowed error probability.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HoeffdingTree {
    nodes: Vec<Node>,
    root: usize,
    feature_count: usize,
    label_count: usize,
    features_size: Vec<usize>,
    delta: f64,
}

impl HoeffdingTree {
    pub fn new(label_count: usize, features_size: Vec<usize>, delta: f64) -> Self {
        let feature_count = features_size.len();
        let mut root = Node::new_root(feature_count, label_count, &features_size);
        root.select_split_values(&features_size);
        HoeffdingTree {
            nodes: vec![root],
            root: 0,
            feature_count,
            label_count,
            features_size,
            delta,
        }
    }

    fn find_leaf(&self, features: &[f64]) -> usize {
        let mut current = self.root;
        loop {
            let node = &self.nodes[current];
            let Some(f) = node.split_feature else {
                return current;
            };
            current = if features[f] < node.split_value {
                node.children[0] as usize
            } else {
                node.children[1] as usize
            };
        }
    }

    pub fn train(&mut self, features: &[f64], label: usize) {
        let leaf = self.find_leaf(features);
        self.bump_counters(leaf, features, label);
        if let Some((feature, value)) = self.evaluate_split(leaf) {
            self.split(leaf, feature, value);
        }
    }

    fn bump_counters(&mut self, leaf: usize, features: &[f64], label: usize) {
        let node = &mut self.nodes[leaf];
        node.count += 1;
        for f in 0..self.feature_count {
            node.upper[f] = node.upper[f].max(features[f]);
            node.lower[f] = node.lower[f].min(features[f]);
        }
        for f in 0..self.feature_count {
            let bin = node.bin_of(f, features[f]);
            node.counters[label][f][bin] += 1;
        }
    }

    /// Entropy of the label distribution at `leaf`, and per-bin information
    /// gain for every feature/bin boundary, flattened as the original packs
    /// `sum_feature_size - feature_count` split candidates.
    fn information_gain(&self, leaf: usize) -> Vec<(usize, usize, f64)> {
        let node = &self.nodes[leaf];
        let total = node.count as f64;
        if total == 0.0 {
            return Vec::new();
        }

        let mut counts_per_label = vec![0.0f64; self.label_count];
        for l in 0..self.label_count {
            counts_per_label[l] = node.counters[l][0].iter().sum::<u64>() as f64;
        }
        let entropy_leaf = -counts_per_label
            .iter()
            .filter(|&&c| c > 0.0)
            .map(|&c| {
                let p = c / total;
                p * p.log2()
            })
            .sum::<f64>();

        let mut candidates = Vec::new();
        for f in 0..self.feature_count {
            let bins = self.features_size[f];
            for cut in 0..bins.saturating_sub(1) {
                // Split candidate: bins [0..=cut] vs (cut..bins).
                let mut left_counts = vec![0.0f64; self.label_count];
                let mut right_counts = vec![0.0f64; self.label_count];
                for l in 0..self.label_count {
                    for b in 0..bins {
                        let c = node.counters[l][f][b] as f64;
                        if b <= cut {
                            left_counts[l] += c;
                        } else {
                            right_counts[l] += c;
                        }
                    }
                }
                let left_total: f64 = left_counts.iter().sum();
                let right_total: f64 = right_counts.iter().sum();
                let entropy = |counts: &[f64], tot: f64| -> f64 {
                    if tot <= 0.0 {
                        return 0.0;
                    }
                    -counts
                        .iter()
                        .filter(|&&c| c > 0.0)
                        .map(|&c| {
                            let p = c / tot;
                            p * p.log2()
                        })
                        .sum::<f64>()
                };
                let weighted = (left_total / total) * entropy(&left_counts, left_total)
                    + (right_total / total) * entropy(&right_counts, right_total);
                candidates.push((f, cut, entropy_leaf - weighted));
            }
        }
        candidates
    }

    /// Runs the Hoeffding bound and returns `Some((feature, split_value))`
    /// if a split should fire.
    fn evaluate_split(&mut self, leaf: usize) -> Option<(usize, f64)> {
        let candidates = self.information_gain(leaf);
        if candidates.len() < 2 {
            return None;
        }
        let node = &mut self.nodes[leaf];
        for (i, (_, _, gain)) in candidates.iter().enumerate() {
            node.info_sum[i] += gain;
        }
        let count = node.count as f64;
        let averaged: Vec<f64> = node.info_sum.iter().take(candidates.len()).map(|s| s / count).collect();

        let mut best = 0usize;
        let mut second = if candidates.len() > 1 { 1 } else { 0 };
        if averaged[best] < averaged[second] {
            std::mem::swap(&mut best, &mut second);
        }
        for i in 2..candidates.len() {
            if averaged[i] > averaged[best] {
                second = best;
                best = i;
            } else if averaged[i] > averaged[second] {
                second = i;
            }
        }

        let epsilon = 4.0 * (1.0 / self.delta).ln() / (2.0 * count);
        let diff = averaged[best] - averaged[second];
        if diff * diff > epsilon && averaged[best] > 0.0 {
            let (feature, cut, _) = candidates[best];
            let split_value = self.nodes[leaf].limits[feature][cut];
            Some((feature, split_value))
        } else {
            None
        }
    }

    fn split(&mut self, leaf: usize, feature: usize, value: f64) {
        let parent = self.nodes[leaf].clone();
        let mut child_left = Node::child_with_bounds(&parent, self.label_count, &self.features_size);
        let mut child_right = Node::child_with_bounds(&parent, self.label_count, &self.features_size);
        child_left.upper[feature] = value;
        child_right.lower[feature] = value;
        child_left.select_split_values(&self.features_size);
        child_right.select_split_values(&self.features_size);

        let left_idx = self.nodes.len();
        self.nodes.push(child_left);
        let right_idx = self.nodes.len();
        self.nodes.push(child_right);

        let node = &mut self.nodes[leaf];
        node.split_feature = Some(feature);
        node.split_value = value;
        node.children = [left_idx as i64, right_idx as i64];
    }

    pub fn predict(&self, features: &[f64]) -> (usize, Vec<f64>) {
        let leaf = self.find_leaf(features);
        let node = &self.nodes[leaf];
        let mut counts = vec![0.0f64; self.label_count];
        for l in 0..self.label_count {
            counts[l] = node.counters[l][0].iter().sum::<u64>() as f64;
        }
        let sum: f64 = counts.iter().sum::<f64>().max(1.0);
        let probabilities: Vec<f64> = counts.iter().map(|&c| c / sum).collect();
        let mut best = 0usize;
        for l in 1..self.label_count {
            if probabilities[l] > probabilities[best] {
                best = l;
            }
        }
        (best, probabilities)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_a_separable_two_class_stream() {
        let mut tree = HoeffdingTree::new(2, vec![4], 0.05);
        for i in 0..400 {
            let (x, label) = if i % 2 == 0 { (1.0, 0) } else { (9.0, 1) };
            tree.train(&[x], label);
        }
        assert!(tree.node_count() >= 1);
        assert_eq!(tree.predict(&[1.0]).0, 0);
        assert_eq!(tree.predict(&[9.0]).0, 1);
    }

    #[test]
    fn empty_tree_has_a_single_root() {
        let tree = HoeffdingTree::new(2, vec![3, 3], 0.05);
        assert_eq!(tree.node_count(), 1);
    }
}
