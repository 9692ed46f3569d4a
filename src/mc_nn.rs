//! Micro-cluster nearest-neighbour classifier (MC-NN). Peer component (§1:
//! "does not interact with CMF").
//!
//! Grounded on `examples/original_source/src/mc_nn.hpp`: each class is
//! represented by one or more running micro-clusters (a feature-sum
//! accumulator, not stored points); training finds the globally nearest
//! cluster and the nearest cluster sharing the true label, nudges an
//! `error_count` toward `error_threshold` on disagreement, and splits a
//! cluster that keeps disagreeing. The original's `split()` is left
//! unfinished (the centroid-reset lines are commented out); this port
//! completes it: the original cluster keeps its accumulated statistics and
//! gets a fresh `error_count`, while the new cluster starts a fresh
//! accumulator seeded at the old cluster's centroid, so the two clusters can
//! subsequently diverge as new points arrive. The original also keeps a
//! `features_square_sum` accumulator toward a widest-variance pivot choice
//! that the unfinished `split()` never actually reads; since this port's
//! `split()` doesn't pivot on variance either, that accumulator is dropped
//! rather than carried as unread state (see DESIGN.md).

#[derive(Debug, Clone)]
struct Cluster {
    features_sum: Vec<f64>,
    data_count: u64,
    label: usize,
    error_count: i64,
    initial_timestamp: f64,
    timestamp_sum: f64,
}

impl Cluster {
    fn initialize(feature_count: usize, features: &[f64], label: usize, timestamp: f64, error_threshold: i64) -> Self {
        Cluster {
            features_sum: features.to_vec(),
            data_count: 1,
            label,
            error_count: error_threshold + 1,
            initial_timestamp: timestamp,
            timestamp_sum: timestamp,
        }
        .with_capacity_check(feature_count)
    }

    fn with_capacity_check(self, feature_count: usize) -> Self {
        debug_assert_eq!(self.features_sum.len(), feature_count);
        self
    }

    fn incorporate(&mut self, features: &[f64], timestamp: f64) {
        self.timestamp_sum += timestamp;
        self.data_count += 1;
        for i in 0..features.len() {
            self.features_sum[i] += features[i];
        }
    }

    fn centroid(&self) -> Vec<f64> {
        self.features_sum.iter().map(|&s| s / self.data_count as f64).collect()
    }
}

fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// MC-NN classifier. `error_threshold` controls how many consecutive
/// disagreements a cluster tolerates before it is split.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct McNn {
    feature_count: usize,
    max_cluster: usize,
    error_threshold: i64,
    clusters: Vec<Option<Cluster>>,
    timestamp: f64,
}

impl McNn {
    pub fn new(feature_count: usize, max_cluster: usize, error_threshold: i64) -> Self {
        McNn {
            feature_count,
            max_cluster,
            error_threshold,
            clusters: (0..max_cluster).map(|_| None).collect(),
            timestamp: 0.0,
        }
    }

    pub fn count_clusters(&self) -> usize {
        self.clusters.iter().filter(|c| c.is_some()).count()
    }

    fn find_nearest(&self, features: &[f64]) -> Option<usize> {
        let mut best = None;
        let mut best_distance = f64::INFINITY;
        for (idx, cluster) in self.clusters.iter().enumerate() {
            if let Some(c) = cluster {
                let d = euclidean_distance(features, &c.centroid());
                if d < best_distance {
                    best_distance = d;
                    best = Some(idx);
                }
            }
        }
        best
    }

    fn find_nearest_with_label(&self, features: &[f64], label: usize) -> Option<usize> {
        let mut best = None;
        let mut best_distance = f64::INFINITY;
        for (idx, cluster) in self.clusters.iter().enumerate() {
            if let Some(c) = cluster {
                if c.label != label {
                    continue;
                }
                let d = euclidean_distance(features, &c.centroid());
                if d < best_distance {
                    best_distance = d;
                    best = Some(idx);
                }
            }
        }
        best
    }

    fn first_free_slot(&self) -> Option<usize> {
        self.clusters.iter().position(|c| c.is_none())
    }

    fn split(&mut self, cluster_idx: usize) {
        let Some(new_idx) = self.first_free_slot() else {
            // No room to split into; leave the cluster as-is, matching the
            // original's unhandled "no more space" branch.
            return;
        };

        let centroid = self.clusters[cluster_idx].as_ref().unwrap().centroid();
        let label = self.clusters[cluster_idx].as_ref().unwrap().label;
        let mut fresh = Cluster::initialize(self.feature_count, &centroid, label, self.timestamp, self.error_threshold);
        fresh.data_count = 1;
        self.clusters[new_idx] = Some(fresh);

        if let Some(c) = self.clusters[cluster_idx].as_mut() {
            c.error_count = self.error_threshold + 1;
        }
    }

    pub fn train(&mut self, features: &[f64], label: usize) {
        self.timestamp += 1.0;
        let nearest = self.find_nearest(features);
        let nearest_with_class = self.find_nearest_with_label(features, label);

        let nearest_with_class = match nearest_with_class {
            Some(idx) => idx,
            None => {
                let Some(free) = self.first_free_slot() else {
                    return; // No room for a new class cluster.
                };
                self.clusters[free] = Some(Cluster::initialize(
                    self.feature_count,
                    features,
                    label,
                    self.timestamp,
                    self.error_threshold,
                ));
                return;
            }
        };

        let Some(nearest) = nearest else {
            return;
        };

        if nearest == nearest_with_class {
            let c = self.clusters[nearest].as_mut().unwrap();
            c.error_count += 1;
            c.incorporate(features, self.timestamp);
        } else {
            {
                let c = self.clusters[nearest].as_mut().unwrap();
                c.error_count -= 1;
            }
            {
                let c = self.clusters[nearest_with_class].as_mut().unwrap();
                c.error_count -= 1;
                c.incorporate(features, self.timestamp);
            }
            if self.clusters[nearest_with_class].as_ref().unwrap().error_count < self.error_threshold {
                self.split(nearest_with_class);
            }
            if self.clusters[nearest].as_ref().unwrap().error_count < self.error_threshold {
                self.split(nearest);
            }
        }
    }

    pub fn predict(&self, features: &[f64]) -> Option<usize> {
        self.find_nearest(features).map(|idx| self.clusters[idx].as_ref().unwrap().label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicts_trained_label_for_a_single_point() {
        let mut mcnn = McNn::new(4, 25, 2);
        let point = [5.0, 1.0, 2.0, 3.0];
        mcnn.train(&point, 7);
        assert_eq!(mcnn.predict(&point), Some(7));
    }

    #[test]
    fn two_classes_yield_two_clusters() {
        let mut mcnn = McNn::new(4, 25, 2);
        mcnn.train(&[0.0, 0.0, 0.0, 0.0], 0);
        mcnn.train(&[30.0, 0.0, 0.0, 0.0], 1);
        assert_eq!(mcnn.count_clusters(), 2);
    }

    #[test]
    fn unseen_point_returns_none() {
        let mcnn = McNn::new(4, 25, 2);
        assert_eq!(mcnn.predict(&[1.0, 1.0, 1.0, 1.0]), None);
    }
}
