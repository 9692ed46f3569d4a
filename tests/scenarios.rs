use cmf::config::TrimType;
use cmf::test_utils::clustered_stream;
use cmf::{CmfConfig, CoarseMondrianForest};

const FEATURES: usize = 4;
const LABELS: usize = 2;

#[test]
fn scenario_3_arena_full_degradation() {
    // CAP sized for roughly 3 nodes per tree across 10 trees.
    let node_size = std::mem::size_of::<f64>() * (2 * FEATURES + LABELS) + std::mem::size_of::<u32>() * 5;
    let cap_bytes = node_size * 3 * 10 + 10 * 64;
    let config = CmfConfig::new(1.0, 0.01, 0.1, 10, FEATURES, LABELS, cap_bytes, 11);
    let mut forest: CoarseMondrianForest<FEATURES, LABELS> = CoarseMondrianForest::new(config).unwrap();

    // Well-separated clusters carry real class signal, unlike a stream whose
    // labels are drawn independently of its features; only a stream with
    // learnable structure can demonstrate the forest beating a naive prior.
    let stream = clustered_stream::<FEATURES>(10_000, LABELS, 11);
    for (x, label) in stream.iter() {
        forest.train(x, *label);
        forest.check_invariants().unwrap();
    }

    let held_out = clustered_stream::<FEATURES>(200, LABELS, 999);
    let mut correct = 0usize;
    for (x, label) in held_out.iter() {
        let (predicted, _) = forest.predict(x);
        if predicted == *label {
            correct += 1;
        }
    }
    // Two well-separated labels: a naive prior clears ~50%. Even degraded by
    // arena pressure, the forest must exceed that baseline, not merely avoid
    // collapsing toward it.
    let accuracy = correct as f64 / held_out.len() as f64;
    assert!(
        accuracy > 0.5,
        "accuracy {accuracy} did not exceed the naive-prior baseline"
    );
}

#[test]
fn scenario_4_trim_frees_slots() {
    let mut config = CmfConfig::new(1.0, 0.01, 0.1, 5, FEATURES, LABELS, 8_000, 5);
    config.trim_type = TrimType::Count;
    config.maximum_trim_size = 0.3;
    let mut forest: CoarseMondrianForest<FEATURES, LABELS> = CoarseMondrianForest::new(config).unwrap();

    // Enough points to exhaust the small arena and force repeated trims.
    let stream = clustered_stream::<FEATURES>(5_000, LABELS, 5);
    let mut min_available = forest.node_available();
    let mut freed: Option<usize> = None;
    for (x, label) in stream.iter() {
        forest.train(x, *label);
        let available = forest.node_available();
        if available < min_available {
            min_available = available;
        } else if available > min_available && freed.is_none() {
            freed = Some(available - min_available);
        }
    }
    forest.check_invariants().unwrap();

    let increase = freed.expect("expected at least one trim to free slots under sustained training pressure");
    assert!(increase > 0, "node_available must increase, got {increase}");
    assert_eq!(
        increase % 2,
        0,
        "trim frees slots in pairs (cut_block releases exactly two nodes), got {increase}"
    );
}

#[test]
fn scenario_5_tree_add_delete_preserves_invariants() {
    let config = CmfConfig::new(1.0, 0.01, 0.1, 3, FEATURES, LABELS, 65_536, 21);
    let mut forest: CoarseMondrianForest<FEATURES, LABELS> = CoarseMondrianForest::new(config).unwrap();

    let stream = clustered_stream::<FEATURES>(200, LABELS, 21);
    for (x, label) in stream.iter() {
        forest.train(x, *label);
    }
    forest.check_invariants().unwrap();

    forest.tree_add();
    forest.tree_add();
    assert_eq!(forest.tree_sizes().len(), 5);
    forest.check_invariants().unwrap();

    forest.tree_delete(0);
    assert_eq!(forest.tree_sizes().len(), 5);
    assert_eq!(forest.tree_sizes()[0], 0);
    forest.check_invariants().unwrap();
}

#[test]
fn scenario_6_posterior_stability_between_disjoint_classes() {
    let config = CmfConfig::new(1.0, 0.01, 0.1, 10, FEATURES, LABELS, 262_144, 3);
    let mut forest: CoarseMondrianForest<FEATURES, LABELS> = CoarseMondrianForest::new(config).unwrap();

    let region0 = [1.0, 1.0, 1.0, 1.0];
    let region1 = [20.0, 20.0, 20.0, 20.0];
    for _ in 0..100 {
        forest.train(&region0, 0);
    }
    for _ in 0..100 {
        forest.train(&region1, 1);
    }

    let (_, scores) = forest.predict(&region0);
    assert!(scores[0] - scores[1] >= 0.3, "scores = {scores:?}");
}
