//! Forest configuration: the explicit, enumerated record required by SPEC_FULL
//! §6/§9 ("~15 behavioural switches... must be expressed as an explicit
//! configuration record with enumerated options").
//!
//! Grounded on `mondrian_coarse.hpp`'s `CoarseMondrianForest` constructor
//! parameter list; every default below reproduces the default there.

use crate::error::CmfError;

/// Per-tree node-budget enforcement regime. Component I (§4.I).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TreeManagement {
    /// `node_count_limit = floor(CAP / trees)`, hard pause at the limit.
    #[default]
    Cobble,
    /// Same limit, but advisory: allowed past it while 2+ nodes remain globally.
    OptimisticCobble,
    /// Fixed limit from construction, rounded to the nearest odd integer.
    Robur,
    /// No limit; degrades to box-update-only once the arena is full.
    Phoenix,
    /// Like Phoenix, but pauses at a limit; intended to pair with periodic resets.
    PausingPhoenix,
}

/// Whether `size_limit` is interpreted as a node count or a depth bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SizeType {
    /// `size_limit` bounds tree depth.
    Depth,
    /// `size_limit` bounds node count.
    #[default]
    Node,
}

/// Whether a tree whose budget is exhausted may be reclaimed by `tree_delete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DontDelete {
    #[default]
    Delete,
    DontDelete,
}

/// How a denied split's `forced_extend` count is redistributed to the new
/// sibling created by `split_node`. §4.E.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FeDistribution {
    #[default]
    Zero,
    SplitEven,
    Proportional,
    Decrement,
}

/// What triggers a Barycentre-policy forced split. §4.E.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FeSplitTrigger {
    #[default]
    None,
    Positive,
    Total,
    Sfe,
}

/// How the barycentre split weighs dimensions in which to pivot. §4.E.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SplitHelper {
    #[default]
    None,
    Avg,
    Weighted,
}

/// Which of the five extend policies to use. §4.E.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExtendType {
    /// No extension at all: points update nothing once the tree has a root
    /// (used by the "No-arena regression" property test in §8).
    None,
    #[default]
    Original,
    Ghost,
    PartialUpdate,
    CounterNoUpdate,
    Barycentre,
}

/// Which leaf-selection rule `Trim` uses. §4.H.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrimType {
    #[default]
    None,
    Random,
    Fading,
    Count,
}

/// Counter maintenance mode. §4.G (ambient resolution, see SPEC_FULL §4.G).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CounterMaintenance {
    #[default]
    Eager,
    Lazy,
}

/// Which pluggable per-tree statistics scorer to use. TreeBase, §3 (ambient).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StatisticsKind {
    #[default]
    ErrorRate,
    Kappa,
    Reservoir,
}

/// Explicit forest configuration. See SPEC_FULL §6.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CmfConfig {
    // --- required ---
    /// Maximum node tau.
    pub lifetime: f64,
    /// Prior per-label mass.
    pub base_measure: f64,
    /// Mondrian hierarchical smoothing strength (`γ`).
    pub discount_factor: f64,
    /// Initial number of trees.
    pub tree_count: usize,
    /// Number of features per training point (`F`).
    pub feature_count: usize,
    /// Number of distinct labels (`L`).
    pub label_count: usize,
    /// Arena capacity in bytes (`CAP`).
    pub cap_bytes: usize,
    /// Seed for the forest's single deterministic random stream.
    pub seed: u64,

    // --- behavioural switches, all defaulted ---
    pub tree_management: TreeManagement,
    pub size_type: SizeType,
    /// -1 means "derive from `cap_bytes` and `tree_count`".
    pub size_limit: i64,
    pub dont_delete: DontDelete,
    pub fe_distribution: FeDistribution,
    pub fe_split_trigger: FeSplitTrigger,
    pub tau_factor: f64,
    pub generate_full_point: bool,
    pub reset_once: bool,
    pub fe_parameter: f64,
    pub fading_count: f64,
    pub split_helper: SplitHelper,
    pub extend_type: ExtendType,
    pub trim_type: TrimType,
    pub maximum_trim_size: f64,

    // --- ambient additions, see SPEC_FULL §6 "Added to the config surface" ---
    pub counter_maintenance: CounterMaintenance,
    pub statistics: StatisticsKind,
}

impl CmfConfig {
    /// `lifetime` scaled by `tau_factor`; every new node's initial split-time
    /// budget is drawn against this rather than the raw `lifetime`, so
    /// `tau_factor` uniformly stretches or shrinks how long a tree keeps
    /// splitting before its leaves age out. §4.E/§4.I.
    pub fn effective_lifetime(&self) -> f64 {
        self.lifetime * self.tau_factor
    }

    /// Convenience constructor filling in every default switch; the caller
    /// supplies only the required fields plus the ambient ones that have no
    /// sensible default (`cap_bytes`, `seed`).
    pub fn new(
        lifetime: f64,
        base_measure: f64,
        discount_factor: f64,
        tree_count: usize,
        feature_count: usize,
        label_count: usize,
        cap_bytes: usize,
        seed: u64,
    ) -> Self {
        CmfConfig {
            lifetime,
            base_measure,
            discount_factor,
            tree_count,
            feature_count,
            label_count,
            cap_bytes,
            seed,
            tree_management: TreeManagement::default(),
            size_type: SizeType::default(),
            size_limit: -1,
            dont_delete: DontDelete::default(),
            fe_distribution: FeDistribution::default(),
            fe_split_trigger: FeSplitTrigger::default(),
            tau_factor: 1.0,
            generate_full_point: true,
            reset_once: true,
            fe_parameter: 1.0,
            fading_count: 1.0,
            split_helper: SplitHelper::default(),
            extend_type: ExtendType::default(),
            trim_type: TrimType::default(),
            maximum_trim_size: 1.0,
            counter_maintenance: CounterMaintenance::default(),
            statistics: StatisticsKind::default(),
        }
    }

    /// Rejects nonsensical configurations before a forest is constructed.
    /// §7 `InvalidConfig`.
    pub fn validate(&self) -> Result<(), CmfError> {
        if self.lifetime <= 0.0 {
            return Err(CmfError::InvalidConfig {
                reason: "lifetime must be positive".into(),
            });
        }
        if self.tree_count == 0 {
            return Err(CmfError::InvalidConfig {
                reason: "tree_count must be at least 1".into(),
            });
        }
        if self.feature_count == 0 {
            return Err(CmfError::InvalidConfig {
                reason: "feature_count must be at least 1".into(),
            });
        }
        if self.label_count == 0 {
            return Err(CmfError::InvalidConfig {
                reason: "label_count must be at least 1".into(),
            });
        }
        if self.base_measure < 0.0 {
            return Err(CmfError::InvalidConfig {
                reason: "base_measure must be non-negative".into(),
            });
        }
        if self.discount_factor < 0.0 {
            return Err(CmfError::InvalidConfig {
                reason: "discount_factor must be non-negative".into(),
            });
        }
        if self.maximum_trim_size <= 0.0 || self.maximum_trim_size > 1.0 {
            return Err(CmfError::InvalidConfig {
                reason: "maximum_trim_size must be in (0, 1]".into(),
            });
        }

        let node_size = std::mem::size_of::<f64>() * (2 * self.feature_count + self.label_count)
            + std::mem::size_of::<u32>() * 3
            + std::mem::size_of::<f64>() * 2;
        let tree_base_size = std::mem::size_of::<f64>() * 2 + std::mem::size_of::<u32>() * 3;
        let min_required = self.tree_count * (node_size + tree_base_size);
        if self.cap_bytes < min_required {
            return Err(CmfError::InvalidConfig {
                reason: format!(
                    "cap_bytes too small: need at least {min_required} bytes for {} trees",
                    self.tree_count
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod validate_tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::zero_lifetime(CmfConfig::new(0.0, 0.01, 0.1, 10, 4, 2, 65_536, 1))]
    #[case::zero_tree_count(CmfConfig::new(1.0, 0.01, 0.1, 0, 4, 2, 65_536, 1))]
    #[case::zero_feature_count(CmfConfig::new(1.0, 0.01, 0.1, 10, 0, 2, 65_536, 1))]
    #[case::zero_label_count(CmfConfig::new(1.0, 0.01, 0.1, 10, 4, 0, 65_536, 1))]
    #[case::negative_base_measure(CmfConfig::new(1.0, -1.0, 0.1, 10, 4, 2, 65_536, 1))]
    #[case::negative_discount_factor(CmfConfig::new(1.0, 0.01, -1.0, 10, 4, 2, 65_536, 1))]
    #[case::cap_bytes_too_small(CmfConfig::new(1.0, 0.01, 0.1, 10, 4, 2, 1, 1))]
    fn rejects_invalid_configs(#[case] config: CmfConfig) {
        assert!(config.validate().is_err());
    }

    #[rstest]
    #[case::lower_bound(0.01)]
    #[case::midpoint(0.5)]
    #[case::upper_bound(1.0)]
    fn accepts_maximum_trim_size_in_range(#[case] maximum_trim_size: f64) {
        let mut config = CmfConfig::new(1.0, 0.01, 0.1, 10, 4, 2, 65_536, 1);
        config.maximum_trim_size = maximum_trim_size;
        assert!(config.validate().is_ok());
    }
}

#[cfg(all(test, feature = "serde"))]
mod serde_tests {
    use super::*;

    #[test]
    fn can_serde() {
        let mut config = CmfConfig::new(1.0, 0.01, 0.1, 10, 4, 2, 65_536, 42);
        config.trim_type = TrimType::Fading;
        config.extend_type = ExtendType::Barycentre;

        let serialized = serde_json::to_string(&config).unwrap();
        let deserialized: CmfConfig = serde_json::from_str(&serialized).unwrap();
        assert_eq!(config, deserialized);
    }
}
