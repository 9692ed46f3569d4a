#![warn(rustdoc::missing_crate_level_docs)]
#![deny(rustdoc::invalid_codeblock_attributes)]
#![warn(rustdoc::broken_intra_doc_links)]
#![warn(rustdoc::private_intra_doc_links)]
#![doc(html_root_url = "https://docs.rs/cmf/0.1.0")]
#![doc(issue_tracker_base_url = "https://github.com/sdd/cmf/issues/")]

//! # cmf
//!
//! A memory-bounded, arena-allocated online classifier built on the
//! [Mondrian process](https://en.wikipedia.org/wiki/Mondrian_process): each
//! tree in the ensemble grows over a fixed node arena, absorbing new points
//! by either extending an existing leaf's bounding box or firing a Mondrian
//! split, and degrades gracefully (growing in place, pausing expansion, or
//! trimming least-useful leaves) once its arena fills up instead of
//! allocating without bound.
//!
//! `cmf` provides:
//! - [`CoarseMondrianForest`], the ensemble classifier, trained online one
//!   point at a time via [`CoarseMondrianForest::train`] and queried via
//!   [`CoarseMondrianForest::predict`];
//! - [`CmfConfig`] to select lifetime, discount, tree count, and one of five
//!   extend policies / budget regimes;
//! - a handful of independent peer learners and data structures
//!   ([`bloom`], [`cuckoo`], [`reservoir`], [`naive_bayes`],
//!   [`hoeffding_tree`], [`perceptron`], [`mc_nn`], [`ltc`]) that do not
//!   interact with the forest but share its streaming, memory-conscious
//!   spirit.
//!
//! ## Usage
//!
//! ```rust
//! use cmf::{CmfConfig, CoarseMondrianForest};
//!
//! let config = CmfConfig::new(1.0, 0.01, 0.1, 10, 4, 2, 65_536, 42);
//! let mut forest: CoarseMondrianForest<4, 2> = CoarseMondrianForest::new(config).unwrap();
//!
//! forest.train(&[1.0, 2.0, 0.5, 0.1], 0);
//! let (label, _scores) = forest.predict(&[1.0, 2.0, 0.5, 0.1]);
//! assert_eq!(label, 0);
//! ```

pub mod arena;
pub mod bloom;
pub mod budget;
pub mod config;
pub mod counters;
pub mod cuckoo;
pub mod error;
pub mod extend;
pub mod forest;
pub mod hoeffding_tree;
pub mod ltc;
pub mod math;
pub mod mc_nn;
pub mod naive_bayes;
pub mod perceptron;
pub mod posterior;
pub mod reservoir;
pub mod reshape;
pub mod split;
pub mod statistics;
pub mod types;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use config::{CmfConfig, CounterMaintenance, ExtendType, StatisticsKind, TreeManagement, TrimType};
pub use error::CmfError;
pub use forest::CoarseMondrianForest;
