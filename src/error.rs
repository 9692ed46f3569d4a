//! Error kinds for the forest's fallible operations.
//!
//! Grounded directly on SPEC_FULL §7; kiddo itself has no `Result`-returning
//! public API to draw this pattern from, so this enum is new, but the choice of
//! `thiserror` to derive it is attested in the wider retrieved corpus (a
//! `thiserror_no_std::Error` derive turns up in one of the `other_examples`
//! files), not invented out of nothing.

use thiserror::Error;

/// Errors produced by [`crate::forest::CoarseMondrianForest`] and the engines it
/// wires together.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CmfError {
    /// The arena had no free slot to honour a split the extend engine wanted to
    /// perform. `train` still returns normally (as `Ok(false)`); any tree that
    /// did absorb the point keeps its update.
    #[error("arena exhausted: node {node} could not obtain a free slot")]
    OutOfArena {
        /// Index of the node at which the allocation failed.
        node: usize,
    },

    /// An internal consistency check failed. Fatal: the forest must not be used
    /// further once this is observed.
    #[error("invariant violated at node {node}: {check}")]
    InvariantViolation {
        /// Index of the offending node.
        node: usize,
        /// Name of the violated check (e.g. "tau_monotonicity", "box_containment").
        check: &'static str,
    },

    /// All excesses and all box widths collapsed to zero; the extend step
    /// degrades to a no-op box update. Non-fatal.
    #[error("degenerate split at node {node}: no dimension has positive excess or width")]
    DegenerateSplit {
        /// Index of the node at which the split collapsed.
        node: usize,
    },

    /// Configuration was rejected before a forest could be constructed.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Human readable reason the configuration was rejected.
        reason: String,
    },
}

/// Not a real error kind (see SPEC_FULL §7): an empty tree's root is absent on
/// predict, and that is treated as "return the prior", not a failure. Kept here
/// only as a marker type so call sites can document the distinction instead of
/// constructing a `CmfError` for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyTreeOnPredict;
