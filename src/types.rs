//! Core trait bounds shared across the arena, split sampler, extend engine and
//! posterior engine.
//!
//! These mirror the role kiddo's own `types.rs` plays for its k-d tree: a small
//! set of bounds that let the rest of the crate stay generic over the feature
//! value type and the index representation, instead of hard-coding `f64`/`u32`
//! everywhere.

use num_traits::{Float, PrimInt, Unsigned, Zero};
use std::fmt::Debug;
use std::ops::AddAssign;

/// The numeric type used for feature values and for `tau`/box bounds.
///
/// Mirrors kiddo's `Axis` trait; a forest is usually instantiated with `f64`.
pub trait Axis: Float + Default + Debug + Copy + AddAssign + Sync {}
impl<T> Axis for T where T: Float + Default + Debug + Copy + AddAssign + Sync {}

/// The integer type used for labels (class ids) and per-label counters.
pub trait Content: PrimInt + Unsigned + Zero + Debug + Copy + Sync {}
impl<T> Content for T where T: PrimInt + Unsigned + Zero + Debug + Copy + Sync {}

/// An arena index with a dedicated "none" sentinel value.
///
/// Plays the same role as kiddo's `Index` trait (`IDX::leaf_offset()` as a
/// sentinel boundary); here there is only one node kind, so the sentinel simply
/// marks "absent" rather than "stem vs. leaf".
pub trait Index: PrimInt + Unsigned + Zero + Debug + Copy + Sync {
    /// The sentinel value meaning "no node" / "not present".
    fn none() -> Self;

    /// Whether this index is the sentinel.
    fn is_none(self) -> bool {
        self == Self::none()
    }

    fn as_usize(self) -> usize;
    fn from_usize(v: usize) -> Self;
}

impl Index for u32 {
    fn none() -> Self {
        u32::MAX
    }
    fn as_usize(self) -> usize {
        self as usize
    }
    fn from_usize(v: usize) -> Self {
        v as u32
    }
}

impl Index for u16 {
    fn none() -> Self {
        u16::MAX
    }
    fn as_usize(self) -> usize {
        self as usize
    }
    fn from_usize(v: usize) -> Self {
        v as u16
    }
}
