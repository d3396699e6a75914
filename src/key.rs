//! Filepath: src/key.rs
//!
//! Key abstraction for [`BppTree`](crate::tree::BppTree).
//!
//! Keys are small ordered values that the per-leaf predictor can feed
//! into a linear regression, so the trait couples total ordering with a
//! lossy cast to `f64`.

use std::fmt as StdFmt;

/// A key type usable by the tree.
///
/// Implementors must be cheap to copy and totally ordered, and must
/// provide a numeric rendering for the position predictor. The rendering
/// must be monotone: `a < b` implies
/// `a.as_model_input() <= b.as_model_input()`. Precision loss is fine
/// (the predictor is advisory); breaking monotonicity only degrades
/// prediction quality, never correctness.
pub trait IndexKey: Copy + Ord + StdFmt::Debug {
    /// Numeric rendering of the key for regression input.
    fn as_model_input(self) -> f64;
}

macro_rules! impl_index_key {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IndexKey for $ty {
                #[inline]
                fn as_model_input(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

impl_index_key!(i64, i32, i16, u64, u32, u16);
