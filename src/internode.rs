//! Filepath: src/internode.rs
//!
//! Internode (internal routing node) for [`BppTree`](crate::tree::BppTree).
//!
//! Internodes hold separator keys and child links, no values. Keys are
//! always in sorted order.

use crate::key::IndexKey;
use crate::tree::NodeRef;

/// An internal routing node.
///
/// # Invariants
/// - `keys` is strictly ascending.
/// - For `k` keys there are `k + 1` children; `children.len() <= order`
///   between inserts (one over, transiently, right before a split).
/// - `children[i]` holds keys `< keys[i]`; `children[i + 1]` holds keys
///   `>= keys[i]`. Each separator is the smallest key of the subtree
///   immediately to its right, as constructed.
#[derive(Debug)]
pub(crate) struct Internode<K: IndexKey> {
    /// Separator keys in sorted order.
    keys: Vec<K>,

    /// Child links; one more than `keys`.
    children: Vec<NodeRef<K>>,
}

impl<K: IndexKey> Internode<K> {
    /// Build a fresh root above a just-split node.
    #[must_use]
    pub(crate) fn from_split(left: NodeRef<K>, separator: K, right: NodeRef<K>) -> Self {
        Self {
            keys: vec![separator],
            children: vec![left, right],
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn key_count(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    #[must_use]
    pub(crate) fn child_count(&self) -> usize {
        self.children.len()
    }

    #[inline]
    #[must_use]
    pub(crate) fn separator(&self, idx: usize) -> K {
        self.keys[idx]
    }

    #[inline]
    #[must_use]
    pub(crate) fn child(&self, idx: usize) -> &NodeRef<K> {
        &self.children[idx]
    }

    #[inline]
    pub(crate) fn child_mut(&mut self, idx: usize) -> &mut NodeRef<K> {
        &mut self.children[idx]
    }

    /// Index of the child subtree that may hold `key`: the child after
    /// the last separator `<= key`, or the leftmost child when every
    /// separator is greater.
    #[must_use]
    pub(crate) fn route(&self, key: K) -> usize {
        self.keys.partition_point(|separator| *separator <= key)
    }

    /// Splice a split descriptor from child `idx` into this node: the
    /// separator lands at `keys[idx]`, the new right sibling at
    /// `children[idx + 1]`.
    pub(crate) fn absorb_split(&mut self, idx: usize, separator: K, right: NodeRef<K>) {
        self.keys.insert(idx, separator);
        self.children.insert(idx + 1, right);
    }

    /// Split an over-full node, promoting the middle separator.
    ///
    /// The left (this) node keeps `ceil(order / 2)` children; the
    /// returned right sibling takes the rest.
    pub(crate) fn split(&mut self, order: usize) -> (K, Self) {
        debug_assert!(self.children.len() > order);

        let keep = order.div_ceil(2);
        let right_children = self.children.split_off(keep);
        let mut right_keys = self.keys.split_off(keep - 1);
        let promoted = right_keys.remove(0);

        let right = Self {
            keys: right_keys,
            children: right_children,
        };

        debug_assert_eq!(self.children.len(), self.keys.len() + 1);
        debug_assert_eq!(right.children.len(), right.keys.len() + 1);

        (promoted, right)
    }
}
