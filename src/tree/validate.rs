//! Filepath: src/tree/validate.rs
//!
//! Whole-structure invariant checking.
//!
//! `validate` walks the entire tree and the leaf chain and cross-checks
//! them. It is a diagnostic for tests and debugging, not a fast path; a
//! failure means the structure is corrupt and the tree should be
//! considered poisoned.

use std::fmt as StdFmt;

use super::{BppTree, NodeRef};
use crate::key::IndexKey;
use crate::leaf::LeafId;

/// A broken structural invariant.
///
/// Any variant is fatal: the operation that produced it left the tree in
/// an inconsistent state, and no recovery is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A leaf's live keys are not strictly ascending.
    LeafUnsorted {
        /// Arena index of the offending leaf.
        leaf: usize,
    },

    /// A leaf's cached live count disagrees with its slots.
    LeafCountDrift {
        /// Arena index of the offending leaf.
        leaf: usize,
    },

    /// A leaf holds a key outside the range its ancestors route to it.
    RoutingBounds {
        /// Arena index of the offending leaf.
        leaf: usize,
    },

    /// An internode's separators are not strictly ascending.
    SeparatorOrder,

    /// An internode has more children than the configured order.
    FanoutExceeded {
        /// Observed child count.
        children: usize,
    },

    /// An internode's child count is not one more than its key count.
    ArityMismatch,

    /// Not all leaves sit at the same depth.
    UnevenLeafDepth,

    /// The `next` chain from `head` does not visit every leaf exactly
    /// once in tree order.
    BrokenChain,

    /// The tracked entry count disagrees with the chain walk.
    SizeDrift {
        /// Entries found by the walk.
        walked: usize,
        /// Entries tracked by the tree.
        tracked: usize,
    },
}

impl StdFmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        match self {
            Self::LeafUnsorted { leaf } => {
                write!(f, "leaf {leaf}: live keys out of order")
            }

            Self::LeafCountDrift { leaf } => {
                write!(f, "leaf {leaf}: live count disagrees with slots")
            }

            Self::RoutingBounds { leaf } => {
                write!(f, "leaf {leaf}: key outside its routed range")
            }

            Self::SeparatorOrder => write!(f, "internode separators out of order"),

            Self::FanoutExceeded { children } => {
                write!(f, "internode with {children} children exceeds the order")
            }

            Self::ArityMismatch => {
                write!(f, "internode child count is not key count + 1")
            }

            Self::UnevenLeafDepth => write!(f, "leaves at differing depths"),

            Self::BrokenChain => {
                write!(f, "leaf chain disagrees with tree order")
            }

            Self::SizeDrift { walked, tracked } => {
                write!(f, "chain walk found {walked} entries, tree tracks {tracked}")
            }
        }
    }
}

impl std::error::Error for InvariantViolation {}

impl<K: IndexKey, V> BppTree<K, V> {
    /// Walk the whole structure and verify every invariant.
    ///
    /// # Errors
    ///
    /// The first [`InvariantViolation`] encountered.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        let mut order_walk: Vec<(LeafId, usize)> = Vec::with_capacity(self.leaves.len());
        self.check_node(&self.root, 1, None, None, &mut order_walk)?;

        // All leaves at one depth.
        let depth = order_walk.first().map_or(1, |(_, d)| *d);
        if order_walk.iter().any(|(_, d)| *d != depth) {
            return Err(InvariantViolation::UnevenLeafDepth);
        }

        // The chain from head must visit exactly the tree-order leaves.
        let mut cursor = Some(self.head);
        for (expected, _) in &order_walk {
            let Some(id) = cursor else {
                return Err(InvariantViolation::BrokenChain);
            };
            if id != *expected {
                return Err(InvariantViolation::BrokenChain);
            }
            cursor = self.leaves[id.0].next();
        }
        if cursor.is_some() || order_walk.len() != self.leaves.len() {
            return Err(InvariantViolation::BrokenChain);
        }

        // Entry count.
        let walked: usize = self.leaves.iter().map(|leaf| leaf.live_count()).sum();
        if walked != self.size {
            return Err(InvariantViolation::SizeDrift {
                walked,
                tracked: self.size,
            });
        }

        Ok(())
    }

    /// Check one subtree. `lower`/`upper` are the routed key bounds
    /// (inclusive / exclusive); leaves are recorded in tree order.
    fn check_node(
        &self,
        node: &NodeRef<K>,
        depth: usize,
        lower: Option<K>,
        upper: Option<K>,
        order_walk: &mut Vec<(LeafId, usize)>,
    ) -> Result<(), InvariantViolation> {
        match node {
            NodeRef::Leaf(id) => {
                let leaf = &self.leaves[id.0];

                let mut live = 0usize;
                let mut last: Option<K> = None;
                for (key, _) in leaf.live_entries() {
                    live += 1;

                    if let Some(prior) = last {
                        if prior >= *key {
                            return Err(InvariantViolation::LeafUnsorted { leaf: id.0 });
                        }
                    }
                    last = Some(*key);

                    let below = lower.is_some_and(|bound| *key < bound);
                    let above = upper.is_some_and(|bound| *key >= bound);
                    if below || above {
                        return Err(InvariantViolation::RoutingBounds { leaf: id.0 });
                    }
                }

                if live != leaf.live_count() {
                    return Err(InvariantViolation::LeafCountDrift { leaf: id.0 });
                }

                order_walk.push((*id, depth));
                Ok(())
            }

            NodeRef::Internode(inner) => {
                if inner.child_count() != inner.key_count() + 1 {
                    return Err(InvariantViolation::ArityMismatch);
                }
                if inner.child_count() > self.config.order {
                    return Err(InvariantViolation::FanoutExceeded {
                        children: inner.child_count(),
                    });
                }

                for i in 1..inner.key_count() {
                    if inner.separator(i - 1) >= inner.separator(i) {
                        return Err(InvariantViolation::SeparatorOrder);
                    }
                }

                for idx in 0..inner.child_count() {
                    let child_lower = if idx == 0 {
                        lower
                    } else {
                        Some(inner.separator(idx - 1))
                    };
                    let child_upper = if idx == inner.key_count() {
                        upper
                    } else {
                        Some(inner.separator(idx))
                    };

                    self.check_node(inner.child(idx), depth + 1, child_lower, child_upper, order_walk)?;
                }

                Ok(())
            }
        }
    }
}
