//! Filepath: src/tree.rs
//!
//! `BppTree` - the tree facade.
//!
//! This module owns the skeleton: a root link, the leaf arena, and the
//! descent/ascent logic. Leaves do their own slot management
//! ([`crate::leaf`]); internodes do their own routing
//! ([`crate::internode`]); this module wires them together and keeps the
//! global bookkeeping (size, head of the leaf chain, predictor
//! counters).

use std::mem as StdMem;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::{ConfigError, TreeConfig};
use crate::internode::Internode;
use crate::key::IndexKey;
use crate::leaf::{GappedLeaf, LeafId, LeafInsert, ModelOutcome};
use crate::tracing_helpers::debug_log;

mod iter;
mod stats;
mod validate;

pub use iter::{Iter, Range};
pub use stats::TreeStats;
pub use validate::InvariantViolation;

// ============================================================================
//  NodeRef
// ============================================================================

/// A child link: an owned internal node, or a leaf by arena id.
///
/// Splits travel up the recursion as `(separator, NodeRef)` descriptors,
/// so no node ever needs a parent pointer.
#[derive(Debug)]
pub(crate) enum NodeRef<K: IndexKey> {
    /// An internal routing node.
    Internode(Box<Internode<K>>),

    /// A leaf, resolved through the tree's leaf arena.
    Leaf(LeafId),
}

// ============================================================================
//  BppTree
// ============================================================================

/// An in-memory ordered key/value index with gapped leaves and learned
/// per-leaf position predictors.
///
/// Keys are unique; inserting a present key overwrites its value and
/// returns the prior one. Reads never allocate. All operations are
/// single-threaded and synchronous.
///
/// # Type Parameters
///
/// * `K` - Key type (see [`IndexKey`])
/// * `V` - Value type, opaque to the tree
///
/// # Example
///
/// ```
/// use bpptree::BppTree;
///
/// let mut tree: BppTree<i64, &str> = BppTree::new(4, 16).unwrap();
/// tree.insert(7, "seven");
///
/// assert_eq!(tree.get(7), Some(&"seven"));
/// assert_eq!(tree.get(8), None);
/// ```
#[derive(Debug)]
pub struct BppTree<K: IndexKey, V> {
    /// Root link; a single leaf until the first split.
    root: NodeRef<K>,

    /// All leaves, in creation order. Leaves are never freed before
    /// teardown, so `LeafId`s are stable.
    leaves: Vec<GappedLeaf<K, V>>,

    /// Leftmost leaf; start of the chain walk.
    head: LeafId,

    /// Validated construction-time knobs.
    config: TreeConfig,

    /// Live entries across all leaves.
    size: usize,

    /// Lifetime count of lookups resolved inside the probe window.
    /// Relaxed counters so `get` stays `&self`.
    model_hits: AtomicU64,

    /// Lifetime count of trained-model lookups that fell back to binary
    /// search.
    model_misses: AtomicU64,
}

impl<K: IndexKey, V> BppTree<K, V> {
    /// Create a tree with the given fanout and initial leaf slot count,
    /// defaults for the adaptivity knobs.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] if `order < 3` or `initial_leaf_capacity < 4`.
    pub fn new(order: usize, initial_leaf_capacity: usize) -> Result<Self, ConfigError> {
        Self::with_config(TreeConfig::new(order, initial_leaf_capacity))
    }

    /// Create a tree from a full [`TreeConfig`].
    ///
    /// # Errors
    ///
    /// [`ConfigError`] naming the first invalid knob.
    pub fn with_config(config: TreeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    /// Construction after validation. Also the `Default` path, where the
    /// knobs are known good.
    fn from_valid(config: TreeConfig) -> Self {
        let head = LeafId(0);
        Self {
            root: NodeRef::Leaf(head),
            leaves: vec![GappedLeaf::new(config.initial_leaf_capacity)],
            head,
            config,
            size: 0,
            model_hits: AtomicU64::new(0),
            model_misses: AtomicU64::new(0),
        }
    }

    // ========================================================================
    //  Accessors
    // ========================================================================

    /// The configuration this tree was built with.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Number of live entries.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.size
    }

    /// Whether the tree holds no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Levels from the root down to (and including) the leaves.
    #[must_use]
    pub fn height(&self) -> usize {
        let mut levels = 1;
        let mut node = &self.root;
        while let NodeRef::Internode(inner) = node {
            levels += 1;
            node = inner.child(0);
        }
        levels
    }

    /// Lifetime count of slots moved by boundary shifts, summed over all
    /// leaves. A gap-efficiency diagnostic for benchmark reports: a
    /// plain sorted-array leaf would move half a leaf per insert.
    #[must_use]
    pub fn shift_count(&self) -> u64 {
        self.leaves.iter().map(GappedLeaf::shifted_slots).sum()
    }

    /// Reset every leaf predictor to untrained.
    ///
    /// Lookups fall back to binary search until the leaves retrain
    /// through their normal insert cadence. Intended for predictor
    /// on/off measurements; results of every operation are unaffected.
    pub fn clear_models(&mut self) {
        for leaf in &mut self.leaves {
            leaf.clear_model();
        }
    }

    // ========================================================================
    //  Point operations
    // ========================================================================

    /// Insert or overwrite, returning the prior value for an overwrite.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let Self {
            root,
            leaves,
            config,
            ..
        } = self;

        let (prior, split) = insert_rec(root, leaves, config, key, value);

        if let Some((separator, right)) = split {
            debug_log!(separator = ?separator, "root split");
            let left = StdMem::replace(&mut self.root, NodeRef::Leaf(self.head));
            self.root = NodeRef::Internode(Box::new(Internode::from_split(left, separator, right)));
        }

        if prior.is_none() {
            self.size += 1;
        }
        prior
    }

    /// Look up a key.
    pub fn get(&self, key: K) -> Option<&V> {
        let leaf = &self.leaves[self.locate_leaf(key).0];
        let (value, outcome) = leaf.lookup(key, &self.config);

        match outcome {
            ModelOutcome::Hit => {
                self.model_hits.fetch_add(1, Ordering::Relaxed);
            }
            ModelOutcome::Miss => {
                self.model_misses.fetch_add(1, Ordering::Relaxed);
            }
            ModelOutcome::Untrained => {}
        }

        value
    }

    /// Whether a key is present.
    #[must_use]
    pub fn contains_key(&self, key: K) -> bool {
        self.get(key).is_some()
    }

    /// Remove a key, returning its value.
    ///
    /// Leaves are never merged or rebalanced by removal; a drained leaf
    /// stays in the chain with zero live slots.
    pub fn remove(&mut self, key: K) -> Option<V> {
        let leaf_id = self.locate_leaf(key);
        let removed = self.leaves[leaf_id.0].delete(key, &self.config);
        if removed.is_some() {
            self.size -= 1;
        }
        removed
    }

    /// Descend to the unique leaf whose key range covers `key`.
    fn locate_leaf(&self, key: K) -> LeafId {
        let mut node = &self.root;
        loop {
            match node {
                NodeRef::Leaf(id) => return *id,
                NodeRef::Internode(inner) => node = inner.child(inner.route(key)),
            }
        }
    }
}

// ============================================================================
//  Insert descent
// ============================================================================

/// Recursive insert: descend to the target leaf, bubble splits back up
/// as `(separator, new sibling)`.
fn insert_rec<K: IndexKey, V>(
    node: &mut NodeRef<K>,
    leaves: &mut Vec<GappedLeaf<K, V>>,
    config: &TreeConfig,
    key: K,
    value: V,
) -> (Option<V>, Option<(K, NodeRef<K>)>) {
    match node {
        NodeRef::Leaf(id) => {
            let leaf_id = *id;
            match leaves[leaf_id.0].insert(key, value, config) {
                LeafInsert::Replaced(prior) => (Some(prior), None),

                LeafInsert::Inserted => (None, None),

                LeafInsert::Full(key, value) => {
                    let (separator, right) = leaves[leaf_id.0].split_off(config);
                    let right_id = LeafId(leaves.len());
                    leaves[leaf_id.0].set_next(Some(right_id));
                    leaves.push(right);

                    // The pending entry now fits: a fresh half either has
                    // gaps or grows on its first compaction.
                    let target = if key >= separator { right_id } else { leaf_id };
                    match leaves[target.0].insert(key, value, config) {
                        LeafInsert::Inserted => {}
                        LeafInsert::Replaced(_) | LeafInsert::Full(..) => {
                            unreachable!("fresh split half rejected the pending insert")
                        }
                    }

                    (None, Some((separator, NodeRef::Leaf(right_id))))
                }
            }
        }

        NodeRef::Internode(inner) => {
            let idx = inner.route(key);
            let (prior, split) = insert_rec(inner.child_mut(idx), leaves, config, key, value);

            let Some((separator, right)) = split else {
                return (prior, None);
            };

            inner.absorb_split(idx, separator, right);
            if inner.child_count() <= config.order {
                return (prior, None);
            }

            let (promoted, right_node) = inner.split(config.order);
            (
                prior,
                Some((promoted, NodeRef::Internode(Box::new(right_node)))),
            )
        }
    }
}

impl<K: IndexKey, V> Default for BppTree<K, V> {
    /// A tree with [`TreeConfig::default`] knobs.
    fn default() -> Self {
        Self::from_valid(TreeConfig::default())
    }
}
