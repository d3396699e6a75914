//! Filepath: src/leaf.rs
//!
//! Gapped-array leaf for [`BppTree`](crate::tree::BppTree).
//!
//! A leaf is an ordered slot array where live `(key, value)` entries are
//! interleaved with empty slots. The empties are deliberate: an insert
//! usually lands in a gap next to its sorted position, costing O(1)
//! instead of a half-leaf shift. Live entries are always sorted; gaps may
//! appear anywhere between them.
//!
//! Each leaf also owns a [`LinearModel`] trained on the *physical* slot
//! indices of its live keys. Because gap placement prefers slots near the
//! predicted position, the model keeps working as the layout evolves, and
//! lookups resolve inside a small probe window most of the time.
//!
//! # Adaptivity
//!
//! A leaf that runs out of gaps compacts: live entries are re-spread at a
//! uniform stride across the slot array. A leaf that compacts too often
//! while staying nearly full grows its slot array instead, trading memory
//! for insert locality. Both decisions are local to the leaf.

use std::cmp::Ordering;
use std::mem as StdMem;

use crate::config::TreeConfig;
use crate::key::IndexKey;
use crate::model::LinearModel;
use crate::tracing_helpers::{debug_log, trace_log};

/// Fullness gate for capacity growth: a leaf only grows when at least
/// this fraction of its slots is live.
const GROWTH_FULLNESS: f64 = 0.8;

/// Stable handle to a leaf in the tree's leaf arena.
///
/// Leaves are never freed before tree teardown, so ids stay valid for
/// the life of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LeafId(pub(crate) usize);

/// Outcome of a leaf-level insert.
#[derive(Debug)]
pub(crate) enum LeafInsert<K, V> {
    /// Key already present; prior value returned.
    Replaced(V),

    /// Entry placed; no structural change needed.
    Inserted,

    /// No slot even after compaction; the caller must split.
    /// Carries the pending entry back to the caller for the retry.
    Full(K, V),
}

/// How the predictor participated in a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ModelOutcome {
    /// Probe window contained the key.
    Hit,

    /// Trained model probed but the window missed; binary search decided.
    Miss,

    /// Model untrained; binary search decided.
    Untrained,
}

/// Result of the skip-gap binary search.
#[derive(Debug, Clone, Copy)]
enum Probe {
    /// Key is live at this physical slot.
    Found(usize),

    /// Key absent. Every live key below the boundary index is smaller,
    /// every live key at or above it is greater.
    Boundary(usize),
}

// ============================================================================
//  GappedLeaf
// ============================================================================

/// A leaf node: gapped slots, predictor, adaptivity counters, chain link.
#[derive(Debug)]
pub(crate) struct GappedLeaf<K: IndexKey, V> {
    /// `cap` physical slots; `None` is a gap.
    slots: Vec<Option<(K, V)>>,

    /// Number of live slots.
    live: usize,

    /// Inserts since the predictor last fit.
    insertions_since_train: u32,

    /// Compactions since the last capacity growth.
    compactions: u32,

    /// Insert operations since the last capacity growth.
    ops_since_reset: u32,

    /// Lifetime compactions, never reset. Feeds statistics.
    compactions_total: u64,

    /// Lifetime slots moved by boundary shifts, never reset.
    shifted_slots: u64,

    /// Learned position predictor.
    model: LinearModel,

    /// Next leaf in key order, or `None` for the rightmost leaf.
    next: Option<LeafId>,
}

impl<K: IndexKey, V> GappedLeaf<K, V> {
    /// Create an empty leaf with `cap` slots.
    #[must_use]
    pub(crate) fn new(cap: usize) -> Self {
        debug_assert!(cap > 0);

        let mut slots = Vec::with_capacity(cap);
        slots.resize_with(cap, || None);

        Self {
            slots,
            live: 0,
            insertions_since_train: 0,
            compactions: 0,
            ops_since_reset: 0,
            compactions_total: 0,
            shifted_slots: 0,
            model: LinearModel::default(),
            next: None,
        }
    }

    // ========================================================================
    //  Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub(crate) fn cap(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    #[must_use]
    pub(crate) const fn live_count(&self) -> usize {
        self.live
    }

    #[inline]
    #[must_use]
    pub(crate) const fn next(&self) -> Option<LeafId> {
        self.next
    }

    #[inline]
    pub(crate) fn set_next(&mut self, next: Option<LeafId>) {
        self.next = next;
    }

    #[inline]
    #[must_use]
    pub(crate) const fn model_trained(&self) -> bool {
        self.model.is_trained()
    }

    #[inline]
    #[must_use]
    pub(crate) const fn compactions_total(&self) -> u64 {
        self.compactions_total
    }

    #[inline]
    #[must_use]
    pub(crate) const fn shifted_slots(&self) -> u64 {
        self.shifted_slots
    }

    /// Fraction of slots that are live.
    #[must_use]
    pub(crate) fn utilization(&self) -> f64 {
        self.live as f64 / self.cap() as f64
    }

    /// The entry at a physical slot, if live.
    #[inline]
    #[must_use]
    pub(crate) fn entry(&self, slot: usize) -> Option<&(K, V)> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Live entries in key order.
    pub(crate) fn live_entries(&self) -> impl Iterator<Item = &(K, V)> + '_ {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Smallest live key, if any.
    #[must_use]
    pub(crate) fn min_live_key(&self) -> Option<K> {
        self.live_entries().next().map(|(k, _)| *k)
    }

    /// Drop the predictor fit. Lookups fall back to binary search until
    /// the next training event.
    pub(crate) fn clear_model(&mut self) {
        self.model.invalidate();
    }

    // ========================================================================
    //  Search
    // ========================================================================

    /// Point lookup: probe window first, binary search as fallback.
    pub(crate) fn lookup(&self, key: K, config: &TreeConfig) -> (Option<&V>, ModelOutcome) {
        if self.model.is_trained() {
            if let Some(pos) = self.window_probe(key, config) {
                let value = self.slots[pos].as_ref().map(|(_, v)| v);
                return (value, ModelOutcome::Hit);
            }

            let value = match self.locate(key) {
                Probe::Found(pos) => self.slots[pos].as_ref().map(|(_, v)| v),
                Probe::Boundary(_) => None,
            };
            return (value, ModelOutcome::Miss);
        }

        let value = match self.locate(key) {
            Probe::Found(pos) => self.slots[pos].as_ref().map(|(_, v)| v),
            Probe::Boundary(_) => None,
        };
        (value, ModelOutcome::Untrained)
    }

    /// Scan the probe window around the predicted position for an exact
    /// match.
    fn window_probe(&self, key: K, config: &TreeConfig) -> Option<usize> {
        let predicted = self.model.predict(key.as_model_input(), self.cap());
        let window_lo = predicted.saturating_sub(config.probe_radius);
        let window_hi = (predicted + config.probe_radius).min(self.cap() - 1);

        (window_lo..=window_hi)
            .find(|&i| matches!(&self.slots[i], Some((k, _)) if *k == key))
    }

    /// Binary search over live slots, skipping gaps.
    ///
    /// Gaps make the midpoint potentially empty; the probe walks right to
    /// the nearest live slot inside the half before comparing. An
    /// all-empty right half collapses the range onto the left half.
    fn locate(&self, key: K) -> Probe {
        let mut lo = 0usize;
        let mut hi = self.cap();

        while lo < hi {
            let mid = lo + (hi - lo) / 2;

            let live = (mid..hi).find_map(|i| self.slots[i].as_ref().map(|(k, _)| (i, *k)));
            match live {
                None => hi = mid,
                Some((at, found)) => match found.cmp(&key) {
                    Ordering::Equal => return Probe::Found(at),
                    Ordering::Less => lo = at + 1,
                    Ordering::Greater => hi = at,
                },
            }
        }

        Probe::Boundary(lo)
    }

    // ========================================================================
    //  Insert
    // ========================================================================

    /// Insert or overwrite.
    ///
    /// Placement preference: a gap inside the insertion interval nearest
    /// the predicted position, then a one-slot shift of the shortest live
    /// run toward the nearest outside gap. A leaf with no gaps at all
    /// compacts (and possibly grows) once before reporting
    /// [`LeafInsert::Full`].
    pub(crate) fn insert(&mut self, key: K, value: V, config: &TreeConfig) -> LeafInsert<K, V> {
        self.ops_since_reset = self.ops_since_reset.saturating_add(1);

        // Overwrite fast path through the probe window.
        if self.model.is_trained() {
            if let Some(pos) = self.window_probe(key, config) {
                if let Some((_, slot_value)) = self.slots[pos].as_mut() {
                    return LeafInsert::Replaced(StdMem::replace(slot_value, value));
                }
            }
        }

        let mut attempt = 0;
        loop {
            match self.locate(key) {
                Probe::Found(pos) => {
                    if let Some((found, prior)) = self.slots[pos].take() {
                        self.slots[pos] = Some((found, value));
                        return LeafInsert::Replaced(prior);
                    }
                }

                Probe::Boundary(boundary) => {
                    if let Some(slot) = self.slot_for_insert(boundary, key) {
                        debug_assert!(self.slots[slot].is_none());

                        self.slots[slot] = Some((key, value));
                        self.live += 1;
                        self.insertions_since_train += 1;

                        if self.insertions_since_train >= config.training_interval
                            && self.live >= 2
                        {
                            self.train();
                        }

                        return LeafInsert::Inserted;
                    }
                }
            }

            if attempt > 0 || !self.compact_and_grow(config) {
                return LeafInsert::Full(key, value);
            }
            attempt += 1;
        }
    }

    /// Pick (and if needed, shift open) an empty slot for a key absent at
    /// `boundary`. `None` means the leaf has no empty slot at all.
    fn slot_for_insert(&mut self, boundary: usize, key: K) -> Option<usize> {
        let prev = (0..boundary).rev().find(|&i| self.slots[i].is_some());
        let next = (boundary..self.cap()).find(|&i| self.slots[i].is_some());

        // Slots strictly between the neighbors are all gaps.
        let gap_lo = prev.map_or(0, |p| p + 1);
        let gap_hi = next.unwrap_or_else(|| self.cap());

        if gap_lo < gap_hi {
            // Contiguous run of acceptable gaps: "nearest to the hint,
            // ties toward the midpoint" reduces to clamping.
            let midpoint = (gap_lo + gap_hi - 1) / 2;
            let target = if self.model.is_trained() {
                self.model.predict(key.as_model_input(), self.cap())
            } else {
                midpoint
            };
            return Some(target.clamp(gap_lo, gap_hi - 1));
        }

        // Interval is packed. Shift one run of live entries toward the
        // nearest outside gap.
        let gap_left = prev.and_then(|p| (0..=p).rev().find(|&i| self.slots[i].is_none()));
        let gap_right = (gap_hi..self.cap()).find(|&i| self.slots[i].is_none());

        let left_run = match (gap_left, prev) {
            (Some(gap), Some(p)) => Some(p - gap),
            _ => None,
        };
        let right_run = gap_right.map(|gap| gap - gap_hi);

        match (left_run, right_run) {
            (None, None) => None,

            // Shorter run wins; ties shift right.
            (left, Some(right)) if left.map_or(true, |l| right <= l) => {
                let gap = gap_hi + right;
                for i in (gap_hi..gap).rev() {
                    self.slots.swap(i, i + 1);
                }
                self.shifted_slots += right as u64;
                Some(gap_hi)
            }

            _ => {
                let run_end = prev?;
                let gap = run_end - left_run?;
                for i in gap..run_end {
                    self.slots.swap(i, i + 1);
                }
                self.shifted_slots += (run_end - gap) as u64;
                Some(run_end)
            }
        }
    }

    // ========================================================================
    //  Delete
    // ========================================================================

    /// Remove a key, leaving its slot empty. No merging, no rebalancing;
    /// a leaf may reach `live_count == 0` and stays in the chain.
    pub(crate) fn delete(&mut self, key: K, config: &TreeConfig) -> Option<V> {
        let pos = if self.model.is_trained() {
            self.window_probe(key, config)
        } else {
            None
        };

        let pos = pos.or_else(|| match self.locate(key) {
            Probe::Found(at) => Some(at),
            Probe::Boundary(_) => None,
        })?;

        let (_, value) = self.slots[pos].take()?;
        self.live -= 1;
        Some(value)
    }

    // ========================================================================
    //  Compaction, growth, training
    // ========================================================================

    /// Re-spread live entries at a uniform stride across the current
    /// slots, clearing every gap, then grow capacity if the leaf has
    /// been compacting too often while nearly full.
    ///
    /// Returns whether capacity grew.
    pub(crate) fn compact_and_grow(&mut self, config: &TreeConfig) -> bool {
        self.compact();

        let rate = f64::from(self.compactions) / f64::from(self.ops_since_reset.max(1));
        let full_enough = self.live as f64 >= self.cap() as f64 * GROWTH_FULLNESS;
        if rate <= config.growth_trigger || !full_enough {
            return false;
        }

        let grown = (self.cap() as f64 * config.growth_factor).ceil() as usize;
        let new_cap = grown.max(self.cap() + 1);
        debug_log!(
            old_cap = self.cap(),
            new_cap,
            live = self.live,
            "leaf capacity grows"
        );

        self.respread_to(new_cap);
        self.compactions = 0;
        self.ops_since_reset = 0;
        self.train();
        true
    }

    /// One compaction step: uniform re-spread over the current capacity.
    fn compact(&mut self) {
        trace_log!(cap = self.cap(), live = self.live, "leaf compaction");

        self.compactions += 1;
        self.compactions_total += 1;
        self.respread_to(self.cap());
        self.train();
    }

    /// Rebuild the slot array at `new_cap` slots with live entries at
    /// uniform stride. Flooring collisions nudge the later entry right.
    fn respread_to(&mut self, new_cap: usize) {
        let entries: Vec<(K, V)> = self.slots.drain(..).flatten().collect();
        debug_assert!(entries.len() <= new_cap);
        self.rebuild(entries, new_cap);
    }

    /// Replace the slot array with `entries` spread across `new_cap`
    /// slots. Counters are untouched; callers decide resets.
    fn rebuild(&mut self, entries: Vec<(K, V)>, new_cap: usize) {
        self.slots.clear();
        self.slots.resize_with(new_cap, || None);

        let n = entries.len();
        let denominator = n.saturating_sub(1).max(1);
        let mut last: Option<usize> = None;

        for (rank, entry) in entries.into_iter().enumerate() {
            let mut pos = rank * (new_cap - 1) / denominator;
            if let Some(prior) = last {
                if pos <= prior {
                    pos = prior + 1;
                }
            }
            self.slots[pos] = Some(entry);
            last = Some(pos);
        }

        self.live = n;
    }

    /// Fit the predictor on `(key, physical index)` samples of the
    /// current layout.
    fn train(&mut self) {
        let samples = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|(k, _)| (k.as_model_input(), i as f64)));
        self.model.fit(samples);
        self.insertions_since_train = 0;
    }

    // ========================================================================
    //  Split
    // ========================================================================

    /// Split a packed leaf in half.
    ///
    /// Both halves get `max(initial_leaf_capacity, ceil(cap / 2))` slots
    /// with their entries re-spread, fresh adaptivity counters, and a
    /// fresh predictor fit. Returns the separator (smallest key of the
    /// right half) and the right sibling; the caller re-links `next` and
    /// retries the pending insert against the correct half.
    pub(crate) fn split_off(&mut self, config: &TreeConfig) -> (K, Self) {
        debug_assert!(self.live >= 2, "split of a leaf with fewer than 2 entries");

        let old_cap = self.cap();
        let mut entries: Vec<(K, V)> = self.slots.drain(..).flatten().collect();
        let upper = entries.split_off(entries.len() / 2);
        let separator = upper[0].0;

        let new_cap = config.initial_leaf_capacity.max(old_cap.div_ceil(2));
        debug_log!(
            old_cap,
            new_cap,
            lower = entries.len(),
            upper = upper.len(),
            separator = ?separator,
            "leaf split"
        );

        self.rebuild(entries, new_cap);
        self.reset_adaptivity();
        self.train();

        let mut right = Self::new(new_cap);
        right.rebuild(upper, new_cap);
        right.train();
        right.next = self.next;

        (separator, right)
    }

    fn reset_adaptivity(&mut self) {
        self.compactions = 0;
        self.ops_since_reset = 0;
        self.insertions_since_train = 0;
    }
}

// ============================================================================
//  Tests
// ============================================================================
