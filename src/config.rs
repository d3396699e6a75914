//! Filepath: src/config.rs
//!
//! Construction-time configuration for [`BppTree`](crate::tree::BppTree).
//!
//! Every knob is validated before the tree is built; a bad value is a
//! [`ConfigError`], never a later surprise.

use std::fmt as StdFmt;

/// Default insertions between predictor fits.
pub const DEFAULT_TRAINING_INTERVAL: u32 = 10;

/// Default half-width of the predictor probe window.
pub const DEFAULT_PROBE_RADIUS: usize = 3;

/// Default compaction-rate threshold that triggers capacity growth.
pub const DEFAULT_GROWTH_TRIGGER: f64 = 0.30;

/// Default capacity multiplier applied on growth.
pub const DEFAULT_GROWTH_FACTOR: f64 = 1.5;

/// Tuning knobs fixed at construction.
///
/// `order` and `initial_leaf_capacity` shape the tree skeleton; the
/// remaining knobs tune per-leaf adaptivity. [`TreeConfig::default`]
/// matches the reference tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeConfig {
    /// Maximum children per internal node. Must be >= 3.
    pub order: usize,

    /// Slot count of every freshly created leaf. Must be >= 4.
    pub initial_leaf_capacity: usize,

    /// Insertions between predictor fits. Must be >= 1.
    pub training_interval: u32,

    /// Half-width of the probe window around a predicted position.
    /// Must be >= 1.
    pub probe_radius: usize,

    /// Compaction-rate threshold above which a full-enough leaf grows.
    /// Must be within (0, 1).
    pub growth_trigger: f64,

    /// Capacity multiplier applied when a leaf grows. Must be > 1 and
    /// finite.
    pub growth_factor: f64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            order: 16,
            initial_leaf_capacity: 16,
            training_interval: DEFAULT_TRAINING_INTERVAL,
            probe_radius: DEFAULT_PROBE_RADIUS,
            growth_trigger: DEFAULT_GROWTH_TRIGGER,
            growth_factor: DEFAULT_GROWTH_FACTOR,
        }
    }
}

impl TreeConfig {
    /// Shorthand for the two structural knobs, defaults for the rest.
    #[must_use]
    pub fn new(order: usize, initial_leaf_capacity: usize) -> Self {
        Self {
            order,
            initial_leaf_capacity,
            ..Self::default()
        }
    }

    /// Check every knob, returning the first offender.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the invalid knob.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.order < 3 {
            return Err(ConfigError::Order(self.order));
        }

        if self.initial_leaf_capacity < 4 {
            return Err(ConfigError::LeafCapacity(self.initial_leaf_capacity));
        }

        if self.training_interval == 0 {
            return Err(ConfigError::TrainingInterval);
        }

        if self.probe_radius == 0 {
            return Err(ConfigError::ProbeRadius);
        }

        if !(self.growth_trigger > 0.0 && self.growth_trigger < 1.0) {
            return Err(ConfigError::GrowthTrigger(self.growth_trigger));
        }

        if !(self.growth_factor > 1.0 && self.growth_factor.is_finite()) {
            return Err(ConfigError::GrowthFactor(self.growth_factor));
        }

        Ok(())
    }
}

// ============================================================================
//  ConfigError
// ============================================================================

/// A rejected [`TreeConfig`] knob.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// `order` below the minimum fanout of 3.
    Order(usize),

    /// `initial_leaf_capacity` below the minimum of 4 slots.
    LeafCapacity(usize),

    /// `training_interval` of zero would retrain on every insert check.
    TrainingInterval,

    /// `probe_radius` of zero disables the probe window entirely.
    ProbeRadius,

    /// `growth_trigger` outside (0, 1).
    GrowthTrigger(f64),

    /// `growth_factor` not a finite value above 1.
    GrowthFactor(f64),
}

impl StdFmt::Display for ConfigError {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        match self {
            Self::Order(got) => {
                write!(f, "order must be at least 3, got {got}")
            }

            Self::LeafCapacity(got) => {
                write!(f, "initial_leaf_capacity must be at least 4, got {got}")
            }

            Self::TrainingInterval => write!(f, "training_interval must be at least 1"),

            Self::ProbeRadius => write!(f, "probe_radius must be at least 1"),

            Self::GrowthTrigger(got) => {
                write!(f, "growth_trigger must be within (0, 1), got {got}")
            }

            Self::GrowthFactor(got) => {
                write!(f, "growth_factor must be finite and above 1, got {got}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
