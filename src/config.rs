//! Sweep configuration.
//!
//! All fields have defaults so a partial document deserialises; call
//! [`SweepConfig::validate`] before building a scheduler.

use crate::sweep_error::SweepError;
use serde::{Deserialize, Serialize};

/// How directions are grouped into angle sets.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AngleAggregation {
    /// One direction per angle set.
    Single,
    /// Directions sharing an octant (sign pattern) share an angle set.
    #[default]
    Octant,
}

/// Outer source-iteration controls.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IterationConfig {
    /// Convergence threshold on the max relative change of the scalar flux.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for IterationConfig {
    fn default() -> Self {
        Self {
            tolerance: 1.0e-6,
            max_iterations: 100,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub angle_aggregation: AngleAggregation,
    /// Upper bound on directions per angle set; 0 means unbounded.
    pub max_angles_per_set: usize,
    /// Number of contiguous group ranges swept as separate angle sets.
    pub num_group_subsets: usize,
    /// Angle sets admitted for execution at once; 0 means all.
    pub max_active_angle_sets: usize,
    /// First message tag; setup and reductions use the first three tags and
    /// angle set `k` uses `tag_base + 3 + k`.
    pub tag_base: u16,
    /// Log the sweep ordering report at debug level after building.
    pub log_ordering: bool,
    pub iteration: IterationConfig,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            angle_aggregation: AngleAggregation::Octant,
            max_angles_per_set: 0,
            num_group_subsets: 1,
            max_active_angle_sets: 0,
            tag_base: 0x5300,
            log_ordering: false,
            iteration: IterationConfig::default(),
        }
    }
}

impl SweepConfig {
    /// Reject configurations the scheduler cannot honour.
    pub fn validate(&self) -> Result<(), SweepError> {
        if self.num_group_subsets == 0 {
            return Err(SweepError::InvalidConfig(
                "num_group_subsets must be at least 1".into(),
            ));
        }
        if !(self.iteration.tolerance > 0.0) {
            return Err(SweepError::InvalidConfig(format!(
                "iteration tolerance must be positive, got {}",
                self.iteration.tolerance
            )));
        }
        if self.iteration.max_iterations == 0 {
            return Err(SweepError::InvalidConfig(
                "iteration max_iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(SweepConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_group_subsets_rejected() {
        let cfg = SweepConfig {
            num_group_subsets: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(SweepError::InvalidConfig(_))));
    }
}
