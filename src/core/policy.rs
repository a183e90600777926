// mission-runtime/src/core/policy.rs
// ============================================================================
// Module: Mission Runtime Policy Snapshot
// Description: Mission policy captured at run start.
// Purpose: Carry strictness, default routing, and tunable extras into a run.
// Dependencies: crate::core::significance, serde
// ============================================================================

//! ## Overview
//! The policy in effect for a run is captured once, at `start_mission_run`,
//! and never re-read from disk. Callers may pass a per-call override to
//! `next_step`, but the persisted snapshot policy remains the run's
//! default, per the "policy capture at start" design note.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::significance::RoutingBands;
use crate::core::significance::SignificanceError;
use crate::core::significance::TimeoutPolicy;

// ============================================================================
// SECTION: Strictness
// ============================================================================

/// Gate strictness level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    /// Gating disabled.
    Off,
    /// Standard gating.
    Medium,
    /// Maximum gating.
    Max,
}

// ============================================================================
// SECTION: Mission Policy Snapshot
// ============================================================================

/// Mission policy captured at run start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionPolicySnapshot {
    /// Gate strictness level.
    pub strictness: Strictness,
    /// Default routing target for unmatched cases.
    pub default_route: String,
    /// Free-form tunables: custom band cutoffs, default timeout seconds,
    /// whether fallback context resolvers are allowed.
    #[serde(default)]
    pub extras: serde_json::Map<String, Value>,
}

impl MissionPolicySnapshot {
    /// Parses custom band cutoffs from `extras`, falling back to the
    /// default cutoffs when absent.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Significance`] when `extras.band_cutoffs` is
    /// present but malformed.
    pub fn band_cutoffs(&self) -> Result<RoutingBands, PolicyError> {
        let Some(raw) = self.extras.get("band_cutoffs") else {
            return Ok(RoutingBands::default_bands());
        };
        let bands: RoutingBands =
            serde_json::from_value(raw.clone()).map_err(|err| PolicyError::Malformed(err.to_string()))?;
        bands.validate().map_err(PolicyError::Significance)?;
        Ok(bands)
    }

    /// Parses the significance timeout policy from `extras`, falling back
    /// to the default timeout policy when absent.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Significance`] when `extras.timeout_policy`
    /// is present but malformed.
    pub fn timeout_policy(&self) -> Result<TimeoutPolicy, PolicyError> {
        let Some(raw) = self.extras.get("timeout_policy") else {
            return Ok(TimeoutPolicy::new_default());
        };
        let policy: TimeoutPolicy = serde_json::from_value(raw.clone())
            .map_err(|err| PolicyError::Malformed(err.to_string()))?;
        policy.validate().map_err(PolicyError::Significance)?;
        Ok(policy)
    }

    /// Returns whether fallback context resolvers are allowed, defaulting
    /// to `false` when unset.
    #[must_use]
    pub fn allow_fallback_context_resolvers(&self) -> bool {
        self.extras.get("allow_fallback_context_resolvers").and_then(Value::as_bool).unwrap_or(false)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Policy construction and parsing errors.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// An `extras` tunable did not match its expected shape.
    #[error("malformed policy extra: {0}")]
    Malformed(String),
    /// A parsed significance tunable failed its own validation.
    #[error(transparent)]
    Significance(#[from] SignificanceError),
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test module")]

    use super::*;

    fn base_policy() -> MissionPolicySnapshot {
        MissionPolicySnapshot {
            strictness: Strictness::Medium,
            default_route: "default".to_string(),
            extras: serde_json::Map::new(),
        }
    }

    #[test]
    fn missing_band_cutoffs_falls_back_to_default() {
        let policy = base_policy();
        let bands = policy.band_cutoffs().unwrap();
        assert_eq!(bands, RoutingBands::default_bands());
    }

    #[test]
    fn missing_timeout_policy_falls_back_to_default() {
        let policy = base_policy();
        let timeout = policy.timeout_policy().unwrap();
        assert_eq!(timeout.default_timeout_seconds, 600);
    }
}
