// mission-runtime/src/core/significance.rs
// ============================================================================
// Module: Mission Runtime Significance Scoring
// Description: Six-dimension significance scoring, hard triggers, and bands.
// Purpose: Classify audit checkpoints into auto-proceed / soft gate / hard gate.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Significance scoring is a pure function of a fixed set of named impact
//! dimensions plus an optional set of hard-trigger classes. It never reads
//! a clock or the filesystem; every error is rejected eagerly at
//! construction so the planner never has to reason about an invalid score.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Dimensions
// ============================================================================

/// The six fixed significance dimension names, in the order the composite
/// score is reported.
pub const DIMENSION_NAMES: [&str; 6] = [
    "architectural_system_impact",
    "cross_team_blast_radius",
    "data_security_compliance_impact",
    "financial_commercial_impact",
    "operational_reliability_impact",
    "user_customer_impact",
];

/// Maximum score for any single dimension.
pub const MAX_DIMENSION_SCORE: u8 = 3;

/// Upper bound of the composite score (six dimensions at maximum).
pub const MAX_COMPOSITE_SCORE: u16 = 18;

// ============================================================================
// SECTION: Hard Trigger Classes
// ============================================================================

/// The five fixed hard-trigger class ids recognized in v1.
pub const HARD_TRIGGER_CLASSES: [&str; 5] = [
    "architecture_foundation",
    "billing_financial_commitment",
    "legal_compliance_regulatory",
    "production_data_destructive",
    "security_privacy_access_control",
];

// ============================================================================
// SECTION: Bands
// ============================================================================

/// A named, contiguous routing band over the composite score range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    /// Auto-proceed.
    Low,
    /// Soft gate.
    Medium,
    /// Hard gate.
    High,
}

/// A single `[min, max]` cutoff for one band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandCutoff {
    /// Inclusive lower bound.
    pub min: u16,
    /// Inclusive upper bound.
    pub max: u16,
}

/// The full set of band cutoffs covering `0..=18`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingBands {
    /// Low-band cutoff.
    pub low: BandCutoff,
    /// Medium-band cutoff.
    pub medium: BandCutoff,
    /// High-band cutoff.
    pub high: BandCutoff,
}

impl RoutingBands {
    /// Returns the default band cutoffs: `low:[0,6] medium:[7,11] high:[12,18]`.
    #[must_use]
    pub const fn default_bands() -> Self {
        Self {
            low: BandCutoff {
                min: 0,
                max: 6,
            },
            medium: BandCutoff {
                min: 7,
                max: 11,
            },
            high: BandCutoff {
                min: 12,
                max: 18,
            },
        }
    }

    /// Validates that the three cutoffs are contiguous, start at 0, end at
    /// 18, and each has `min <= max`.
    ///
    /// # Errors
    ///
    /// Returns [`SignificanceError::InvalidBandCutoffs`] when the cutoffs
    /// are malformed.
    pub fn validate(&self) -> Result<(), SignificanceError> {
        let ordered = [("low", self.low), ("medium", self.medium), ("high", self.high)];

        for (name, cutoff) in ordered {
            if cutoff.min > cutoff.max {
                return Err(SignificanceError::InvalidBandCutoffs(format!(
                    "band {name} has min {} greater than max {}",
                    cutoff.min, cutoff.max
                )));
            }
        }

        if self.low.min != 0 {
            return Err(SignificanceError::InvalidBandCutoffs(
                "band cutoffs must start at 0".to_string(),
            ));
        }
        if self.high.max != MAX_COMPOSITE_SCORE {
            return Err(SignificanceError::InvalidBandCutoffs(format!(
                "band cutoffs must end at {MAX_COMPOSITE_SCORE}"
            )));
        }
        if self.medium.min != self.low.max + 1 {
            return Err(SignificanceError::InvalidBandCutoffs(
                "low and medium bands must be contiguous with no gap or overlap".to_string(),
            ));
        }
        if self.high.min != self.medium.max + 1 {
            return Err(SignificanceError::InvalidBandCutoffs(
                "medium and high bands must be contiguous with no gap or overlap".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolves the band containing `composite`.
    ///
    /// # Panics
    ///
    /// Panics if `self` was not validated via [`RoutingBands::validate`]
    /// first and no band covers `composite`; callers must validate cutoffs
    /// at construction time.
    #[must_use]
    pub fn band_for(&self, composite: u16) -> Band {
        if composite <= self.low.max {
            Band::Low
        } else if composite <= self.medium.max {
            Band::Medium
        } else {
            Band::High
        }
    }
}

impl Default for RoutingBands {
    fn default() -> Self {
        Self::default_bands()
    }
}

// ============================================================================
// SECTION: Significance Block (template-authored)
// ============================================================================

/// Significance authoring block on an audit step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignificanceBlock {
    /// Scores for each of the six fixed dimensions.
    pub dimensions: BTreeMap<String, u8>,
    /// Hard-trigger class ids that apply to this checkpoint.
    #[serde(default)]
    pub hard_triggers: Vec<String>,
}

impl SignificanceBlock {
    /// Validates dimension-name completeness, score ranges, and hard
    /// trigger ids, returning the evaluated score.
    ///
    /// # Errors
    ///
    /// Returns [`SignificanceError`] when the dimension set is wrong, a
    /// score is out of range, or an unknown hard-trigger id is present.
    pub fn evaluate(&self, bands: &RoutingBands) -> Result<SignificanceScore, SignificanceError> {
        evaluate_significance(&self.dimensions, &self.hard_triggers, bands)
    }

    /// Validates dimension completeness, score ranges, and hard-trigger ids
    /// without requiring a set of routing bands. Used at template
    /// construction time, before a policy (and its band cutoffs) exists.
    ///
    /// # Errors
    ///
    /// Returns [`SignificanceError`] when the dimension set is wrong, a
    /// score is out of range, or an unknown hard-trigger id is present.
    pub fn validate_shape(&self) -> Result<(), SignificanceError> {
        validate_dimension_scores(&self.dimensions)?;
        for trigger in &self.hard_triggers {
            if !HARD_TRIGGER_CLASSES.contains(&trigger.as_str()) {
                return Err(SignificanceError::UnknownHardTrigger(trigger.clone()));
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Significance Score
// ============================================================================

/// A validated significance score: per-dimension values, composite, numeric
/// band, and effective band (which hard triggers can escalate to `high`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignificanceScore {
    /// Dimension scores, sorted lexicographically by name for reproducible
    /// serialization.
    pub dimensions: Vec<(String, u8)>,
    /// Hard-trigger class ids present, sorted.
    pub hard_trigger_classes: Vec<String>,
    /// Sum of the six dimension scores.
    pub composite: u16,
    /// Band implied by the composite score alone.
    pub band: Band,
    /// Band after hard-trigger escalation: `high` if any trigger is
    /// present, otherwise equal to `band`.
    pub effective_band: Band,
}

/// Significance validation and scoring errors.
#[derive(Debug, Error)]
pub enum SignificanceError {
    /// The dimension map did not exactly match the six fixed names.
    #[error("significance dimensions must be exactly {DIMENSION_NAMES:?}, got: {0:?}")]
    InvalidDimensionSet(Vec<String>),
    /// A dimension score fell outside `[0, 3]`.
    #[error("dimension {0} score {1} is out of range [0, {MAX_DIMENSION_SCORE}]")]
    DimensionScoreOutOfRange(String, u8),
    /// A hard-trigger id was not among the fixed registry.
    #[error("unknown hard trigger class: {0}")]
    UnknownHardTrigger(String),
    /// Custom band cutoffs failed validation.
    #[error("invalid band cutoffs: {0}")]
    InvalidBandCutoffs(String),
    /// A timeout value was not strictly positive.
    #[error("timeout seconds must be positive, got {0}")]
    InvalidTimeout(i64),
}

/// Validates dimension scores and hard triggers, then scores them against
/// the given bands.
///
/// # Errors
///
/// Returns [`SignificanceError`] when the dimension set, a score, or a
/// hard-trigger id is invalid.
pub fn evaluate_significance(
    dimension_scores: &BTreeMap<String, u8>,
    hard_trigger_classes: &[String],
    bands: &RoutingBands,
) -> Result<SignificanceScore, SignificanceError> {
    validate_dimension_scores(dimension_scores)?;
    for trigger in hard_trigger_classes {
        if !HARD_TRIGGER_CLASSES.contains(&trigger.as_str()) {
            return Err(SignificanceError::UnknownHardTrigger(trigger.clone()));
        }
    }

    let mut dimensions: Vec<(String, u8)> =
        dimension_scores.iter().map(|(name, score)| (name.clone(), *score)).collect();
    dimensions.sort_by(|left, right| left.0.cmp(&right.0));

    let composite: u16 = dimensions.iter().map(|(_, score)| u16::from(*score)).sum();

    let mut hard_trigger_classes: Vec<String> = hard_trigger_classes.to_vec();
    hard_trigger_classes.sort();

    let band = bands.band_for(composite);
    let effective_band = if hard_trigger_classes.is_empty() { band } else { Band::High };

    Ok(SignificanceScore {
        dimensions,
        hard_trigger_classes,
        composite,
        band,
        effective_band,
    })
}

/// Validates that `dimension_scores` exactly covers the six fixed dimension
/// names and that each score is in range.
///
/// # Errors
///
/// Returns [`SignificanceError::InvalidDimensionSet`] or
/// [`SignificanceError::DimensionScoreOutOfRange`].
pub fn validate_dimension_scores(
    dimension_scores: &BTreeMap<String, u8>,
) -> Result<(), SignificanceError> {
    let mut provided: Vec<String> = dimension_scores.keys().cloned().collect();
    provided.sort();
    let mut expected: Vec<String> = DIMENSION_NAMES.iter().map(|name| (*name).to_string()).collect();
    expected.sort();

    if provided != expected {
        return Err(SignificanceError::InvalidDimensionSet(provided));
    }

    for (name, score) in dimension_scores {
        if *score > MAX_DIMENSION_SCORE {
            return Err(SignificanceError::DimensionScoreOutOfRange(name.clone(), *score));
        }
    }

    Ok(())
}

// ============================================================================
// SECTION: Timeout Policy
// ============================================================================

/// Timeout policy governing how long an operator has to answer a pending
/// decision before `notify_decision_timeout` applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutPolicy {
    /// Default timeout in seconds, applied when no per-decision override
    /// exists.
    pub default_timeout_seconds: u32,
    /// Per-decision overrides of the default, keyed by decision id string.
    #[serde(default)]
    pub overrides: BTreeMap<String, u32>,
}

impl TimeoutPolicy {
    /// Default timeout of 600 seconds with no overrides.
    #[must_use]
    pub fn new_default() -> Self {
        Self {
            default_timeout_seconds: 600,
            overrides: BTreeMap::new(),
        }
    }

    /// Validates that the default and every override are strictly positive.
    ///
    /// # Errors
    ///
    /// Returns [`SignificanceError::InvalidTimeout`] when a value is zero.
    pub fn validate(&self) -> Result<(), SignificanceError> {
        if self.default_timeout_seconds == 0 {
            return Err(SignificanceError::InvalidTimeout(0));
        }
        for value in self.overrides.values() {
            if *value == 0 {
                return Err(SignificanceError::InvalidTimeout(0));
            }
        }
        Ok(())
    }

    /// Returns the effective timeout for a decision: the override if set,
    /// else the default.
    #[must_use]
    pub fn effective_timeout_seconds(&self, decision_id: &str) -> u32 {
        self.overrides.get(decision_id).copied().unwrap_or(self.default_timeout_seconds)
    }
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self::new_default()
    }
}

// ============================================================================
// SECTION: Escalation Targets
// ============================================================================

/// Resolves the escalation target roles for a given effective band.
///
/// Per §4.3: `medium` escalates to the accountable actor only; `high`
/// escalates to the accountable actor followed by every consulted actor in
/// declaration order. `low` never escalates (it auto-proceeds).
#[must_use]
pub fn escalation_role_order(band: Band) -> &'static [&'static str] {
    match band {
        Band::Low => &[],
        Band::Medium => &["accountable"],
        Band::High => &["accountable", "consulted"],
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test module")]

    use super::*;

    fn dims(value: u8) -> BTreeMap<String, u8> {
        DIMENSION_NAMES.iter().map(|name| ((*name).to_string(), value)).collect()
    }

    #[test]
    fn composite_equals_sum_of_dimensions() {
        let bands = RoutingBands::default_bands();
        let score = evaluate_significance(&dims(2), &[], &bands).unwrap();
        assert_eq!(score.composite, 12);
        assert_eq!(score.band, Band::High);
        assert_eq!(score.effective_band, Band::High);
    }

    #[test]
    fn hard_trigger_forces_high_regardless_of_band() {
        let bands = RoutingBands::default_bands();
        let score = evaluate_significance(
            &dims(1),
            &["production_data_destructive".to_string()],
            &bands,
        )
        .unwrap();
        assert_eq!(score.composite, 6);
        assert_eq!(score.band, Band::Low);
        assert_eq!(score.effective_band, Band::High);
    }

    #[test]
    fn band_boundaries_straddle_correctly() {
        let bands = RoutingBands::default_bands();
        assert_eq!(bands.band_for(6), Band::Low);
        assert_eq!(bands.band_for(7), Band::Medium);
        assert_eq!(bands.band_for(11), Band::Medium);
        assert_eq!(bands.band_for(12), Band::High);
    }

    #[test]
    fn unknown_dimension_set_is_rejected() {
        let mut scores = dims(1);
        scores.remove("user_customer_impact");
        scores.insert("made_up_dimension".to_string(), 1);
        let bands = RoutingBands::default_bands();
        assert!(matches!(
            evaluate_significance(&scores, &[], &bands),
            Err(SignificanceError::InvalidDimensionSet(_))
        ));
    }

    #[test]
    fn custom_band_cutoffs_must_be_contiguous() {
        let bands = RoutingBands {
            low: BandCutoff {
                min: 0,
                max: 5,
            },
            medium: BandCutoff {
                min: 7,
                max: 11,
            },
            high: BandCutoff {
                min: 12,
                max: 18,
            },
        };
        assert!(matches!(bands.validate(), Err(SignificanceError::InvalidBandCutoffs(_))));
    }

    #[test]
    fn significance_block_validate_shape_rejects_unknown_trigger() {
        let block = SignificanceBlock {
            dimensions: dims(1),
            hard_triggers: vec!["not_a_real_trigger".to_string()],
        };
        assert!(matches!(
            block.validate_shape(),
            Err(SignificanceError::UnknownHardTrigger(_))
        ));
    }

    #[test]
    fn escalation_targets_match_band_routing_table() {
        assert_eq!(escalation_role_order(Band::Medium), ["accountable"]);
        assert_eq!(escalation_role_order(Band::High), ["accountable", "consulted"]);
        assert!(escalation_role_order(Band::Low).is_empty());
    }
}
