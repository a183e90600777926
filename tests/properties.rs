// mission-runtime/tests/properties.rs
// Property tests for the quantified invariants: band-boundary routing,
// dimension-score validation, NextDecision serialization round-trip, and
// completed_steps de-duplication.

#![allow(clippy::unwrap_used, reason = "test module")]

use std::collections::BTreeMap;

use mission_runtime_core::MissionKey;
use mission_runtime_core::NextDecision;
use mission_runtime_core::RoutingBands;
use mission_runtime_core::RunId;
use mission_runtime_core::RunSnapshot;
use mission_runtime_core::StepId;
use mission_runtime_core::core::significance::DIMENSION_NAMES;
use mission_runtime_core::core::significance::MAX_DIMENSION_SCORE;
use mission_runtime_core::core::significance::evaluate_significance;
use proptest::prelude::*;

fn dimension_map(scores: [u8; 6]) -> BTreeMap<String, u8> {
    DIMENSION_NAMES.iter().zip(scores).map(|(name, score)| ((*name).to_string(), score)).collect()
}

proptest! {
    /// For any six in-range dimension scores, the composite is their sum
    /// and the band assigned matches the default cutoffs exactly.
    #[test]
    fn band_for_composite_matches_default_cutoffs(
        scores in proptest::array::uniform6(0u8..=MAX_DIMENSION_SCORE),
    ) {
        let bands = RoutingBands::default_bands();
        let score = evaluate_significance(&dimension_map(scores), &[], &bands).unwrap();
        let composite: u16 = scores.iter().map(|value| u16::from(*value)).sum();
        prop_assert_eq!(score.composite, composite);

        let expected_band = if composite <= 6 {
            mission_runtime_core::Band::Low
        } else if composite <= 11 {
            mission_runtime_core::Band::Medium
        } else {
            mission_runtime_core::Band::High
        };
        prop_assert_eq!(score.band, expected_band);
        prop_assert_eq!(bands.band_for(composite), expected_band);
    }

    /// A hard trigger always escalates the effective band to high,
    /// regardless of the composite-derived band.
    #[test]
    fn hard_trigger_always_escalates_to_high(
        scores in proptest::array::uniform6(0u8..=MAX_DIMENSION_SCORE),
    ) {
        let bands = RoutingBands::default_bands();
        let score = evaluate_significance(
            &dimension_map(scores),
            &["production_data_destructive".to_string()],
            &bands,
        )
        .unwrap();
        prop_assert_eq!(score.effective_band, mission_runtime_core::Band::High);
    }

    /// A dimension score above the maximum is always rejected, and the
    /// complete dimension set with every score in range is always accepted.
    #[test]
    fn out_of_range_dimension_score_is_rejected(
        extra in (MAX_DIMENSION_SCORE + 1)..=u8::MAX,
    ) {
        let bands = RoutingBands::default_bands();
        let mut scores = dimension_map([0, 0, 0, 0, 0, 0]);
        scores.insert(DIMENSION_NAMES[0].to_string(), extra);
        prop_assert!(evaluate_significance(&scores, &[], &bands).is_err());
    }

    /// Serializing a NextDecision and re-parsing it always yields an equal
    /// value, for any reachable Blocked or Terminal payload.
    #[test]
    fn next_decision_round_trips_through_json(
        reason in "[a-zA-Z0-9 ]{0,40}",
        is_terminal in any::<bool>(),
    ) {
        let run_id = RunId::new("r1");
        let mission_key = MissionKey::new("demo");
        let decision = if is_terminal {
            NextDecision::Terminal { run_id, mission_key, reason }
        } else {
            NextDecision::Blocked { run_id, mission_key, reason }
        };
        let value = serde_json::to_value(&decision).unwrap();
        let round_tripped: NextDecision = serde_json::from_value(value).unwrap();
        prop_assert_eq!(decision, round_tripped);
    }

    /// completed_steps never grows duplicate entries, regardless of how
    /// many times the same step id is marked complete.
    #[test]
    fn complete_step_never_duplicates(
        ids in proptest::collection::vec("[a-z]{1,6}", 0..12),
    ) {
        let mut snapshot = RunSnapshot::new_initial(
            RunId::new("r1"),
            MissionKey::new("demo"),
            "/tmp/demo/mission.yaml".to_string(),
            "deadbeef".to_string(),
            mission_runtime_core::MissionPolicySnapshot {
                strictness: mission_runtime_core::Strictness::Medium,
                default_route: "default".to_string(),
                extras: serde_json::Map::new(),
            },
            BTreeMap::new(),
        );
        for id in &ids {
            snapshot.complete_step(StepId::new(id.clone()));
            snapshot.complete_step(StepId::new(id.clone()));
        }

        let mut unique: Vec<&StepId> = snapshot.completed_steps.iter().collect();
        unique.sort();
        unique.dedup();
        prop_assert_eq!(unique.len(), snapshot.completed_steps.len());
    }
}
