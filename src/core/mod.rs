// mission-runtime/src/core/mod.rs
// ============================================================================
// Module: Mission Runtime Core Types
// Description: Canonical mission template, policy, significance, RACI, and
//              run-state structures.
// Purpose: Provide stable, serializable value types shared by the planner,
//          engine, discovery, and diagnostics modules.
// Dependencies: serde, serde_json, serde_yaml, sha2, thiserror, time
// ============================================================================

//! ## Overview
//! Core types are the canonical source of truth for the mission runtime:
//! mission templates, RACI and significance value objects, the run
//! snapshot, and the `NextDecision` variant. These types enforce their own
//! invariants on construction so the planner and engine can stay total.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod event;
pub mod hashing;
pub mod identifiers;
pub mod policy;
pub mod raci;
pub mod run_state;
pub mod significance;
pub mod template;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use event::EventRecord;
pub use event::EventType;
pub use event::build_payload;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use identifiers::ActorId;
pub use identifiers::DecisionId;
pub use identifiers::MissionKey;
pub use identifiers::RunId;
pub use identifiers::StepId;
pub use policy::MissionPolicySnapshot;
pub use policy::PolicyError;
pub use policy::Strictness;
pub use raci::ActorType;
pub use raci::RaciAssignment;
pub use raci::RaciError;
pub use raci::RaciRole;
pub use raci::ResolvedRaciBinding;
pub use raci::apply_raci_override;
pub use raci::infer_raci_for_audit_step;
pub use raci::infer_raci_for_prompt_step;
pub use raci::resolve_raci;
pub use raci::validate_raci_assignment;
pub use run_state::Actor;
pub use run_state::NextDecision;
pub use run_state::PendingDecisionRequest;
pub use run_state::RunSnapshot;
pub use run_state::RunStateError;
pub use run_state::StepContext;
pub use significance::Band;
pub use significance::BandCutoff;
pub use significance::DIMENSION_NAMES;
pub use significance::HARD_TRIGGER_CLASSES;
pub use significance::RoutingBands;
pub use significance::SignificanceBlock;
pub use significance::SignificanceError;
pub use significance::SignificanceScore;
pub use significance::TimeoutPolicy;
pub use significance::escalation_role_order;
pub use significance::evaluate_significance;
pub use template::AuditConfig;
pub use template::AuditStep;
pub use template::Enforcement;
pub use template::MissionMeta;
pub use template::MissionTemplate;
pub use template::PromptStep;
pub use template::RaciOverride;
pub use template::TemplateError;
pub use template::TriggerMode;
pub use time::Timestamp;
