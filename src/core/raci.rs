// mission-runtime/src/core/raci.rs
// ============================================================================
// Module: Mission Runtime RACI Resolution
// Description: Responsible/accountable/consulted/informed actor resolution.
// Purpose: Derive and validate per-step actor assignments from fixed rules.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! RACI resolution is deterministic: the step kind and enforcement level
//! fix which actor types fill the responsible/accountable roles, and
//! resolution lifts concrete actor ids out of the caller-supplied input
//! map. Required roles that cannot be bound fail closed; optional roles
//! degrade silently.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::ActorId;
use crate::core::template::RaciOverride;

// ============================================================================
// SECTION: Actor Types and Roles
// ============================================================================

/// The kind of actor that can be bound to a RACI role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    /// A human operator.
    Human,
    /// An LLM agent.
    Llm,
    /// A service account.
    Service,
}

impl ActorType {
    /// Returns the input-map key used to look up an actor id of this type.
    #[must_use]
    pub const fn input_key(self) -> &'static str {
        match self {
            Self::Human => "mission_owner_id",
            Self::Llm => "agent_id",
            Self::Service => "service_id",
        }
    }

    /// Parses an actor type from its wire representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "human" => Some(Self::Human),
            "llm" => Some(Self::Llm),
            "service" => Some(Self::Service),
            _ => None,
        }
    }
}

/// A RACI role name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaciRole {
    /// Responsible: does the work.
    Responsible,
    /// Accountable: owns the outcome. Must always be human.
    Accountable,
    /// Consulted: two-way input before the decision.
    Consulted,
    /// Informed: notified after the decision.
    Informed,
}

impl RaciRole {
    /// Returns true for the roles that fail closed when unresolved
    /// (`responsible`, `accountable`).
    #[must_use]
    pub const fn is_required(self) -> bool {
        matches!(self, Self::Responsible | Self::Accountable)
    }

    /// Parses a RACI role from its wire representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "responsible" => Some(Self::Responsible),
            "accountable" => Some(Self::Accountable),
            "consulted" => Some(Self::Consulted),
            "informed" => Some(Self::Informed),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Inferred Assignment (pre-resolution)
// ============================================================================

/// A step's inferred RACI assignment before actor ids are resolved: which
/// actor type fills `responsible` and `accountable`, plus the rule name
/// that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaciAssignment {
    /// Actor type responsible for doing the work.
    pub responsible: ActorType,
    /// Actor type accountable for the outcome. Always [`ActorType::Human`].
    pub accountable: ActorType,
    /// Consulted actor types, in declaration order.
    #[serde(default)]
    pub consulted: Vec<ActorType>,
    /// Informed actor types, in declaration order.
    #[serde(default)]
    pub informed: Vec<ActorType>,
    /// Name of the inference rule that produced this assignment.
    pub rule: &'static str,
}

/// Validates the P0 invariant that `accountable` is always human, and that
/// blocking audits also require a human `responsible`.
///
/// # Errors
///
/// Returns [`RaciError::AccountableMustBeHuman`] or
/// [`RaciError::BlockingAuditRequiresHumanResponsible`].
pub fn validate_raci_assignment(
    assignment: &RaciAssignment,
    is_blocking_audit: bool,
) -> Result<(), RaciError> {
    if assignment.accountable != ActorType::Human {
        return Err(RaciError::AccountableMustBeHuman);
    }
    if is_blocking_audit && assignment.responsible != ActorType::Human {
        return Err(RaciError::BlockingAuditRequiresHumanResponsible);
    }
    Ok(())
}

/// Infers the default RACI assignment for a prompt step.
#[must_use]
pub fn infer_raci_for_prompt_step() -> RaciAssignment {
    RaciAssignment {
        responsible: ActorType::Llm,
        accountable: ActorType::Human,
        consulted: Vec::new(),
        informed: Vec::new(),
        rule: "prompt_default",
    }
}

/// Infers the default RACI assignment for an audit step given its
/// enforcement level.
#[must_use]
pub fn infer_raci_for_audit_step(blocking: bool) -> RaciAssignment {
    if blocking {
        RaciAssignment {
            responsible: ActorType::Human,
            accountable: ActorType::Human,
            consulted: Vec::new(),
            informed: Vec::new(),
            rule: "audit_blocking",
        }
    } else {
        RaciAssignment {
            responsible: ActorType::Llm,
            accountable: ActorType::Human,
            consulted: Vec::new(),
            informed: Vec::new(),
            rule: "audit_advisory",
        }
    }
}

/// Applies a step's explicit [`RaciOverride`] on top of its inferred
/// [`RaciAssignment`], replacing whichever roles the override names and
/// leaving the rest at their inferred values. A step with no override
/// returns its inferred assignment unchanged.
///
/// # Errors
///
/// Returns [`RaciError::UnknownActorType`] when the override names an actor
/// type outside `human`/`llm`/`service`, or propagates
/// [`validate_raci_assignment`]'s errors when the overridden assignment
/// violates the P0 invariant or the blocking-audit human-responsible rule.
pub fn apply_raci_override(
    mut assignment: RaciAssignment,
    override_block: Option<&RaciOverride>,
    is_blocking_audit: bool,
) -> Result<RaciAssignment, RaciError> {
    let Some(override_block) = override_block else {
        return Ok(assignment);
    };

    if let Some(responsible) = &override_block.responsible {
        assignment.responsible =
            ActorType::parse(responsible).ok_or_else(|| RaciError::UnknownActorType(responsible.clone()))?;
    }
    if let Some(accountable) = &override_block.accountable {
        assignment.accountable =
            ActorType::parse(accountable).ok_or_else(|| RaciError::UnknownActorType(accountable.clone()))?;
    }
    if !override_block.consulted.is_empty() {
        assignment.consulted = parse_actor_types(&override_block.consulted)?;
    }
    if !override_block.informed.is_empty() {
        assignment.informed = parse_actor_types(&override_block.informed)?;
    }
    assignment.rule = "explicit_override";

    validate_raci_assignment(&assignment, is_blocking_audit)?;
    Ok(assignment)
}

fn parse_actor_types(values: &[String]) -> Result<Vec<ActorType>, RaciError> {
    values
        .iter()
        .map(|value| ActorType::parse(value).ok_or_else(|| RaciError::UnknownActorType(value.clone())))
        .collect()
}

// ============================================================================
// SECTION: Resolved Binding (post-resolution)
// ============================================================================

/// A RACI assignment with concrete actor ids resolved from the run's input
/// map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRaciBinding {
    /// The actor responsible for doing the work.
    pub responsible: ActorId,
    /// The actor accountable for the outcome.
    pub accountable: ActorId,
    /// Consulted actors that could be resolved, in declaration order.
    pub consulted: Vec<ActorId>,
    /// Informed actors that could be resolved, in declaration order.
    pub informed: Vec<ActorId>,
    /// Name of the inference rule that produced the underlying assignment.
    pub rule: String,
}

/// Resolves concrete actor ids for every role in `assignment` from
/// `inputs`.
///
/// # Errors
///
/// Returns [`RaciError::RequiredRoleUnbound`] when a required role
/// (`responsible` or `accountable`) cannot be resolved. Optional roles
/// (`consulted`, `informed`) that cannot be resolved are silently dropped.
pub fn resolve_raci(
    assignment: &RaciAssignment,
    inputs: &BTreeMap<String, String>,
) -> Result<ResolvedRaciBinding, RaciError> {
    let responsible = resolve_actor(assignment.responsible, inputs)
        .ok_or(RaciError::RequiredRoleUnbound(RaciRole::Responsible))?;
    let accountable = resolve_actor(assignment.accountable, inputs)
        .ok_or(RaciError::RequiredRoleUnbound(RaciRole::Accountable))?;
    let consulted = assignment
        .consulted
        .iter()
        .filter_map(|actor_type| resolve_actor(*actor_type, inputs))
        .collect();
    let informed = assignment
        .informed
        .iter()
        .filter_map(|actor_type| resolve_actor(*actor_type, inputs))
        .collect();

    Ok(ResolvedRaciBinding {
        responsible,
        accountable,
        consulted,
        informed,
        rule: assignment.rule.to_string(),
    })
}

/// Looks up the actor id bound to `actor_type` in `inputs`, keyed by the
/// fixed `actor_type -> input_key` mapping.
fn resolve_actor(actor_type: ActorType, inputs: &BTreeMap<String, String>) -> Option<ActorId> {
    inputs.get(actor_type.input_key()).map(ActorId::new)
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// RACI resolution and validation errors.
#[derive(Debug, Error)]
pub enum RaciError {
    /// A required role (`responsible` or `accountable`) has no bound
    /// actor id.
    #[error("required RACI role {0:?} could not be resolved to an actor id")]
    RequiredRoleUnbound(RaciRole),
    /// The accountable actor type was not human, violating the P0
    /// invariant.
    #[error("accountable actor must be of type human")]
    AccountableMustBeHuman,
    /// A blocking audit step's responsible actor type was not human.
    #[error("blocking audit steps require a human responsible actor")]
    BlockingAuditRequiresHumanResponsible,
    /// A RACI override named an actor type outside the fixed
    /// `human`/`llm`/`service` set.
    #[error("unknown actor type in RACI override: {0}")]
    UnknownActorType(String),
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test module")]

    use super::*;

    #[test]
    fn prompt_default_rule_assigns_llm_responsible_human_accountable() {
        let assignment = infer_raci_for_prompt_step();
        assert_eq!(assignment.responsible, ActorType::Llm);
        assert_eq!(assignment.accountable, ActorType::Human);
        assert_eq!(assignment.rule, "prompt_default");
    }

    #[test]
    fn blocking_audit_requires_human_responsible_and_accountable() {
        let assignment = infer_raci_for_audit_step(true);
        assert_eq!(assignment.responsible, ActorType::Human);
        assert_eq!(assignment.accountable, ActorType::Human);
        assert_eq!(assignment.rule, "audit_blocking");
    }

    #[test]
    fn resolution_fails_closed_on_unbound_required_role() {
        let assignment = infer_raci_for_prompt_step();
        let inputs = BTreeMap::new();
        let err = resolve_raci(&assignment, &inputs).unwrap_err();
        assert!(matches!(err, RaciError::RequiredRoleUnbound(RaciRole::Responsible)));
    }

    #[test]
    fn optional_roles_degrade_silently_when_unbound() {
        let mut assignment = infer_raci_for_prompt_step();
        assignment.consulted.push(ActorType::Service);
        let mut inputs = BTreeMap::new();
        inputs.insert("agent_id".to_string(), "agent-1".to_string());
        inputs.insert("mission_owner_id".to_string(), "owner-1".to_string());
        let resolved = resolve_raci(&assignment, &inputs).unwrap();
        assert!(resolved.consulted.is_empty());
    }

    #[test]
    fn no_override_leaves_inferred_assignment_untouched() {
        let assignment = infer_raci_for_audit_step(false);
        let applied = apply_raci_override(assignment.clone(), None, false).unwrap();
        assert_eq!(applied, assignment);
    }

    #[test]
    fn override_replaces_named_roles_and_rule() {
        let assignment = infer_raci_for_audit_step(false);
        let override_block = RaciOverride {
            responsible: Some("human".to_string()),
            accountable: None,
            consulted: vec!["service".to_string()],
            informed: Vec::new(),
        };
        let applied = apply_raci_override(assignment, Some(&override_block), false).unwrap();
        assert_eq!(applied.responsible, ActorType::Human);
        assert_eq!(applied.accountable, ActorType::Human);
        assert_eq!(applied.consulted, vec![ActorType::Service]);
        assert_eq!(applied.rule, "explicit_override");
    }

    #[test]
    fn override_rejects_unknown_actor_type() {
        let assignment = infer_raci_for_prompt_step();
        let override_block = RaciOverride {
            responsible: Some("robot".to_string()),
            accountable: None,
            consulted: Vec::new(),
            informed: Vec::new(),
        };
        let err = apply_raci_override(assignment, Some(&override_block), false).unwrap_err();
        assert!(matches!(err, RaciError::UnknownActorType(value) if value == "robot"));
    }

    #[test]
    fn override_rejects_non_human_accountable() {
        let assignment = infer_raci_for_prompt_step();
        let override_block = RaciOverride {
            responsible: None,
            accountable: Some("llm".to_string()),
            consulted: Vec::new(),
            informed: Vec::new(),
        };
        let err = apply_raci_override(assignment, Some(&override_block), false).unwrap_err();
        assert!(matches!(err, RaciError::AccountableMustBeHuman));
    }
}
