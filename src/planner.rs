// mission-runtime/src/planner.rs
// ============================================================================
// Module: Mission Runtime Planner
// Description: Pure priority cascade mapping a run snapshot to its next
//              decision.
// Purpose: Decide what the engine should do next without performing any
//          mutation or I/O of its own, other than hashing a live template
//          file to detect drift.
// Dependencies: crate::core, std::fs
// ============================================================================

//! ## Overview
//! The planner is the one place mission-runtime reasoning lives. Given a
//! snapshot, its frozen template, the policy captured at run start, and an
//! opaque actor context, it always returns the same [`NextDecision`] for the
//! same inputs. The only I/O it performs is reading the live template file
//! (when a path is supplied) to hash it for drift detection; a read failure
//! is treated as "no drift signal available" rather than an error, since the
//! planner never raises.
//!
//! The priority cascade, in order:
//! 1. A recorded `blocked_reason` short-circuits everything.
//! 2. Template drift (when a live path is given) blocks the run.
//! 3. Any pending decision is re-surfaced, lexicographically first by id.
//! 4. The DAG is walked (`steps` then `audit_steps`, in declaration order)
//!    for the first step that is not completed, not currently issued, and
//!    whose dependencies are all satisfied.
//! 5. If no step is eligible, the run is blocked (something remains
//!    incomplete) or terminal (everything is done).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::core::DecisionId;
use crate::core::MissionPolicySnapshot;
use crate::core::MissionTemplate;
use crate::core::NextDecision;
use crate::core::PendingDecisionRequest;
use crate::core::RunSnapshot;
use crate::core::StepContext;
use crate::core::StepId;
use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::hash_bytes;
use crate::core::significance::Band;
use crate::core::significance::RoutingBands;
use crate::core::template::AuditStep;
use crate::core::template::Enforcement;
use crate::core::template::PromptStep;

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Everything [`plan_next`] can tell the caller: either a decision that is
/// fit to return to the outside world, or a signal that one audit step
/// should be auto-completed and planning retried.
///
/// The four [`NextDecision`] variants on the wire do not have room for
/// "auto-proceed, no operator interaction" (an audit step whose significance
/// evaluates to the low band skips the gate entirely). Folding that into
/// [`NextDecision::Step`] would make every consumer special-case audit
/// steps; instead the engine loops on [`PlanOutcome::AutoCompleteAudit`]
/// until it reaches a decision it can persist and return.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanOutcome {
    /// A decision ready to surface to the caller.
    Decision(NextDecision),
    /// `step_id` is a low-band audit checkpoint; the engine should mark it
    /// completed, emit the auto-completion event, and call [`plan_next`]
    /// again.
    AutoCompleteAudit {
        /// The audit step to auto-complete.
        step_id: StepId,
        /// The composite significance score that produced the low band,
        /// for the `SignificanceEvaluated` audit trail entry.
        composite: u16,
    },
}

// ============================================================================
// SECTION: Planner
// ============================================================================

/// Computes the next decision for a run.
///
/// `live_template_path`, when provided, is read and hashed against
/// `snapshot.template_hash` to detect template drift. A read failure is not
/// treated as drift — the run proceeds as if no path had been supplied.
#[must_use]
pub fn plan_next(
    snapshot: &RunSnapshot,
    template: &MissionTemplate,
    policy: &MissionPolicySnapshot,
    actor_context: &Value,
    live_template_path: Option<&Path>,
) -> PlanOutcome {
    if let Some(reason) = &snapshot.blocked_reason {
        return PlanOutcome::Decision(blocked(snapshot, reason.clone()));
    }

    if let Some(path) = live_template_path {
        if let Ok(bytes) = fs::read(path) {
            let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, &bytes);
            if digest.value != snapshot.template_hash {
                return PlanOutcome::Decision(blocked(
                    snapshot,
                    "Template changed during active run. Migration required.".to_string(),
                ));
            }
        }
    }

    if let Some((_, pending)) = snapshot.pending_decisions.iter().next() {
        return PlanOutcome::Decision(decision_required_from_pending(snapshot, pending));
    }

    let bands = policy.band_cutoffs().unwrap_or_else(|_| RoutingBands::default_bands());

    for step in &template.steps {
        if !is_eligible(snapshot, &step.id, &step.depends_on) {
            continue;
        }
        return PlanOutcome::Decision(plan_prompt_step(snapshot, step, policy, actor_context));
    }

    for step in &template.audit_steps {
        if !is_eligible(snapshot, &step.id, &step.depends_on) {
            continue;
        }
        return plan_audit_step(snapshot, step, policy, &bands, actor_context);
    }

    if template.all_step_ids().into_iter().any(|id| !snapshot.is_completed(id)) {
        return PlanOutcome::Decision(blocked(
            snapshot,
            "No eligible steps: remaining steps have unmet dependencies.".to_string(),
        ));
    }

    PlanOutcome::Decision(NextDecision::Terminal {
        run_id: snapshot.run_id.clone(),
        mission_key: snapshot.mission_key.clone(),
        reason: "All steps and audits completed.".to_string(),
    })
}

/// Returns true when `step_id` is not completed, not the currently issued
/// step, and every entry in `depends_on` is already completed.
fn is_eligible(snapshot: &RunSnapshot, step_id: &StepId, depends_on: &[StepId]) -> bool {
    if snapshot.is_completed(step_id) {
        return false;
    }
    if snapshot.issued_step_id.as_ref() == Some(step_id) {
        return false;
    }
    depends_on.iter().all(|dep| snapshot.is_completed(dep))
}

/// Builds a [`NextDecision::Blocked`] for `snapshot`.
fn blocked(snapshot: &RunSnapshot, reason: String) -> NextDecision {
    NextDecision::Blocked {
        run_id: snapshot.run_id.clone(),
        mission_key: snapshot.mission_key.clone(),
        reason,
    }
}

/// Re-surfaces a recorded pending decision as [`NextDecision::DecisionRequired`].
fn decision_required_from_pending(snapshot: &RunSnapshot, pending: &PendingDecisionRequest) -> NextDecision {
    NextDecision::DecisionRequired {
        run_id: snapshot.run_id.clone(),
        mission_key: snapshot.mission_key.clone(),
        step_id: pending.step_id.clone(),
        decision_id: pending.decision_id.clone(),
        input_key: pending.input_key.clone(),
        question: pending.question.clone(),
        options: pending.options.clone(),
        reason: pending.reason.clone(),
    }
}

/// Plans a single eligible [`PromptStep`]: either it is missing a required
/// input (raised as an `input:` decision) or it is issued outright.
fn plan_prompt_step(
    snapshot: &RunSnapshot,
    step: &PromptStep,
    policy: &MissionPolicySnapshot,
    actor_context: &Value,
) -> NextDecision {
    for name in &step.requires_inputs {
        let bound = snapshot.inputs.contains_key(name)
            || snapshot.decisions.contains_key(DecisionId::for_input(name).as_str());
        if !bound {
            return NextDecision::DecisionRequired {
                run_id: snapshot.run_id.clone(),
                mission_key: snapshot.mission_key.clone(),
                step_id: Some(step.id.clone()),
                decision_id: DecisionId::for_input(name),
                input_key: Some(name.clone()),
                question: format!(
                    "Input required before step '{}': provide a value for '{name}'.",
                    step.id
                ),
                options: None,
                reason: Some("missing_required_input".to_string()),
            };
        }
    }

    NextDecision::Step {
        run_id: snapshot.run_id.clone(),
        mission_key: snapshot.mission_key.clone(),
        step_id: step.id.clone(),
        step_title: step.title.clone(),
        prompt: Some(resolved_prompt_text(step)),
        context: StepContext {
            policy_snapshot: policy.clone(),
            description: step.description.clone(),
            expected_output: step.expected_output.clone(),
            actor_context: actor_context.clone(),
        },
    }
}

/// Resolves the literal prompt text for a step: its own `prompt`, or a
/// default derived from the step id and title.
fn resolved_prompt_text(step: &PromptStep) -> String {
    step.prompt.clone().unwrap_or_else(|| format!("Execute step '{}': {}", step.id, step.title))
}

/// Plans a single eligible [`AuditStep`] per the significance/gating
/// routing table: low band auto-proceeds, medium opens a soft gate, high
/// (or a blocking step with no significance block) opens a hard gate, and
/// an advisory step with no significance block is treated like a plain
/// step.
fn plan_audit_step(
    snapshot: &RunSnapshot,
    step: &AuditStep,
    policy: &MissionPolicySnapshot,
    bands: &RoutingBands,
    actor_context: &Value,
) -> PlanOutcome {
    if let Some(significance) = &step.significance {
        let Ok(score) = significance.evaluate(bands) else {
            // A malformed block should have been rejected at template
            // construction time; if one slips through regardless, fail
            // closed to a hard gate rather than let the planner raise.
            return PlanOutcome::Decision(hard_gate_decision(snapshot, step));
        };

        return match score.effective_band {
            Band::Low => PlanOutcome::AutoCompleteAudit {
                step_id: step.id.clone(),
                composite: score.composite,
            },
            Band::Medium => PlanOutcome::Decision(soft_gate_decision(snapshot, step)),
            Band::High => PlanOutcome::Decision(hard_gate_decision(snapshot, step)),
        };
    }

    if step.is_blocking() {
        return PlanOutcome::Decision(hard_gate_decision(snapshot, step));
    }

    PlanOutcome::Decision(plan_audit_as_plain_step(snapshot, step, policy, actor_context))
}

/// Builds the hard-gate (`approve`/`reject`) decision for an audit step.
fn hard_gate_decision(snapshot: &RunSnapshot, step: &AuditStep) -> NextDecision {
    NextDecision::DecisionRequired {
        run_id: snapshot.run_id.clone(),
        mission_key: snapshot.mission_key.clone(),
        step_id: Some(step.id.clone()),
        decision_id: DecisionId::for_audit(&step.id),
        input_key: None,
        question: format!("Audit checkpoint '{}' requires approval.", step.id),
        options: Some(vec!["approve".to_string(), "reject".to_string()]),
        reason: None,
    }
}

/// Builds the soft-gate (`decide_solo`/`open_stand_up`/`defer`) decision
/// for an audit step.
fn soft_gate_decision(snapshot: &RunSnapshot, step: &AuditStep) -> NextDecision {
    NextDecision::DecisionRequired {
        run_id: snapshot.run_id.clone(),
        mission_key: snapshot.mission_key.clone(),
        step_id: Some(step.id.clone()),
        decision_id: DecisionId::for_audit(&step.id),
        input_key: None,
        question: format!("Audit checkpoint '{}' requires a gating decision.", step.id),
        options: Some(vec![
            "decide_solo".to_string(),
            "open_stand_up".to_string(),
            "defer".to_string(),
        ]),
        reason: None,
    }
}

/// Treats an advisory audit step with no significance block as a plain
/// step the caller executes and reports back on, the same as a prompt step.
fn plan_audit_as_plain_step(
    snapshot: &RunSnapshot,
    step: &AuditStep,
    policy: &MissionPolicySnapshot,
    actor_context: &Value,
) -> NextDecision {
    NextDecision::Step {
        run_id: snapshot.run_id.clone(),
        mission_key: snapshot.mission_key.clone(),
        step_id: step.id.clone(),
        step_title: step.title.clone(),
        prompt: Some(format!("Execute audit step '{}': {}", step.id, step.title)),
        context: StepContext {
            policy_snapshot: policy.clone(),
            description: step.description.clone(),
            expected_output: None,
            actor_context: actor_context.clone(),
        },
    }
}
