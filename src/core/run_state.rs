// mission-runtime/src/core/run_state.rs
// ============================================================================
// Module: Mission Runtime Run State
// Description: Run snapshot, next-decision variants, and actor attribution.
// Purpose: Capture deterministic run evolution for replay and auditing.
// Dependencies: crate::core::{identifiers, policy}, serde, serde_json
// ============================================================================

//! ## Overview
//! The run snapshot is the entire state the planner needs, besides the
//! frozen template. It is mutated monotonically by the engine:
//! `completed_steps` only grows, and `decisions`/`pending_decisions` are
//! keyed maps whose entries are never rewritten in place, only inserted or
//! removed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::DecisionId;
use crate::core::identifiers::MissionKey;
use crate::core::identifiers::RunId;
use crate::core::identifiers::StepId;
use crate::core::policy::MissionPolicySnapshot;

// ============================================================================
// SECTION: Actor Attribution
// ============================================================================

/// The actor attributed to an operation (an answer, a timeout
/// notification), as distinct from the RACI actor *types* inferred for a
/// step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Actor identifier.
    pub actor_id: String,
    /// Actor type: `human`, `llm`, or `service`.
    pub actor_type: String,
}

// ============================================================================
// SECTION: Pending Decision Requests
// ============================================================================

/// A decision awaiting an operator answer, recorded the moment it is
/// first requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDecisionRequest {
    /// Decision identifier.
    pub decision_id: DecisionId,
    /// Step id this decision is about, when applicable.
    #[serde(default)]
    pub step_id: Option<StepId>,
    /// Input key this decision resolves, for `input:` decisions.
    #[serde(default)]
    pub input_key: Option<String>,
    /// Operator-facing question text.
    pub question: String,
    /// Allowed answer options, when the decision is a closed choice.
    #[serde(default)]
    pub options: Option<Vec<String>>,
    /// Machine-readable reason the decision was raised.
    #[serde(default)]
    pub reason: Option<String>,
}

// ============================================================================
// SECTION: Run Snapshot
// ============================================================================

/// The persisted state of a run.
///
/// # Invariants
/// - `completed_steps` contains no duplicates and only valid step ids.
/// - `issued_step_id`, if present, is a valid step id not in
///   `completed_steps`.
/// - `decisions` and `pending_decisions` entries are inserted or removed,
///   never rewritten in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// Run identifier.
    pub run_id: RunId,
    /// Mission key this run executes.
    pub mission_key: MissionKey,
    /// Resolved filesystem path to the live template, if it still exists.
    pub template_path: String,
    /// Hex SHA-256 of the frozen template bytes.
    pub template_hash: String,
    /// Policy captured at run start.
    pub policy_snapshot: MissionPolicySnapshot,
    /// Step ids completed so far, in completion order.
    #[serde(default)]
    pub completed_steps: Vec<StepId>,
    /// The step the caller was last told to execute, if any.
    #[serde(default)]
    pub issued_step_id: Option<StepId>,
    /// Caller-supplied or decision-resolved input values.
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
    /// Answer records, plus audit-trail entries keyed `raci:{step_id}`,
    /// `significance:{decision_id}`, `soft_gate:…`, `timeout:{decision_id}`.
    #[serde(default)]
    pub decisions: BTreeMap<String, Value>,
    /// Decisions currently awaiting an operator answer.
    #[serde(default)]
    pub pending_decisions: BTreeMap<String, PendingDecisionRequest>,
    /// Set when the run cannot progress: unmet dependencies, a rejected
    /// audit, or template drift.
    #[serde(default)]
    pub blocked_reason: Option<String>,
}

impl RunSnapshot {
    /// Constructs the initial snapshot for a freshly started run.
    #[must_use]
    pub fn new_initial(
        run_id: RunId,
        mission_key: MissionKey,
        template_path: String,
        template_hash: String,
        policy_snapshot: MissionPolicySnapshot,
        inputs: BTreeMap<String, String>,
    ) -> Self {
        Self {
            run_id,
            mission_key,
            template_path,
            template_hash,
            policy_snapshot,
            completed_steps: Vec::new(),
            issued_step_id: None,
            inputs,
            decisions: BTreeMap::new(),
            pending_decisions: BTreeMap::new(),
            blocked_reason: None,
        }
    }

    /// Returns true when `step_id` has been completed.
    #[must_use]
    pub fn is_completed(&self, step_id: &StepId) -> bool {
        self.completed_steps.contains(step_id)
    }

    /// Appends `step_id` to `completed_steps` unless it is already
    /// present (dedup on re-application).
    pub fn complete_step(&mut self, step_id: StepId) {
        if !self.is_completed(&step_id) {
            self.completed_steps.push(step_id);
        }
    }
}

// ============================================================================
// SECTION: Step Context (bundled with `Step` decisions)
// ============================================================================

/// Context bundled with a `Step` decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepContext {
    /// The policy snapshot in effect for this run.
    pub policy_snapshot: MissionPolicySnapshot,
    /// The step's description, when present.
    #[serde(default)]
    pub description: Option<String>,
    /// The step's expected output, when present.
    #[serde(default)]
    pub expected_output: Option<String>,
    /// Opaque actor context passed through from the caller.
    #[serde(default)]
    pub actor_context: Value,
}

// ============================================================================
// SECTION: Next Decision
// ============================================================================

/// The planner's decision about what to do next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NextDecision {
    /// Issue a prompt step to the caller for execution.
    Step {
        /// Run identifier.
        run_id: RunId,
        /// Mission key.
        mission_key: MissionKey,
        /// Step identifier to execute.
        step_id: StepId,
        /// Step title.
        step_title: String,
        /// Literal or resolved prompt text.
        #[serde(default)]
        prompt: Option<String>,
        /// Bundled execution context.
        context: StepContext,
    },
    /// Await an operator-supplied input or approval.
    DecisionRequired {
        /// Run identifier.
        run_id: RunId,
        /// Mission key.
        mission_key: MissionKey,
        /// Step id this decision concerns, when applicable.
        #[serde(default)]
        step_id: Option<StepId>,
        /// Decision identifier.
        decision_id: DecisionId,
        /// Input key this decision resolves, for `input:` decisions.
        /// Always absent for `audit:` decisions.
        #[serde(default)]
        input_key: Option<String>,
        /// Operator-facing question text.
        question: String,
        /// Allowed answer options.
        #[serde(default)]
        options: Option<Vec<String>>,
        /// Machine-readable reason.
        #[serde(default)]
        reason: Option<String>,
    },
    /// The run cannot progress.
    Blocked {
        /// Run identifier.
        run_id: RunId,
        /// Mission key.
        mission_key: MissionKey,
        /// Human-readable reason the run is blocked.
        reason: String,
    },
    /// All steps and audits have completed.
    Terminal {
        /// Run identifier.
        run_id: RunId,
        /// Mission key.
        mission_key: MissionKey,
        /// Human-readable completion reason.
        reason: String,
    },
}

impl NextDecision {
    /// Returns the run id common to every variant.
    #[must_use]
    pub const fn run_id(&self) -> &RunId {
        match self {
            Self::Step {
                run_id, ..
            }
            | Self::DecisionRequired {
                run_id, ..
            }
            | Self::Blocked {
                run_id, ..
            }
            | Self::Terminal {
                run_id, ..
            } => run_id,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Run-state and engine operation errors.
#[derive(Debug, Error)]
pub enum RunStateError {
    /// The run directory's frozen template file is missing.
    #[error("frozen template missing for run {0}")]
    FrozenTemplateMissing(String),
    /// The persisted snapshot could not be parsed.
    #[error("failed to parse run snapshot: {0}")]
    SnapshotParse(String),
    /// An operation referenced a decision id not in `pending_decisions`.
    #[error("unknown pending decision id: {0}")]
    UnknownDecisionId(DecisionId),
    /// An answer was not among the options recorded for the decision.
    #[error("answer {answer:?} is not a valid option for decision {decision_id}")]
    ForbiddenAnswer {
        /// The decision the caller tried to answer.
        decision_id: DecisionId,
        /// The rejected answer.
        answer: String,
    },
    /// A timeout notification was raised before the prerequisite
    /// `raci:`/`significance:` audit-trail entries existed.
    #[error("timeout notification for {0} is missing prerequisite RACI or significance records")]
    MissingTimeoutPrerequisites(DecisionId),
    /// Underlying filesystem I/O failed.
    #[error("run state io error: {0}")]
    Io(String),
}
