// mission-runtime/src/runtime/engine.rs
// ============================================================================
// Module: Mission Runtime Engine
// Description: Owns the run directory, applies result-to-state transitions,
//              invokes the planner, and routes decision answers back into
//              state.
// Purpose: Concentrate every impure operation the mission runtime performs
//          behind a small set of pull-driven operations the caller repeats
//          until a run reaches a terminal decision.
// Dependencies: crate::{core, discovery, interfaces, planner, runtime::store}
// ============================================================================

//! ## Overview
//! [`RunEngine`] is the one place this crate performs I/O beyond the
//! planner's optional drift-detection read. It resolves a mission template
//! through discovery, freezes it to a fresh run directory, and from then on
//! every [`RunEngine::next_step`] call re-reads the persisted snapshot,
//! applies the caller-reported result for whatever step was last issued,
//! hands the updated snapshot to [`crate::planner::plan_next`], applies the
//! resulting decision, and writes the snapshot back — once per call, after
//! every event for that call has already been appended to the run's event
//! log.
//!
//! A single in-process mutex serializes every call through one
//! [`RunEngine`] instance, matching the specification's requirement that a
//! run directory is owned exclusively by the engine for the duration of a
//! call. Cross-process coordination (an advisory file lock) is out of
//! scope, per the concurrency model.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::core::Actor;
use crate::core::ActorId;
use crate::core::DecisionId;
use crate::core::EventRecord;
use crate::core::EventType;
use crate::core::MissionKey;
use crate::core::MissionPolicySnapshot;
use crate::core::NextDecision;
use crate::core::PendingDecisionRequest;
use crate::core::RunId;
use crate::core::RunSnapshot;
use crate::core::RunStateError;
use crate::core::StepId;
use crate::core::build_payload;
use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::hash_bytes;
use crate::core::raci::ResolvedRaciBinding;
use crate::core::raci::apply_raci_override;
use crate::core::raci::infer_raci_for_audit_step;
use crate::core::raci::infer_raci_for_prompt_step;
use crate::core::raci::resolve_raci;
use crate::core::significance::Band;
use crate::core::significance::RoutingBands;
use crate::core::significance::SignificanceScore;
use crate::core::significance::escalation_role_order;
use crate::core::template::MissionTemplate;
use crate::discovery::DiscoveryContext;
use crate::discovery::DiscoveryError;
use crate::discovery::load_mission_template;
use crate::interfaces::RuntimeEventEmitter;
use crate::planner::PlanOutcome;
use crate::planner::plan_next;
use crate::runtime::store::RunStore;

// ============================================================================
// SECTION: Engine Configuration
// ============================================================================

/// Relative path, under the current directory, the engine defaults its
/// runs-root to when the caller supplies none.
pub const DEFAULT_RUNS_ROOT_SUBPATH: &str = ".kittify/runtime/runs";

/// Engine configuration: where runs live, and the default discovery
/// context used to resolve a mission key when the caller does not supply
/// one of their own. A plain value, constructed in code or deserialized
/// from a small TOML file via `toml`, matching the crate's "no global
/// mutable configuration state" design note.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root directory runs are created under.
    pub runs_root: PathBuf,
    /// Discovery context used when a caller does not supply one
    /// explicitly to [`RunEngine::start_mission_run`].
    pub default_discovery: DiscoveryContext,
}

impl EngineConfig {
    /// Builds a config rooted at `runs_root`, with an empty default
    /// discovery context.
    #[must_use]
    pub fn with_runs_root(runs_root: impl Into<PathBuf>) -> Self {
        Self {
            runs_root: runs_root.into(),
            default_discovery: DiscoveryContext::default(),
        }
    }

    /// Builds a config defaulting `runs_root` to
    /// `<current_dir>/.kittify/runtime/runs`.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the current directory cannot
    /// be read.
    pub fn from_current_dir() -> std::io::Result<Self> {
        let cwd = std::env::current_dir()?;
        Ok(Self::with_runs_root(cwd.join(DEFAULT_RUNS_ROOT_SUBPATH)))
    }

    /// Parses an [`EngineConfig`] from a TOML document. Only `runs_root`
    /// is read from the document; `default_discovery` always starts
    /// empty, since a [`DiscoveryContext`] carries `PathBuf`s and an
    /// environment snapshot that a config file has no stable way to
    /// express alongside the engine's own settings.
    ///
    /// # Errors
    ///
    /// Returns a parse error when `toml` is malformed or missing
    /// `runs_root`.
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        /// Wire shape of the on-disk config document.
        #[derive(serde::Deserialize)]
        struct Wire {
            /// See [`EngineConfig::runs_root`].
            runs_root: PathBuf,
        }
        let wire: Wire = toml::from_str(raw)?;
        Ok(Self::with_runs_root(wire.runs_root))
    }
}

// ============================================================================
// SECTION: Run Reference
// ============================================================================

/// Handle to a started run, returned by [`RunEngine::start_mission_run`]
/// and passed back into every subsequent call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRef {
    /// The run's identifier.
    pub run_id: RunId,
    /// The run's directory on disk.
    pub run_dir: PathBuf,
    /// The mission key this run executes.
    pub mission_key: MissionKey,
}

// ============================================================================
// SECTION: Step Result
// ============================================================================

/// The caller's report of how the last-issued step went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// The step completed successfully.
    Success,
    /// The step failed.
    Failed,
    /// The caller is blocking the run (e.g. cancellation).
    Blocked,
}

impl StepResult {
    /// Parses a result from its wire string (`"success"`, `"failed"`, or
    /// `"blocked"`).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }

    /// Returns the wire string for this result.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
        }
    }
}

// ============================================================================
// SECTION: Timeout Escalation
// ============================================================================

/// Result of [`RunEngine::notify_decision_timeout`]: the escalation
/// targets derived from the decision's recorded RACI binding and
/// effective significance band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutEscalationResult {
    /// The run this timeout belongs to.
    pub run_id: RunId,
    /// The decision that timed out.
    pub decision_id: DecisionId,
    /// Actors to escalate to, in order.
    pub escalation_targets: Vec<ActorId>,
    /// The effective significance band that produced the escalation
    /// ordering.
    pub effective_band: Band,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors a [`RunEngine`] operation can raise.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A run-state or snapshot-persistence operation failed.
    #[error(transparent)]
    RunState(#[from] RunStateError),
    /// Discovery or template loading failed while starting a run.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    /// The engine's internal lock was poisoned by a prior panic.
    #[error("run engine lock poisoned")]
    LockPoisoned,
}

/// Option set the planner issues for a hard audit gate.
const HARD_GATE_OPTIONS: [&str; 2] = ["approve", "reject"];
/// Option set the planner issues for a soft audit gate.
const SOFT_GATE_OPTIONS: [&str; 3] = ["decide_solo", "open_stand_up", "defer"];

// ============================================================================
// SECTION: Run Engine
// ============================================================================

/// Owns a `runs_root` directory and drives runs through it. Every public
/// method takes the full lock for its duration, serializing concurrent
/// calls against this instance.
pub struct RunEngine<E> {
    /// Filesystem operations scoped to the configured runs root.
    store: RunStore,
    /// External observer notified after every event is appended.
    emitter: E,
    /// Serializes every call through this instance.
    lock: Mutex<()>,
}

impl<E: RuntimeEventEmitter> RunEngine<E> {
    /// Builds an engine over `config`, notifying `emitter` of every event
    /// after it has already been appended to the run's own event log.
    #[must_use]
    pub fn new(config: EngineConfig, emitter: E) -> Self {
        Self {
            store: RunStore::new(config.runs_root),
            emitter,
            lock: Mutex::new(()),
        }
    }

    /// Starts a new run: resolves `template_key_or_path` through
    /// discovery, freezes the resolved template into a fresh run
    /// directory, persists the initial snapshot, and emits
    /// `MissionRunStarted`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Discovery`] when the mission cannot be
    /// resolved or loaded, or [`EngineError::RunState`] when the run
    /// directory cannot be created or written.
    pub fn start_mission_run(
        &self,
        template_key_or_path: &str,
        inputs: BTreeMap<String, String>,
        policy: MissionPolicySnapshot,
        discovery_context: Option<&DiscoveryContext>,
        actor: &Actor,
    ) -> Result<RunRef, EngineError> {
        let _guard = self.lock.lock().map_err(|_| EngineError::LockPoisoned)?;

        let default_context = DiscoveryContext::default();
        let context = discovery_context.unwrap_or(&default_context);
        let (template, template_path) = load_mission_template(template_key_or_path, context)?;

        let run_id = RunId::generate();
        let run_dir = self.store.create_run_dir(&run_id)?;
        let template_hash = self.store.freeze_template(&run_dir, &template_path, &template)?;

        let mission_key = MissionKey::new(template.mission.key.clone());
        let snapshot = RunSnapshot::new_initial(
            run_id.clone(),
            mission_key.clone(),
            template_path.display().to_string(),
            template_hash.clone(),
            policy,
            inputs,
        );
        self.store.write_snapshot(&run_dir, &snapshot)?;

        self.emit(
            &run_dir,
            EventType::MissionRunStarted,
            build_payload(
                &run_id,
                Some(actor),
                json!({
                    "mission_key": mission_key.as_str(),
                    "template_path": snapshot.template_path,
                    "template_hash": template_hash,
                }),
            ),
        )?;

        Ok(RunRef {
            run_id,
            run_dir,
            mission_key,
        })
    }

    /// Advances a run by one pull: applies the caller's reported `result`
    /// for whatever step was last issued, invokes the planner (looping
    /// through any low-band audit auto-completions), applies the
    /// resulting decision, persists the snapshot once, and returns the
    /// decision.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RunState`] when the snapshot or frozen
    /// template cannot be read or written.
    pub fn next_step(
        &self,
        run_ref: &RunRef,
        agent: &Actor,
        result: StepResult,
        policy_override: Option<MissionPolicySnapshot>,
        actor_context: Value,
    ) -> Result<NextDecision, EngineError> {
        let _guard = self.lock.lock().map_err(|_| EngineError::LockPoisoned)?;

        let mut snapshot = self.store.read_snapshot(&run_ref.run_dir)?;
        let effective_policy = policy_override.unwrap_or_else(|| snapshot.policy_snapshot.clone());
        let template = self.store.read_frozen_template(&run_ref.run_dir)?;

        // Drift must be caught before the caller's reported result is
        // applied: a result reported against a template that has since
        // changed on disk must not be allowed to mutate `completed_steps`
        // (the run is blocked as if the call never happened).
        if let Some(reason) = self.detect_drift(&snapshot) {
            return Ok(NextDecision::Blocked {
                run_id: run_ref.run_id.clone(),
                mission_key: run_ref.mission_key.clone(),
                reason,
            });
        }

        if let Some(step_id) = snapshot.issued_step_id.take() {
            match result {
                StepResult::Success => snapshot.complete_step(step_id.clone()),
                StepResult::Failed | StepResult::Blocked => {
                    snapshot.blocked_reason =
                        Some(format!("Step {step_id} reported {}: run blocked.", result.as_str()));
                }
            }
            self.emit(
                &run_ref.run_dir,
                EventType::NextStepAutoCompleted,
                build_payload(
                    &run_ref.run_id,
                    Some(agent),
                    json!({"step_id": step_id.as_str(), "result": result.as_str()}),
                ),
            )?;
        }

        let decision = loop {
            let live_path = Path::new(&snapshot.template_path);
            let live_template_path = live_path.exists().then_some(live_path);

            match plan_next(&snapshot, &template, &effective_policy, &actor_context, live_template_path) {
                PlanOutcome::Decision(decision) => break decision,
                PlanOutcome::AutoCompleteAudit {
                    step_id,
                    composite,
                } => {
                    self.emit(
                        &run_ref.run_dir,
                        EventType::SignificanceEvaluated,
                        build_payload(
                            &run_ref.run_id,
                            Some(agent),
                            json!({"step_id": step_id.as_str(), "composite": composite, "effective_band": "low"}),
                        ),
                    )?;
                    snapshot.complete_step(step_id.clone());
                    self.emit(
                        &run_ref.run_dir,
                        EventType::NextStepAutoCompleted,
                        build_payload(
                            &run_ref.run_id,
                            Some(agent),
                            json!({"step_id": step_id.as_str(), "result": "auto_proceed"}),
                        ),
                    )?;
                }
            }
        };

        self.apply_decision(&mut snapshot, &template, &effective_policy, &decision, agent)?;
        self.store.write_snapshot(&run_ref.run_dir, &snapshot)?;
        Ok(decision)
    }

    /// Applies a freshly computed [`NextDecision`] to `snapshot`, emitting
    /// whichever event (if any) the decision kind calls for. Mutation
    /// only; does not persist the snapshot.
    fn apply_decision(
        &self,
        snapshot: &mut RunSnapshot,
        template: &MissionTemplate,
        policy: &MissionPolicySnapshot,
        decision: &NextDecision,
        agent: &Actor,
    ) -> Result<(), EngineError> {
        match decision {
            NextDecision::Step {
                run_id,
                step_id,
                ..
            } => {
                snapshot.issued_step_id = Some(step_id.clone());
                self.record_prompt_step_raci(snapshot, template, step_id);
                self.emit(
                    &self.store.run_dir(run_id),
                    EventType::NextStepIssued,
                    build_payload(run_id, Some(agent), json!({"step_id": step_id.as_str()})),
                )?;
            }
            NextDecision::DecisionRequired {
                run_id,
                step_id,
                decision_id,
                input_key,
                question,
                options,
                reason,
            } => {
                let key = decision_id.as_str().to_string();
                if !snapshot.pending_decisions.contains_key(&key) {
                    snapshot.pending_decisions.insert(
                        key,
                        PendingDecisionRequest {
                            decision_id: decision_id.clone(),
                            step_id: step_id.clone(),
                            input_key: input_key.clone(),
                            question: question.clone(),
                            options: options.clone(),
                            reason: reason.clone(),
                        },
                    );

                    if decision_id.is_audit() {
                        if let Some(audit_step_id) = step_id {
                            self.record_audit_gate_prerequisites(
                                snapshot,
                                template,
                                policy,
                                audit_step_id,
                                decision_id,
                            );
                        }
                    }

                    self.emit(
                        &self.store.run_dir(run_id),
                        EventType::DecisionInputRequested,
                        build_payload(
                            run_id,
                            Some(agent),
                            json!({
                                "decision_id": decision_id.as_str(),
                                "step_id": step_id.as_ref().map(StepId::as_str),
                                "input_key": input_key,
                                "question": question,
                                "options": options,
                            }),
                        ),
                    )?;
                }
            }
            NextDecision::Terminal {
                run_id,
                ..
            } => {
                if snapshot.issued_step_id.is_none() && self.is_fresh_terminal(snapshot) {
                    snapshot.decisions.insert("terminal:completed".to_string(), Value::Bool(true));
                    self.emit(
                        &self.store.run_dir(run_id),
                        EventType::MissionRunCompleted,
                        build_payload(run_id, Some(agent), json!({})),
                    )?;
                }
            }
            NextDecision::Blocked {
                ..
            } => {}
        }
        Ok(())
    }

    /// Reads the run's live template file (the original path recorded at
    /// start, not the frozen copy) and compares its hash against
    /// `snapshot.template_hash`. Returns `None` when the file is missing,
    /// unreadable, or unchanged — a read failure is not drift, it is "no
    /// signal available", matching the planner's own tolerance.
    fn detect_drift(&self, snapshot: &RunSnapshot) -> Option<String> {
        let live_path = Path::new(&snapshot.template_path);
        let bytes = std::fs::read(live_path).ok()?;
        let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, &bytes);
        (digest.value != snapshot.template_hash)
            .then(|| "Template changed during active run. Migration required.".to_string())
    }

    /// Returns true the first time a run is observed terminal: i.e. no
    /// `MissionRunCompleted` event has been recorded for it yet. Re-polls
    /// after terminal must not re-emit the event.
    fn is_fresh_terminal(&self, snapshot: &RunSnapshot) -> bool {
        !snapshot.decisions.contains_key("terminal:completed")
    }

    /// Records the `raci:{step_id}` and `significance:{decision_id}`
    /// audit-trail entries the first time an audit gate decision is
    /// raised, so [`RunEngine::notify_decision_timeout`] has its required
    /// prerequisites. Applies the step's explicit RACI override, if any,
    /// before resolving actor ids.
    fn record_audit_gate_prerequisites(
        &self,
        snapshot: &mut RunSnapshot,
        template: &MissionTemplate,
        policy: &MissionPolicySnapshot,
        step_id: &StepId,
        decision_id: &DecisionId,
    ) {
        let Some(step) = template.audit_steps.iter().find(|step| &step.id == step_id) else {
            return;
        };

        let raci_key = format!("raci:{step_id}");
        if !snapshot.decisions.contains_key(&raci_key) {
            let assignment = infer_raci_for_audit_step(step.is_blocking());
            if let Ok(assignment) = apply_raci_override(assignment, step.raci.as_ref(), step.is_blocking()) {
                if let Ok(binding) = resolve_raci(&assignment, &snapshot.inputs) {
                    if let Ok(value) = serde_json::to_value(&binding) {
                        snapshot.decisions.insert(raci_key, value);
                    }
                }
            }
        }

        let significance_key = format!("significance:{decision_id}");
        if !snapshot.decisions.contains_key(&significance_key) {
            if let Some(significance) = &step.significance {
                let bands = policy.band_cutoffs().unwrap_or_else(|_| RoutingBands::default_bands());
                if let Ok(score) = significance.evaluate(&bands) {
                    if let Ok(value) = serde_json::to_value(&score) {
                        snapshot.decisions.insert(significance_key, value);
                    }
                }
            }
        }
    }

    /// Records the `raci:{step_id}` audit-trail entry for a prompt step the
    /// first time it is issued, applying the step's explicit RACI override
    /// (if any) on top of the fixed `prompt_default` inference rule. Mirrors
    /// [`RunEngine::record_audit_gate_prerequisites`]'s audit-step handling
    /// so every issued step, not only audit gates, carries a resolved RACI
    /// binding in the audit trail.
    fn record_prompt_step_raci(&self, snapshot: &mut RunSnapshot, template: &MissionTemplate, step_id: &StepId) {
        let Some(step) = template.steps.iter().find(|step| &step.id == step_id) else {
            return;
        };

        let raci_key = format!("raci:{step_id}");
        if snapshot.decisions.contains_key(&raci_key) {
            return;
        }

        let assignment = infer_raci_for_prompt_step();
        let Ok(assignment) = apply_raci_override(assignment, step.raci.as_ref(), false) else {
            return;
        };
        if let Ok(binding) = resolve_raci(&assignment, &snapshot.inputs) {
            if let Ok(value) = serde_json::to_value(&binding) {
                snapshot.decisions.insert(raci_key, value);
            }
        }
    }

    /// Answers a pending decision: validates the answer against the
    /// option set recorded when the decision was raised, applies its
    /// effect (completing a step, setting `blocked_reason`, binding an
    /// input), and records the answer.
    ///
    /// # Errors
    ///
    /// Returns [`RunStateError::UnknownDecisionId`] when `decision_id` is
    /// not pending, or [`RunStateError::ForbiddenAnswer`] when `answer` is
    /// not among the recorded options.
    pub fn provide_decision_answer(
        &self,
        run_ref: &RunRef,
        decision_id: &DecisionId,
        answer: &str,
        actor: &Actor,
    ) -> Result<(), EngineError> {
        let _guard = self.lock.lock().map_err(|_| EngineError::LockPoisoned)?;

        let mut snapshot = self.store.read_snapshot(&run_ref.run_dir)?;
        let key = decision_id.as_str().to_string();
        let pending = snapshot
            .pending_decisions
            .get(&key)
            .cloned()
            .ok_or_else(|| RunStateError::UnknownDecisionId(decision_id.clone()))?;

        let mut keep_pending = false;

        if decision_id.is_audit() {
            let options: Vec<&str> = pending.options.as_deref().unwrap_or(&[]).iter().map(String::as_str).collect();
            if options == HARD_GATE_OPTIONS {
                match answer {
                    "approve" => {
                        if let Some(step_id) = &pending.step_id {
                            snapshot.complete_step(step_id.clone());
                        }
                    }
                    "reject" => {
                        let step_ref = pending.step_id.as_ref().map(StepId::as_str).unwrap_or(decision_id.as_str());
                        snapshot.blocked_reason =
                            Some(format!("Audit step {step_ref} rejected by {}.", actor.actor_id));
                    }
                    _ => {
                        return Err(EngineError::RunState(RunStateError::ForbiddenAnswer {
                            decision_id: decision_id.clone(),
                            answer: answer.to_string(),
                        }));
                    }
                }
            } else if options == SOFT_GATE_OPTIONS {
                match answer {
                    "decide_solo" => {
                        if let Some(step_id) = &pending.step_id {
                            snapshot.complete_step(step_id.clone());
                        }
                    }
                    "open_stand_up" | "defer" => keep_pending = true,
                    _ => {
                        return Err(EngineError::RunState(RunStateError::ForbiddenAnswer {
                            decision_id: decision_id.clone(),
                            answer: answer.to_string(),
                        }));
                    }
                }
            }
        } else if let Some(input_key) = decision_id.input_key() {
            snapshot.inputs.insert(input_key.to_string(), answer.to_string());
        }

        snapshot.decisions.insert(
            key.clone(),
            json!({"answer": answer, "actor_id": actor.actor_id, "actor_type": actor.actor_type}),
        );
        if !keep_pending {
            snapshot.pending_decisions.remove(&key);
        }

        self.emit(
            &run_ref.run_dir,
            EventType::DecisionInputAnswered,
            build_payload(
                &run_ref.run_id,
                Some(actor),
                json!({"decision_id": decision_id.as_str(), "answer": answer}),
            ),
        )?;

        self.store.write_snapshot(&run_ref.run_dir, &snapshot)?;
        Ok(())
    }

    /// Notifies the engine that a pending decision's timeout expired,
    /// computing escalation targets from its recorded RACI binding and
    /// effective significance band. Never mutates `blocked_reason` or
    /// `completed_steps`.
    ///
    /// # Errors
    ///
    /// Returns [`RunStateError::MissingTimeoutPrerequisites`] when the
    /// decision's `raci:` and `significance:` audit-trail entries are not
    /// both present.
    pub fn notify_decision_timeout(
        &self,
        run_ref: &RunRef,
        decision_id: &DecisionId,
        actor: &Actor,
    ) -> Result<TimeoutEscalationResult, EngineError> {
        let _guard = self.lock.lock().map_err(|_| EngineError::LockPoisoned)?;

        let mut snapshot = self.store.read_snapshot(&run_ref.run_dir)?;

        if !decision_id.is_audit() {
            return Err(EngineError::RunState(RunStateError::MissingTimeoutPrerequisites(decision_id.clone())));
        }
        let step_suffix = decision_id.as_str().trim_start_matches("audit:");
        let raci_key = format!("raci:{step_suffix}");
        let significance_key = format!("significance:{decision_id}");

        let raci_value = snapshot
            .decisions
            .get(&raci_key)
            .cloned()
            .ok_or_else(|| RunStateError::MissingTimeoutPrerequisites(decision_id.clone()))?;
        let significance_value = snapshot
            .decisions
            .get(&significance_key)
            .cloned()
            .ok_or_else(|| RunStateError::MissingTimeoutPrerequisites(decision_id.clone()))?;

        let binding: ResolvedRaciBinding = serde_json::from_value(raci_value)
            .map_err(|_| RunStateError::MissingTimeoutPrerequisites(decision_id.clone()))?;
        let score: SignificanceScore = serde_json::from_value(significance_value)
            .map_err(|_| RunStateError::MissingTimeoutPrerequisites(decision_id.clone()))?;

        let mut escalation_targets = Vec::new();
        for role in escalation_role_order(score.effective_band) {
            match *role {
                "accountable" => escalation_targets.push(binding.accountable.clone()),
                "consulted" => escalation_targets.extend(binding.consulted.iter().cloned()),
                _ => {}
            }
        }

        let result = TimeoutEscalationResult {
            run_id: run_ref.run_id.clone(),
            decision_id: decision_id.clone(),
            escalation_targets: escalation_targets.clone(),
            effective_band: score.effective_band,
        };

        let timeout_key = format!("timeout:{decision_id}");
        snapshot.decisions.insert(
            timeout_key,
            json!({
                "escalation_targets": escalation_targets.iter().map(ActorId::as_str).collect::<Vec<_>>(),
                "effective_band": score.effective_band,
                "notified_by": actor.actor_id,
            }),
        );

        self.emit(
            &run_ref.run_dir,
            EventType::DecisionTimeoutExpired,
            build_payload(
                &run_ref.run_id,
                Some(actor),
                json!({
                    "decision_id": decision_id.as_str(),
                    "escalation_targets": result.escalation_targets.iter().map(ActorId::as_str).collect::<Vec<_>>(),
                }),
            ),
        )?;

        self.store.write_snapshot(&run_ref.run_dir, &snapshot)?;
        Ok(result)
    }

    /// Appends `payload` under `event_type` to the run's own event log,
    /// then best-effort notifies the configured emitter. An emitter
    /// failure is swallowed: it must never prevent the append that
    /// already happened.
    fn emit(&self, run_dir: &Path, event_type: EventType, payload: Value) -> Result<(), EngineError> {
        let record = EventRecord::new(event_type, payload);
        self.store.append_event(run_dir, &record)?;
        drop(self.emitter.emit(&record));
        Ok(())
    }
}
