// mission-runtime/src/core/event.rs
// ============================================================================
// Module: Mission Runtime Events
// Description: The eight run-lifecycle event types and their envelope.
// Purpose: Provide the structured payloads appended to `run.events.jsonl`.
// Dependencies: crate::core::{identifiers, run_state, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! Every state transition the engine performs is mirrored as a structured
//! event. This is the mission runtime's only observability surface — there
//! is no generic logging framework in this crate's dependency stack; the
//! JSONL event stream itself is the log.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::RunId;
use crate::core::run_state::Actor;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Event Type
// ============================================================================

/// The eight fixed run-lifecycle event type strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    /// A run was started.
    MissionRunStarted,
    /// A step was issued to the caller.
    NextStepIssued,
    /// A step's result was recorded without a new decision cycle: an
    /// ordinary step's reported result, or a low-band audit gate that
    /// skipped operator interaction entirely.
    NextStepAutoCompleted,
    /// An operator input or approval was requested.
    DecisionInputRequested,
    /// An operator answered a pending decision.
    DecisionInputAnswered,
    /// A run reached its terminal state.
    MissionRunCompleted,
    /// A significance score was computed for an audit step.
    SignificanceEvaluated,
    /// A pending decision's timeout expired.
    DecisionTimeoutExpired,
}

impl EventType {
    /// Returns the exact wire string for this event type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissionRunStarted => "MissionRunStarted",
            Self::NextStepIssued => "NextStepIssued",
            Self::NextStepAutoCompleted => "NextStepAutoCompleted",
            Self::DecisionInputRequested => "DecisionInputRequested",
            Self::DecisionInputAnswered => "DecisionInputAnswered",
            Self::MissionRunCompleted => "MissionRunCompleted",
            Self::SignificanceEvaluated => "SignificanceEvaluated",
            Self::DecisionTimeoutExpired => "DecisionTimeoutExpired",
        }
    }
}

// ============================================================================
// SECTION: Event Record
// ============================================================================

/// One line of `run.events.jsonl`: `{event_type, timestamp, payload}` with
/// keys sorted on serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// Exact event type string.
    pub event_type: String,
    /// ISO-8601 UTC timestamp when the event was recorded.
    pub timestamp: Timestamp,
    /// Event-specific payload. Always carries `run_id` and an `actor`
    /// object, plus event-specific fields.
    pub payload: Value,
}

impl EventRecord {
    /// Builds an event record, stamping it with the current time.
    #[must_use]
    pub fn new(event_type: EventType, payload: Value) -> Self {
        Self {
            event_type: event_type.as_str().to_string(),
            timestamp: Timestamp::now(),
            payload,
        }
    }
}

/// Builds the common `run_id` + `actor` prefix merged with event-specific
/// fields into a single JSON object.
#[must_use]
pub fn build_payload(run_id: &RunId, actor: Option<&Actor>, fields: Value) -> Value {
    let mut map = serde_json::Map::new();
    map.insert("run_id".to_string(), Value::String(run_id.to_string()));
    if let Some(actor) = actor {
        map.insert(
            "actor".to_string(),
            serde_json::json!({
                "actor_id": actor.actor_id,
                "actor_type": actor.actor_type,
            }),
        );
    }
    if let Value::Object(extra) = fields {
        map.extend(extra);
    }
    Value::Object(map)
}
