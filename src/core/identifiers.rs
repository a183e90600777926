// mission-runtime/src/core/identifiers.rs
// ============================================================================
// Module: Mission Runtime Identifiers
// Description: Canonical opaque identifiers used across mission templates and runs.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the canonical string-based identifiers used throughout
//! the mission runtime. Identifiers are opaque and serialize as strings.
//! Validation of the string contents (non-emptiness, character set) is
//! handled at template or run-state construction boundaries rather than in
//! these simple wrappers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use rand::RngCore;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Run identifier scoped to a single mission execution.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Creates a new run identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generates a fresh run identifier: 16 random bytes, hex-encoded.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0_u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        const HEX: &[u8; 16] = b"0123456789abcdef";
        let mut out = String::with_capacity(32);
        for byte in bytes {
            out.push(HEX[(byte >> 4) as usize] as char);
            out.push(HEX[(byte & 0x0f) as usize] as char);
        }
        Self(out)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RunId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Mission key identifying a mission template independent of file location.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MissionKey(String);

impl MissionKey {
    /// Creates a new mission key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for MissionKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for MissionKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Step identifier, unique across a mission template's prompt and audit steps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    /// Creates a new step identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for StepId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for StepId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Decision identifier, e.g. `input:framework` or `audit:a1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionId(String);

impl DecisionId {
    /// Creates a new decision identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Builds the decision id used for a missing-input request.
    #[must_use]
    pub fn for_input(input_key: &str) -> Self {
        Self(format!("input:{input_key}"))
    }

    /// Builds the decision id used for an audit gate on the given step.
    #[must_use]
    pub fn for_audit(step_id: &StepId) -> Self {
        Self(format!("audit:{step_id}"))
    }

    /// Returns the input key suffix when this decision id has the `input:` prefix.
    #[must_use]
    pub fn input_key(&self) -> Option<&str> {
        self.0.strip_prefix("input:")
    }

    /// Returns true when this decision id has the `audit:` prefix.
    #[must_use]
    pub fn is_audit(&self) -> bool {
        self.0.starts_with("audit:")
    }
}

impl fmt::Display for DecisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for DecisionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for DecisionId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Actor identifier (a human, an agent, or a service account).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    /// Creates a new actor identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ActorId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ActorId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test module")]

    use super::DecisionId;
    use super::StepId;

    #[test]
    fn decision_id_for_input_round_trips_the_key() {
        let decision = DecisionId::for_input("framework");
        assert_eq!(decision.as_str(), "input:framework");
        assert_eq!(decision.input_key(), Some("framework"));
    }

    #[test]
    fn decision_id_for_audit_is_not_an_input_decision() {
        let step_id = StepId::new("a1");
        let decision = DecisionId::for_audit(&step_id);
        assert_eq!(decision.as_str(), "audit:a1");
        assert_eq!(decision.input_key(), None);
        assert!(decision.is_audit());
    }

    #[test]
    fn generated_run_ids_are_distinct_hex_strings() {
        let first = super::RunId::generate();
        let second = super::RunId::generate();
        assert_ne!(first, second);
        assert_eq!(first.as_str().len(), 32);
        assert!(first.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
