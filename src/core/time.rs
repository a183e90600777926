// mission-runtime/src/core/time.rs
// ============================================================================
// Module: Mission Runtime Timestamps
// Description: Opaque timestamp representation recorded by the engine.
// Purpose: Keep wall-clock values out of planner reasoning.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! The engine stamps events and snapshots with wall-clock time, but the
//! planner never reads a [`Timestamp`] to make a decision — it only ever
//! appears in persisted records. Keeping the type opaque (no arithmetic, no
//! comparison beyond equality) makes that boundary hard to violate by
//! accident.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// An ISO-8601 UTC timestamp, opaque to the planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(String);

impl Timestamp {
    /// Captures the current wall-clock time as an RFC 3339 UTC timestamp.
    ///
    /// # Panics
    ///
    /// Panics only if the system clock cannot be read, which does not
    /// happen on supported platforms.
    #[must_use]
    pub fn now() -> Self {
        #[expect(clippy::unwrap_used, reason = "RFC 3339 formatting of now() cannot fail")]
        let formatted = OffsetDateTime::now_utc().format(&Rfc3339).unwrap();
        Self(formatted)
    }

    /// Wraps an already-formatted RFC 3339 string without reformatting it.
    #[must_use]
    pub fn from_rfc3339(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the timestamp as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
