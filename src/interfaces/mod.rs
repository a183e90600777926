// mission-runtime/src/interfaces/mod.rs
// ============================================================================
// Module: Mission Runtime Interfaces
// Description: The engine's single observability seam: run event emission.
// Purpose: Define the contract external collaborators implement to observe
//          run-lifecycle events without coupling the engine to them.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The mission runtime has exactly one ambient interface: emitting the
//! structured events described in the external interfaces section of the
//! specification. Event-log *consumers* are out of scope; this crate only
//! defines the emission contract and two reference implementations
//! (a no-op and a JSONL-file-backed log).
//!
//! Per the error handling design, an emitter failure must never prevent a
//! snapshot write or a JSONL append that already happened — the engine
//! appends to the log first, then invokes the emitter, and swallows
//! emitter errors into a best-effort notification.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;

use crate::core::EventRecord;

// ============================================================================
// SECTION: Emitter
// ============================================================================

/// Errors an emitter may report. The engine never propagates these as
/// operation failures; see the module overview.
#[derive(Debug, Error)]
pub enum EmitError {
    /// The emitter failed to deliver the event.
    #[error("event emitter failed: {0}")]
    Failed(String),
}

/// Observes run-lifecycle events as they are emitted by the engine.
pub trait RuntimeEventEmitter {
    /// Notifies the emitter of a new event.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError`] when delivery fails. The engine logs this but
    /// does not let it affect snapshot or JSONL persistence.
    fn emit(&self, event: &EventRecord) -> Result<(), EmitError>;
}

/// An emitter that discards every event. Useful for planner-only tests and
/// callers that only care about the persisted JSONL log.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEmitter;

impl RuntimeEventEmitter for NullEmitter {
    fn emit(&self, _event: &EventRecord) -> Result<(), EmitError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: JSONL Event Log Emitter
// ============================================================================

/// An emitter that appends every event it observes to its own JSONL file,
/// independent of the run directory's own `run.events.jsonl`. Useful for a
/// secondary external sink (a tailing log shipper, a test harness) that
/// wants the same structured records without reading the run directory.
pub struct JsonlEventLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlEventLog {
    /// Creates a JSONL event log emitter appending to `path`. The file is
    /// created on first emit; it is never truncated.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Returns the path this emitter appends to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RuntimeEventEmitter for JsonlEventLog {
    fn emit(&self, event: &EventRecord) -> Result<(), EmitError> {
        let _guard = self.lock.lock().map_err(|_| EmitError::Failed("event log mutex poisoned".to_string()))?;
        let value = serde_json::to_value(event).map_err(|err| EmitError::Failed(err.to_string()))?;
        let mut line = serde_json::to_string(&value).map_err(|err| EmitError::Failed(err.to_string()))?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| EmitError::Failed(err.to_string()))?;
        file.write_all(line.as_bytes()).map_err(|err| EmitError::Failed(err.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test module")]

    use tempfile::TempDir;

    use super::*;
    use crate::core::EventType;

    #[test]
    fn jsonl_event_log_appends_one_line_per_emit() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("external.events.jsonl");
        let emitter = JsonlEventLog::new(&path);
        emitter.emit(&EventRecord::new(EventType::MissionRunStarted, serde_json::json!({"run_id": "r1"}))).unwrap();
        emitter.emit(&EventRecord::new(EventType::MissionRunCompleted, serde_json::json!({"run_id": "r1"}))).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 2);
    }

    #[test]
    fn null_emitter_never_fails() {
        let emitter = NullEmitter;
        assert!(emitter.emit(&EventRecord::new(EventType::MissionRunStarted, serde_json::json!({}))).is_ok());
    }
}
