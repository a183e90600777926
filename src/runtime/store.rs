// mission-runtime/src/runtime/store.rs
// ============================================================================
// Module: Mission Runtime Run Directory Store
// Description: Filesystem operations for a single run directory: the frozen
//              template, the snapshot, and the append-only event log.
// Purpose: Concentrate every byte the engine writes to disk in one place so
//          the run-directory layout in the external interfaces section has
//          a single implementation.
// Dependencies: crate::core, serde_json, std::fs
// ============================================================================

//! ## Overview
//! A run directory holds exactly three artifacts: `mission_template_frozen.yaml`
//! (the verbatim source bytes, or a canonical dump when the source no
//! longer exists), `state.json` (the run snapshot, canonical JSON with
//! sorted keys and two-space indentation), and `run.events.jsonl`
//! (one sorted-key JSON object per line, strictly append-only).
//!
//! Snapshot writes are whole-file rewrites: the new contents are written to
//! a sibling temporary file and renamed into place, so a reader never
//! observes a partially written `state.json`. The event log is opened,
//! appended to, and closed once per record, matching the "single
//! open-append-write-close per event record" requirement.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use crate::core::EventRecord;
use crate::core::MissionTemplate;
use crate::core::RunId;
use crate::core::RunSnapshot;
use crate::core::RunStateError;
use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::hash_bytes;

// ============================================================================
// SECTION: Filenames
// ============================================================================

const FROZEN_TEMPLATE_FILE_NAME: &str = "mission_template_frozen.yaml";
const STATE_FILE_NAME: &str = "state.json";
const EVENTS_FILE_NAME: &str = "run.events.jsonl";

// ============================================================================
// SECTION: Run Store
// ============================================================================

/// Filesystem operations scoped to a `runs_root` directory. Stateless
/// beyond that root: every method takes the run directory it operates on
/// explicitly, so a single instance can serve every run the process knows
/// about.
#[derive(Debug, Clone)]
pub struct RunStore {
    runs_root: PathBuf,
}

impl RunStore {
    /// Creates a store rooted at `runs_root`. The directory is not created
    /// until the first run is started.
    #[must_use]
    pub fn new(runs_root: impl Into<PathBuf>) -> Self {
        Self {
            runs_root: runs_root.into(),
        }
    }

    /// Returns the directory a given run's artifacts live under.
    #[must_use]
    pub fn run_dir(&self, run_id: &RunId) -> PathBuf {
        self.runs_root.join(run_id.as_str())
    }

    /// Creates a fresh run directory.
    ///
    /// # Errors
    ///
    /// Returns [`RunStateError::Io`] when the directory cannot be created.
    pub fn create_run_dir(&self, run_id: &RunId) -> Result<PathBuf, RunStateError> {
        let dir = self.run_dir(run_id);
        fs::create_dir_all(&dir).map_err(|err| RunStateError::Io(err.to_string()))?;
        Ok(dir)
    }

    /// Freezes the template at `source_path` into `run_dir`: copies the
    /// source bytes verbatim when the file still exists, otherwise
    /// reconstructs canonical YAML from the already-parsed `template`.
    /// Returns the hex SHA-256 of the frozen bytes.
    ///
    /// # Errors
    ///
    /// Returns [`RunStateError::Io`] when the frozen copy cannot be
    /// written, or when `source_path` is absent and `template` fails to
    /// re-serialize.
    pub fn freeze_template(
        &self,
        run_dir: &Path,
        source_path: &Path,
        template: &MissionTemplate,
    ) -> Result<String, RunStateError> {
        let bytes = match fs::read(source_path) {
            Ok(bytes) => bytes,
            Err(_) => serde_yaml::to_string(template)
                .map_err(|err| RunStateError::Io(err.to_string()))?
                .into_bytes(),
        };
        let frozen_path = self.frozen_template_path(run_dir);
        fs::write(&frozen_path, &bytes).map_err(|err| RunStateError::Io(err.to_string()))?;
        Ok(hash_bytes(DEFAULT_HASH_ALGORITHM, &bytes).value)
    }

    /// Path to the frozen template copy within `run_dir`.
    #[must_use]
    pub fn frozen_template_path(&self, run_dir: &Path) -> PathBuf {
        run_dir.join(FROZEN_TEMPLATE_FILE_NAME)
    }

    /// Reads and parses the frozen template copy from `run_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`RunStateError::FrozenTemplateMissing`] when the file is
    /// absent, or a wrapped parse error when it fails to parse.
    pub fn read_frozen_template(&self, run_dir: &Path) -> Result<MissionTemplate, RunStateError> {
        let path = self.frozen_template_path(run_dir);
        let raw = fs::read_to_string(&path)
            .map_err(|_| RunStateError::FrozenTemplateMissing(run_dir.display().to_string()))?;
        MissionTemplate::from_yaml_str(&raw, &path).map_err(|err| RunStateError::SnapshotParse(err.to_string()))
    }

    /// Path to the run snapshot within `run_dir`.
    #[must_use]
    pub fn state_path(&self, run_dir: &Path) -> PathBuf {
        run_dir.join(STATE_FILE_NAME)
    }

    /// Writes `snapshot` as canonical JSON (sorted keys, two-space indent)
    /// to `run_dir`'s `state.json`, via a temp-file-then-rename so readers
    /// never observe a partial write.
    ///
    /// # Errors
    ///
    /// Returns [`RunStateError::Io`] when serialization or the write
    /// fails.
    pub fn write_snapshot(&self, run_dir: &Path, snapshot: &RunSnapshot) -> Result<(), RunStateError> {
        let value = serde_json::to_value(snapshot).map_err(|err| RunStateError::Io(err.to_string()))?;
        let text = serde_json::to_string_pretty(&value).map_err(|err| RunStateError::Io(err.to_string()))?;
        let final_path = self.state_path(run_dir);
        let tmp_path = final_path.with_extension("json.tmp");
        fs::write(&tmp_path, text.as_bytes()).map_err(|err| RunStateError::Io(err.to_string()))?;
        fs::rename(&tmp_path, &final_path).map_err(|err| RunStateError::Io(err.to_string()))?;
        Ok(())
    }

    /// Reads and parses the run snapshot from `run_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`RunStateError::SnapshotParse`] when the file is missing
    /// or fails to parse.
    pub fn read_snapshot(&self, run_dir: &Path) -> Result<RunSnapshot, RunStateError> {
        let raw = fs::read_to_string(self.state_path(run_dir))
            .map_err(|err| RunStateError::SnapshotParse(err.to_string()))?;
        serde_json::from_str(&raw).map_err(|err| RunStateError::SnapshotParse(err.to_string()))
    }

    /// Path to the event log within `run_dir`.
    #[must_use]
    pub fn events_path(&self, run_dir: &Path) -> PathBuf {
        run_dir.join(EVENTS_FILE_NAME)
    }

    /// Appends one event record as a single sorted-key JSON line, opening,
    /// writing, and closing the file once per call.
    ///
    /// # Errors
    ///
    /// Returns [`RunStateError::Io`] when the append fails.
    pub fn append_event(&self, run_dir: &Path, event: &EventRecord) -> Result<(), RunStateError> {
        let value = serde_json::to_value(event).map_err(|err| RunStateError::Io(err.to_string()))?;
        let mut line = serde_json::to_string(&value).map_err(|err| RunStateError::Io(err.to_string()))?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.events_path(run_dir))
            .map_err(|err| RunStateError::Io(err.to_string()))?;
        file.write_all(line.as_bytes()).map_err(|err| RunStateError::Io(err.to_string()))?;
        Ok(())
    }

    /// Reads every event record from `run_dir`'s event log, in append
    /// order. Used by tests that assert on emitted event sequences.
    ///
    /// # Errors
    ///
    /// Returns [`RunStateError::Io`] when the file cannot be read, or
    /// [`RunStateError::SnapshotParse`] when a line fails to parse.
    pub fn read_events(&self, run_dir: &Path) -> Result<Vec<EventRecord>, RunStateError> {
        let path = self.events_path(run_dir);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&path).map_err(|err| RunStateError::Io(err.to_string()))?;
        raw.lines()
            .filter(|line| !line.is_empty())
            .map(|line| serde_json::from_str(line).map_err(|err| RunStateError::SnapshotParse(err.to_string())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test module")]

    use tempfile::TempDir;

    use super::*;
    use crate::core::EventType;
    use crate::core::MissionKey;
    use crate::core::MissionPolicySnapshot;
    use crate::core::Strictness;

    fn policy() -> MissionPolicySnapshot {
        MissionPolicySnapshot {
            strictness: Strictness::Medium,
            default_route: "default".to_string(),
            extras: serde_json::Map::new(),
        }
    }

    #[test]
    fn write_then_read_snapshot_round_trips() {
        let temp = TempDir::new().unwrap();
        let store = RunStore::new(temp.path());
        let run_id = RunId::new("r1");
        let run_dir = store.create_run_dir(&run_id).unwrap();
        let snapshot = RunSnapshot::new_initial(
            run_id,
            MissionKey::new("demo"),
            "/tmp/demo/mission.yaml".to_string(),
            "deadbeef".to_string(),
            policy(),
            std::collections::BTreeMap::new(),
        );
        store.write_snapshot(&run_dir, &snapshot).unwrap();
        let read_back = store.read_snapshot(&run_dir).unwrap();
        assert_eq!(read_back, snapshot);
    }

    #[test]
    fn state_json_has_sorted_keys_and_two_space_indent() {
        let temp = TempDir::new().unwrap();
        let store = RunStore::new(temp.path());
        let run_id = RunId::new("r1");
        let run_dir = store.create_run_dir(&run_id).unwrap();
        let snapshot = RunSnapshot::new_initial(
            run_id,
            MissionKey::new("demo"),
            "/tmp/demo/mission.yaml".to_string(),
            "deadbeef".to_string(),
            policy(),
            std::collections::BTreeMap::new(),
        );
        store.write_snapshot(&run_dir, &snapshot).unwrap();
        let raw = fs::read_to_string(store.state_path(&run_dir)).unwrap();
        assert!(raw.starts_with("{\n  \""));
        let blocked_idx = raw.find("\"blocked_reason\"").unwrap();
        let completed_idx = raw.find("\"completed_steps\"").unwrap();
        assert!(blocked_idx < completed_idx, "keys must be sorted alphabetically");
    }

    #[test]
    fn append_event_writes_one_jsonl_line_per_call() {
        let temp = TempDir::new().unwrap();
        let store = RunStore::new(temp.path());
        let run_id = RunId::new("r1");
        let run_dir = store.create_run_dir(&run_id).unwrap();
        store
            .append_event(&run_dir, &EventRecord::new(EventType::MissionRunStarted, serde_json::json!({})))
            .unwrap();
        store
            .append_event(&run_dir, &EventRecord::new(EventType::MissionRunCompleted, serde_json::json!({})))
            .unwrap();
        let events = store.read_events(&run_dir).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "MissionRunStarted");
        assert_eq!(events[1].event_type, "MissionRunCompleted");
    }

    #[test]
    fn frozen_template_read_back_matches_source_when_copied_verbatim() {
        let temp = TempDir::new().unwrap();
        let store = RunStore::new(temp.path());
        let run_id = RunId::new("r1");
        let run_dir = store.create_run_dir(&run_id).unwrap();
        let source_dir = temp.path().join("source");
        fs::create_dir_all(&source_dir).unwrap();
        let source_path = source_dir.join("mission.yaml");
        fs::write(
            &source_path,
            "mission:\n  key: demo\n  name: Demo\n  version: \"1.0\"\nsteps:\n  - id: S1\n    title: Step\n",
        )
        .unwrap();
        let template = MissionTemplate::from_yaml_str(&fs::read_to_string(&source_path).unwrap(), &source_path).unwrap();
        let hash = store.freeze_template(&run_dir, &source_path, &template).unwrap();
        let expected_hash = hash_bytes(DEFAULT_HASH_ALGORITHM, &fs::read(&source_path).unwrap()).value;
        assert_eq!(hash, expected_hash);
        let reread = store.read_frozen_template(&run_dir).unwrap();
        assert_eq!(reread, template);
    }
}
