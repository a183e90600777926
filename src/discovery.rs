// mission-runtime/src/discovery.rs
// ============================================================================
// Module: Mission Runtime Discovery
// Description: Seven-tier mission template discovery and precedence
//              resolution.
// Purpose: Resolve a mission key or explicit path to a concrete template
//          file, tracking shadowed duplicates across precedence tiers.
// Dependencies: crate::core, serde, serde_yaml, std::fs
// ============================================================================

//! ## Overview
//! Discovery walks seven precedence tiers, highest first: explicit paths,
//! the `SPEC_KITTY_MISSION_PATHS` environment list, the project override
//! directory, the project legacy directory, the user's global directory,
//! the project config file's pack list, and finally the builtin roots.
//! Within a tier, roots are scanned in the order given; the first time a
//! mission key is seen it is marked `selected`, and every later occurrence
//! of that key is recorded as a shadow.
//!
//! Unlike the reference implementation this was distilled from, a load or
//! parse failure is never swallowed: every failure along the way is
//! surfaced as a [`DiscoveryWarning`] rather than silently skipped, so a
//! caller can tell "no missions found" apart from "missions found, but N
//! could not be read".
//!
//! Discovery takes its environment variable value and filesystem roots as
//! explicit fields on [`DiscoveryContext`] rather than reading
//! `std::env`/`dirs` itself, keeping it a pure function of its inputs and
//! its tests hermetic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use crate::core::MissionKey;
use crate::core::MissionTemplate;
use crate::core::TemplateError;

/// Default name of the environment variable carrying a platform-separated
/// list of extra mission search paths.
pub const DEFAULT_ENV_VAR_NAME: &str = "SPEC_KITTY_MISSION_PATHS";

const TEMPLATE_FILE_NAME: &str = "mission.yaml";
const MANIFEST_FILE_NAME: &str = "mission-pack.yaml";
const PROJECT_OVERRIDE_SUBPATH: &str = ".kittify/overrides/missions";
const PROJECT_LEGACY_SUBPATH: &str = ".kittify/missions";
const USER_GLOBAL_SUBPATH: &str = ".kittify/missions";
const PROJECT_CONFIG_SUBPATH: &str = ".kittify/config.yaml";

// ============================================================================
// SECTION: Discovery Context
// ============================================================================

/// Everything discovery needs to resolve mission templates, injected by the
/// caller rather than read from process-global state.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryContext {
    /// Paths given explicitly by the caller; highest precedence tier.
    pub explicit_paths: Vec<PathBuf>,
    /// Raw value of the mission-paths environment variable, if set.
    pub env_value: Option<String>,
    /// Project root directory, used to resolve the override/legacy/config
    /// tiers.
    pub project_dir: Option<PathBuf>,
    /// The current user's home directory, used for the user-global tier.
    pub user_home: Option<PathBuf>,
    /// Builtin roots shipped with the runtime itself; lowest precedence
    /// tier.
    pub builtin_roots: Vec<PathBuf>,
}

impl DiscoveryContext {
    /// Reads `SPEC_KITTY_MISSION_PATHS` and `HOME`/`USERPROFILE` from the
    /// process environment to populate `env_value` and `user_home`. Kept
    /// separate from [`DiscoveryContext::default`] so that discovery
    /// itself never performs this read implicitly.
    #[must_use]
    pub fn from_process(project_dir: Option<PathBuf>) -> Self {
        let env_value = env::var(DEFAULT_ENV_VAR_NAME).ok();
        let user_home = env::var_os("HOME").or_else(|| env::var_os("USERPROFILE")).map(PathBuf::from);
        Self {
            explicit_paths: Vec::new(),
            env_value,
            project_dir,
            user_home,
            builtin_roots: Vec::new(),
        }
    }
}

// ============================================================================
// SECTION: Discovery Results
// ============================================================================

/// One mission template found during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredMission {
    /// The mission's key.
    pub key: MissionKey,
    /// Resolved path to its `mission.yaml`.
    pub path: PathBuf,
    /// Name of the precedence tier this entry was found in.
    pub tier: &'static str,
    /// True for the first (highest-precedence) occurrence of this key;
    /// false for shadowed duplicates.
    pub selected: bool,
}

/// A load or parse failure encountered while scanning, surfaced rather
/// than swallowed.
#[derive(Debug, Clone)]
pub struct DiscoveryWarning {
    /// Path that failed to load.
    pub path: PathBuf,
    /// Human-readable failure description.
    pub message: String,
}

/// The full result of a discovery pass.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryResult {
    /// Every mission found, selected and shadowed alike, in scan order.
    pub missions: Vec<DiscoveredMission>,
    /// Every failure encountered while scanning.
    pub warnings: Vec<DiscoveryWarning>,
}

impl DiscoveryResult {
    /// Returns only the selected (non-shadowed) missions.
    #[must_use]
    pub fn selected(&self) -> Vec<&DiscoveredMission> {
        self.missions.iter().filter(|mission| mission.selected).collect()
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Discovery and template-loading errors.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// No mission with the given key was found among the selected entries.
    #[error("no selected mission found for key: {0}")]
    UnknownMissionKey(String),
    /// The given path does not exist.
    #[error("mission template path does not exist: {0}")]
    PathNotFound(String),
    /// The mission template at the resolved path could not be read.
    #[error("failed to read mission template at {path}: {message}")]
    Io {
        /// Path that could not be read.
        path: String,
        /// Underlying I/O error description.
        message: String,
    },
    /// The mission template failed to parse or validate.
    #[error(transparent)]
    Template(#[from] TemplateError),
}

// ============================================================================
// SECTION: Manifest Parsing
// ============================================================================

/// A `mission-pack.yaml` manifest entry: either a bare directory name or an
/// explicit path.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ManifestEntry {
    /// `- onboarding` — resolved to `<pack_root>/onboarding/mission.yaml`.
    Shorthand(String),
    /// `- path: custom/location` — resolved relative to the pack root.
    Explicit {
        /// Path to the mission, relative to the pack root.
        path: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct PackMeta {
    #[allow(dead_code, reason = "parsed for presence; pack identity is not consumed by discovery")]
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct PackManifest {
    /// A manifest with no `pack:` section is malformed; its absence is a
    /// hard load error, not a silently-ignored manifest.
    pack: PackMeta,
    #[serde(default)]
    missions: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct ProjectConfig {
    #[serde(default)]
    mission_packs: Vec<String>,
}

// ============================================================================
// SECTION: Root Scanning
// ============================================================================

/// Scans a single root for candidate `mission.yaml` paths, per the
/// reference lookup order: a manifest's explicit list, `<root>/*/mission.yaml`,
/// `<root>/missions/*/mission.yaml`, and a direct `<root>/mission.yaml`.
/// Candidates are deduplicated by canonical path, preserving first-seen
/// order.
fn scan_root(root: &Path, result: &mut DiscoveryResult) -> Vec<PathBuf> {
    if root.is_file() && root.file_name().and_then(|name| name.to_str()) == Some(TEMPLATE_FILE_NAME) {
        return vec![root.to_path_buf()];
    }
    if !root.is_dir() {
        return Vec::new();
    }

    let mut candidates = Vec::new();
    candidates.extend(collect_from_manifest(root, result));

    for glob_root in [root.to_path_buf(), root.join("missions")] {
        if let Ok(entries) = fs::read_dir(&glob_root) {
            let mut names: Vec<PathBuf> = entries.filter_map(Result::ok).map(|entry| entry.path()).collect();
            names.sort();
            for dir in names {
                if dir.is_dir() {
                    let candidate = dir.join(TEMPLATE_FILE_NAME);
                    if candidate.is_file() {
                        candidates.push(candidate);
                    }
                }
            }
        }
    }

    let direct = root.join(TEMPLATE_FILE_NAME);
    if direct.is_file() {
        candidates.push(direct);
    }

    dedup_by_canonical_path(candidates)
}

/// Reads `<root>/mission-pack.yaml`, resolving each listed entry to a
/// candidate path. Returns no candidates (silently) when the manifest file
/// itself is absent — that is the normal case for a plain mission
/// directory, not a failure. A manifest that exists but fails to parse, or
/// parses without a `pack:` section, is a hard load error recorded as a
/// warning rather than silently skipped.
fn collect_from_manifest(root: &Path, result: &mut DiscoveryResult) -> Vec<PathBuf> {
    let manifest_path = root.join(MANIFEST_FILE_NAME);
    let Ok(raw) = fs::read_to_string(&manifest_path) else {
        return Vec::new();
    };
    match serde_yaml::from_str::<PackManifest>(&raw) {
        Ok(manifest) => manifest
            .missions
            .into_iter()
            .map(|entry| match entry {
                ManifestEntry::Shorthand(name) => root.join(name).join(TEMPLATE_FILE_NAME),
                ManifestEntry::Explicit {
                    path,
                } => root.join(path),
            })
            .collect(),
        Err(err) => {
            result.warnings.push(DiscoveryWarning {
                path: manifest_path,
                message: format!("mission pack manifest is missing its pack section or is malformed: {err}"),
            });
            Vec::new()
        }
    }
}

/// Removes later duplicates of a path (by canonical form, falling back to
/// the path itself when canonicalization fails), preserving the order of
/// first occurrence.
fn dedup_by_canonical_path(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for path in paths {
        let key = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
        if seen.insert(key) {
            out.push(path);
        }
    }
    out
}

// ============================================================================
// SECTION: Discovery
// ============================================================================

/// Runs the full seven-tier discovery pass, never swallowing a load
/// failure: every path that fails to parse is recorded as a warning
/// instead of being skipped silently.
#[must_use]
pub fn discover_missions_with_warnings(context: &DiscoveryContext) -> DiscoveryResult {
    let mut result = DiscoveryResult::default();
    let mut seen_keys: BTreeSet<String> = BTreeSet::new();

    let mut tiers: Vec<(&'static str, Vec<PathBuf>)> = vec![("explicit", context.explicit_paths.clone())];

    if let Some(raw) = &context.env_value {
        tiers.push(("env", env::split_paths(raw).collect()));
    } else {
        tiers.push(("env", Vec::new()));
    }

    if let Some(project_dir) = &context.project_dir {
        tiers.push(("project_override", vec![project_dir.join(PROJECT_OVERRIDE_SUBPATH)]));
        tiers.push(("project_legacy", vec![project_dir.join(PROJECT_LEGACY_SUBPATH)]));
    } else {
        tiers.push(("project_override", Vec::new()));
        tiers.push(("project_legacy", Vec::new()));
    }

    if let Some(user_home) = &context.user_home {
        tiers.push(("user_global", vec![user_home.join(USER_GLOBAL_SUBPATH)]));
    } else {
        tiers.push(("user_global", Vec::new()));
    }

    tiers.push(("project_config", project_config_pack_roots(context, &mut result)));
    tiers.push(("builtin", context.builtin_roots.clone()));

    for (tier, roots) in tiers {
        for root in roots {
            for candidate in scan_root(&root, &mut result) {
                load_and_record(&candidate, tier, &mut seen_keys, &mut result);
            }
        }
    }

    result
}

/// Reads the project config file's `mission_packs` list and resolves each
/// entry (relative to the project directory) to a root directory to scan.
/// A missing config file is not a warning; a present-but-malformed one is.
fn project_config_pack_roots(context: &DiscoveryContext, result: &mut DiscoveryResult) -> Vec<PathBuf> {
    let Some(project_dir) = &context.project_dir else {
        return Vec::new();
    };
    let config_path = project_dir.join(PROJECT_CONFIG_SUBPATH);
    let Ok(raw) = fs::read_to_string(&config_path) else {
        return Vec::new();
    };
    match serde_yaml::from_str::<ProjectConfig>(&raw) {
        Ok(config) => config.mission_packs.into_iter().map(|pack| project_dir.join(pack)).collect(),
        Err(err) => {
            result.warnings.push(DiscoveryWarning {
                path: config_path,
                message: format!("failed to parse project config: {err}"),
            });
            Vec::new()
        }
    }
}

/// Loads a single candidate mission template file, recording it as a
/// discovered mission (selected if its key is new) or as a warning if it
/// fails to load.
fn load_and_record(
    candidate: &Path,
    tier: &'static str,
    seen_keys: &mut BTreeSet<String>,
    result: &mut DiscoveryResult,
) {
    match load_mission_template_file(candidate) {
        Ok(template) => {
            let key = template.mission.key.clone();
            let selected = seen_keys.insert(key.clone());
            result.missions.push(DiscoveredMission {
                key: MissionKey::new(key),
                path: candidate.to_path_buf(),
                tier,
                selected,
            });
        }
        Err(err) => {
            result.warnings.push(DiscoveryWarning {
                path: candidate.to_path_buf(),
                message: err.to_string(),
            });
        }
    }
}

/// Reads and parses a single mission template file.
///
/// # Errors
///
/// Returns [`DiscoveryError::Io`] when the file cannot be read, or
/// [`DiscoveryError::Template`] when it fails to parse or validate.
pub fn load_mission_template_file(path: &Path) -> Result<MissionTemplate, DiscoveryError> {
    let raw = fs::read_to_string(path).map_err(|err| DiscoveryError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    Ok(MissionTemplate::from_yaml_str(&raw, path)?)
}

/// Resolves `path_or_key` to a loaded mission template and its path: if it
/// names an existing file, that file is loaded directly; otherwise it is
/// looked up by key among `context`'s selected (non-shadowed) discovered
/// missions.
///
/// # Errors
///
/// Returns [`DiscoveryError::PathNotFound`] when a looks-like-a-path value
/// does not resolve to an existing file, [`DiscoveryError::UnknownMissionKey`]
/// when no selected mission matches the given key, or an I/O or template
/// error while loading the resolved file.
pub fn load_mission_template(
    path_or_key: &str,
    context: &DiscoveryContext,
) -> Result<(MissionTemplate, PathBuf), DiscoveryError> {
    let as_path = Path::new(path_or_key);
    if as_path.exists() {
        let template = load_mission_template_file(as_path)?;
        return Ok((template, as_path.to_path_buf()));
    }
    if path_or_key.contains('/') || path_or_key.ends_with(".yaml") || path_or_key.ends_with(".yml") {
        return Err(DiscoveryError::PathNotFound(path_or_key.to_string()));
    }

    let discovered = discover_missions_with_warnings(context);
    let found = discovered
        .selected()
        .into_iter()
        .find(|mission| mission.key.as_str() == path_or_key)
        .ok_or_else(|| DiscoveryError::UnknownMissionKey(path_or_key.to_string()))?;

    let template = load_mission_template_file(&found.path)?;
    Ok((template, found.path.clone()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test module")]

    use tempfile::TempDir;

    use super::*;

    fn write_mission(dir: &Path, key: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(
            dir.join(TEMPLATE_FILE_NAME),
            format!("mission:\n  key: {key}\n  name: {key}\n  version: \"1.0\"\nsteps:\n  - id: S1\n    title: Step\n"),
        )
        .unwrap();
    }

    #[test]
    fn explicit_path_wins_over_builtin_root_for_the_same_key() {
        let temp = TempDir::new().unwrap();
        let explicit_dir = temp.path().join("explicit");
        let builtin_dir = temp.path().join("builtin").join("demo");
        write_mission(&explicit_dir, "demo");
        write_mission(&builtin_dir, "demo");

        let context = DiscoveryContext {
            explicit_paths: vec![explicit_dir.join(TEMPLATE_FILE_NAME)],
            builtin_roots: vec![temp.path().join("builtin")],
            ..DiscoveryContext::default()
        };
        let result = discover_missions_with_warnings(&context);
        let selected = result.selected();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].path, explicit_dir.join(TEMPLATE_FILE_NAME));

        let shadowed = result.missions.iter().filter(|mission| !mission.selected).count();
        assert_eq!(shadowed, 1);
    }

    #[test]
    fn malformed_template_is_reported_as_a_warning_not_swallowed() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("broken");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(TEMPLATE_FILE_NAME), "not: [valid, mission").unwrap();

        let context = DiscoveryContext {
            explicit_paths: vec![dir.join(TEMPLATE_FILE_NAME)],
            ..DiscoveryContext::default()
        };
        let result = discover_missions_with_warnings(&context);
        assert!(result.missions.is_empty());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn load_mission_template_resolves_an_existing_path_directly() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("demo");
        write_mission(&dir, "demo");

        let context = DiscoveryContext::default();
        let (template, path) =
            load_mission_template(dir.join(TEMPLATE_FILE_NAME).to_str().unwrap(), &context).unwrap();
        assert_eq!(template.mission.key, "demo");
        assert_eq!(path, dir.join(TEMPLATE_FILE_NAME));
    }

    #[test]
    fn load_mission_template_resolves_by_key_among_selected_entries() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("builtin").join("demo");
        write_mission(&dir, "demo");

        let context = DiscoveryContext {
            builtin_roots: vec![temp.path().join("builtin")],
            ..DiscoveryContext::default()
        };
        let (template, _) = load_mission_template("demo", &context).unwrap();
        assert_eq!(template.mission.key, "demo");
    }

    #[test]
    fn load_mission_template_rejects_unknown_key() {
        let context = DiscoveryContext::default();
        let err = load_mission_template("does-not-exist", &context).unwrap_err();
        assert!(matches!(err, DiscoveryError::UnknownMissionKey(_)));
    }
}
