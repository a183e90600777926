// mission-runtime/src/core/template.rs
// ============================================================================
// Module: Mission Runtime Template
// Description: Mission template, prompt/audit step, and audit config types.
// Purpose: Define the immutable DAG of work the planner resolves.
// Dependencies: crate::core::{identifiers, significance}, serde, serde_yaml
// ============================================================================

//! ## Overview
//! A mission template is immutable once loaded: it is parsed once, frozen
//! to the run directory verbatim, and every subsequent planning call uses
//! that frozen copy. Validation happens eagerly at construction so the
//! planner never has to reject a structurally broken template mid-run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::StepId;
use crate::core::significance::SignificanceBlock;

// ============================================================================
// SECTION: Mission Metadata
// ============================================================================

/// The `mission:` block of a template file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionMeta {
    /// Unique mission key.
    pub key: String,
    /// Human-readable mission name.
    pub name: String,
    /// Mission template version string.
    pub version: String,
    /// Optional mission description.
    #[serde(default)]
    pub description: Option<String>,
}

// ============================================================================
// SECTION: Mission Template
// ============================================================================

/// A declarative DAG of prompt steps and audit checkpoints.
///
/// # Invariants
/// - Step ids are unique across `steps ∪ audit_steps`.
/// - Every `depends_on` target resolves within that union.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionTemplate {
    /// Mission metadata.
    pub mission: MissionMeta,
    /// Ordered prompt steps. Definition order is significant.
    #[serde(default)]
    pub steps: Vec<PromptStep>,
    /// Ordered audit checkpoints. Definition order is significant.
    #[serde(default)]
    pub audit_steps: Vec<AuditStep>,
}

/// Wire representation accepting the top-level shorthand where
/// `key`/`name`/`version` appear without a `mission:` wrapper.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TemplateWire {
    Wrapped(MissionTemplate),
    Shorthand {
        key: Option<String>,
        name: String,
        version: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        steps: Vec<PromptStep>,
        #[serde(default)]
        audit_steps: Vec<AuditStep>,
    },
}

impl MissionTemplate {
    /// Parses a template from YAML source, accepting either the wrapped
    /// `mission:` form or the top-level shorthand. When the shorthand
    /// omits `key`, it defaults to the name of the directory containing
    /// `source_path`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Parse`] on malformed YAML, or
    /// [`TemplateError`] variants from [`MissionTemplate::validate`].
    pub fn from_yaml_str(yaml: &str, source_path: &Path) -> Result<Self, TemplateError> {
        let wire: TemplateWire =
            serde_yaml::from_str(yaml).map_err(|err| TemplateError::Parse(err.to_string()))?;

        let template = match wire {
            TemplateWire::Wrapped(template) => template,
            TemplateWire::Shorthand {
                key,
                name,
                version,
                description,
                steps,
                audit_steps,
            } => {
                let key = key.unwrap_or_else(|| directory_name(source_path));
                MissionTemplate {
                    mission: MissionMeta {
                        key,
                        name,
                        version,
                        description,
                    },
                    steps,
                    audit_steps,
                }
            }
        };

        template.validate()?;
        Ok(template)
    }

    /// Validates step-id uniqueness, dependency resolution, and the RACI
    /// override/reason coupling invariant.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] describing the first invariant violation
    /// found.
    pub fn validate(&self) -> Result<(), TemplateError> {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for id in self.all_step_ids() {
            if !seen.insert(id.as_str()) {
                return Err(TemplateError::DuplicateStepId(id.clone()));
            }
        }

        let known: BTreeSet<&str> = seen;
        for step in &self.steps {
            for dep in &step.depends_on {
                if !known.contains(dep.as_str()) {
                    return Err(TemplateError::UnresolvedDependency(
                        step.id.clone(),
                        dep.clone(),
                    ));
                }
            }
            validate_override_reason(&step.id, step.raci_override_reason.as_deref(), step.raci.is_some())?;
        }
        for step in &self.audit_steps {
            for dep in &step.depends_on {
                if !known.contains(dep.as_str()) {
                    return Err(TemplateError::UnresolvedDependency(
                        step.id.clone(),
                        dep.clone(),
                    ));
                }
            }
            validate_override_reason(&step.id, step.raci_override_reason.as_deref(), step.raci.is_some())?;
            if let Some(significance) = &step.significance {
                significance
                    .validate_shape()
                    .map_err(|err| TemplateError::InvalidSignificance(step.id.clone(), err.to_string()))?;
            }
        }

        Ok(())
    }

    /// Returns every step id across `steps` and `audit_steps`, in
    /// template definition order (regular steps first).
    #[must_use]
    pub fn all_step_ids(&self) -> Vec<&StepId> {
        self.steps
            .iter()
            .map(|step| &step.id)
            .chain(self.audit_steps.iter().map(|step| &step.id))
            .collect()
    }
}

fn validate_override_reason(
    step_id: &StepId,
    reason: Option<&str>,
    has_override: bool,
) -> Result<(), TemplateError> {
    match (has_override, reason) {
        (true, None | Some("")) => Err(TemplateError::MissingOverrideReason(step_id.clone())),
        (false, Some(_)) => Err(TemplateError::UnexpectedOverrideReason(step_id.clone())),
        _ => Ok(()),
    }
}

/// Returns the name of `path`'s containing directory, or `"mission"` if it
/// cannot be determined.
fn directory_name(path: &Path) -> String {
    path.parent()
        .and_then(Path::file_name)
        .and_then(|name| name.to_str())
        .map_or_else(|| "mission".to_string(), ToString::to_string)
}

// ============================================================================
// SECTION: RACI Override
// ============================================================================

/// An explicit RACI override for a single step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaciOverride {
    /// Overridden responsible actor type, as a wire string (`human`,
    /// `llm`, `service`).
    #[serde(default)]
    pub responsible: Option<String>,
    /// Overridden accountable actor type, as a wire string. Must resolve
    /// to `human`.
    #[serde(default)]
    pub accountable: Option<String>,
    /// Overridden consulted actor types.
    #[serde(default)]
    pub consulted: Vec<String>,
    /// Overridden informed actor types.
    #[serde(default)]
    pub informed: Vec<String>,
}

// ============================================================================
// SECTION: Prompt Step
// ============================================================================

/// An agent-executed unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptStep {
    /// Step identifier, unique across the template.
    pub id: StepId,
    /// Step title.
    pub title: String,
    /// Step description.
    #[serde(default)]
    pub description: Option<String>,
    /// Literal prompt text.
    #[serde(default)]
    pub prompt: Option<String>,
    /// Prompt template reference.
    #[serde(default)]
    pub prompt_template: Option<String>,
    /// Expected output description.
    #[serde(default)]
    pub expected_output: Option<String>,
    /// Input key names this step requires before it can be issued.
    #[serde(default)]
    pub requires_inputs: Vec<String>,
    /// Step ids that must be completed before this step is eligible.
    #[serde(default)]
    pub depends_on: Vec<StepId>,
    /// Optional RACI override.
    #[serde(default)]
    pub raci: Option<RaciOverride>,
    /// Mandatory reason when `raci` is present.
    #[serde(default)]
    pub raci_override_reason: Option<String>,
}

// ============================================================================
// SECTION: Audit Step
// ============================================================================

/// A gate checkpoint in the mission DAG.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStep {
    /// Step identifier, unique across the template.
    pub id: StepId,
    /// Step title.
    pub title: String,
    /// Step description.
    #[serde(default)]
    pub description: Option<String>,
    /// Audit configuration.
    pub audit: AuditConfig,
    /// Optional significance block.
    #[serde(default)]
    pub significance: Option<SignificanceBlock>,
    /// Step ids that must be completed before this step is eligible.
    #[serde(default)]
    pub depends_on: Vec<StepId>,
    /// Optional RACI override.
    #[serde(default)]
    pub raci: Option<RaciOverride>,
    /// Mandatory reason when `raci` is present.
    #[serde(default)]
    pub raci_override_reason: Option<String>,
}

impl AuditStep {
    /// Returns true when this step's enforcement is `blocking`.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.audit.enforcement == Enforcement::Blocking
    }
}

/// Audit trigger mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// Triggered manually by an operator.
    Manual,
    /// Triggered automatically after a merge event.
    PostMerge,
    /// Triggered both manually and after a merge event.
    Both,
}

/// Audit enforcement level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Enforcement {
    /// Advisory: does not block progress absent a significance block.
    Advisory,
    /// Blocking: always requires an operator decision.
    Blocking,
}

/// Audit checkpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// When this checkpoint triggers.
    pub trigger_mode: TriggerMode,
    /// Enforcement level.
    pub enforcement: Enforcement,
    /// Optional display label.
    #[serde(default)]
    pub label: Option<String>,
    /// Optional free-form metadata.
    #[serde(default)]
    pub metadata: Option<std::collections::BTreeMap<String, String>>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Template construction and validation errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template file was not valid YAML.
    #[error("failed to parse mission template yaml: {0}")]
    Parse(String),
    /// A step id appeared more than once across `steps` and `audit_steps`.
    #[error("duplicate step id: {0}")]
    DuplicateStepId(StepId),
    /// A `depends_on` entry referenced an id not present in the template.
    #[error("step {0} depends on unresolved step id {1}")]
    UnresolvedDependency(StepId, StepId),
    /// A step declared a RACI override with no reason.
    #[error("step {0} has a RACI override but no override reason")]
    MissingOverrideReason(StepId),
    /// A step declared a RACI override reason without an override.
    #[error("step {0} has a RACI override reason but no override")]
    UnexpectedOverrideReason(StepId),
    /// An audit step's significance block failed its own validation.
    #[error("step {0} has an invalid significance block: {1}")]
    InvalidSignificance(StepId, String),
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test module")]

    use std::path::PathBuf;

    use super::*;

    fn minimal_yaml() -> &'static str {
        "mission:\n  key: demo\n  name: Demo\n  version: \"1.0\"\nsteps:\n  - id: S1\n    title: Step One\n"
    }

    #[test]
    fn parses_wrapped_form() {
        let template =
            MissionTemplate::from_yaml_str(minimal_yaml(), &PathBuf::from("/tmp/demo/mission.yaml"))
                .unwrap();
        assert_eq!(template.mission.key, "demo");
        assert_eq!(template.steps.len(), 1);
    }

    #[test]
    fn shorthand_synthesizes_mission_block_and_defaults_key_to_directory_name() {
        let yaml = "name: Demo\nversion: \"1.0\"\nsteps:\n  - id: S1\n    title: Step One\n";
        let template =
            MissionTemplate::from_yaml_str(yaml, &PathBuf::from("/missions/onboarding/mission.yaml"))
                .unwrap();
        assert_eq!(template.mission.key, "onboarding");
    }

    #[test]
    fn duplicate_step_ids_are_rejected() {
        let yaml = "mission:\n  key: demo\n  name: Demo\n  version: \"1.0\"\nsteps:\n  - id: S1\n    title: A\n  - id: S1\n    title: B\n";
        let err =
            MissionTemplate::from_yaml_str(yaml, &PathBuf::from("/tmp/demo/mission.yaml")).unwrap_err();
        assert!(matches!(err, TemplateError::DuplicateStepId(_)));
    }

    #[test]
    fn unresolved_dependency_is_rejected() {
        let yaml = "mission:\n  key: demo\n  name: Demo\n  version: \"1.0\"\nsteps:\n  - id: S1\n    title: A\n    depends_on: [S2]\n";
        let err =
            MissionTemplate::from_yaml_str(yaml, &PathBuf::from("/tmp/demo/mission.yaml")).unwrap_err();
        assert!(matches!(err, TemplateError::UnresolvedDependency(_, _)));
    }

    #[test]
    fn audit_step_with_malformed_significance_block_is_rejected() {
        let yaml = "mission:\n  key: demo\n  name: Demo\n  version: \"1.0\"\naudit_steps:\n  - id: A1\n    title: Audit One\n    audit:\n      trigger_mode: manual\n      enforcement: advisory\n    significance:\n      dimensions:\n        architectural_system_impact: 1\n      hard_triggers: []\n";
        let err =
            MissionTemplate::from_yaml_str(yaml, &PathBuf::from("/tmp/demo/mission.yaml")).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidSignificance(_, _)));
    }
}
