// mission-runtime/tests/scenarios.rs
// End-to-end engine scenarios driven against a temporary runs root.

#![allow(clippy::unwrap_used, reason = "test module")]

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use mission_runtime_core::DecisionId;
use mission_runtime_core::MissionPolicySnapshot;
use mission_runtime_core::NextDecision;
use mission_runtime_core::Strictness;
use mission_runtime_core::core::run_state::Actor;
use mission_runtime_core::interfaces::NullEmitter;
use mission_runtime_core::runtime::EngineConfig;
use mission_runtime_core::runtime::RunEngine;
use mission_runtime_core::runtime::RunStore;
use mission_runtime_core::runtime::StepResult;
use tempfile::TempDir;

fn actor(id: &str, actor_type: &str) -> Actor {
    Actor {
        actor_id: id.to_string(),
        actor_type: actor_type.to_string(),
    }
}

fn policy() -> MissionPolicySnapshot {
    MissionPolicySnapshot {
        strictness: Strictness::Medium,
        default_route: "default".to_string(),
        extras: serde_json::Map::new(),
    }
}

fn engine(runs_root: &Path) -> RunEngine<NullEmitter> {
    RunEngine::new(EngineConfig::with_runs_root(runs_root), NullEmitter)
}

fn write_mission(dir: &Path, name: &str, yaml: &str) -> std::path::PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, yaml).unwrap();
    path
}

#[test]
fn scenario_one_two_plain_steps_advance_to_terminal() {
    let temp = TempDir::new().unwrap();
    let mission_path = write_mission(
        temp.path(),
        "mission.yaml",
        "mission:\n  key: demo\n  name: Demo\n  version: \"1.0\"\nsteps:\n  - id: S1\n    title: Step One\n  - id: S2\n    title: Step Two\n",
    );
    let engine = engine(&temp.path().join("runs"));
    let caller = actor("agent-1", "llm");

    let run_ref = engine
        .start_mission_run(mission_path.to_str().unwrap(), BTreeMap::new(), policy(), None, &caller)
        .unwrap();

    let first = engine.next_step(&run_ref, &caller, StepResult::Success, None, serde_json::json!({})).unwrap();
    match first {
        NextDecision::Step {
            step_id, ..
        } => assert_eq!(step_id.as_str(), "S1"),
        other => panic!("expected Step(S1), got {other:?}"),
    }

    let second = engine.next_step(&run_ref, &caller, StepResult::Success, None, serde_json::json!({})).unwrap();
    match second {
        NextDecision::Step {
            step_id, ..
        } => assert_eq!(step_id.as_str(), "S2"),
        other => panic!("expected Step(S2), got {other:?}"),
    }

    let third = engine.next_step(&run_ref, &caller, StepResult::Success, None, serde_json::json!({})).unwrap();
    assert!(matches!(third, NextDecision::Terminal { .. }));
}

#[test]
fn scenario_two_missing_input_gates_the_step() {
    let temp = TempDir::new().unwrap();
    let mission_path = write_mission(
        temp.path(),
        "mission.yaml",
        "mission:\n  key: demo\n  name: Demo\n  version: \"1.0\"\nsteps:\n  - id: S1\n    title: Step One\n    requires_inputs: [framework]\n",
    );
    let engine = engine(&temp.path().join("runs"));
    let caller = actor("agent-1", "llm");

    let run_ref = engine
        .start_mission_run(mission_path.to_str().unwrap(), BTreeMap::new(), policy(), None, &caller)
        .unwrap();

    let first = engine.next_step(&run_ref, &caller, StepResult::Success, None, serde_json::json!({})).unwrap();
    let decision_id = match first {
        NextDecision::DecisionRequired {
            decision_id,
            input_key,
            ..
        } => {
            assert_eq!(input_key, Some("framework".to_string()));
            decision_id
        }
        other => panic!("expected DecisionRequired, got {other:?}"),
    };
    assert_eq!(decision_id, DecisionId::new("input:framework"));

    engine.provide_decision_answer(&run_ref, &decision_id, "React", &actor("human-1", "human")).unwrap();

    let store = RunStore::new(temp.path().join("runs"));
    let snapshot = store.read_snapshot(&run_ref.run_dir).unwrap();
    assert_eq!(snapshot.inputs.get("framework"), Some(&"React".to_string()));

    let second = engine.next_step(&run_ref, &caller, StepResult::Success, None, serde_json::json!({})).unwrap();
    match second {
        NextDecision::Step {
            step_id, ..
        } => assert_eq!(step_id.as_str(), "S1"),
        other => panic!("expected Step(S1), got {other:?}"),
    }
}

#[test]
fn scenario_three_blocking_audit_rejection_blocks_the_run() {
    let temp = TempDir::new().unwrap();
    let mission_path = write_mission(
        temp.path(),
        "mission.yaml",
        "mission:\n  key: demo\n  name: Demo\n  version: \"1.0\"\naudit_steps:\n  - id: a1\n    title: Audit One\n    audit:\n      trigger_mode: manual\n      enforcement: blocking\n",
    );
    let engine = engine(&temp.path().join("runs"));
    let caller = actor("agent-1", "llm");

    let run_ref = engine
        .start_mission_run(mission_path.to_str().unwrap(), BTreeMap::new(), policy(), None, &caller)
        .unwrap();

    let first = engine.next_step(&run_ref, &caller, StepResult::Success, None, serde_json::json!({})).unwrap();
    let decision_id = match first {
        NextDecision::DecisionRequired {
            decision_id,
            options,
            input_key,
            ..
        } => {
            assert_eq!(options, Some(vec!["approve".to_string(), "reject".to_string()]));
            assert_eq!(input_key, None);
            decision_id
        }
        other => panic!("expected DecisionRequired, got {other:?}"),
    };
    assert_eq!(decision_id, DecisionId::new("audit:a1"));

    engine.provide_decision_answer(&run_ref, &decision_id, "reject", &actor("security-lead", "human")).unwrap();

    let second = engine.next_step(&run_ref, &caller, StepResult::Success, None, serde_json::json!({})).unwrap();
    match second {
        NextDecision::Blocked {
            reason, ..
        } => {
            assert!(reason.contains("a1"), "reason should mention the step id: {reason}");
            assert!(reason.contains("security-lead"), "reason should mention the actor: {reason}");
        }
        other => panic!("expected Blocked, got {other:?}"),
    }
}

fn dims_yaml(score: u8) -> String {
    let names = [
        "architectural_system_impact",
        "cross_team_blast_radius",
        "data_security_compliance_impact",
        "financial_commercial_impact",
        "operational_reliability_impact",
        "user_customer_impact",
    ];
    names.iter().map(|name| format!("        {name}: {score}\n")).collect::<String>()
}

#[test]
fn scenario_four_significance_band_routing() {
    let temp = TempDir::new().unwrap();

    // Composite 12 (all dims at 2): lands in the high band, hard gate.
    let high_path = write_mission(
        temp.path(),
        "high.yaml",
        &format!(
            "mission:\n  key: demo\n  name: Demo\n  version: \"1.0\"\naudit_steps:\n  - id: a1\n    title: Audit\n    audit:\n      trigger_mode: manual\n      enforcement: advisory\n    significance:\n      dimensions:\n{}      hard_triggers: []\n",
            dims_yaml(2)
        ),
    );
    let engine_high = engine(&temp.path().join("runs-high"));
    let caller = actor("agent-1", "llm");
    let run_ref = engine_high
        .start_mission_run(high_path.to_str().unwrap(), BTreeMap::new(), policy(), None, &caller)
        .unwrap();
    let decision =
        engine_high.next_step(&run_ref, &caller, StepResult::Success, None, serde_json::json!({})).unwrap();
    match decision {
        NextDecision::DecisionRequired {
            options, ..
        } => assert_eq!(options, Some(vec!["approve".to_string(), "reject".to_string()])),
        other => panic!("expected a hard gate, got {other:?}"),
    }

    // Composite 6 (all dims at 1): low band, auto-completes straight to terminal.
    let low_path = write_mission(
        temp.path(),
        "low.yaml",
        &format!(
            "mission:\n  key: demo\n  name: Demo\n  version: \"1.0\"\naudit_steps:\n  - id: a1\n    title: Audit\n    audit:\n      trigger_mode: manual\n      enforcement: advisory\n    significance:\n      dimensions:\n{}      hard_triggers: []\n",
            dims_yaml(1)
        ),
    );
    let engine_low = engine(&temp.path().join("runs-low"));
    let run_ref = engine_low
        .start_mission_run(low_path.to_str().unwrap(), BTreeMap::new(), policy(), None, &caller)
        .unwrap();
    let decision =
        engine_low.next_step(&run_ref, &caller, StepResult::Success, None, serde_json::json!({})).unwrap();
    assert!(matches!(decision, NextDecision::Terminal { .. }));

    // Composite 6 with a hard trigger: effective band escalates to high regardless.
    let hard_trigger_path = write_mission(
        temp.path(),
        "hard-trigger.yaml",
        &format!(
            "mission:\n  key: demo\n  name: Demo\n  version: \"1.0\"\naudit_steps:\n  - id: a1\n    title: Audit\n    audit:\n      trigger_mode: manual\n      enforcement: advisory\n    significance:\n      dimensions:\n{}      hard_triggers: [production_data_destructive]\n",
            dims_yaml(1)
        ),
    );
    let engine_trigger = engine(&temp.path().join("runs-trigger"));
    let run_ref = engine_trigger
        .start_mission_run(hard_trigger_path.to_str().unwrap(), BTreeMap::new(), policy(), None, &caller)
        .unwrap();
    let decision =
        engine_trigger.next_step(&run_ref, &caller, StepResult::Success, None, serde_json::json!({})).unwrap();
    match decision {
        NextDecision::DecisionRequired {
            options, ..
        } => assert_eq!(options, Some(vec!["approve".to_string(), "reject".to_string()])),
        other => panic!("expected a hard gate escalated by the hard trigger, got {other:?}"),
    }
}

#[test]
fn scenario_five_template_drift_blocks_without_mutating_completed_steps() {
    let temp = TempDir::new().unwrap();
    let mission_path = write_mission(
        temp.path(),
        "mission.yaml",
        "mission:\n  key: demo\n  name: Demo\n  version: \"1.0\"\nsteps:\n  - id: S1\n    title: Step One\n  - id: S2\n    title: Step Two\n",
    );
    let engine = engine(&temp.path().join("runs"));
    let caller = actor("agent-1", "llm");

    let run_ref = engine
        .start_mission_run(mission_path.to_str().unwrap(), BTreeMap::new(), policy(), None, &caller)
        .unwrap();

    let first = engine.next_step(&run_ref, &caller, StepResult::Success, None, serde_json::json!({})).unwrap();
    assert!(matches!(first, NextDecision::Step { .. }));

    let mut contents = fs::read_to_string(&mission_path).unwrap();
    contents.push_str("  - id: S3\n    title: Added Later\n");
    fs::write(&mission_path, contents).unwrap();

    let second = engine.next_step(&run_ref, &caller, StepResult::Success, None, serde_json::json!({})).unwrap();
    match second {
        NextDecision::Blocked {
            reason, ..
        } => assert_eq!(reason, "Template changed during active run. Migration required."),
        other => panic!("expected Blocked, got {other:?}"),
    }

    let store = RunStore::new(temp.path().join("runs"));
    let snapshot = store.read_snapshot(&run_ref.run_dir).unwrap();
    assert!(snapshot.completed_steps.is_empty(), "completed_steps must not be mutated on drift");
}

#[test]
fn scenario_six_identical_runs_produce_pointwise_equal_decisions() {
    let temp = TempDir::new().unwrap();
    let mission_path = write_mission(
        temp.path(),
        "mission.yaml",
        "mission:\n  key: demo\n  name: Demo\n  version: \"1.0\"\nsteps:\n  - id: S1\n    title: Step One\n  - id: S2\n    title: Step Two\n",
    );
    let caller = actor("agent-1", "llm");

    let drive_to_terminal = |runs_root: &Path| -> Vec<serde_json::Value> {
        let engine = engine(runs_root);
        let run_ref = engine
            .start_mission_run(mission_path.to_str().unwrap(), BTreeMap::new(), policy(), None, &caller)
            .unwrap();
        let mut decisions = Vec::new();
        loop {
            let decision =
                engine.next_step(&run_ref, &caller, StepResult::Success, None, serde_json::json!({})).unwrap();
            let mut value = serde_json::to_value(&decision).unwrap();
            if let Some(object) = value.as_object_mut() {
                object.insert("run_id".to_string(), serde_json::Value::String("run".to_string()));
            }
            let terminal = matches!(decision, NextDecision::Terminal { .. });
            decisions.push(value);
            if terminal {
                break;
            }
        }
        decisions
    };

    let first_run = drive_to_terminal(&temp.path().join("runs-a"));
    let second_run = drive_to_terminal(&temp.path().join("runs-b"));
    assert_eq!(first_run, second_run);
}

#[test]
fn explicit_raci_override_replaces_the_inferred_responsible_actor() {
    let temp = TempDir::new().unwrap();
    // Mixed dimension scores summing to 8: lands in the medium band, which
    // routes to a soft gate (decide_solo/open_stand_up/defer) rather than
    // the low band's auto-complete or the high band's hard gate.
    let medium_dims = "        architectural_system_impact: 2\n        cross_team_blast_radius: 1\n        data_security_compliance_impact: 1\n        financial_commercial_impact: 1\n        operational_reliability_impact: 2\n        user_customer_impact: 1\n";
    let mission_path = write_mission(
        temp.path(),
        "mission.yaml",
        &format!(
            "mission:\n  key: demo\n  name: Demo\n  version: \"1.0\"\naudit_steps:\n  - id: a1\n    title: Audit One\n    audit:\n      trigger_mode: manual\n      enforcement: advisory\n    significance:\n      dimensions:\n{medium_dims}      hard_triggers: []\n    raci:\n      responsible: human\n    raci_override_reason: compliance requires a human reviewer here\n"
        ),
    );
    let engine = engine(&temp.path().join("runs"));
    let caller = actor("agent-1", "llm");

    let mut inputs = BTreeMap::new();
    inputs.insert("mission_owner_id".to_string(), "owner-1".to_string());
    inputs.insert("agent_id".to_string(), "agent-1".to_string());

    let run_ref =
        engine.start_mission_run(mission_path.to_str().unwrap(), inputs, policy(), None, &caller).unwrap();

    let decision = engine.next_step(&run_ref, &caller, StepResult::Success, None, serde_json::json!({})).unwrap();
    match decision {
        NextDecision::DecisionRequired {
            options, ..
        } => assert_eq!(
            options,
            Some(vec!["decide_solo".to_string(), "open_stand_up".to_string(), "defer".to_string()])
        ),
        other => panic!("expected a soft gate decision, got {other:?}"),
    }

    let store = RunStore::new(temp.path().join("runs"));
    let snapshot = store.read_snapshot(&run_ref.run_dir).unwrap();
    let raci = snapshot.decisions.get("raci:a1").expect("raci audit trail entry must be recorded");
    assert_eq!(raci["responsible"], serde_json::Value::String("owner-1".to_string()));
    assert_eq!(raci["rule"], serde_json::Value::String("explicit_override".to_string()));
}
