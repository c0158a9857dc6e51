//! Build and run synthesized programs with the local Go toolchain.
//!
//! Every test returns early when `go` is not installed.

use std::process::Command;

use ltsgen::config::{HarnessBackend, HarnessConfig};
use ltsgen::harness::{ExecutionRequest, ExecutionResult, Harness};
use ltsgen::synth::{ChoicePolicy, synthesize_json};

fn go_available(name: &str) -> bool {
    let ok = Command::new("go")
        .arg("version")
        .output()
        .is_ok_and(|o| o.status.success());
    if !ok {
        eprintln!("Go not installed, skipping {name}");
    }
    ok
}

async fn run(json: &str, policy: ChoicePolicy, timeout_secs: u64) -> ExecutionResult {
    let program = synthesize_json(json, policy).unwrap();
    let harness = Harness::new(HarnessConfig {
        backend: HarnessBackend::Local,
        allow_degraded: true,
        max_output_bytes: 64 * 1024,
        ..Default::default()
    });
    let req = ExecutionRequest {
        timeout_secs: Some(timeout_secs),
        ..ExecutionRequest::new(program.source)
    };
    let result = harness.execute(&req).await.unwrap();
    assert!(
        !result.stderr.contains("main.go:"),
        "generated program failed to build:\n{}",
        result.stderr
    );
    result
}

/// Complete lines only; the capture may end mid-line.
fn complete_lines(stdout: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = stdout.split('\n').collect();
    lines.pop();
    lines
}

#[tokio::test]
async fn switch_alternates_on_and_off() {
    if !go_available("switch_alternates_on_and_off") {
        return;
    }
    let json = r#"[
        {"process": "SWITCH", "from": "S0", "to": "S1", "action": "on"},
        {"process": "SWITCH", "from": "S1", "to": "S0", "action": "off"}
    ]"#;
    let result = run(json, ChoicePolicy::First, 2).await;
    assert!(result.timed_out);

    let actions: Vec<&str> = complete_lines(&result.stdout)
        .into_iter()
        .filter(|l| l.starts_with("[SWITCH] action:"))
        .collect();
    assert!(actions.len() >= 2);
    for (i, line) in actions.iter().enumerate() {
        let expected = if i % 2 == 0 {
            "[SWITCH] action: on (S0 -> S1)"
        } else {
            "[SWITCH] action: off (S1 -> S0)"
        };
        assert_eq!(*line, expected);
    }
}

#[tokio::test]
async fn consumer_never_gets_ahead_of_producer() {
    if !go_available("consumer_never_gets_ahead_of_producer") {
        return;
    }
    let json = r#"{"processes": [
        {"name": "PRODUCER", "initial_state": "READY", "transitions": [
            {"from": "READY", "to": "PRODUCING", "action": "produce"},
            {"from": "PRODUCING", "to": "READY", "action": "put"}
        ]},
        {"name": "BUFFER", "initial_state": "EMPTY", "transitions": [
            {"from": "EMPTY", "to": "FULL", "action": "put"},
            {"from": "FULL", "to": "EMPTY", "action": "get"}
        ]},
        {"name": "CONSUMER", "initial_state": "WAITING", "transitions": [
            {"from": "WAITING", "to": "CONSUMING", "action": "get"},
            {"from": "CONSUMING", "to": "WAITING", "action": "consume"}
        ]}
    ]}"#;
    let result = run(json, ChoicePolicy::First, 2).await;
    assert!(result.timed_out);

    let mut puts = 0usize;
    let mut gets = 0usize;
    for line in complete_lines(&result.stdout) {
        if line.starts_with("[BUFFER] action: put") {
            puts += 1;
        } else if line.starts_with("[CONSUMER] action: get") {
            gets += 1;
        }
        // BUFFER prints `put` before it offers `get`, and CONSUMER prints
        // only after that handshake completes.
        assert!(gets <= puts, "get ran ahead of put: {gets} > {puts}");
    }
    assert!(puts > 0 && gets > 0);
}

#[tokio::test]
async fn terminating_processes_complete() {
    if !go_available("terminating_processes_complete") {
        return;
    }
    let json = r#"[
        {"process": "A", "from": "0", "to": "1", "action": "meet"},
        {"process": "B", "from": "0", "to": "1", "action": "meet"},
        {"process": "C", "from": "0", "to": "1", "action": "meet"},
        {"process": "D", "from": "A", "to": "STOP", "action": "halt"}
    ]"#;
    let result = run(json, ChoicePolicy::First, 30).await;
    assert!(result.success, "stderr:\n{}", result.stderr);
    assert!(!result.timed_out);
    assert_eq!(result.exit_code, Some(0));

    let stdout = &result.stdout;
    for p in ["A", "B", "C"] {
        assert!(stdout.contains(&format!("[{p}] action: meet (0 -> 1)")));
        assert!(stdout.contains(&format!("[{p}] reached terminal state 1")));
    }
    assert!(stdout.contains("[D] reached terminal state STOP"));
    assert!(stdout.trim_end().ends_with("=== LTS execution complete ==="));
}

#[tokio::test]
async fn mixed_and_rotating_choices_build_and_run() {
    if !go_available("mixed_and_rotating_choices_build_and_run") {
        return;
    }
    let json = r#"[
        {"process": "P", "from": "S0", "to": "S1", "action": "sync"},
        {"process": "P", "from": "S0", "to": "S2", "action": "work"},
        {"process": "P", "from": "S1", "to": "S0", "action": "back"},
        {"process": "P", "from": "S2", "to": "S0", "action": "rest"},
        {"process": "P", "from": "S2", "to": "S0", "action": "nap"},
        {"process": "Q", "from": "Q0", "to": "Q0", "action": "sync"}
    ]"#;
    let result = run(json, ChoicePolicy::Rotate, 2).await;
    assert!(result.timed_out);
    let stdout = &result.stdout;
    assert!(stdout.contains("[P] starting"));
    assert!(stdout.contains("[Q] starting"));
    assert!(!stdout.contains("unknown state"));
}

#[tokio::test]
async fn unoffered_shared_action_falls_back_to_private_branch() {
    if !go_available("unoffered_shared_action_falls_back_to_private_branch") {
        return;
    }
    // Q declares `sync` only on a state it never reaches.
    let json = r#"{"processes": [
        {"name": "P", "initial_state": "S0", "transitions": [
            {"from": "S0", "to": "S1", "action": "sync"},
            {"from": "S0", "to": "S2", "action": "work"},
            {"from": "S1", "to": "S0", "action": "back"},
            {"from": "S2", "to": "S0", "action": "rest"}
        ]},
        {"name": "Q", "initial_state": "Q0", "transitions": [
            {"from": "Q0", "to": "STOP", "action": "idle"},
            {"from": "QX", "to": "Q0", "action": "sync"}
        ]}
    ]}"#;
    let result = run(json, ChoicePolicy::First, 2).await;
    assert!(result.timed_out);

    let stdout = &result.stdout;
    assert!(stdout.contains("[P] action: work (S0 -> S2)"));
    assert!(!stdout.contains("[P] action: sync"));
    assert!(!stdout.contains("[Q] action: sync"));
}
