use std::process::{Command, Output};

fn witr(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_witr"))
        .args(args)
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to execute witr")
}

#[test]
fn test_help_shows_usage() {
    let output = witr(&["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--pid"));
    assert!(stdout.contains("--port"));
    assert!(stdout.contains("--warnings"));
}

#[test]
fn test_no_target_prints_help_and_fails() {
    let output = witr(&[]);

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"));
}

#[test]
fn test_nonexistent_name_fails() {
    let output = witr(&["nonexistent_xyz_98765"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("no matching process found"),
        "Expected not-found error in stderr, got: {}",
        stderr
    );
}

#[test]
fn test_pid_zero_is_malformed() {
    let output = witr(&["--pid", "0"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("malformed target"), "got: {}", stderr);
}

#[test]
fn test_conflicting_targets_are_usage_errors() {
    let output = witr(&["--pid", "1", "--port", "80"]);
    assert_eq!(output.status.code(), Some(2));
}

#[cfg(target_os = "linux")]
#[test]
fn test_json_for_own_test_process() {
    let pid = std::process::id().to_string();
    let output = witr(&["--json", "--pid", &pid]);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(report["process"]["pid"].as_u64(), Some(std::process::id() as u64));

    let ancestry = report["ancestry"].as_array().expect("ancestry array");
    assert!(!ancestry.is_empty());
    assert_eq!(
        ancestry.last().unwrap()["pid"].as_u64(),
        Some(std::process::id() as u64)
    );
    assert!(report["source"]["confidence"].as_f64().unwrap() > 0.0);
}

#[cfg(target_os = "linux")]
#[test]
fn test_short_output_is_single_line() {
    let pid = std::process::id().to_string();
    let output = witr(&["--short", "--pid", &pid]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim_end().lines().count(), 1);
    assert!(stdout.contains(&format!("(pid {})", pid)));
}

#[cfg(target_os = "linux")]
#[test]
fn test_env_json_for_own_test_process() {
    let pid = std::process::id().to_string();
    let output = witr(&["--env", "--json", "--pid", &pid]);

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(report["env"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e.as_str().is_some_and(|s| s.starts_with("PATH="))));
}

#[test]
fn test_completions() {
    let output = witr(&["--completions", "bash"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("witr"));
}
