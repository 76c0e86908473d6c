//! Integration tests for `stevedore install`.
//!
//! These drive the real binary against a temp sandbox, with a fake
//! package manager script standing in for pnpm so no network or
//! registry is involved.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-q", "-p", "stevedore-cli", "--bin", "stevedore", "--"]);
    cmd
}

fn write_package_json(dir: &Path, deps: &str) {
    let content = format!(r#"{{"name": "app", "version": "1.0.0", "dependencies": {deps}}}"#);
    fs::write(dir.join("package.json"), content).unwrap();
}

/// Install a fake package-manager script and return its absolute path.
fn write_fake_pm(dir: &Path, script: &str) -> String {
    let path = dir.join("fake-pnpm");
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path.to_str().unwrap().to_string()
}

fn parse_events(stdout: &str) -> Vec<serde_json::Value> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line)
                .unwrap_or_else(|_| panic!("stdout line should be JSON: {line}"))
        })
        .collect()
}

fn kinds(events: &[serde_json::Value]) -> Vec<String> {
    events
        .iter()
        .map(|e| e["type"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn rejects_a_blank_request_before_touching_the_sandbox() {
    let dir = tempdir().unwrap();

    let output = cargo_bin()
        .args(["install", "", "   ", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("failed to run stevedore");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("no valid package names"),
        "stderr: {stderr}"
    );
}

#[test]
fn short_circuits_when_all_packages_are_already_installed() {
    let dir = tempdir().unwrap();
    write_package_json(dir.path(), r#"{"react": "^18.2.0"}"#);

    let output = cargo_bin()
        .args([
            "--json",
            "install",
            "react",
            "--pm",
            "/bin/false",
            "--skip-restart",
            "--cwd",
        ])
        .arg(dir.path())
        .output()
        .expect("failed to run stevedore");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let events = parse_events(&String::from_utf8_lossy(&output.stdout));
    assert_eq!(kinds(&events), ["start", "status", "success", "complete"]);

    let success = &events[2];
    assert_eq!(success["installedPackages"].as_array().unwrap().len(), 0);
    assert_eq!(success["alreadyInstalled"][0], "react");
}

#[test]
fn installs_only_the_missing_package_and_verifies_it() {
    let dir = tempdir().unwrap();
    write_package_json(dir.path(), r#"{"lodash": "^4.17.0"}"#);
    fs::write(
        dir.path().join("package.json.installed"),
        r#"{"name": "app", "dependencies": {"lodash": "^4.17.0", "axios": "1.2.0"}}"#,
    )
    .unwrap();
    let pm = write_fake_pm(
        dir.path(),
        "#!/bin/sh\necho \"$@\" >> calls.log\ncp package.json.installed package.json\necho \"Progress: resolved 1, added 1\"\nexit 0\n",
    );

    let output = cargo_bin()
        .args([
            "--json",
            "install",
            "lodash",
            "axios@1.2.0",
            "--pm",
            &pm,
            "--skip-restart",
            "--cwd",
        ])
        .arg(dir.path())
        .output()
        .expect("failed to run stevedore");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    // Only the missing package reached the package manager.
    let calls = fs::read_to_string(dir.path().join("calls.log")).unwrap();
    assert_eq!(calls.trim(), "install axios@1.2.0");

    let events = parse_events(&String::from_utf8_lossy(&output.stdout));
    let success = events
        .iter()
        .find(|e| e["type"] == "success")
        .expect("success event");
    // Original request string preserved, version suffix included.
    assert_eq!(success["installedPackages"][0], "axios@1.2.0");

    let all_kinds = kinds(&events);
    assert_eq!(all_kinds.first().unwrap(), "start");
    assert_eq!(all_kinds.last().unwrap(), "complete");
}

#[test]
fn recovers_from_a_stale_lockfile_with_one_retry() {
    let dir = tempdir().unwrap();
    write_package_json(dir.path(), "{}");
    fs::write(
        dir.path().join("package.json.installed"),
        r#"{"name": "app", "dependencies": {"axios": "1.2.0"}}"#,
    )
    .unwrap();
    // First call fails with the staleness signature, the refresh
    // succeeds, the re-run installs.
    let pm = write_fake_pm(
        dir.path(),
        concat!(
            "#!/bin/sh\n",
            "echo \"$@\" >> calls.log\n",
            "count=$(wc -l < calls.log)\n",
            "case $count in\n",
            "  1) echo \" ERR_PNPM_OUTDATED_LOCKFILE  Lockfile is out of date\" >&2; exit 1;;\n",
            "  2) echo \"lockfile refreshed\"; exit 0;;\n",
            "  *) cp package.json.installed package.json; echo \"installed axios\"; exit 0;;\n",
            "esac\n",
        ),
    );

    let output = cargo_bin()
        .args([
            "--json",
            "install",
            "axios@1.2.0",
            "--pm",
            &pm,
            "--skip-restart",
            "--cwd",
        ])
        .arg(dir.path())
        .output()
        .expect("failed to run stevedore");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let calls: Vec<String> = fs::read_to_string(dir.path().join("calls.log"))
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    assert_eq!(
        calls,
        [
            "install axios@1.2.0",
            "install --no-frozen-lockfile",
            "install axios@1.2.0"
        ]
    );

    let events = parse_events(&String::from_utf8_lossy(&output.stdout));
    let all_kinds = kinds(&events);
    // The forwarded stderr line surfaced as an error, the recovery as
    // a warning, and the operation still ended in success.
    assert!(all_kinds.iter().any(|k| k == "error"));
    assert!(all_kinds.iter().any(|k| k == "warning"));
    assert!(all_kinds.iter().any(|k| k == "success"));
    assert_eq!(all_kinds.last().unwrap(), "complete");
}

#[test]
fn missing_manifest_fails_open_and_reports_verification_failure() {
    let dir = tempdir().unwrap();
    // No package.json at all; the fake pm also never creates one.
    let pm = write_fake_pm(dir.path(), "#!/bin/sh\necho \"pretending to install\"\nexit 0\n");

    let output = cargo_bin()
        .args([
            "--json",
            "install",
            "react",
            "vue",
            "--pm",
            &pm,
            "--skip-restart",
            "--cwd",
        ])
        .arg(dir.path())
        .output()
        .expect("failed to run stevedore");

    // Verification confirmed nothing, so the invocation fails overall.
    assert!(!output.status.success());

    let events = parse_events(&String::from_utf8_lossy(&output.stdout));
    let info = events
        .iter()
        .find(|e| e["type"] == "info")
        .expect("fail-open info event");
    let message = info["message"].as_str().unwrap();
    assert!(message.contains("react, vue"), "message: {message}");

    assert!(events
        .iter()
        .any(|e| e["type"] == "error"
            && e["message"] == "Failed to verify package installation"));
    // The stream still terminated cleanly.
    assert_eq!(events.last().unwrap()["type"], "complete");
}
