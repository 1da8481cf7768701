//! Integration tests for the `pvwatch` binary.
//!
//! Every test points `--config` at a temporary file describing the
//! simulated IOC, so nothing depends on the user's environment.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

// ── Helpers ─────────────────────────────────────────────────────────

const SIM_CONFIG: &str = r#"
[ca]
addr_list = "10.0.0.255"
auto_addr_list = false

[engine]
probe_connect_timeout_ms = 50
probe_read_timeout_ms = 50

[sim.pvs."SR:CURRENT"]
value = 12.5
fields = { DESC = "Beam Current", EGU = "mA", PREC = 2 }

[sim.pvs."RF:SETPOINT"]
value = 1.5

[sim.pvs."RO:MODE"]
value = "idle"
read_only = true
"#;

fn write_config(body: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, body).unwrap();
    (dir, path)
}

/// Build a [`Command`] for the `pvwatch` binary with env isolation.
fn pvwatch_cmd(config: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("pvwatch");
    cmd.env("HOME", "/tmp/pvwatch-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/pvwatch-cli-test-nonexistent")
        .env_remove("PVWATCH_OUTPUT")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(config);
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = cargo_bin_cmd!("pvwatch").output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_lists_commands() {
    cargo_bin_cmd!("pvwatch").arg("--help").assert().success().stdout(
        predicate::str::contains("watch")
            .and(predicate::str::contains("get"))
            .and(predicate::str::contains("put"))
            .and(predicate::str::contains("config")),
    );
}

#[test]
fn test_version_flag() {
    cargo_bin_cmd!("pvwatch")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pvwatch"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_echoes_override() {
    let (_dir, path) = write_config(SIM_CONFIG);
    pvwatch_cmd(&path)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_env_renders_ca_variables() {
    let (_dir, path) = write_config(SIM_CONFIG);
    pvwatch_cmd(&path)
        .args(["config", "env"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("EPICS_CA_ADDR_LIST=10.0.0.255")
                .and(predicate::str::contains("EPICS_CA_AUTO_ADDR_LIST=NO"))
                .and(predicate::str::contains("EPICS_CA_SERVER_PORT=5064")),
        );
}

#[test]
fn test_config_show_includes_sim_pvs() {
    let (_dir, path) = write_config(SIM_CONFIG);
    pvwatch_cmd(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SR:CURRENT").and(predicate::str::contains("[ca]")));
}

#[test]
fn test_invalid_ports_exit_with_usage_code() {
    let (_dir, path) = write_config("[ca]\nserver_port = 5064\nrepeater_port = 5064\n");
    let output = pvwatch_cmd(&path).args(["config", "show"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("repeater_port"));
}

// ── Get ─────────────────────────────────────────────────────────────

#[test]
fn test_get_prints_enriched_record() {
    let (_dir, path) = write_config(SIM_CONFIG);
    pvwatch_cmd(&path)
        .args(["-o", "plain", "get", "SR:CURRENT", "--quiet-ms", "3000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SR:CURRENT 12.5 mA CONNECTED"));
}

#[test]
fn test_get_single_field() {
    let (_dir, path) = write_config(SIM_CONFIG);
    pvwatch_cmd(&path)
        .args(["-o", "plain", "get", "SR:CURRENT", "--field", "DESC", "--quiet-ms", "3000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Beam Current"));
}

#[test]
fn test_get_text_pv_as_json() {
    let (_dir, path) = write_config("[engine]\nenrichment = false\n\n[sim.pvs.\"RO:MODE\"]\nvalue = \"idle\"\n");
    pvwatch_cmd(&path)
        .args(["get", "RO:MODE", "--quiet-ms", "100"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"value\": \"idle\"")
                .and(predicate::str::contains("\"value_type\": \"string\"")),
        );
}

#[test]
fn test_get_unknown_pv_is_connection_error() {
    let (_dir, path) = write_config(SIM_CONFIG);
    let output = pvwatch_cmd(&path)
        .args(["get", "NO:SUCH:PV", "--quiet-ms", "100"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(7));
    assert!(combined_output(&output).contains("NO:SUCH:PV"));
}

#[test]
fn test_get_blank_name_is_usage_error() {
    let (_dir, path) = write_config(SIM_CONFIG);
    let output = pvwatch_cmd(&path).args(["get", "  "]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

// ── Put ─────────────────────────────────────────────────────────────

#[test]
fn test_put_main_value() {
    let (_dir, path) = write_config(SIM_CONFIG);
    pvwatch_cmd(&path)
        .args(["-o", "plain", "put", "RF:SETPOINT", "3.25", "--quiet-ms", "500"])
        .assert()
        .success()
        .stdout(predicate::str::contains("RF:SETPOINT 3.25"));
}

#[test]
fn test_put_read_only_is_rejected() {
    let (_dir, path) = write_config(SIM_CONFIG);
    let output = pvwatch_cmd(&path)
        .args(["put", "RO:MODE", "busy", "--quiet-ms", "100"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(5));
    assert!(combined_output(&output).contains("rejected"));
}

#[test]
fn test_put_undiscovered_field_is_not_found() {
    let (_dir, path) = write_config(SIM_CONFIG);
    let output = pvwatch_cmd(&path)
        .args(["put", "RF:SETPOINT", "V", "--field", "EGU", "--quiet-ms", "100", "--max-wait-ms", "200"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("RF:SETPOINT.EGU"));
}

// ── Watch ───────────────────────────────────────────────────────────

#[test]
fn test_watch_streams_json_lines() {
    let (_dir, path) = write_config(SIM_CONFIG);
    let output = pvwatch_cmd(&path)
        .args(["-o", "json-compact", "watch", "SR:CURRENT", "--duration", "2"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert!(lines.len() >= 2, "expected several records:\n{stdout}");
    assert!(lines.iter().all(|l| l.starts_with('{')));
    assert!(stdout.contains("\"connection_state\":\"CONNECTING\""));
    assert!(stdout.contains("\"connection_state\":\"CONNECTED\""));
}

#[test]
fn test_watch_requires_a_pv() {
    let (_dir, path) = write_config(SIM_CONFIG);
    let output = pvwatch_cmd(&path).arg("watch").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}
