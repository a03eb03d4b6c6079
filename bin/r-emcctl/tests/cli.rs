//! ---
//! emc_section: "05-networking-external-interfaces"
//! emc_subsection: "integration-tests"
//! emc_type: "source"
//! emc_scope: "code"
//! emc_description: "Operator CLI for the R-EMC message store."
//! emc_version: "v0.0.0-prealpha"
//! emc_owner: "tbd"
//! ---
use std::path::Path;

use assert_cmd::Command;
use serde_json::Value;
use tempfile::tempdir;

fn emcctl(store: &Path) -> Command {
    let mut cmd = Command::cargo_bin("r-emcctl").unwrap();
    cmd.env_remove("R_EMC_CONFIG")
        .env("R_EMC_LOG", "error")
        .arg("--store")
        .arg(store);
    cmd
}

fn json(output: &[u8]) -> Value {
    serde_json::from_slice(output).unwrap()
}

#[test]
fn submit_then_status_reports_active_emitter() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("messages.json");

    emcctl(&store)
        .args([
            "submit", "--name", "coastal", "--type", "addEmitter", "--target", "E1",
            "--param", "amplitude=40", "--param", "direction=270", "--save", "--send",
        ])
        .assert()
        .success();
    emcctl(&store)
        .args(["submit", "--name", "go", "--type", "start-emitter", "--target", "E1", "--send"])
        .assert()
        .success();

    let output = emcctl(&store).args(["--json", "status"]).output().unwrap();
    assert!(output.status.success());
    let views = json(&output.stdout);
    assert_eq!(views["E1"]["active"], Value::Bool(true));
    assert_eq!(views["E1"]["transmitted"], Value::Bool(true));
    assert_eq!(views["E1"]["amplitude"], serde_json::json!(40.0));
}

#[test]
fn ineligible_send_exits_with_declined_status() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("messages.json");

    let output = emcctl(&store)
        .args(["--json", "submit", "--name", "halt", "--type", "stopEmitter", "--target", "E1", "--send"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let outcome = json(&output.stdout);
    assert_eq!(outcome["outcome"], "refused");
    assert_eq!(outcome["eligibility"]["reason"], "nothing_to_stop");
}

#[test]
fn conflicting_save_needs_confirm() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("messages.json");
    let save = |extra: &[&str]| {
        let mut cmd = emcctl(&store);
        cmd.args(["--json", "submit", "--name", "N", "--type", "addEmitter", "--target", "E1", "--save"])
            .args(extra);
        cmd.output().unwrap()
    };

    assert!(save(&[]).status.success());
    let conflicted = save(&[]);
    assert_eq!(conflicted.status.code(), Some(2));
    assert_eq!(json(&conflicted.stdout)["outcome"], "conflicts");

    let confirmed = save(&["--confirm"]);
    assert!(confirmed.status.success());
    assert_eq!(json(&confirmed.stdout)["replaced"].as_array().unwrap().len(), 1);

    let listed = emcctl(&store).args(["--json", "messages"]).output().unwrap();
    assert_eq!(json(&listed.stdout).as_array().unwrap().len(), 1);
}

#[test]
fn submit_requires_an_intent() {
    let dir = tempdir().unwrap();
    emcctl(&dir.path().join("messages.json"))
        .args(["submit", "--name", "x", "--type", "addEmitter"])
        .assert()
        .failure();
}
