use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

fn tracking_settings_json() -> &'static str {
    r#"
{
  "version": 1,
  "birth-year": 1990,
  "birth-month": 1,
  "birth-day": 1,
  "configured": true,
  "show-week": false,
  "show-month": false
}
"#
}

#[test]
fn once_prints_panel_and_menu() {
    let dir = tempdir().expect("tempdir");
    let settings = dir.path().join("settings.json");
    fs::write(&settings, tracking_settings_json()).expect("write json");

    let mut cmd = cargo_bin_cmd!("memento-mori");
    cmd.arg("--once")
        .arg("--no-color")
        .arg("--at")
        .arg("2024-03-01T15:36:00")
        .arg("--settings")
        .arg(settings)
        .assert()
        .success()
        .stdout(predicate::str::contains("⏳ 𝗗 65% · 𝗬 16% · 𝗟 42%"))
        .stdout(predicate::str::contains("> Refresh"));
}

#[test]
fn missing_settings_file_shows_unconfigured_panel() {
    let dir = tempdir().expect("tempdir");
    let settings = dir.path().join("absent.json");

    let mut cmd = cargo_bin_cmd!("memento-mori");
    cmd.arg("--once")
        .arg("--no-color")
        .arg("--at")
        .arg("2024-03-01T12:00:00")
        .arg("--settings")
        .arg(&settings)
        .assert()
        .success()
        .stdout(predicate::str::contains("⏳ memento mori."))
        .stdout(predicate::str::contains("Set your birth year"));
    assert!(!settings.exists());
}

#[test]
fn json_report_lists_every_scale() {
    let dir = tempdir().expect("tempdir");
    let settings = dir.path().join("settings.json");
    fs::write(&settings, tracking_settings_json()).expect("write json");

    let mut cmd = cargo_bin_cmd!("memento-mori");
    cmd.arg("--once")
        .arg("--json")
        .arg("--at")
        .arg("2024-03-01T15:36:00")
        .arg("--settings")
        .arg(settings)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""instant": "2024-03-01T15:36:00""#))
        .stdout(predicate::str::contains(r#""week""#))
        .stdout(predicate::str::contains(r#""life""#));
}

#[test]
fn countdown_counts_whole_days() {
    let mut cmd = cargo_bin_cmd!("memento-mori");
    cmd.arg("--countdown")
        .arg("12-25")
        .arg("--at")
        .arg("2024-12-20T10:00:00")
        .assert()
        .success()
        .stdout("5\n");

    let mut cmd = cargo_bin_cmd!("memento-mori");
    cmd.arg("--countdown")
        .arg("03-01")
        .arg("--at")
        .arg("2024-03-01T00:00:00")
        .assert()
        .success()
        .stdout("0\n");

    let mut cmd = cargo_bin_cmd!("memento-mori");
    cmd.arg("--countdown")
        .arg("03-01")
        .arg("--at")
        .arg("2024-03-01T23:59:00")
        .assert()
        .success()
        .stdout("365\n");
}

#[test]
fn countdown_rejects_impossible_date() {
    let mut cmd = cargo_bin_cmd!("memento-mori");
    cmd.arg("--countdown")
        .arg("04-31")
        .assert()
        .failure()
        .stderr(predicate::str::contains("day must be between 1 and 30"));
}

#[test]
fn malformed_json_fails_with_clear_error() {
    let dir = tempdir().expect("tempdir");
    let settings = dir.path().join("settings.json");
    fs::write(&settings, "{ not-valid-json ").expect("write invalid json");

    let mut cmd = cargo_bin_cmd!("memento-mori");
    cmd.arg("--once")
        .arg("--settings")
        .arg(settings)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid JSON"));
}

#[test]
fn out_of_range_setting_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let settings = dir.path().join("settings.json");
    fs::write(&settings, r#"{ "version": 1, "life-expectancy": 400 }"#).expect("write json");

    let mut cmd = cargo_bin_cmd!("memento-mori");
    cmd.arg("--once")
        .arg("--settings")
        .arg(settings)
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "life-expectancy must be between 1 and 150, got 400",
        ));
}

#[test]
fn malformed_instant_fails() {
    let mut cmd = cargo_bin_cmd!("memento-mori");
    cmd.arg("--once")
        .arg("--at")
        .arg("tomorrow")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid local datetime"));
}

#[test]
fn json_requires_once() {
    let mut cmd = cargo_bin_cmd!("memento-mori");
    cmd.arg("--json").assert().failure();
}
