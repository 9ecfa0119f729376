//! CLI integration tests using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn psytest() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("psytest").unwrap()
}

const TEST_INSTRUMENT: &str = r#"[instrument]
id = "mini"
version = 1
name = "Mini Inventory"
categories = ["analytic", "intuitive"]

[instrument.config]
min_questions = 2

[[questions]]
id = "q1"
text = "one"
category = "analytic"

[[questions]]
id = "q2"
text = "two"
category = "intuitive"
polarity = "negative"
"#;

#[test]
fn validate_bundled_instrument() {
    psytest()
        .arg("validate")
        .arg("--instruments")
        .arg("../../instruments/csi.toml")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cognitive Style Inventory"))
        .stdout(predicate::str::contains("All instruments valid"));
}

#[test]
fn validate_directory() {
    psytest()
        .arg("validate")
        .arg("--instruments")
        .arg("../../instruments")
        .assert()
        .success()
        .stdout(predicate::str::contains("questions"));
}

#[test]
fn validate_nonexistent_file() {
    psytest()
        .arg("validate")
        .arg("--instruments")
        .arg("nonexistent.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn validate_reports_warnings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("warny.toml");
    // min_questions exceeds the question count.
    std::fs::write(
        &path,
        r#"[instrument]
id = "warny"
name = "Warny"
categories = ["a", "b"]

[instrument.config]
min_questions = 5

[[questions]]
id = "q1"
text = "one"
category = "a"

[[questions]]
id = "q2"
text = "two"
category = "b"
"#,
    )
    .unwrap();

    psytest()
        .arg("validate")
        .arg("--instruments")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("WARNING"))
        .stdout(predicate::str::contains("warning(s) found"));
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    psytest()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created instruments/csi.toml"))
        .stdout(predicate::str::contains("Created roster.toml"));

    assert!(dir.path().join("instruments/csi.toml").exists());
    assert!(dir.path().join("roster.toml").exists());
}

#[test]
fn init_skips_existing() {
    let dir = TempDir::new().unwrap();

    psytest()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();

    psytest()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn init_then_validate_round_trip() {
    let dir = TempDir::new().unwrap();

    psytest()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();

    psytest()
        .current_dir(dir.path())
        .arg("validate")
        .arg("--instruments")
        .arg("instruments")
        .assert()
        .success()
        .stdout(predicate::str::contains("All instruments valid"));
}

#[test]
fn simulate_prints_aggregate() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mini.toml");
    std::fs::write(&path, TEST_INSTRUMENT).unwrap();

    psytest()
        .arg("simulate")
        .arg("--instruments")
        .arg(&path)
        .arg("--students")
        .arg("5")
        .arg("--seed")
        .arg("7")
        .assert()
        .success()
        .stdout(predicate::str::contains("Completed: 5 / 5 students"))
        .stdout(predicate::str::contains("Most common style:"))
        .stdout(predicate::str::contains("Diversity index:"));
}

#[test]
fn simulate_rejects_unknown_instrument_type() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mini.toml");
    std::fs::write(&path, TEST_INSTRUMENT).unwrap();

    psytest()
        .arg("simulate")
        .arg("--instruments")
        .arg(&path)
        .arg("--instrument-type")
        .arg("nope")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown instrument type"));
}

#[test]
fn help_output() {
    psytest()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Test assignment and psychometric scoring engine",
        ));
}

#[test]
fn version_output() {
    psytest()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("psytest"));
}
