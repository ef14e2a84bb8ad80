use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

use sgrep_lint::utils::constants::FALLBACK_TEMPLATE;

use super::common::{sgrep, EQEQ_RULES};

/// Unreachable proxy: template downloads fail fast and the built-in template is used
const OFFLINE_PROXY: &str = "http://127.0.0.1:1";

/// Contract tests for config handling: --generate-config, --validate, --strict

#[test]
fn test_generate_config_writes_template() {
    let temp_dir = TempDir::new().unwrap();

    sgrep(temp_dir.path())
        .env("HTTPS_PROXY", OFFLINE_PROXY)
        .arg("--generate-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Template config successfully written"));

    let content = fs::read_to_string(temp_dir.path().join(".sgrep.yml")).unwrap();
    assert_eq!(content, FALLBACK_TEMPLATE);
}

#[test]
fn test_generate_config_quiet_prints_nothing() {
    let temp_dir = TempDir::new().unwrap();

    sgrep(temp_dir.path())
        .env("HTTPS_PROXY", OFFLINE_PROXY)
        .args(["--generate-config", "--quiet"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    assert!(temp_dir.path().join(".sgrep.yml").exists());
}

#[test]
fn test_generate_config_refuses_existing_file() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join(".sgrep.yml"), EQEQ_RULES).unwrap();

    sgrep(temp_dir.path())
        .arg("-g")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("already exists"));

    // untouched
    assert_eq!(fs::read_to_string(temp_dir.path().join(".sgrep.yml")).unwrap(), EQEQ_RULES);
}

#[test]
fn test_validate_default_config() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join(".sgrep.yml"), EQEQ_RULES).unwrap();

    sgrep(temp_dir.path())
        .arg("--validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid: 1 rules in 1 configs"));
}

#[test]
fn test_validate_reports_invalid_folder_entries() {
    let temp_dir = TempDir::new().unwrap();
    let rules = temp_dir.path().join("rules");
    fs::create_dir(&rules).unwrap();
    fs::write(rules.join("good.yml"), EQEQ_RULES).unwrap();
    fs::write(rules.join("bad.yaml"), "rules:\n  - id: broken\n    pattern: foo(\n").unwrap();

    sgrep(temp_dir.path())
        .args(["--validate", "--config", "rules"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("bad.yaml"))
        .stderr(predicate::str::contains("1 of 2 configs are invalid"));
}

#[test]
fn test_invalid_yaml_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("broken.yml"), "rules: [unclosed").unwrap();

    sgrep(temp_dir.path())
        .args(["--validate", "-f", "broken.yml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid yaml file"));
}

#[test]
fn test_strict_aborts_on_invalid_config() {
    let temp_dir = TempDir::new().unwrap();
    let rules = temp_dir.path().join("rules");
    fs::create_dir(&rules).unwrap();
    fs::write(rules.join("good.yml"), EQEQ_RULES).unwrap();
    fs::write(rules.join("bad.yml"), "not_rules: 1").unwrap();

    sgrep(temp_dir.path())
        .args(["--strict", "-f", "rules"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("run with --strict and there were 1 errors loading configs"));
}

#[test]
fn test_missing_config_path() {
    let temp_dir = TempDir::new().unwrap();

    sgrep(temp_dir.path())
        .args(["-f", "does/not/exist.yml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unable to find a config"));
}

#[test]
fn test_no_config_at_all() {
    let temp_dir = TempDir::new().unwrap();

    sgrep(temp_dir.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no valid rules found"));
}

#[test]
fn test_pattern_requires_lang() {
    let temp_dir = TempDir::new().unwrap();

    sgrep(temp_dir.path())
        .args(["-e", "$X == $X"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--lang"));
}

#[test]
fn test_rce_rules_need_flag() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("py.yml"),
        r#"rules:
  - id: py
    patterns:
      - pattern: $F(...)
      - pattern-where-python: "True"
    message: m
    languages: [python]
    severity: INFO
"#,
    )
    .unwrap();

    sgrep(temp_dir.path())
        .args(["--validate", "-f", "py.yml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--dangerously-allow-arbitrary-code-execution-from-rules"));

    sgrep(temp_dir.path())
        .args([
            "--validate",
            "-f",
            "py.yml",
            "--dangerously-allow-arbitrary-code-execution-from-rules",
        ])
        .assert()
        .success();
}
