use std::fs;
use tempfile::TempDir;

use sgrep_lint::models::rule::{rewrite_rule_ids, validate_configs, ValidationOptions};
use sgrep_lint::services::config_resolver::ConfigResolver;
use sgrep_lint::services::engine::render_rules_file;
use sgrep_lint::utils::environment::Settings;

/// Default config discovery through to the rules file handed to the engine

fn rule(id: &str) -> String {
    format!("rules:\n  - id: {id}\n    pattern: foo($X)\n    message: m\n    languages: [python]\n    severity: WARNING\n")
}

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let folder = dir.path().join(".sgrep");
    fs::create_dir_all(folder.join("python").join("flask")).unwrap();
    fs::create_dir_all(folder.join(".drafts")).unwrap();
    fs::write(folder.join("top.yml"), rule("top")).unwrap();
    fs::write(folder.join("python").join("flask").join("views.yaml"), rule("no-debug")).unwrap();
    fs::write(folder.join(".drafts").join("wip.yml"), rule("wip")).unwrap();
    fs::write(folder.join("notes.txt"), "not a rule").unwrap();
    dir
}

#[tokio::test]
async fn test_default_folder_rules_are_namespaced() {
    let dir = project();
    let resolver = ConfigResolver::new(Settings::default()).with_base_path(dir.path().to_path_buf());

    let configs = resolver.resolve_config(None).await.unwrap();
    let ids: Vec<&str> = configs.keys().map(String::as_str).collect();
    assert_eq!(ids, vec!["python/flask/views.yaml", "top.yml"]);

    let mut validated = validate_configs(&configs, &ValidationOptions::default());
    assert!(validated.invalid.is_empty());
    rewrite_rule_ids(&mut validated);

    let mut rule_ids: Vec<&str> = validated.all_rules().map(|r| r.id.as_str()).collect();
    rule_ids.sort();
    assert_eq!(rule_ids, vec!["python.flask.no-debug", "top"]);

    let rendered = render_rules_file(validated.all_rules()).unwrap();
    assert!(rendered.contains("python.flask.no-debug"));
    assert!(!rendered.contains("wip"));
}

#[tokio::test]
async fn test_default_file_wins_over_folder() {
    let dir = project();
    fs::write(dir.path().join(".sgrep.yml"), rule("single")).unwrap();
    let resolver = ConfigResolver::new(Settings::default()).with_base_path(dir.path().to_path_buf());

    let configs = resolver.resolve_config(None).await.unwrap();
    assert_eq!(configs.len(), 1);

    let validated = validate_configs(&configs, &ValidationOptions::default());
    assert_eq!(validated.all_rules().next().unwrap().id, "single");
}

#[tokio::test]
async fn test_explicit_file_is_loaded_relative_to_base() {
    let dir = project();
    let resolver = ConfigResolver::new(Settings::default()).with_base_path(dir.path().to_path_buf());

    let configs = resolver.resolve_config(Some("extra.yml")).await;
    assert!(configs.unwrap_err().to_string().contains("unable to find a config"));

    fs::write(dir.path().join("extra.yml"), rule("extra")).unwrap();
    let configs = resolver.resolve_config(Some("extra.yml")).await.unwrap();
    let validated = validate_configs(&configs, &ValidationOptions::default());
    assert_eq!(validated.rule_count(), 1);
}
