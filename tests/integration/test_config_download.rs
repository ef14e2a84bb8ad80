use flate2::write::GzEncoder;
use flate2::Compression;
use mockito::Server;
use tempfile::TempDir;

use sgrep_lint::models::rule::{validate_configs, ValidationOptions};
use sgrep_lint::services::config_resolver::ConfigResolver;
use sgrep_lint::utils::environment::Settings;

/// Downloading configs from URLs and the named registry

const RULES: &str = "rules:\n  - id: eqeq\n    pattern: $X == $X\n    message: useless\n    languages: [python]\n    severity: ERROR\n";

fn resolver(download_root: &TempDir) -> ConfigResolver {
    ConfigResolver::new(Settings::default()).with_download_root(download_root.path().to_path_buf())
}

/// Tarball laid out like a GitHub archive: one top-level folder
fn rules_tarball() -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, contents) in [
        ("sgrep-rules-develop/python/eq.yml", RULES),
        ("sgrep-rules-develop/README.md", "# rules"),
        ("sgrep-rules-develop/.github/ci.yml", "on: push"),
    ] {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, contents.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

#[tokio::test]
async fn test_plain_text_config() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/rules.yml")
        .with_status(200)
        .with_header("content-type", "text/plain; charset=utf-8")
        .with_body(RULES)
        .create_async()
        .await;

    let download_root = TempDir::new().unwrap();
    let url = format!("{}/rules.yml", server.url());
    let configs = resolver(&download_root).resolve_config(Some(&url)).await.unwrap();

    mock.assert_async().await;
    assert_eq!(configs.len(), 1);
    assert!(configs["remote-url"].is_some());
}

#[tokio::test]
async fn test_gzipped_tarball_config() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/archive.tar.gz")
        .with_status(200)
        .with_header("content-type", "application/x-gzip")
        .with_body(rules_tarball())
        .create_async()
        .await;

    let download_root = TempDir::new().unwrap();
    let url = format!("{}/archive.tar.gz", server.url());
    let configs = resolver(&download_root).download_config(&url).await.unwrap();

    // ids are relative to the archive's top folder; hidden folders and non-YAML are skipped
    let ids: Vec<&str> = configs.keys().map(String::as_str).collect();
    assert_eq!(ids, vec!["python/eq.yml"]);

    let validated = validate_configs(&configs, &ValidationOptions::default());
    assert_eq!(validated.rule_count(), 1);

    // extracted next to other downloads, under a directory named after the URL
    assert_eq!(std::fs::read_dir(download_root.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn test_registry_name_resolves_to_url() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/packs/team")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body(RULES)
        .create_async()
        .await;

    let download_root = TempDir::new().unwrap();
    let configs = resolver(&download_root)
        .with_registry_entry("team", &format!("{}/packs/team", server.url()))
        .resolve_config(Some("team"))
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(configs.contains_key("remote-url"));
}

#[tokio::test]
async fn test_bad_status_is_an_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/missing.yml")
        .with_status(404)
        .create_async()
        .await;

    let download_root = TempDir::new().unwrap();
    let url = format!("{}/missing.yml", server.url());
    let err = resolver(&download_root).download_config(&url).await.unwrap_err();
    assert!(err.to_string().contains("bad status code: 404"));
}

#[tokio::test]
async fn test_unknown_content_type_is_an_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/rules.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{}")
        .create_async()
        .await;

    let download_root = TempDir::new().unwrap();
    let url = format!("{}/rules.json", server.url());
    let err = resolver(&download_root).download_config(&url).await.unwrap_err();
    assert!(err.to_string().contains("unknown content-type: application/json"));
}

#[tokio::test]
async fn test_unreachable_url_is_recorded_as_missing() {
    let download_root = TempDir::new().unwrap();
    let url = "http://127.0.0.1:1/rules.yml";
    let configs = resolver(&download_root).download_config(url).await.unwrap();

    assert_eq!(configs.len(), 1);
    assert!(configs[url].is_none());
}
