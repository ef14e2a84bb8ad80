use mockito::Server;
use std::fs;
use tempfile::TempDir;

use sgrep_lint::services::config_resolver::ConfigResolver;
use sgrep_lint::utils::constants::FALLBACK_TEMPLATE;
use sgrep_lint::utils::environment::Settings;

/// `--generate-config` template download and its offline fallback

fn resolver(dir: &TempDir, template_url: String) -> ConfigResolver {
    ConfigResolver::new(Settings::default())
        .with_base_path(dir.path().to_path_buf())
        .with_template_url(template_url)
}

#[tokio::test]
async fn test_served_template_is_written() {
    let mut server = Server::new_async().await;
    let body = "rules:\n  - id: from-server\n    pattern: foo()\n    message: m\n    languages: [go]\n    severity: INFO\n";
    let mock = server
        .mock("GET", "/template.yaml")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body(body)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let written = resolver(&dir, format!("{}/template.yaml", server.url()))
        .generate_config()
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(written, dir.path().join(".sgrep.yml"));
    assert_eq!(fs::read_to_string(written).unwrap(), body);
}

#[tokio::test]
async fn test_server_error_falls_back_to_builtin_template() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/template.yaml")
        .with_status(500)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let written = resolver(&dir, format!("{}/template.yaml", server.url()))
        .generate_config()
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(fs::read_to_string(written).unwrap(), FALLBACK_TEMPLATE);
}
