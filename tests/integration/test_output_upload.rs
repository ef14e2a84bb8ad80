use mockito::{Matcher, Server};
use serde_json::json;

use sgrep_lint::models::finding::{Finding, FindingExtra, Position, ScanReport};
use sgrep_lint::services::output_writer::{OutputFormat, OutputWriter};

fn report() -> ScanReport {
    ScanReport {
        results: vec![Finding {
            check_id: "test.eqeq".to_string(),
            path: "app.py".to_string(),
            start: Position { line: 1, col: 4 },
            end: Position { line: 1, col: 10 },
            extra: FindingExtra {
                message: "useless".to_string(),
                severity: Some("ERROR".to_string()),
                line: None,
            },
        }],
        errors: Vec::new(),
    }
}

#[tokio::test]
async fn test_results_posted_as_json() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/results")
        .match_header("content-type", "application/json")
        .match_body(Matcher::PartialJson(json!({
            "results": [{"check_id": "test.eqeq", "path": "app.py"}]
        })))
        .with_status(201)
        .create_async()
        .await;

    // text format still posts the JSON report
    let writer = OutputWriter::new(OutputFormat::Text, true);
    writer
        .emit(&report(), Some(&format!("{}/results", server.url())))
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_rejected_upload_is_an_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/results")
        .with_status(500)
        .create_async()
        .await;

    let writer = OutputWriter::new(OutputFormat::Json, true);
    let err = writer
        .emit(&report(), Some(&format!("{}/results", server.url())))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("failed with status 500"));
}
