use std::path::Path;
use std::time::Duration;

use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gh_project_export::ExportError;
use gh_project_export::cancel::CancelFlag;
use gh_project_export::config::types::ExportConfig;
use gh_project_export::export::{ExportRequest, run_export};
use gh_project_export::flatten::BASE_COLUMNS;
use gh_project_export::github::GraphQlClient;
use gh_project_export::types::Owner;

fn fixture(src: &str) -> Value {
    serde_json::from_str(src).expect("valid JSON fixture")
}

/// Serve the project fixture and one page of items.
async fn mock_project(items: Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({ "variables": { "login": "alice", "number": 3 } })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(fixture(include_str!("fixtures/project.json"))),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({ "variables": { "projectId": "PVT_kwHOAAlice" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(items))
        .mount(&server)
        .await;
    server
}

fn config(output_dir: &Path) -> ExportConfig {
    ExportConfig {
        throttle_ms: 0,
        output_dir: Some(output_dir.to_path_buf()),
        ..ExportConfig::default()
    }
}

fn request(view: Option<&str>) -> ExportRequest {
    ExportRequest {
        owner: Owner::user("alice"),
        project_number: 3,
        view_name: view.map(str::to_owned),
        output: None,
    }
}

fn client_for(server: &MockServer) -> GraphQlClient {
    GraphQlClient::new("test-token", Some(&server.uri()), Duration::from_secs(5)).unwrap()
}

/// Parse a written snapshot back into (headers, rows).
fn read_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers = reader.headers().unwrap().iter().map(str::to_owned).collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_owned).collect())
        .collect();
    (headers, rows)
}

fn cell<'a>(headers: &[String], row: &'a [String], column: &str) -> &'a str {
    let idx = headers
        .iter()
        .position(|h| h == column)
        .unwrap_or_else(|| panic!("missing column {column}"));
    &row[idx]
}

#[tokio::test]
async fn exports_every_item_with_base_and_custom_columns() {
    let server = mock_project(fixture(include_str!("fixtures/items.json"))).await;
    let dir = tempfile::tempdir().unwrap();

    let summary = run_export(
        &client_for(&server),
        &config(dir.path()),
        &request(None),
        &CancelFlag::new(),
    )
    .await
    .unwrap();

    assert_eq!(summary.total_items, 2);
    assert_eq!(summary.rows_written, 2);
    assert_eq!(summary.output, dir.path().join("project_3_export.csv"));
    assert!(summary.view.is_none());

    let (headers, rows) = read_csv(&summary.output);
    assert_eq!(&headers[..BASE_COLUMNS.len()], BASE_COLUMNS);
    assert_eq!(
        &headers[BASE_COLUMNS.len()..],
        [
            "field:Title",
            "field:Status",
            "field:Points",
            "field:Labels",
            "field:Notes"
        ]
    );
    assert_eq!(rows.len(), 2);

    let issue = &rows[0];
    assert_eq!(cell(&headers, issue, "project_item_id"), "PVTI_1");
    assert_eq!(cell(&headers, issue, "type"), "Issue");
    assert_eq!(cell(&headers, issue, "title"), "Fix bug");
    assert_eq!(cell(&headers, issue, "repo"), "alice/app");
    assert_eq!(cell(&headers, issue, "number"), "12");
    assert_eq!(cell(&headers, issue, "state"), "OPEN");
    assert_eq!(cell(&headers, issue, "assignees"), "alice");
    assert_eq!(cell(&headers, issue, "labels"), "bug, good first issue");
    assert_eq!(cell(&headers, issue, "milestone"), "v1.0");
    assert_eq!(cell(&headers, issue, "milestone_due"), "2024-06-30T00:00:00Z");
    assert_eq!(cell(&headers, issue, "createdAt"), "2024-01-10T09:00:00Z");
    assert_eq!(cell(&headers, issue, "field:Status"), "Doing");
    assert_eq!(cell(&headers, issue, "field:Points"), "3");
    // Unsupported value type renders as an empty cell.
    assert_eq!(cell(&headers, issue, "field:Labels"), "");
    assert_eq!(cell(&headers, issue, "field:Notes"), "");

    let draft = &rows[1];
    assert_eq!(cell(&headers, draft, "type"), "DraftIssue");
    assert_eq!(cell(&headers, draft, "title"), "Draft idea");
    assert_eq!(cell(&headers, draft, "url"), "");
    assert_eq!(cell(&headers, draft, "repo"), "");
    assert_eq!(cell(&headers, draft, "field:Status"), "");
    assert_eq!(cell(&headers, draft, "field:Notes"), "needs, \"triage\"\nsoon");
}

#[tokio::test]
async fn every_cell_is_quoted() {
    let server = mock_project(fixture(include_str!("fixtures/items.json"))).await;
    let dir = tempfile::tempdir().unwrap();

    let summary = run_export(
        &client_for(&server),
        &config(dir.path()),
        &request(None),
        &CancelFlag::new(),
    )
    .await
    .unwrap();

    let raw = std::fs::read_to_string(&summary.output).unwrap();
    assert!(raw.starts_with("\"project_item_id\",\"type\",\"title\""), "{raw}");
    assert!(raw.contains("\"needs, \"\"triage\"\"\nsoon\""), "{raw}");
}

#[tokio::test]
async fn view_filter_narrows_rows() {
    let server = mock_project(fixture(include_str!("fixtures/items.json"))).await;
    let dir = tempfile::tempdir().unwrap();

    let summary = run_export(
        &client_for(&server),
        &config(dir.path()),
        &request(Some("in progress")),
        &CancelFlag::new(),
    )
    .await
    .unwrap();

    assert_eq!(summary.view.as_ref().map(|v| v.name.as_str()), Some("In progress"));
    assert_eq!(summary.total_items, 2);
    assert_eq!(summary.rows_written, 1);

    let (headers, rows) = read_csv(&summary.output);
    assert_eq!(rows.len(), 1);
    assert_eq!(cell(&headers, &rows[0], "title"), "Fix bug");
    // The schema only covers rows that survived the filter.
    assert!(!headers.iter().any(|h| h == "field:Notes"));
}

#[tokio::test]
async fn at_me_resolves_to_viewer_and_unsupported_terms_are_ignored() {
    let server = mock_project(fixture(include_str!("fixtures/items.json"))).await;
    let dir = tempfile::tempdir().unwrap();

    let summary = run_export(
        &client_for(&server),
        &config(dir.path()),
        &request(Some("Mine")),
        &CancelFlag::new(),
    )
    .await
    .unwrap();

    let filter = summary.filter.as_ref().expect("view has a filter");
    assert_eq!(filter.assignee_values(), ["alice"]);
    assert_eq!(filter.ignored(), ["-label:wontfix"]);
    assert_eq!(summary.rows_written, 1);
}

#[tokio::test]
async fn unknown_view_exports_everything() {
    let server = mock_project(fixture(include_str!("fixtures/items.json"))).await;
    let dir = tempfile::tempdir().unwrap();

    let summary = run_export(
        &client_for(&server),
        &config(dir.path()),
        &request(Some("Nope")),
        &CancelFlag::new(),
    )
    .await
    .unwrap();

    assert!(summary.view.is_none());
    assert!(summary.filter.is_none());
    assert_eq!(summary.rows_written, 2);
}

#[tokio::test]
async fn empty_project_writes_header_only_file() {
    let server = mock_project(json!({
        "data": { "node": { "items": {
            "pageInfo": { "hasNextPage": false, "endCursor": null },
            "nodes": []
        } } }
    }))
    .await;
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("empty.csv");

    let mut req = request(None);
    req.output = Some(output.clone());
    let summary = run_export(
        &client_for(&server),
        &config(dir.path()),
        &req,
        &CancelFlag::new(),
    )
    .await
    .unwrap();

    assert_eq!(summary.total_items, 0);
    assert_eq!(summary.rows_written, 0);
    assert_eq!(summary.output, output);

    let (headers, rows) = read_csv(&output);
    assert_eq!(headers, BASE_COLUMNS);
    assert!(rows.is_empty());
}

#[tokio::test]
async fn failed_listing_leaves_no_output_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({ "variables": { "login": "alice" } })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(fixture(include_str!("fixtures/project.json"))),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({ "variables": { "projectId": "PVT_kwHOAAlice" } })))
        .respond_with(ResponseTemplate::new(403).set_body_string("API rate limit exceeded"))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let err = run_export(
        &client_for(&server),
        &config(dir.path()),
        &request(None),
        &CancelFlag::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ExportError::Transport { status: Some(403), .. }));
    assert!(gh_project_export::github::rate_limit::is_rate_limited(&err));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
