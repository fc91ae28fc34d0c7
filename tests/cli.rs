use assert_cmd::Command;
use plaza_traffic::persist::read_parquet;
use plaza_traffic::table::ColumnValues;
use predicates::prelude::*;
use tempfile::tempdir;
use wiremock::matchers::{any, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DAY1: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<PLAZA_TRAFFIC>
  <DAY date="2016-09-12">
    <HOUR time="00:00" count="5"/>
    <HOUR time="01:00" count="7"/>
  </DAY>
</PLAZA_TRAFFIC>"#;

fn listing(links: &[&str]) -> String {
    let items: String = links
        .iter()
        .map(|l| format!(r#"<li><a href="{l}">{l}</a></li>"#))
        .collect();
    format!(
        r#"<html><body><div class="span-39 last"><ul>{items}</ul></div></body></html>"#
    )
}

async fn serve(server: &MockServer, route: &str, status: u16, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .expect(1)
        .mount(server)
        .await;
}

fn command(server: &MockServer) -> Command {
    let mut cmd = Command::cargo_bin("plaza-traffic").expect("Binary exists");
    cmd.arg("--listing-url")
        .arg(format!("{}/trafficdata.html", server.uri()))
        .arg("--base-url")
        .arg(server.uri())
        .arg("--timeout-secs")
        .arg("5");
    cmd
}

#[tokio::test(flavor = "multi_thread")]
async fn cli_single_file_writes_typed_parquet() {
    let server = MockServer::start().await;
    serve(&server, "/trafficdata.html", 200, listing(&["/files/day1.xml"])).await;
    serve(&server, "/files/day1.xml", 200, DAY1.to_string()).await;
    let out = tempdir().unwrap();

    command(&server)
        .arg(out.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Downloading...").and(predicate::str::contains("Saving to")));

    let dataset = read_parquet(&out.path().join("plaza_traffic.parquet")).expect("Output exists");
    assert_eq!(dataset.row_count(), 2);
    assert_eq!(dataset.column_names(), vec!["date", "time", "count"]);
    assert_eq!(
        dataset.column("count"),
        Some(&ColumnValues::Int(vec![Some(5), Some(7)]))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn cli_invalid_file_is_skipped_with_warning_and_exit_zero() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/trafficdata.html",
        200,
        listing(&["/files/day1.xml", "/files/day2.xml"]),
    )
    .await;
    serve(&server, "/files/day1.xml", 200, DAY1.to_string()).await;
    serve(&server, "/files/day2.xml", 200, "<PLAZA_TRAFFIC><DAY".to_string()).await;
    let out = tempdir().unwrap();

    let output = command(&server).arg(out.path()).output().unwrap();
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("/files/day2.xml").count(), 1, "{stderr}");

    let dataset = read_parquet(&out.path().join("plaza_traffic.parquet")).unwrap();
    assert_eq!(dataset.row_count(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn cli_run_without_rows_exits_zero_and_writes_nothing() {
    let server = MockServer::start().await;
    serve(&server, "/trafficdata.html", 200, listing(&["/files/gone.xml"])).await;
    serve(&server, "/files/gone.xml", 404, String::new()).await;
    let out = tempdir().unwrap();

    command(&server)
        .arg(out.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing saved").and(predicate::str::contains("Saving to").not()));

    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn cli_missing_destination_fails_before_downloading() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let parent = tempdir().unwrap();
    let missing = parent.path().join("no-such-dir");

    command(&server)
        .arg(&missing)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no-such-dir"));

    assert!(!missing.exists());
    assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn cli_listing_page_error_is_fatal_and_writes_nothing() {
    let server = MockServer::start().await;
    serve(&server, "/trafficdata.html", 500, String::new()).await;
    let out = tempdir().unwrap();

    command(&server)
        .arg(out.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("trafficdata.html"));

    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn cli_csv_format_and_json_report() {
    let server = MockServer::start().await;
    serve(&server, "/trafficdata.html", 200, listing(&["/files/day1.xml"])).await;
    serve(&server, "/files/day1.xml", 200, DAY1.to_string()).await;
    let out = tempdir().unwrap();

    command(&server)
        .arg(out.path())
        .arg("--format")
        .arg("csv")
        .arg("--report-json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"rows\": 2"));

    let csv = std::fs::read_to_string(out.path().join("plaza_traffic.csv")).unwrap();
    assert!(csv.starts_with("date,time,count\n"));
}
