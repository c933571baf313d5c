//! `nipbot ask` against a mock Gemini endpoint.


use std::fs;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use fixtures::{answer_response, can_bind_localhost};
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STREAM_PATH: &str = "/models/gemini-2.0-flash:streamGenerateContent";

fn nipbot(home: &Path, base_url: &str) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("nipbot");
    cmd.env("NIPBOT_HOME", home)
        .env("GEMINI_BASE_URL", base_url)
        .env_remove("GEMINI_API_KEY")
        .env_remove("VITE_API_KEY")
        .env_remove("API_KEY")
        .env_remove("NIPBOT_MODEL")
        .env_remove("RUST_LOG");
    cmd
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ask_streams_answer_and_sources() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(query_param("alt", "sse"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(answer_response(
            "표준 일정 확인",
            "BCG는 생후 4주 이내 접종합니다.\n| 백신 | 횟수 |\n|---|---|\n| BCG | 1회 |",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    nipbot(home.path(), &server.uri())
        .env("GEMINI_API_KEY", "test-key")
        .args(["ask", "BCG 접종 시기는?"])
        .assert()
        .success()
        .stdout(predicate::str::contains("BCG는 생후 4주 이내 접종합니다."))
        .stdout(predicate::str::contains("출처:"))
        .stdout(predicate::str::contains("https://nip.kdca.go.kr/irhp/index.jsp"))
        .stdout(predicate::str::contains("news.example.com").not())
        .stderr(predicate::str::contains("NIP 데이터를 분석하고 있습니다"))
        .stderr(predicate::str::contains("[NIP 데이터 분석 프로세스]"))
        .stderr(predicate::str::contains("표준 일정 확인"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ask_without_key_fails_without_request() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    nipbot(home.path(), &server.uri())
        .args(["ask", "질문"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("⚠️ 오류 발생: API_KEY가 설정되지 않았습니다."));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ask_rate_limited_message() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string(
            r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#,
        ))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    nipbot(home.path(), &server.uri())
        .env("GEMINI_API_KEY", "test-key")
        .args(["ask", "질문"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("잠시 후 다시 시도해주세요"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ask_writes_html_transcript() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(answer_response("", "**1회** 접종합니다."))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let html_path = home.path().join("out").join("chat.html");
    nipbot(home.path(), &server.uri())
        .env("GEMINI_API_KEY", "test-key")
        .args(["ask", "BCG 몇 번?", "--html"])
        .arg(&html_path)
        .assert()
        .success();

    let html = fs::read_to_string(&html_path).unwrap();
    assert!(html.contains("BCG 몇 번?"));
    assert!(html.contains("<strong>1회</strong> 접종합니다."));
    assert!(html.contains("https://nip.kdca.go.kr/irhp/index.jsp"));
    assert!(!html.contains("news.example.com"));
}
