use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

const ANSWER: &str = "### 표준 일정\n**BCG**는 생후 4주 이내 접종합니다.\n| 백신 | 횟수 |\n|---|---|\n| BCG | **1회** |\n끝.";

#[test]
fn test_render_stdin_to_html() {
    cargo_bin_cmd!("nipbot")
        .arg("render")
        .write_stdin(ANSWER)
        .assert()
        .success()
        .stdout(predicate::str::contains("<h3>표준 일정</h3>"))
        .stdout(predicate::str::contains("<strong>BCG</strong>"))
        .stdout(predicate::str::contains("<th>백신</th><th>횟수</th>"))
        .stdout(predicate::str::contains("<td><strong>1회</strong></td>"))
        .stdout(predicate::str::contains("|---|").not());
}

#[test]
fn test_render_reads_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("answer.md");
    fs::write(&path, "plain text only").unwrap();

    cargo_bin_cmd!("nipbot")
        .arg("render")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("<div>plain text only</div>"));
}

#[test]
fn test_render_missing_file_fails() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("nipbot")
        .arg("render")
        .arg(dir.path().join("missing.md"))
        .assert()
        .failure();
}

#[test]
fn test_export_without_tables_fails() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("nipbot")
        .env("NIPBOT_HOME", dir.path())
        .args(["export", "--out-dir"])
        .arg(dir.path())
        .write_stdin("표가 없는 답변")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No tables"));
}
