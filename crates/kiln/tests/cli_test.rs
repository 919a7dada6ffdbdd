#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! へ移行

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

mod common;
use common::{TestProject, missing_socket};

/// CLIヘルプが正しく表示されることを確認
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("kiln").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("save"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("--host"));
}

/// バージョン表示が正しく動作することを確認
#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("kiln").unwrap();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("kiln"));
}

/// buildコマンドのヘルプに主要なフラグが出ることを確認
#[test]
fn test_build_help() {
    let mut cmd = Command::cargo_bin("kiln").unwrap();
    cmd.arg("build")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output"))
        .stdout(predicate::str::contains("--build-arg"))
        .stdout(predicate::str::contains("--cap-add"))
        .stdout(predicate::str::contains("--iidfile"));
}

/// デーモンが起動していない場合はソケットパスを含むエラーになる
#[test]
fn test_build_without_daemon() {
    let project = TestProject::new();
    project.write_dockerfile("FROM busybox\n");

    project
        .kiln(&missing_socket(&project))
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("kiln_build.sock"));
}

#[test]
fn test_save_without_daemon() {
    let project = TestProject::new();

    project
        .kiln(&missing_socket(&project))
        .args(["save", "app:latest", "-o", "app.tar"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("kiln_build.sock"));
    assert!(!project.path().join("app.tar").exists());
}

#[test]
fn test_save_requires_output() {
    let project = TestProject::new();

    project
        .kiln(&missing_socket(&project))
        .args(["save", "app:latest"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("output path should not be empty"));
}

#[test]
fn test_save_existing_destination() {
    let project = TestProject::new();
    fs::write(project.path().join("app.tar"), "old").unwrap();

    project
        .kiln(&missing_socket(&project))
        .args(["save", "app:latest", "-o", "app.tar"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

/// 入力検証はデーモンへの接続前に行われる
#[test]
fn test_build_validation_happens_locally() {
    let project = TestProject::new();
    project.write_dockerfile("FROM busybox\n");
    let socket = missing_socket(&project);

    project
        .kiln(&socket)
        .args(["build", "-o", "docker-isula:/x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not support"));

    project
        .kiln(&socket)
        .args(["build", "-o", "isulad:name"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid isulad output format"));

    project
        .kiln(&socket)
        .args(["build", "--cap-add", "CAP_SYS_ADMINsss"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is invalid"));

    project
        .kiln(&socket)
        .args(["build", "--format", "tar"])
        .assert()
        .failure();
}

#[test]
fn test_build_without_dockerfile() {
    let project = TestProject::new();

    project
        .kiln(&missing_socket(&project))
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("dockerfile: no such file or directory"));
}

#[test]
fn test_health_without_daemon() {
    let project = TestProject::new();

    project
        .kiln(&missing_socket(&project))
        .arg("health")
        .assert()
        .failure()
        .stderr(predicate::str::contains("kiln_build.sock"));
}
