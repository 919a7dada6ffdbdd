#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! へ移行

use kiln_client::FakeDaemon;
use predicates::prelude::*;
use std::fs;

mod common;
use common::{TestProject, start_daemon};

/// build → status → save をソケット越しに通しで実行
#[test]
fn test_build_status_save_roundtrip() {
    let project = TestProject::new();
    project.write_dockerfile("FROM busybox\nRUN echo hello\n");
    let daemon = start_daemon(FakeDaemon::new());

    project
        .kiln(&daemon.socket)
        .args(["build", "-t", "app:1", "--iidfile", "iid.txt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Build success with image id:"));

    let image_id = fs::read_to_string(project.path().join("iid.txt")).unwrap();
    assert_eq!(image_id.len(), 64);

    project
        .kiln(&daemon.socket)
        .args(["save", "app:1", "-o", "app.tar", "--format", "docker"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Save success with image:"));
    assert!(project.path().join("app.tar").exists());

    project
        .kiln(&daemon.socket)
        .args(["status", &format!("{:016x}", 1)])
        .assert()
        .success()
        .stdout(predicate::str::contains("complete"));
}

#[test]
fn test_save_missing_image_is_reported_verbatim() {
    let project = TestProject::new();
    let daemon = start_daemon(FakeDaemon::new().with_image("app:1", b"tar".to_vec()));

    project
        .kiln(&daemon.socket)
        .args(["save", "app:1", "9f8e7d6c", "-o", "both.tar"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to save image 9f8e7d6c"));
    assert!(!project.path().join("both.tar").exists());
}

#[test]
fn test_status_unknown_build() {
    let project = TestProject::new();
    let daemon = start_daemon(FakeDaemon::new());

    project
        .kiln(&daemon.socket)
        .args(["status", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown build id nope"));
}

#[test]
fn test_health() {
    let project = TestProject::new();
    let daemon = start_daemon(FakeDaemon::new());

    project
        .kiln(&daemon.socket)
        .arg("health")
        .assert()
        .success()
        .stdout(predicate::str::contains("healthy"));
}
