//! Integration tests for the CLI interface
//!
//! Runs the photopipe binary against shell pipelines in temporary sessions.

mod common;

use assert_cmd::Command;
use common::{TestContext, TestContextBuilder, FAILING_PIPELINE, PHOTOPIPE_ENV, SHELL_PIPELINE};
use predicates::prelude::*;
use std::fs;

fn photopipe(ctx: &TestContext) -> Command {
    let mut cmd = Command::cargo_bin("photopipe").unwrap();
    for var in PHOTOPIPE_ENV {
        cmd.env_remove(var);
    }
    cmd.current_dir(ctx.root())
        .arg("--config")
        .arg(&ctx.settings);
    cmd
}

fn shell_context() -> TestContext {
    TestContextBuilder::new()
        .unwrap()
        .with_image("IMG_0001.JPG")
        .with_image("IMG_0002.jpg")
        .with_pipeline("shell", SHELL_PIPELINE)
        .with_pipeline("failing", FAILING_PIPELINE)
        .build()
        .unwrap()
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = Command::cargo_bin("photopipe").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Commands:"));
}

#[test]
fn test_run_help_documents_step_options() {
    let mut cmd = Command::cargo_bin("photopipe").unwrap();
    cmd.args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--step-args SEL TOKEN..."));
}

#[test]
fn test_steps_lists_builtin_pipeline() {
    let ctx = shell_context();
    photopipe(&ctx)
        .arg("steps")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline 'openmvg_openmvs'"))
        .stdout(predicate::str::contains("DensifyPointCloud"))
        .stdout(predicate::str::contains("texture"));
}

#[test]
fn test_steps_lists_pipeline_from_settings_dir() {
    let ctx = shell_context();
    photopipe(&ctx)
        .args(["steps", "--pipeline", "shell"])
        .assert()
        .success()
        .stdout(predicate::str::contains("entrypoint: list"))
        .stdout(predicate::str::contains("List the ingested images"));
}

#[test]
fn test_unknown_pipeline_is_configuration_error() {
    let ctx = shell_context();
    photopipe(&ctx)
        .args(["steps", "--pipeline", "nope"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("unknown pipeline 'nope'"));
}

#[test]
fn test_unknown_from_label_fails_before_session_exists() {
    let ctx = shell_context();
    photopipe(&ctx)
        .arg("run")
        .arg(&ctx.source)
        .args(["--uid", "bogus", "--from", "bogus_label"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("has no step 'bogus_label'"));

    assert!(!ctx.session_dir("bogus").exists());
}

#[test]
fn test_dry_run_prints_merged_commands() {
    let ctx = shell_context();
    photopipe(&ctx)
        .arg("run")
        .arg(&ctx.source)
        .args(["--uid", "preview", "--dry-run", "--to", "features", "--1", "p", "ULTRA"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[#0] intrinsics"))
        .stdout(predicate::str::contains("-m SIFT -p ULTRA"))
        .stdout(predicate::str::contains("[#2]").not());

    assert!(!ctx.session_dir("preview").exists());
}

#[test]
fn test_host_run_executes_every_step() {
    let ctx = shell_context();
    photopipe(&ctx)
        .arg("run")
        .arg(&ctx.source)
        .args(["--uid", "s1", "--pipeline", "shell"])
        .assert()
        .success()
        .stdout(predicate::str::contains(">>> [#0] List the ingested images"))
        .stdout(predicate::str::contains("<<< done in"))
        .stdout(predicate::str::contains("3 step(s) in"));

    let session = ctx.session_dir("s1");
    let listing = fs::read_to_string(session.join("tmp/matches/images.txt")).unwrap();
    assert!(listing.contains("IMG_0001.JPG"));
    assert!(listing.contains("IMG_0002.jpg"));
    assert_eq!(
        fs::read_to_string(session.join("tmp/mvs/scene.txt")).unwrap().trim(),
        "2"
    );

    let log = fs::read_to_string(session.join("processed.log")).unwrap();
    assert!(log.contains("START #2 report"));
    assert!(log.contains("reconstructed"));
    assert_eq!(
        fs::read_to_string(session.join("execution.jsonl"))
            .unwrap()
            .lines()
            .count(),
        3
    );
}

#[test]
fn test_resume_with_entrypoint_reuses_session() {
    let ctx = shell_context();
    photopipe(&ctx)
        .arg("run")
        .arg(&ctx.source)
        .args(["--uid", "s2", "--pipeline", "shell", "--to", "count"])
        .assert()
        .success();
    assert!(!ctx.session_dir("s2").join("tmp/mvs/scene.txt").exists());

    photopipe(&ctx)
        .arg("run")
        .arg(&ctx.source)
        .args(["--uid", "s2", "--pipeline", "shell", "--entrypoint", "report"])
        .assert()
        .success()
        .stdout(predicate::str::contains(">>> [#0]").not());

    assert!(ctx.session_dir("s2").join("tmp/mvs/scene.txt").exists());
}

#[test]
fn test_failing_step_stops_the_run() {
    let ctx = shell_context();
    photopipe(&ctx)
        .arg("run")
        .arg(&ctx.source)
        .args(["--uid", "s3", "--pipeline", "failing"])
        .assert()
        .code(5)
        .stdout(predicate::str::contains("<<< failed after"))
        .stdout(predicate::str::contains("FAILED (exit status 3)"))
        .stderr(predicate::str::contains("Step 'broken' failed (exit status 3)"));

    let session = ctx.session_dir("s3");
    assert!(session.join("build/first.txt").exists());
    assert!(!session.join("build/never.txt").exists());
    assert!(fs::read_to_string(session.join("processed.log"))
        .unwrap()
        .contains("about to fail"));
}

#[test]
fn test_missing_source_directory() {
    let ctx = shell_context();
    photopipe(&ctx)
        .args(["run", "does-not-exist", "--uid", "s4", "--pipeline", "shell"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("source image directory not found"));
}

#[test]
fn test_missing_camera_database_on_host() {
    let ctx = TestContextBuilder::new()
        .unwrap()
        .with_image("IMG_0001.jpg")
        .without_camera_database()
        .build()
        .unwrap();

    photopipe(&ctx)
        .arg("run")
        .arg(&ctx.source)
        .args(["--uid", "s5", "--to", "0"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("camera sensor database not found"));
}

#[test]
fn test_dry_run_with_missing_source_directory() {
    let ctx = shell_context();
    photopipe(&ctx)
        .args(["run", "does-not-exist", "--uid", "s6", "--dry-run"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("source image directory not found"))
        .stdout(predicate::str::contains("Dry run of").not());

    assert!(!ctx.session_dir("s6").exists());
}
