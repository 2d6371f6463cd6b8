#![allow(deprecated)] // Command::cargo_bin

use assert_cmd::Command;
use predicates::prelude::*;

fn aws_web_pub() -> Command {
    let mut cmd = Command::cargo_bin("aws-web-pub").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("CDK_CONTEXT_JSON")
        .env_remove("CDK_DEFAULT_ACCOUNT")
        .env_remove("AWS_WEB_PUB_HANDLER_PACKAGE");
    cmd
}

fn write_project(dir: &std::path::Path, config: &str) {
    std::fs::write(dir.join(".aws-web-pub.json"), config).unwrap();
    std::fs::create_dir_all(dir.join("public")).unwrap();
    std::fs::write(dir.join("public/index.html"), "<h1>hello</h1>").unwrap();
    std::fs::write(dir.join("handler.zip"), b"PK").unwrap();
}

#[test]
fn test_cli_help() {
    aws_web_pub()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("publish"))
        .stdout(predicate::str::contains("unpublish"))
        .stdout(predicate::str::contains("--profile"))
        .stdout(predicate::str::contains("synth").not());
}

#[test]
fn test_deploy_alias_help() {
    aws_web_pub()
        .arg("deploy")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("[PROJECT_DIR]"));
}

#[test]
fn test_publish_reports_config_error_first() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".aws-web-pub.json"), r#"{ "projectName": "site" }"#).unwrap();
    aws_web_pub()
        .arg("publish")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "config property \"publishDir\" must exist and must be a string",
        ));
    assert!(!dir.path().join("aws-web-pub.out").exists());
}

#[test]
fn test_unpublish_without_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    aws_web_pub()
        .arg("--profile")
        .arg("staging")
        .arg("destroy")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains(".aws-web-pub.json"));
}

#[test]
fn test_synth_writes_cloud_assembly() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), r#"{ "projectName": "my-site", "publishDir": "public" }"#);
    let out = dir.path().join("cdk.out");
    let context = serde_json::json!({ "project": dir.path() }).to_string();

    aws_web_pub()
        .arg("synth")
        .env("CDK_CONTEXT_JSON", context)
        .env("CDK_OUTDIR", &out)
        .env("AWS_WEB_PUB_HANDLER_PACKAGE", dir.path().join("handler.zip"))
        .assert()
        .success();

    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("manifest.json")).unwrap()).unwrap();
    assert_eq!(
        manifest["artifacts"]["aws-web-pub"]["properties"]["stackName"],
        "my-site"
    );
    assert!(out.join("aws-web-pub.template.json").is_file());
    assert!(out.join("aws-web-pub.assets.json").is_file());
}

#[test]
fn test_synth_without_project_context_fails() {
    let dir = tempfile::tempdir().unwrap();
    aws_web_pub()
        .arg("synth")
        .env("CDK_OUTDIR", dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("project"));
}
