use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn graphbind_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("graphbind"))
}

const SCHEMA: &str = r#"
types:
  - name: Folder
    properties:
      - name: name
        type: string
      - name: files
        type: List<File>
        forward: folder-files
  - name: File
    properties:
      - name: name
        type: string
      - name: size
        type: long
      - name: folder
        type: Folder
        back: folder-files
"#;

/// Workspace with `schema.yaml` and one input document
fn workspace(input: &str) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("schema.yaml"), SCHEMA).unwrap();
    fs::write(temp_dir.path().join("input.json"), input).unwrap();
    temp_dir
}

fn bind(dir: &Path) -> Command {
    let mut cmd = graphbind_cmd();
    cmd.current_dir(dir)
        .args(["--schema", "schema.yaml", "--type", "Folder"]);
    cmd
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_init_creates_config_file() {
    let temp_dir = TempDir::new().unwrap();

    graphbind_cmd()
        .current_dir(&temp_dir)
        .arg("--init")
        .assert()
        .success()
        .stdout(predicate::str::contains("graphbind.yaml"));

    let config = fs::read_to_string(temp_dir.path().join("graphbind.yaml")).unwrap();
    assert!(config.contains("readOptions"));
    assert!(config.contains("failOnUnknownProperties"));
    assert!(config.contains("selfReferences"));
}

#[test]
fn test_init_refuses_to_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("graphbind.yaml"), "readOptions: {}\n").unwrap();

    graphbind_cmd()
        .current_dir(&temp_dir)
        .arg("--init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_config_file_is_applied() {
    let temp_dir = workspace(r#"{"name": "logs", "extra": 1}"#);
    fs::write(
        temp_dir.path().join("graphbind.json"),
        r#"{"readOptions": {"ignoreUnknown": true}}"#,
    )
    .unwrap();

    bind(temp_dir.path())
        .args(["--config", "graphbind.json", "--compact", "input.json"])
        .assert()
        .success()
        .stdout(r#"{"name":"logs","files":null}"#.to_string() + "\n");
}

// ============================================================================
// Binding
// ============================================================================

#[test]
fn test_bind_prints_reencoded_document() {
    let temp_dir = workspace(r#"{"files": [{"size": 10, "name": "a.txt"}], "name": "docs"}"#);

    bind(temp_dir.path())
        .args(["--compact", "input.json"])
        .assert()
        .success()
        .stdout(r#"{"name":"docs","files":[{"name":"a.txt","size":10}]}"#.to_string() + "\n");
}

#[test]
fn test_pretty_output_by_default() {
    let temp_dir = workspace(r#"{"name": "docs", "files": []}"#);

    bind(temp_dir.path())
        .arg("input.json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"docs\""));
}

#[test]
fn test_multiple_files_keep_order() {
    let temp_dir = workspace(r#"{"name": "first", "files": []}"#);
    fs::write(temp_dir.path().join("second.json"), r#"{"name": "second", "files": []}"#).unwrap();

    let output = bind(temp_dir.path())
        .args(["--compact", "input.json", "second.json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<_> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("first"));
    assert!(lines[1].contains("second"));
}

#[test]
fn test_root_type_expression() {
    let temp_dir = workspace(r#"[{"name": "x", "size": 1}]"#);

    graphbind_cmd()
        .current_dir(&temp_dir)
        .args(["--schema", "schema.yaml", "--type", "List<File>", "--compact", "input.json"])
        .assert()
        .success()
        .stdout(r#"[{"name":"x","size":1}]"#.to_string() + "\n");
}

#[test]
fn test_stats_go_to_stderr() {
    let temp_dir = workspace(r#"{"name": "docs", "files": []}"#);

    bind(temp_dir.path())
        .args(["--stats", "--compact", "input.json"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Binders:"))
        .stdout(predicate::str::contains("Binders:").not());
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_unknown_field_fails() {
    let temp_dir = workspace(r#"{"name": "docs", "owner": "root"}"#);

    bind(temp_dir.path())
        .arg("input.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("owner"))
        .stderr(predicate::str::contains("input.json"));
}

#[test]
fn test_lenient_skips_unknown_field() {
    let temp_dir = workspace(r#"{"name": "docs", "owner": "root"}"#);

    bind(temp_dir.path())
        .args(["--lenient", "--compact", "input.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("owner").not());
}

#[test]
fn test_one_bad_file_fails_the_run() {
    let temp_dir = workspace(r#"{"name": "ok", "files": []}"#);
    fs::write(temp_dir.path().join("bad.json"), "{ broken").unwrap();

    bind(temp_dir.path())
        .args(["--compact", "input.json", "bad.json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"ok\""))
        .stderr(predicate::str::contains("bad.json"));
}

#[test]
fn test_missing_schema_argument() {
    let temp_dir = workspace("{}");

    graphbind_cmd()
        .current_dir(&temp_dir)
        .arg("input.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--schema"));
}

#[test]
fn test_no_input_files() {
    let temp_dir = workspace("{}");

    bind(temp_dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("No input files"));
}

#[test]
fn test_missing_input_file() {
    let temp_dir = workspace("{}");

    bind(temp_dir.path())
        .arg("nowhere.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("nowhere.json"));
}
