//! CLI integration tests for skillmap
//!
//! These tests build small corpora in temp directories and run the binary
//! end to end: build, exit codes, report output and `--validate`.

use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Get a command instance for the skillmap binary
fn skillmap_cmd() -> assert_cmd::Command {
    assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("skillmap"))
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn skill(root: &Path, id: &str, extra: &str, body: &str) {
    write(
        root,
        &format!("skills/{}/SKILL.md", id),
        &format!("---\nname: {id}\ndescription: The {id} skill\ntargets: [claudecode]\n{extra}---\n{body}\n"),
    );
}

/// A corpus with one unit of every kind and no findings
fn setup_clean_corpus() -> TempDir {
    let dir = TempDir::new().unwrap();
    skill(dir.path(), "git-workflow", "", "# Git\n\nBranch, commit, push.");
    write(
        dir.path(),
        "agents/code-reviewer.md",
        "---\nname: code-reviewer\ndescription: Reviews diffs\ntargets: [claudecode, opencode]\nclaudecode:\n  tools: [Read, Grep, Glob]\nopencode:\n  mode: subagent\n---\nFollow [skill:git-workflow].\n",
    );
    write(
        dir.path(),
        "commands/ship.md",
        "---\ndescription: Ship the branch\ntargets: [claudecode]\ndepends_on: [git-workflow]\n---\nRun [subagent:code-reviewer] first.\n",
    );
    write(
        dir.path(),
        "rules/style.md",
        "---\ndescription: House style\ntargets: [copilot]\n---\nKeep it short.\n",
    );
    dir
}

fn read_manifest(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

// =============================================================================
// Build Tests
// =============================================================================

#[test]
fn test_build_clean_corpus() {
    let dir = setup_clean_corpus();

    skillmap_cmd()
        .arg("--root")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("0 error(s), 0 warning(s)"))
        .stdout(predicate::str::contains("Manifest written to"));

    let manifest = read_manifest(&dir.path().join("manifest.json"));
    assert_eq!(manifest["version"], "1.0.0");
    assert_eq!(manifest["stats"]["units"], 4);
    assert_eq!(manifest["stats"]["skills"], 1);
    assert_eq!(manifest["stats"]["subagents"], 1);
    assert_eq!(manifest["stats"]["commands"], 1);
    assert_eq!(manifest["stats"]["rules"], 1);
    assert_eq!(manifest["units"]["ship"]["kind"], "command");
    assert_eq!(manifest["units"]["ship"]["dependsOn"][0], "git-workflow");
    assert_eq!(manifest["units"]["ship"]["inferredDependencies"][0], "code-reviewer");
    assert_eq!(manifest["units"]["git-workflow"]["dependents"].as_array().unwrap().len(), 2);
    assert!(manifest.get("errors").is_none());
}

#[test]
fn test_build_is_byte_identical_apart_from_timestamp() {
    let dir = setup_clean_corpus();
    skill(dir.path(), "loop-a", "depends_on: [loop-b]\n", "");
    skill(dir.path(), "loop-b", "depends_on: [loop-a]\n", "");
    let path = dir.path().join("manifest.json");

    let strip = |text: String| -> String {
        text.lines()
            .filter(|l| !l.contains("\"generatedAt\""))
            .collect::<Vec<_>>()
            .join("\n")
    };

    skillmap_cmd().arg("--root").arg(dir.path()).assert().failure();
    let first = strip(fs::read_to_string(&path).unwrap());
    skillmap_cmd().arg("--root").arg(dir.path()).arg("--parallel").assert().failure();
    let second = strip(fs::read_to_string(&path).unwrap());

    assert_eq!(first, second);
}

#[test]
fn test_custom_output_path() {
    let dir = setup_clean_corpus();

    skillmap_cmd()
        .arg("--root")
        .arg(dir.path())
        .args(["--output", "dist/out.json"])
        .assert()
        .success();

    assert!(dir.path().join("dist/out.json").is_file());
    assert!(!dir.path().join("dist/out.json.tmp").exists());
    assert!(!dir.path().join("manifest.json").exists());
}

#[test]
fn test_config_file_sets_output_and_policy() {
    let dir = TempDir::new().unwrap();
    skill(dir.path(), "a", "depends_on: [missing]\n", "");
    write(dir.path(), "skillmap.toml", "output = \"build/manifest.json\"\nstrict = false\n");

    skillmap_cmd()
        .arg("--root")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("error[ReferenceError]"));

    assert!(dir.path().join("build/manifest.json").is_file());

    // Flag beats config
    skillmap_cmd()
        .arg("--root")
        .arg(dir.path())
        .arg("--strict")
        .assert()
        .failure();
}

#[test]
fn test_config_tools_extend_allow_list() {
    let dir = TempDir::new().unwrap();
    skill(dir.path(), "a", "claudecode:\n  tools: [Read, mcp__github]\n", "");

    skillmap_cmd()
        .arg("--root")
        .arg(dir.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("mcp__github"));

    write(dir.path(), "skillmap.toml", "[tools]\nclaudecode = [\"mcp__github\"]\n");
    skillmap_cmd().arg("--root").arg(dir.path()).assert().success();
}

// =============================================================================
// Finding Tests
// =============================================================================

#[test]
fn test_malformed_header_excludes_unit() {
    let dir = setup_clean_corpus();
    write(dir.path(), "rules/broken.md", "---\ndescription: [\n---\n");

    skillmap_cmd()
        .arg("--root")
        .arg(dir.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("error[ParseError] rules/broken.md"));

    let manifest = read_manifest(&dir.path().join("manifest.json"));
    assert_eq!(manifest["units"].as_object().unwrap().len(), 4);
    assert_eq!(manifest["stats"]["parseFailures"], 1);
}

#[test]
fn test_parse_errors_fail_even_without_strict() {
    let dir = setup_clean_corpus();
    write(dir.path(), "agents/broken.md", "no frontmatter here\n");

    skillmap_cmd()
        .arg("--root")
        .arg(dir.path())
        .arg("--no-strict")
        .assert()
        .failure();
}

#[test]
fn test_banned_field_names_platform_block() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "agents/helper.md",
        "---\nname: helper\ndescription: Helps\ntargets: [claudecode]\ntools: [Read]\n---\n",
    );

    skillmap_cmd()
        .arg("--root")
        .arg(dir.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("agents/helper.md:5"))
        .stdout(predicate::str::contains("claudecode"));
}

#[test]
fn test_cycle_reported() {
    let dir = TempDir::new().unwrap();
    skill(dir.path(), "a", "depends_on: [b]\n", "");
    skill(dir.path(), "b", "depends_on: [a]\n", "");

    skillmap_cmd()
        .arg("--root")
        .arg(dir.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("error[CycleError]"));

    let manifest = read_manifest(&dir.path().join("manifest.json"));
    assert_eq!(manifest["cycles"], serde_json::json!([["a", "b", "a"]]));
}

#[test]
fn test_warnings_do_not_fail() {
    let dir = TempDir::new().unwrap();
    skill(dir.path(), "a", "conflicts_with: [b]\n", "");
    skill(dir.path(), "b", "", "");
    skill(dir.path(), "Bad_Name", "", "");

    skillmap_cmd()
        .arg("--root")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("warning[AsymmetricConflict]"))
        .stdout(predicate::str::contains("warning[NamingWarning]"))
        .stdout(predicate::str::contains("0 error(s), 2 warning(s)"));
}

#[test]
fn test_errors_listed_before_warnings() {
    let dir = TempDir::new().unwrap();
    skill(dir.path(), "a", "conflicts_with: [b]\n", "");
    skill(dir.path(), "b", "", "");
    skill(dir.path(), "z", "depends_on: [nowhere]\n", "");

    let assert = skillmap_cmd().arg("--root").arg(dir.path()).assert().failure();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();

    let error_at = stdout.find("error[ReferenceError]").unwrap();
    let warning_at = stdout.find("warning[AsymmetricConflict]").unwrap();
    assert!(error_at < warning_at);
}

// =============================================================================
// Output Format Tests
// =============================================================================

#[test]
fn test_json_report() {
    let dir = TempDir::new().unwrap();
    skill(dir.path(), "a", "depends_on: [b]\n", "");

    let assert = skillmap_cmd()
        .arg("--root")
        .arg(dir.path())
        .args(["--format", "json"])
        .assert()
        .failure();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout);
    let json: Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(json["written"], true);
    assert_eq!(json["fatal"], true);
    assert_eq!(json["summary"]["errors"], 1);
    assert_eq!(json["findings"][0]["code"], "ReferenceError");
    assert_eq!(json["findings"][0]["unitId"], "a");
}

#[test]
fn test_verbose_flag() {
    let dir = setup_clean_corpus();

    skillmap_cmd()
        .arg("--root")
        .arg(dir.path())
        .arg("--verbose")
        .assert()
        .success()
        .stderr(predicate::str::contains("[verbose:run] -> loading"))
        .stderr(predicate::str::contains("[verbose:run] -> succeeded"))
        .stderr(predicate::str::contains("[verbose:load] Discovered 4 unit file(s)"));
}

// =============================================================================
// Error Handling Tests
// =============================================================================

#[test]
fn test_missing_root_aborts() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("nope");

    skillmap_cmd()
        .arg("--root")
        .arg(&root)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("does not exist"));

    assert!(!root.join("manifest.json").exists());
}

#[test]
fn test_malformed_config_error() {
    let dir = setup_clean_corpus();
    write(dir.path(), "skillmap.toml", "strict = \"sometimes\"\n");

    skillmap_cmd()
        .arg("--root")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse project config"));

    assert!(!dir.path().join("manifest.json").exists());
}

// =============================================================================
// Validate Tests
// =============================================================================

#[test]
fn test_validate_written_manifest() {
    let dir = setup_clean_corpus();
    skillmap_cmd().arg("--root").arg(dir.path()).assert().success();

    skillmap_cmd()
        .arg("--root")
        .arg(dir.path())
        .arg("--validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Manifest is valid"));
}

#[test]
fn test_validate_does_not_scan_corpus() {
    let dir = TempDir::new().unwrap();
    skill(dir.path(), "a", "depends_on: [gone]\n", "");
    skillmap_cmd().arg("--root").arg(dir.path()).assert().failure();

    // A corpus full of findings still has a schema-valid manifest
    write(dir.path(), "rules/broken.md", "garbage");
    skillmap_cmd()
        .arg("--validate")
        .arg(dir.path().join("manifest.json"))
        .assert()
        .success();
}

#[test]
fn test_validate_reports_violations() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(
        &path,
        r#"{"version": "one", "generatedAt": "2024-01-01T00:00:00Z", "stats": {"units": 0}, "units": {}, "surprise": 1}"#,
    )
    .unwrap();

    skillmap_cmd()
        .arg("--validate")
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("unknown top-level key `surprise`"))
        .stdout(predicate::str::contains("`version`"))
        .stderr(predicate::str::contains("2 schema violation(s)"));
}

#[test]
fn test_validate_json_format() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(&path, "{").unwrap();

    let assert = skillmap_cmd()
        .arg("--validate")
        .arg(&path)
        .args(["-f", "json"])
        .assert()
        .failure();

    let json: Value =
        serde_json::from_str(String::from_utf8_lossy(&assert.get_output().stdout).trim()).unwrap();
    assert_eq!(json["valid"], false);
    assert_eq!(json["violations"].as_array().unwrap().len(), 1);
}

#[test]
fn test_validate_missing_file() {
    let dir = TempDir::new().unwrap();

    skillmap_cmd()
        .arg("--validate")
        .arg(dir.path().join("none.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read manifest"));
}
