//! Golden tests for the manifest document
//!
//! Platform generators read the manifest, so its shape is a contract. These
//! tests pin the exact JSON produced for a small corpus.

use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Get a command instance for the skillmap binary
fn skillmap_cmd() -> assert_cmd::Command {
    assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("skillmap"))
}

const PLANNER: &str = "---\nname: planner\ndescription: Plans work\ntargets: [claudecode, opencode]\ndepends_on: [notes]\nconflicts_with: [yolo]\n---\nWrite the plan with [skill:notes], then hand off to [subagent:builder].\n";
const NOTES: &str = "---\nname: notes\ndescription: Keeps notes\ntargets: claudecode\n---\nPlain notes.\n";
const BUILDER: &str = "---\nname: builder\ndescription: Builds\ntargets: [opencode]\nopencode:\n  tools:\n    bash: true\n    edit: true\n---\nBuild it.\n";
const YOLO: &str = "---\ndescription: Skip review\ntargets: [claudecode]\n---\nJust ship.\n";

fn setup_golden_corpus() -> TempDir {
    let dir = TempDir::new().unwrap();
    let files = [
        ("skills/planner/SKILL.md", PLANNER),
        ("skills/notes/SKILL.md", NOTES),
        ("agents/builder.md", BUILDER),
        ("commands/yolo.md", YOLO),
    ];
    for (rel, content) in files {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    dir
}

fn build(root: &Path) -> (String, Value) {
    skillmap_cmd().arg("--root").arg(root).assert().success();
    let text = fs::read_to_string(root.join("manifest.json")).unwrap();
    let value = serde_json::from_str(&text).unwrap();
    (text, value)
}

fn hash(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

#[test]
fn test_manifest_golden() {
    let dir = setup_golden_corpus();
    let (_, mut manifest) = build(dir.path());

    let generated = manifest
        .as_object_mut()
        .unwrap()
        .remove("generatedAt")
        .unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(generated.as_str().unwrap()).is_ok());

    let expected = json!({
        "version": "1.0.0",
        "stats": {
            "units": 4,
            "skills": 2,
            "subagents": 1,
            "commands": 1,
            "rules": 0,
            "edges": 2,
            "declaredEdges": 1,
            "inferredEdges": 2,
            "cycles": 0,
            "conflicts": 1,
            "errors": 0,
            "warnings": 1,
            "parseFailures": 0
        },
        "units": {
            "builder": {
                "kind": "subagent",
                "sourcePath": "agents/builder.md",
                "name": "builder",
                "description": "Builds",
                "targets": ["opencode"],
                "dependsOn": [],
                "inferredDependencies": [],
                "conflictsWith": [],
                "dependents": ["planner"],
                "platforms": ["opencode"],
                "hash": hash(BUILDER)
            },
            "notes": {
                "kind": "skill",
                "sourcePath": "skills/notes/SKILL.md",
                "name": "notes",
                "description": "Keeps notes",
                "targets": ["claudecode"],
                "dependsOn": [],
                "inferredDependencies": [],
                "conflictsWith": [],
                "dependents": ["planner"],
                "platforms": [],
                "hash": hash(NOTES)
            },
            "planner": {
                "kind": "skill",
                "sourcePath": "skills/planner/SKILL.md",
                "name": "planner",
                "description": "Plans work",
                "targets": ["claudecode", "opencode"],
                "dependsOn": ["notes"],
                "inferredDependencies": ["builder"],
                "conflictsWith": ["yolo"],
                "dependents": [],
                "platforms": [],
                "hash": hash(PLANNER)
            },
            "yolo": {
                "kind": "command",
                "sourcePath": "commands/yolo.md",
                "description": "Skip review",
                "targets": ["claudecode"],
                "dependsOn": [],
                "inferredDependencies": [],
                "conflictsWith": [],
                "dependents": [],
                "platforms": [],
                "hash": hash(YOLO)
            }
        },
        "errors": [
            {
                "unitId": "planner",
                "severity": "warning",
                "code": "AsymmetricConflict",
                "message": "`planner` declares a conflict with `yolo`, but `yolo` does not declare one with `planner`",
                "sourcePath": "skills/planner/SKILL.md",
                "line": 6
            }
        ],
        "conflicts": [
            {
                "a": "planner",
                "b": "yolo",
                "symmetric": false,
                "declaredBy": ["planner"]
            }
        ]
    });

    assert_eq!(manifest, expected);
}

#[test]
fn test_manifest_keys_are_sorted() {
    let dir = setup_golden_corpus();
    let (text, _) = build(dir.path());

    let top_level: Vec<&str> = text
        .lines()
        .filter(|l| l.starts_with("  \"") && !l.starts_with("   "))
        .map(|l| l.trim().split('"').nth(1).unwrap())
        .collect();
    assert_eq!(
        top_level,
        vec!["conflicts", "errors", "generatedAt", "stats", "units", "version"]
    );
    assert!(text.ends_with("}\n"));
}

#[test]
fn test_manifest_omits_empty_sections() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rules/only.md");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "---\ndescription: Only rule\ntargets: [copilot]\n---\n").unwrap();

    let (_, manifest) = build(dir.path());
    let keys: Vec<&String> = manifest.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["generatedAt", "stats", "units", "version"]);
}
