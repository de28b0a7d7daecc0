//! Manifest model, serialization and schema validation
//!
//! The manifest is the only artifact this tool writes. Output is
//! deterministic apart from `generatedAt`: object keys are sorted and every
//! list is emitted in a stable order. Writes go through a temp file and a
//! rename so readers never see a partial manifest.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::{
    Finding, FindingCode, GraphValidation, Platform, Report, UnitGraph, UnitId, UnitKind,
};

/// Manifest schema version
pub const MANIFEST_VERSION: &str = "1.0.0";

const REQUIRED_KEYS: &[&str] = &["version", "generatedAt", "stats", "units"];
const OPTIONAL_KEYS: &[&str] = &["errors", "cycles", "conflicts"];

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Manifest has {} schema violation(s)", .0.len())]
    Invalid(Vec<String>),
}

/// Corpus-wide counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub units: usize,
    pub skills: usize,
    pub subagents: usize,
    pub commands: usize,
    pub rules: usize,
    pub edges: usize,
    pub declared_edges: usize,
    pub inferred_edges: usize,
    pub cycles: usize,
    pub conflicts: usize,
    pub errors: usize,
    pub warnings: usize,
    pub parse_failures: usize,
}

/// Per-unit entry consumed by platform generators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitSummary {
    pub kind: UnitKind,
    pub source_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<UnitId>,
    #[serde(default)]
    pub inferred_dependencies: Vec<UnitId>,
    #[serde(default)]
    pub conflicts_with: Vec<UnitId>,
    #[serde(default)]
    pub dependents: Vec<UnitId>,
    #[serde(default)]
    pub platforms: Vec<Platform>,
    pub hash: String,
}

/// One conflict relation as reported in the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictFinding {
    pub a: UnitId,
    pub b: UnitId,
    pub symmetric: bool,
    pub declared_by: Vec<UnitId>,
}

/// The manifest document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Manifest {
    pub version: String,
    pub generated_at: DateTime<Utc>,
    pub stats: Stats,
    pub units: BTreeMap<UnitId, UnitSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<Finding>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cycles: Vec<Vec<UnitId>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<ConflictFinding>,
}

impl Manifest {
    /// Assembles the manifest from the validated graph and the full report
    pub fn build(
        graph: &UnitGraph,
        validation: &GraphValidation,
        report: &Report,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let units: BTreeMap<UnitId, UnitSummary> = graph
            .nodes()
            .map(|node| {
                let unit = &node.unit;
                let mut targets = unit.targets();
                targets.sort();
                targets.dedup();

                let summary = UnitSummary {
                    kind: unit.kind,
                    source_path: unit.source_path.clone(),
                    name: unit.name().map(str::to_string),
                    description: unit.description().map(str::to_string),
                    targets,
                    depends_on: unit.declared_dependencies.iter().cloned().collect(),
                    inferred_dependencies: node.inferred_dependencies.iter().cloned().collect(),
                    conflicts_with: unit.declared_conflicts.iter().cloned().collect(),
                    dependents: graph.dependents(unit.id.as_str()),
                    platforms: unit.platform_blocks.iter().copied().collect(),
                    hash: unit.hash.clone(),
                };
                (unit.id.clone(), summary)
            })
            .collect();

        let conflicts: Vec<ConflictFinding> = graph
            .conflicts()
            .map(|pair| ConflictFinding {
                a: pair.a.clone(),
                b: pair.b.clone(),
                symmetric: pair.is_symmetric(),
                declared_by: pair.declared_by.iter().cloned().collect(),
            })
            .collect();

        let edges: Vec<_> = graph.edges().collect();
        let stats = Stats {
            units: units.len(),
            skills: graph.count_kind(UnitKind::Skill),
            subagents: graph.count_kind(UnitKind::Subagent),
            commands: graph.count_kind(UnitKind::Command),
            rules: graph.count_kind(UnitKind::Rule),
            edges: edges.len(),
            declared_edges: edges.iter().filter(|e| e.is_declared()).count(),
            inferred_edges: edges.iter().filter(|e| e.is_inferred()).count(),
            cycles: validation.cycles.len(),
            conflicts: conflicts.len(),
            errors: report.error_count(),
            warnings: report.warning_count(),
            parse_failures: report.count(FindingCode::ParseError),
        };

        Self {
            version: MANIFEST_VERSION.to_string(),
            generated_at,
            stats,
            units,
            errors: report.sorted(),
            cycles: validation.cycles.clone(),
            conflicts,
        }
    }

    /// Serializes with sorted object keys, pretty-printed, newline-terminated
    pub fn to_json(&self) -> Result<String> {
        // Going through Value sorts every object's keys
        let value = serde_json::to_value(self).context("Failed to serialize manifest")?;
        let mut json = serde_json::to_string_pretty(&value).context("Failed to render manifest")?;
        json.push('\n');
        Ok(json)
    }

    /// Writes the manifest atomically (temp file + rename)
    pub fn write(&self, path: &Path) -> Result<()> {
        let content = self.to_json()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let temp_path = temp_path(path);

        // Write to temp file first
        fs::write(&temp_path, &content)
            .with_context(|| format!("Failed to write temp file: {}", temp_path.display()))?;

        // Atomic rename
        fs::rename(&temp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

/// Temp file used while writing `path`
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Reads a manifest file and checks it against the manifest schema
pub fn validate_file(path: &Path) -> Result<(), ManifestError> {
    let content = fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let violations = validate_str(&content);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ManifestError::Invalid(violations))
    }
}

/// Returns every schema violation found in a manifest document
pub fn validate_str(content: &str) -> Vec<String> {
    let value: Value = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(e) => return vec![format!("not valid JSON: {}", e)],
    };
    let Some(root) = value.as_object() else {
        return vec!["top level must be a JSON object".to_string()];
    };

    let mut violations = Vec::new();

    for key in REQUIRED_KEYS {
        if !root.contains_key(*key) {
            violations.push(format!("missing required key `{}`", key));
        }
    }
    for key in root.keys() {
        if !REQUIRED_KEYS.contains(&key.as_str()) && !OPTIONAL_KEYS.contains(&key.as_str()) {
            violations.push(format!("unknown top-level key `{}`", key));
        }
    }

    match root.get("version").and_then(Value::as_str) {
        Some(v) if is_semver_triplet(v) => {}
        Some(v) => violations.push(format!("`version` must be a three-part numeric string, got `{}`", v)),
        None if root.contains_key("version") => violations.push("`version` must be a string".to_string()),
        None => {}
    }

    if let Some(generated) = root.get("generatedAt") {
        let valid = generated
            .as_str()
            .is_some_and(|s| DateTime::parse_from_rfc3339(s).is_ok());
        if !valid {
            violations.push("`generatedAt` must be an RFC 3339 timestamp".to_string());
        }
    }

    let unit_count = match root.get("units") {
        Some(Value::Object(units)) => {
            for (id, unit) in units {
                check_unit(id, unit, &mut violations);
            }
            Some(units.len())
        }
        Some(_) => {
            violations.push("`units` must be an object keyed by unit id".to_string());
            None
        }
        None => None,
    };

    match (root.get("stats"), unit_count) {
        (Some(Value::Object(stats)), Some(count)) => {
            if stats.get("units").and_then(Value::as_u64) != Some(count as u64) {
                violations.push(format!("`stats.units` must equal the number of units ({})", count));
            }
        }
        (Some(Value::Object(_)), None) | (None, _) => {}
        (Some(_), _) => violations.push("`stats` must be an object".to_string()),
    }

    check_list(root.get("errors"), "errors", &mut violations, |i, item, out| {
        if let Err(e) = serde_json::from_value::<Finding>(item.clone()) {
            out.push(format!("errors[{}]: {}", i, e));
        }
    });

    check_list(root.get("cycles"), "cycles", &mut violations, |i, item, out| {
        let ids: Option<Vec<&str>> = item
            .as_array()
            .and_then(|items| items.iter().map(Value::as_str).collect());
        match ids {
            Some(ids) if ids.len() >= 2 && ids.first() == ids.last() => {}
            _ => out.push(format!(
                "cycles[{}] must list at least two ids and end where it starts",
                i
            )),
        }
    });

    check_list(root.get("conflicts"), "conflicts", &mut violations, |i, item, out| {
        match serde_json::from_value::<ConflictFinding>(item.clone()) {
            Ok(c) if c.a <= c.b => {}
            Ok(_) => out.push(format!("conflicts[{}]: `a` must sort before `b`", i)),
            Err(e) => out.push(format!("conflicts[{}]: {}", i, e)),
        }
    });

    if violations.is_empty() {
        if let Err(e) = serde_json::from_value::<Manifest>(value) {
            violations.push(format!("does not match the manifest schema: {}", e));
        }
    }

    violations
}

fn check_unit(id: &str, unit: &Value, violations: &mut Vec<String>) {
    if UnitId::new(id).is_err() {
        violations.push(format!("units: invalid unit id `{}`", id));
    }
    let Some(fields) = unit.as_object() else {
        violations.push(format!("units.{} must be an object", id));
        return;
    };

    let kind_ok = fields
        .get("kind")
        .and_then(Value::as_str)
        .is_some_and(|k| serde_json::from_value::<UnitKind>(Value::String(k.to_string())).is_ok());
    if !kind_ok {
        violations.push(format!("units.{}.kind must be one of skill, subagent, command, rule", id));
    }
    if !fields.get("sourcePath").is_some_and(Value::is_string) {
        violations.push(format!("units.{}.sourcePath must be a string", id));
    }
}

fn check_list(
    value: Option<&Value>,
    key: &str,
    violations: &mut Vec<String>,
    check: impl Fn(usize, &Value, &mut Vec<String>),
) {
    match value {
        None => {}
        Some(Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                check(i, item, violations);
            }
        }
        Some(_) => violations.push(format!("`{}` must be an array", key)),
    }
}

fn is_semver_triplet(s: &str) -> bool {
    let parts: Vec<&str> = s.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}
