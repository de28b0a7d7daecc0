//! Per-kind frontmatter schemas
//!
//! Each [`UnitKind`] maps to one [`KindSchema`] holding its required fields,
//! banned top-level fields and recommended field order. Validation dispatches
//! once on the kind and only ever adds findings; it never drops a unit.

use serde_yaml::Value;
use std::collections::{BTreeMap, BTreeSet};

use super::finding::{Finding, FindingCode};
use super::id::UnitId;
use super::unit::{string_list, Platform, Unit, UnitKind};

/// Schema for one unit kind
#[derive(Debug, PartialEq, Eq)]
pub struct KindSchema {
    pub kind: UnitKind,

    /// Fields that must be present and non-null
    pub required: &'static [&'static str],

    /// Fields that must live under a platform block instead of the top level
    pub banned: &'static [(&'static str, Platform)],

    /// Recommended top-level field order; unlisted fields are ignored
    pub field_order: &'static [&'static str],
}

const BANNED_TOP_LEVEL: &[(&str, Platform)] = &[
    ("tools", Platform::ClaudeCode),
    ("model", Platform::ClaudeCode),
    ("mode", Platform::OpenCode),
];

const FIELD_ORDER: &[&str] = &[
    "name",
    "description",
    "targets",
    "depends_on",
    "conflicts_with",
    "claudecode",
    "opencode",
    "copilot",
];

const SKILL: KindSchema = KindSchema {
    kind: UnitKind::Skill,
    required: &["name", "description", "targets"],
    banned: BANNED_TOP_LEVEL,
    field_order: FIELD_ORDER,
};

const SUBAGENT: KindSchema = KindSchema {
    kind: UnitKind::Subagent,
    required: &["name", "description", "targets"],
    banned: BANNED_TOP_LEVEL,
    field_order: FIELD_ORDER,
};

const COMMAND: KindSchema = KindSchema {
    kind: UnitKind::Command,
    required: &["description", "targets"],
    banned: BANNED_TOP_LEVEL,
    field_order: FIELD_ORDER,
};

const RULE: KindSchema = KindSchema {
    kind: UnitKind::Rule,
    required: &["targets", "description"],
    banned: BANNED_TOP_LEVEL,
    field_order: FIELD_ORDER,
};

impl UnitKind {
    /// Returns the schema for this kind
    pub fn schema(&self) -> &'static KindSchema {
        match self {
            UnitKind::Skill => &SKILL,
            UnitKind::Subagent => &SUBAGENT,
            UnitKind::Command => &COMMAND,
            UnitKind::Rule => &RULE,
        }
    }
}

/// Allowed tool names, keyed by platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolAllowList(BTreeMap<Platform, BTreeSet<String>>);

impl Default for ToolAllowList {
    fn default() -> Self {
        let mut map = BTreeMap::new();
        map.insert(
            Platform::ClaudeCode,
            names(&[
                "Read", "Write", "Edit", "MultiEdit", "Bash", "Grep", "Glob", "LS", "WebFetch",
                "WebSearch", "Task", "TodoWrite", "NotebookEdit", "NotebookRead",
            ]),
        );
        map.insert(
            Platform::OpenCode,
            names(&[
                "read", "write", "edit", "patch", "bash", "grep", "glob", "list", "webfetch",
                "todowrite", "todoread", "task",
            ]),
        );
        map.insert(
            Platform::Copilot,
            names(&[
                "read", "edit", "search", "runCommands", "runTasks", "fetch", "githubRepo",
                "codebase", "usages", "problems", "changes", "testFailure",
                "terminalLastCommand",
            ]),
        );
        Self(map)
    }
}

fn names(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl ToolAllowList {
    /// Adds extra allowed names for a platform
    pub fn extend(&mut self, platform: Platform, extra: impl IntoIterator<Item = String>) {
        self.0.entry(platform).or_default().extend(extra);
    }

    pub fn allows(&self, platform: Platform, tool: &str) -> bool {
        self.0
            .get(&platform)
            .is_some_and(|allowed| allowed.contains(tool))
    }
}

/// Validates one unit against the schema for its kind
pub fn validate_unit(unit: &Unit, tools: &ToolAllowList) -> Vec<Finding> {
    let schema = unit.kind.schema();
    let fm = &unit.frontmatter;
    let mut findings = Vec::new();

    let error = |message: String, key: Option<&str>| {
        Finding::error(FindingCode::SchemaError, &unit.id, &unit.source_path, message)
            .at_line(key.and_then(|k| fm.line_of(k)))
    };

    for field in schema.required {
        if matches!(fm.get(field), None | Some(Value::Null)) {
            findings.push(error(
                format!("{} is missing required field `{}`", schema.kind, field),
                None,
            ));
        }
    }

    for (field, platform) in schema.banned {
        if fm.contains(field) {
            findings.push(error(
                format!(
                    "field `{}` is not allowed at the top level; move it under `{}.{}`",
                    field, platform, field
                ),
                Some(*field),
            ));
        }
    }

    if let Some(value) = fm.get("targets") {
        match string_list(value) {
            Some(targets) => {
                for target in targets {
                    if target.parse::<Platform>().is_err() {
                        findings.push(error(
                            format!("unknown target platform `{}`", target),
                            Some("targets"),
                        ));
                    }
                }
            }
            None => findings.push(error(
                "`targets` must be a string or a list of strings".to_string(),
                Some("targets"),
            )),
        }
    }

    for field in ["depends_on", "conflicts_with"] {
        if let Err(message) = fm.id_list(field) {
            findings.push(error(message, Some(field)));
        }
    }

    for platform in &unit.platform_blocks {
        findings.extend(validate_tools(unit, *platform, tools));
    }

    if let Some(finding) = check_field_order(unit, schema) {
        findings.push(finding);
    }

    if !unit.id.is_kebab_case() {
        findings.push(Finding::warning(
            FindingCode::NamingWarning,
            &unit.id,
            &unit.source_path,
            format!(
                "id `{}` is not kebab-case (expected lowercase letters, digits and single hyphens)",
                unit.id
            ),
        ));
    }

    findings
}

/// Checks the `tools` entry of one platform block against the allow-list
fn validate_tools(unit: &Unit, platform: Platform, allow: &ToolAllowList) -> Vec<Finding> {
    let block = match unit.platform_block(platform) {
        Some(block) => block,
        None => return Vec::new(),
    };
    let value = match block.get("tools") {
        Some(value) => value,
        None => return Vec::new(),
    };
    let line = unit.frontmatter.line_of(platform.as_str());
    let error = |message: String| {
        Finding::error(FindingCode::SchemaError, &unit.id, &unit.source_path, message).at_line(line)
    };

    let tools: Vec<String> = match value {
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Sequence(_) => match string_list(value) {
            Some(list) => list,
            None => return vec![error(format!("`{}.tools` must contain only strings", platform))],
        },
        Value::Mapping(map) => map.keys().filter_map(Value::as_str).map(str::to_string).collect(),
        Value::Null => Vec::new(),
        _ => {
            return vec![error(format!(
                "`{}.tools` must be a list, a comma-separated string or a mapping",
                platform
            ))]
        }
    };

    tools
        .into_iter()
        .filter(|tool| !allow.allows(platform, tool))
        .map(|tool| error(format!("unknown {} tool `{}`", platform, tool)))
        .collect()
}

/// Reports the first field that appears after a field it should precede
fn check_field_order(unit: &Unit, schema: &KindSchema) -> Option<Finding> {
    let rank = |key: &str| schema.field_order.iter().position(|f| *f == key);
    let mut latest: Option<(&str, usize)> = None;

    for key in unit.frontmatter.keys() {
        let Some(position) = rank(key) else { continue };
        match latest {
            Some((previous, previous_rank)) if position < previous_rank => {
                return Some(
                    Finding::warning(
                        FindingCode::NamingWarning,
                        &unit.id,
                        &unit.source_path,
                        format!(
                            "field `{}` should come before `{}` (recommended order: {})",
                            key,
                            previous,
                            schema.field_order.join(", ")
                        ),
                    )
                    .at_line(unit.frontmatter.line_of(key)),
                );
            }
            _ => latest = Some((key, position)),
        }
    }

    None
}

/// Removes later units whose id was already seen, reporting each duplicate
///
/// Units are expected in discovery order; the first occurrence wins.
pub fn dedup_ids(units: Vec<Unit>) -> (Vec<Unit>, Vec<Finding>) {
    let mut first_seen: BTreeMap<UnitId, String> = BTreeMap::new();
    let mut kept = Vec::with_capacity(units.len());
    let mut findings = Vec::new();

    for unit in units {
        if let Some(original) = first_seen.get(&unit.id) {
            findings.push(Finding::error(
                FindingCode::SchemaError,
                &unit.id,
                &unit.source_path,
                format!(
                    "duplicate id `{}` (already defined by {}); this unit is excluded",
                    unit.id, original
                ),
            ));
        } else {
            first_seen.insert(unit.id.clone(), unit.source_path.clone());
            kept.push(unit);
        }
    }

    (kept, findings)
}
