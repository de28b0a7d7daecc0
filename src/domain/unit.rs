//! Unit domain model
//!
//! A unit is one content file: a YAML frontmatter header followed by a
//! prose body. Units are rebuilt on every run; nothing here is persisted.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use super::id::UnitId;

/// Kind of unit. Selects the schema applied to the frontmatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Skill,
    Subagent,
    Command,
    Rule,
}

impl UnitKind {
    /// All kinds in discovery order
    pub fn all() -> &'static [UnitKind] {
        &[
            UnitKind::Skill,
            UnitKind::Subagent,
            UnitKind::Command,
            UnitKind::Rule,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Skill => "skill",
            UnitKind::Subagent => "subagent",
            UnitKind::Command => "command",
            UnitKind::Rule => "rule",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skill" => Ok(UnitKind::Skill),
            "subagent" | "agent" => Ok(UnitKind::Subagent),
            "command" => Ok(UnitKind::Command),
            "rule" => Ok(UnitKind::Rule),
            _ => Err(format!("Unknown unit kind: {}", s)),
        }
    }
}

/// Target platform with its own nested frontmatter block
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[serde(rename = "claudecode")]
    ClaudeCode,
    #[serde(rename = "opencode")]
    OpenCode,
    Copilot,
}

impl Platform {
    pub fn all() -> &'static [Platform] {
        &[Platform::ClaudeCode, Platform::OpenCode, Platform::Copilot]
    }

    /// Frontmatter key of the platform block
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::ClaudeCode => "claudecode",
            Platform::OpenCode => "opencode",
            Platform::Copilot => "copilot",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "claudecode" => Ok(Platform::ClaudeCode),
            "opencode" => Ok(Platform::OpenCode),
            "copilot" => Ok(Platform::Copilot),
            _ => Err(format!("Unknown platform: {}", s)),
        }
    }
}

/// Reads a field that may be a single string or a list of strings
pub fn string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Sequence(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect(),
        Value::Null => Some(Vec::new()),
        _ => None,
    }
}

/// Parsed frontmatter of one unit, in file order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    /// Top-level fields; key order follows the file
    pub fields: Mapping,

    /// 1-indexed file line of each top-level key
    pub field_lines: BTreeMap<String, usize>,
}

impl Frontmatter {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Top-level keys in file order (non-string keys skipped)
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().filter_map(Value::as_str)
    }

    pub fn line_of(&self, key: &str) -> Option<usize> {
        self.field_lines.get(key).copied()
    }

    /// Returns a string field, if present and a string
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Reads an id list field (`depends_on`, `conflicts_with`)
    ///
    /// Absent fields are empty. Wrong shapes return a description of the
    /// problem for the schema stage to report.
    pub fn id_list(&self, key: &str) -> Result<BTreeSet<UnitId>, String> {
        let value = match self.get(key) {
            Some(v) => v,
            None => return Ok(BTreeSet::new()),
        };

        let items = string_list(value)
            .ok_or_else(|| format!("`{}` must be a string or a list of strings", key))?;

        items
            .into_iter()
            .map(|item| {
                UnitId::new(item.trim())
                    .map_err(|e| format!("`{}` contains an invalid id: {}", key, e))
            })
            .collect()
    }
}

/// One successfully parsed content file
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    pub id: UnitId,
    pub kind: UnitKind,

    /// Path relative to the corpus root, `/`-separated
    pub source_path: String,

    pub frontmatter: Frontmatter,

    /// From `depends_on`
    pub declared_dependencies: BTreeSet<UnitId>,

    /// From `conflicts_with`
    pub declared_conflicts: BTreeSet<UnitId>,

    /// Platform sub-objects present in the frontmatter
    pub platform_blocks: BTreeSet<Platform>,

    /// Prose after the closing delimiter
    pub body: String,

    /// 1-indexed file line where the body starts
    pub body_line: usize,

    /// blake3 hex digest of the raw file bytes
    pub hash: String,
}

impl Unit {
    /// Assembles a unit from its parsed parts. Malformed relation fields are
    /// treated as empty here; the schema stage reports them.
    pub fn new(
        id: UnitId,
        kind: UnitKind,
        source_path: impl Into<String>,
        frontmatter: Frontmatter,
        body: impl Into<String>,
        body_line: usize,
        raw: &[u8],
    ) -> Self {
        let declared_dependencies = frontmatter.id_list("depends_on").unwrap_or_default();
        let declared_conflicts = frontmatter.id_list("conflicts_with").unwrap_or_default();
        let platform_blocks = Platform::all()
            .iter()
            .copied()
            .filter(|p| matches!(frontmatter.get(p.as_str()), Some(Value::Mapping(_))))
            .collect();

        Self {
            id,
            kind,
            source_path: source_path.into(),
            frontmatter,
            declared_dependencies,
            declared_conflicts,
            platform_blocks,
            body: body.into(),
            body_line,
            hash: blake3::hash(raw).to_hex().to_string(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.frontmatter.str_field("name")
    }

    pub fn description(&self) -> Option<&str> {
        self.frontmatter.str_field("description")
    }

    /// Declared targets, as written
    pub fn targets(&self) -> Vec<String> {
        self.frontmatter
            .get("targets")
            .and_then(string_list)
            .unwrap_or_default()
    }

    /// Returns the platform block mapping, if present
    pub fn platform_block(&self, platform: Platform) -> Option<&Mapping> {
        self.frontmatter
            .get(platform.as_str())
            .and_then(Value::as_mapping)
    }
}
