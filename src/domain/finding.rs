//! Findings and the report that collects them
//!
//! Every stage below the loader reports problems as [`Finding`]s instead of
//! failing. Stages build their own [`Report`] values which are merged at
//! stage boundaries, so per-unit work can run in parallel without sharing a
//! mutable accumulator.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use super::id::UnitId;

/// Severity of a finding. Errors sort before warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Machine-readable finding category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FindingCode {
    /// Missing or malformed frontmatter; the unit is excluded from the graph
    ParseError,

    /// Missing required field, banned field, unknown tool, duplicate id
    SchemaError,

    /// Dependency or conflict target does not exist
    ReferenceError,

    /// One per detected dependency cycle
    CycleError,

    /// Conflict declared in one direction only
    AsymmetricConflict,

    /// Id not kebab-case, or fields out of the recommended order
    NamingWarning,
}

impl FindingCode {
    /// Returns true if this code fails the run even when strict mode is off
    pub fn is_always_fatal(&self) -> bool {
        matches!(self, FindingCode::ParseError)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FindingCode::ParseError => "ParseError",
            FindingCode::SchemaError => "SchemaError",
            FindingCode::ReferenceError => "ReferenceError",
            FindingCode::CycleError => "CycleError",
            FindingCode::AsymmetricConflict => "AsymmetricConflict",
            FindingCode::NamingWarning => "NamingWarning",
        }
    }
}

impl fmt::Display for FindingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reported error or warning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub unit_id: UnitId,
    pub severity: Severity,
    pub code: FindingCode,
    pub message: String,
    pub source_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl Finding {
    pub fn error(
        code: FindingCode,
        unit_id: &UnitId,
        source_path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            unit_id: unit_id.clone(),
            severity: Severity::Error,
            code,
            message: message.into(),
            source_path: source_path.into(),
            line: None,
        }
    }

    pub fn warning(
        code: FindingCode,
        unit_id: &UnitId,
        source_path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, unit_id, source_path, message)
        }
    }

    /// Attaches a 1-indexed line number
    pub fn at_line(mut self, line: Option<usize>) -> Self {
        self.line = line;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Stable ordering: severity, source path, line, then the remaining fields
    fn sort_key(&self) -> (Severity, &str, Option<usize>, FindingCode, &UnitId, &str) {
        (
            self.severity,
            &self.source_path,
            self.line,
            self.code,
            &self.unit_id,
            &self.message,
        )
    }
}

impl PartialOrd for Finding {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Finding {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}] {}", self.severity, self.code, self.source_path)?;
        if let Some(line) = self.line {
            write!(f, ":{}", line)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Append-only collection of findings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    findings: Vec<Finding>,
    strict: bool,
}

impl Report {
    /// Creates an empty report. In strict mode every error is fatal.
    pub fn new(strict: bool) -> Self {
        Self {
            findings: Vec::new(),
            strict,
        }
    }

    /// Records a finding. Exact repeats are dropped so counts match the
    /// listed findings.
    pub fn push(&mut self, finding: Finding) {
        if !self.findings.contains(&finding) {
            self.findings.push(finding);
        }
    }

    /// Appends another report's findings, keeping this report's policy
    pub fn merge(mut self, other: Report) -> Self {
        self.extend(other.findings);
        self
    }

    pub fn extend(&mut self, findings: impl IntoIterator<Item = Finding>) {
        for finding in findings {
            self.push(finding);
        }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    /// Findings in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter()
    }

    /// Findings in stable report order (errors first, then by path and line)
    pub fn sorted(&self) -> Vec<Finding> {
        let mut findings = self.findings.clone();
        findings.sort();
        findings
    }

    pub fn error_count(&self) -> usize {
        self.findings.iter().filter(|f| f.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.findings.iter().filter(|f| !f.is_error()).count()
    }

    /// Number of findings with the given code
    pub fn count(&self, code: FindingCode) -> usize {
        self.findings.iter().filter(|f| f.code == code).count()
    }

    /// Decides the process exit status. Warnings never count.
    pub fn has_fatal_errors(&self) -> bool {
        self.findings
            .iter()
            .filter(|f| f.is_error())
            .any(|f| self.strict || f.code.is_always_fatal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> UnitId {
        UnitId::new(s).unwrap()
    }

    #[test]
    fn sorted_groups_errors_before_warnings() {
        let mut report = Report::new(true);
        report.push(Finding::warning(FindingCode::NamingWarning, &id("a"), "skills/a/SKILL.md", "w"));
        report.push(Finding::error(FindingCode::SchemaError, &id("b"), "skills/b/SKILL.md", "e").at_line(Some(3)));
        report.push(Finding::error(FindingCode::SchemaError, &id("a"), "skills/a/SKILL.md", "e").at_line(Some(2)));

        let sorted = report.sorted();
        assert_eq!(sorted[0].source_path, "skills/a/SKILL.md");
        assert!(sorted[0].is_error());
        assert_eq!(sorted[1].source_path, "skills/b/SKILL.md");
        assert_eq!(sorted[2].severity, Severity::Warning);
    }

    #[test]
    fn lines_order_within_one_file() {
        let mut report = Report::new(true);
        let unit = id("a");
        report.push(Finding::error(FindingCode::SchemaError, &unit, "p", "late").at_line(Some(9)));
        report.push(Finding::error(FindingCode::SchemaError, &unit, "p", "early").at_line(Some(2)));

        let sorted = report.sorted();
        assert_eq!(sorted[0].message, "early");
        assert_eq!(sorted[1].message, "late");
    }

    #[test]
    fn warnings_are_never_fatal() {
        let mut report = Report::new(true);
        report.push(Finding::warning(FindingCode::AsymmetricConflict, &id("a"), "p", "w"));
        assert!(!report.has_fatal_errors());
    }

    #[test]
    fn strict_policy_controls_schema_errors() {
        let finding = Finding::error(FindingCode::ReferenceError, &id("a"), "p", "missing");

        let mut strict = Report::new(true);
        strict.push(finding.clone());
        assert!(strict.has_fatal_errors());

        let mut lenient = Report::new(false);
        lenient.push(finding);
        assert!(!lenient.has_fatal_errors());
    }

    #[test]
    fn parse_errors_fatal_even_when_lenient() {
        let mut report = Report::new(false);
        report.push(Finding::error(FindingCode::ParseError, &id("a"), "p", "bad header"));
        assert!(report.has_fatal_errors());
    }

    #[test]
    fn merge_keeps_all_findings() {
        let mut left = Report::new(true);
        left.push(Finding::error(FindingCode::SchemaError, &id("a"), "p", "x"));
        let mut right = Report::new(true);
        right.push(Finding::warning(FindingCode::NamingWarning, &id("b"), "q", "y"));

        let merged = left.merge(right);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.error_count(), 1);
        assert_eq!(merged.warning_count(), 1);
    }

    #[test]
    fn repeated_findings_count_once() {
        let mut report = Report::new(true);
        let finding = Finding::error(FindingCode::SchemaError, &id("a"), "p", "unknown target `emacs`");
        report.push(finding.clone());
        report.extend(vec![finding.clone(), finding]);

        assert_eq!(report.len(), 1);
        assert_eq!(report.error_count(), report.sorted().len());
    }

    #[test]
    fn finding_serializes_camel_case() {
        let finding = Finding::error(FindingCode::ReferenceError, &id("a"), "skills/a/SKILL.md", "m")
            .at_line(Some(4));
        let json = serde_json::to_value(&finding).unwrap();

        assert_eq!(json["unitId"], "a");
        assert_eq!(json["severity"], "error");
        assert_eq!(json["code"], "ReferenceError");
        assert_eq!(json["sourcePath"], "skills/a/SKILL.md");
        assert_eq!(json["line"], 4);
    }

    #[test]
    fn display_includes_location() {
        let finding = Finding::warning(FindingCode::NamingWarning, &id("a"), "rules/a.md", "bad")
            .at_line(Some(1));
        assert_eq!(finding.to_string(), "warning[NamingWarning] rules/a.md:1: bad");
    }
}
