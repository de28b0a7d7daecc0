//! Frontmatter parsing for unit files
//!
//! A unit file starts with a line containing only `---`, followed by a YAML
//! mapping, closed by the next line containing only `---`. Everything after
//! the closing delimiter is the body.

use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::domain::Frontmatter;

#[derive(Debug, Error, PartialEq)]
pub enum FrontmatterError {
    #[error("Missing frontmatter (file must start with a `---` line)")]
    MissingHeader,

    #[error("Missing closing `---` for the frontmatter opened on line 1")]
    Unterminated,

    #[error("Malformed frontmatter: {message}")]
    Yaml { message: String, line: Option<usize> },

    #[error("Frontmatter must be a mapping of fields")]
    NotAMapping,
}

impl FrontmatterError {
    /// File line the problem points at, if known
    pub fn line(&self) -> Option<usize> {
        match self {
            FrontmatterError::MissingHeader => Some(1),
            FrontmatterError::Unterminated => Some(1),
            FrontmatterError::Yaml { line, .. } => *line,
            FrontmatterError::NotAMapping => Some(2),
        }
    }
}

/// A unit file split into header and body
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub frontmatter: Frontmatter,
    pub body: String,

    /// 1-indexed file line where the body starts
    pub body_line: usize,
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end() == "---"
}

/// Parses a unit file into frontmatter and body
pub fn parse(content: &str) -> Result<Document, FrontmatterError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let lines: Vec<&str> = content.lines().collect();

    if !lines.first().is_some_and(|l| is_delimiter(l)) {
        return Err(FrontmatterError::MissingHeader);
    }

    let close = lines
        .iter()
        .skip(1)
        .position(|l| is_delimiter(l))
        .map(|p| p + 1)
        .ok_or(FrontmatterError::Unterminated)?;

    let header = &lines[1..close];
    let yaml = header.join("\n");

    let value: Value = serde_yaml::from_str(&yaml).map_err(|e| FrontmatterError::Yaml {
        message: e.to_string(),
        // Header line 1 is file line 2
        line: e.location().map(|loc| loc.line() + 1),
    })?;

    let fields = match value {
        Value::Mapping(map) => map,
        Value::Null => Mapping::new(),
        _ => return Err(FrontmatterError::NotAMapping),
    };

    Ok(Document {
        frontmatter: Frontmatter {
            fields,
            field_lines: field_lines(header),
        },
        body: lines[close + 1..].join("\n"),
        body_line: close + 2,
    })
}

/// Maps each top-level key to its 1-indexed file line
fn field_lines(header: &[&str]) -> BTreeMap<String, usize> {
    let mut lines = BTreeMap::new();

    for (offset, line) in header.iter().enumerate() {
        if line.starts_with(char::is_whitespace) || line.starts_with('#') || line.starts_with('-') {
            continue;
        }
        let Some((key, _)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().trim_matches(|c| c == '"' || c == '\'');
        if !key.is_empty() {
            lines.entry(key.to_string()).or_insert(offset + 2);
        }
    }

    lines
}
