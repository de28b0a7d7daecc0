//! skillmap - Manifest builder and integrity checker for skill corpora
//!
//! A corpus is a tree of skills, subagents, commands and rules, each a
//! Markdown file with a YAML frontmatter header. skillmap validates every
//! unit, builds the dependency and conflict graph from declared fields and
//! inline `[skill:<id>]` references, checks the graph, and writes one
//! deterministic JSON manifest for platform generators to consume.

pub mod domain;
pub mod storage;
pub mod pipeline;
pub mod cli;

pub use domain::{Finding, FindingCode, Report, Severity, Unit, UnitGraph, UnitId, UnitKind};
pub use pipeline::{Pipeline, RunOptions, RunOutcome, RunState};
pub use storage::Manifest;
