//! # Pipeline
//!
//! Runs one full pass over a corpus:
//!
//! ```text
//! Loading -> Parsing -> Validating -> BuildingGraph -> ValidatingGraph -> Emitting -> Succeeded
//!    |
//!    +-> Aborted (root unusable, nothing written)
//! ```
//!
//! Per-unit work (read, parse, schema check, reference scan) is independent
//! and may run on a rayon pool. Each unit produces its own findings which
//! are merged into the run's [`Report`] afterwards, so parallel and
//! sequential runs emit identical manifests. Graph building and validation
//! wait for every unit.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use rayon::prelude::*;

use crate::cli::Output;
use crate::domain::{
    dedup_ids, integrity, references, validate_unit, Finding, FindingCode, References, Report,
    ToolAllowList, Unit, UnitGraph, UnitId, UnitNode,
};
use crate::storage::{
    frontmatter, manifest, Corpus, Layout, Manifest, ProjectConfig, SourceFile, UnreadableDir,
};

/// Stage of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Loading,
    Parsing,
    Validating,
    BuildingGraph,
    ValidatingGraph,
    Emitting,
    Succeeded,
    Aborted,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Loading => "loading",
            RunState::Parsing => "parsing",
            RunState::Validating => "validating",
            RunState::BuildingGraph => "building-graph",
            RunState::ValidatingGraph => "validating-graph",
            RunState::Emitting => "emitting",
            RunState::Succeeded => "succeeded",
            RunState::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Aborted)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved settings for a run
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub root: PathBuf,

    /// Manifest path (already joined onto the root when relative)
    pub output: PathBuf,

    pub strict: bool,
    pub parallel: bool,
    pub layout: Layout,
    pub tools: ToolAllowList,
}

impl RunOptions {
    /// Defaults for `root` with no config file
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let config = ProjectConfig::default();
        Self {
            output: root.join(&config.output),
            root,
            strict: config.strict,
            parallel: config.parallel,
            layout: config.layout,
            tools: ToolAllowList::default(),
        }
    }

    /// Builds options from a project config
    pub fn from_config(root: impl Into<PathBuf>, config: &ProjectConfig) -> Result<Self> {
        let root = root.into();
        let tools = config
            .tool_allow_list()
            .context("Invalid [tools] configuration")?;

        Ok(Self {
            output: resolve_output(&root, &config.output),
            root,
            strict: config.strict,
            parallel: config.parallel,
            layout: config.layout.clone(),
            tools,
        })
    }
}

/// Joins a relative output path onto the root
pub fn resolve_output(root: &Path, output: &Path) -> PathBuf {
    if output.is_absolute() {
        output.to_path_buf()
    } else {
        root.join(output)
    }
}

/// Result of a completed run
#[derive(Debug)]
pub struct RunOutcome {
    pub report: Report,
    pub manifest: Manifest,
    pub manifest_path: PathBuf,
    pub written: bool,
}

impl RunOutcome {
    /// Whether the run should exit nonzero
    pub fn is_fatal(&self) -> bool {
        self.report.has_fatal_errors()
    }
}

/// Per-unit result before the graph join
enum UnitResult {
    Parsed { node: UnitNode, findings: Vec<Finding> },
    Failed(Finding),
}

/// Runs the full pipeline once
pub struct Pipeline<'a> {
    options: &'a RunOptions,
    output: &'a Output,
}

impl<'a> Pipeline<'a> {
    pub fn new(options: &'a RunOptions, output: &'a Output) -> Self {
        Self { options, output }
    }

    fn enter(&self, state: RunState) {
        self.output.verbose_ctx("run", &format!("-> {}", state));
    }

    /// Runs and writes the manifest
    ///
    /// Returns `Err` only when the corpus root is unusable or the manifest
    /// cannot be written. Every other problem is a finding in the report.
    pub fn run(&self) -> Result<RunOutcome> {
        let mut outcome = self.build()?;

        self.enter(RunState::Emitting);
        outcome
            .manifest
            .write(&outcome.manifest_path)
            .with_context(|| format!("Failed to write manifest: {}", outcome.manifest_path.display()))?;
        outcome.written = true;
        self.output.verbose_ctx(
            "emit",
            &format!("Wrote {}", outcome.manifest_path.display()),
        );

        self.enter(RunState::Succeeded);
        Ok(outcome)
    }

    /// Runs every stage except writing the manifest
    pub fn build(&self) -> Result<RunOutcome> {
        let options = self.options;

        self.enter(RunState::Loading);
        let corpus = Corpus::new(&options.root, options.layout.clone())
            .exclude(&options.output)
            .exclude(manifest::temp_path(&options.output));
        let discovery = match corpus.discover() {
            Ok(discovery) => discovery,
            Err(e) => {
                self.enter(RunState::Aborted);
                return Err(e).context("Failed to load corpus");
            }
        };
        let files = discovery.files;
        self.output.verbose_ctx(
            "load",
            &format!("Discovered {} unit file(s) under {}", files.len(), options.root.display()),
        );

        self.enter(RunState::Parsing);
        let results: Vec<UnitResult> = if options.parallel {
            files
                .par_iter()
                .map(|file| process_file(file, &options.tools))
                .collect()
        } else {
            files
                .iter()
                .map(|file| process_file(file, &options.tools))
                .collect()
        };

        self.enter(RunState::Validating);
        let mut report = Report::new(options.strict);
        for dir in &discovery.unreadable {
            let finding = unreadable_finding(dir);
            self.output.verbose_ctx("load", &finding.to_string());
            report.push(finding);
        }
        let mut nodes = Vec::with_capacity(results.len());
        for result in results {
            match result {
                UnitResult::Parsed { node, findings } => {
                    report.extend(findings);
                    nodes.push(node);
                }
                UnitResult::Failed(finding) => {
                    self.output.verbose_ctx("parse", &finding.to_string());
                    report.push(finding);
                }
            }
        }
        let nodes = dedup_nodes(nodes, &mut report);
        self.output.verbose_ctx(
            "validate",
            &format!(
                "{} unit(s) parsed, {} parse failure(s)",
                nodes.len(),
                report.count(FindingCode::ParseError)
            ),
        );

        self.enter(RunState::BuildingGraph);
        let graph = UnitGraph::build(nodes);
        self.output.verbose_ctx(
            "graph",
            &format!("{} unit(s), {} edge(s)", graph.len(), graph.edges().count()),
        );

        self.enter(RunState::ValidatingGraph);
        let validation = integrity::validate(&graph);
        self.output.verbose_ctx(
            "graph",
            &format!(
                "{} cycle(s), {} graph finding(s)",
                validation.cycles.len(),
                validation.findings.len()
            ),
        );
        report.extend(validation.findings.iter().cloned());

        let manifest = Manifest::build(&graph, &validation, &report, Utc::now());

        Ok(RunOutcome {
            report,
            manifest,
            manifest_path: options.output.clone(),
            written: false,
        })
    }
}

/// Drops later units that reuse an id, keeping node order
fn dedup_nodes(nodes: Vec<UnitNode>, report: &mut Report) -> Vec<UnitNode> {
    let (units, refs): (Vec<Unit>, Vec<_>) = nodes
        .into_iter()
        .map(|n| (n.unit, n.references))
        .unzip();
    let sources: Vec<String> = units.iter().map(|u| u.source_path.clone()).collect();

    let (kept, duplicates) = dedup_ids(units);
    report.extend(duplicates);

    // Source paths are unique per file
    let mut refs: BTreeMap<String, References> = sources.into_iter().zip(refs).collect();
    kept.into_iter()
        .map(|unit| {
            let r = refs.remove(&unit.source_path).unwrap_or_default();
            UnitNode::new(unit, r)
        })
        .collect()
}

/// A directory that could not be listed; its units are missing from the run
fn unreadable_finding(dir: &UnreadableDir) -> Finding {
    Finding::error(
        FindingCode::ParseError,
        &UnitId::from_file_name(&dir.source_path),
        &dir.source_path,
        format!("failed to read {} directory: {}", dir.kind, dir.error),
    )
}

/// Read, parse, schema-check and scan one file
fn process_file(file: &SourceFile, tools: &ToolAllowList) -> UnitResult {
    if !file.name_is_utf8 {
        return UnitResult::Failed(Finding::error(
            FindingCode::ParseError,
            &UnitId::from_file_name(&file.stem),
            &file.source_path,
            "file name is not valid UTF-8",
        ));
    }

    let id = match UnitId::new(file.stem.as_str()) {
        Ok(id) => id,
        Err(e) => {
            return UnitResult::Failed(
                Finding::error(
                    FindingCode::ParseError,
                    &UnitId::from_file_name(&file.stem),
                    &file.source_path,
                    format!("file name cannot be used as a unit id: {}", e),
                ),
            )
        }
    };

    let raw = match file.read() {
        Ok(raw) => raw,
        Err(e) => {
            return UnitResult::Failed(Finding::error(
                FindingCode::ParseError,
                &id,
                &file.source_path,
                format!("failed to read file: {}", e),
            ))
        }
    };

    let text = match std::str::from_utf8(&raw) {
        Ok(text) => text,
        Err(e) => {
            return UnitResult::Failed(Finding::error(
                FindingCode::ParseError,
                &id,
                &file.source_path,
                format!("file is not valid UTF-8: {}", e),
            ))
        }
    };

    let doc = match frontmatter::parse(text) {
        Ok(doc) => doc,
        Err(e) => {
            return UnitResult::Failed(
                Finding::error(FindingCode::ParseError, &id, &file.source_path, e.to_string())
                    .at_line(e.line()),
            )
        }
    };

    let unit = Unit::new(
        id,
        file.kind,
        file.source_path.as_str(),
        doc.frontmatter,
        doc.body,
        doc.body_line,
        &raw,
    );
    let findings = validate_unit(&unit, tools);
    let refs = references::extract(&unit.body, &unit.id, unit.body_line);

    UnitResult::Parsed {
        node: UnitNode::new(unit, refs),
        findings,
    }
}
