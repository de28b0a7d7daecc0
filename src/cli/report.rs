//! Rendering run results and manifest validation results

use std::path::Path;

use serde::Serialize;

use super::output::Output;
use crate::domain::Finding;
use crate::pipeline::RunOutcome;

#[derive(Debug, Serialize)]
struct Summary {
    errors: usize,
    warnings: usize,
}

/// JSON shape of a run report
#[derive(Debug, Serialize)]
struct RunReport<'a> {
    manifest: String,
    written: bool,
    fatal: bool,
    summary: Summary,
    findings: &'a [Finding],
}

/// Text lines for a run: findings (errors first), then the summary
pub fn render_text(outcome: &RunOutcome) -> Vec<String> {
    let mut lines: Vec<String> = outcome.report.sorted().iter().map(Finding::to_string).collect();

    lines.push(format!(
        "{} error(s), {} warning(s)",
        outcome.report.error_count(),
        outcome.report.warning_count()
    ));
    if outcome.written {
        lines.push(format!("Manifest written to {}", outcome.manifest_path.display()));
    }
    lines
}

/// Prints the findings and summary of a completed run
pub fn print_outcome(output: &Output, outcome: &RunOutcome) {
    if output.is_json() {
        let findings = outcome.report.sorted();
        output.data(&RunReport {
            manifest: outcome.manifest_path.display().to_string(),
            written: outcome.written,
            fatal: outcome.is_fatal(),
            summary: Summary {
                errors: outcome.report.error_count(),
                warnings: outcome.report.warning_count(),
            },
            findings: &findings,
        });
    } else {
        for line in render_text(outcome) {
            output.line(&line);
        }
    }
}

/// Prints the result of checking a manifest file
pub fn print_validation(output: &Output, path: &Path, violations: &[String]) {
    if output.is_json() {
        output.data(&serde_json::json!({
            "manifest": path.display().to_string(),
            "valid": violations.is_empty(),
            "violations": violations,
        }));
        return;
    }

    if violations.is_empty() {
        output.success(&format!("Manifest is valid: {}", path.display()));
    } else {
        for violation in violations {
            output.line(violation);
        }
        output.error(&format!(
            "{} has {} schema violation(s)",
            path.display(),
            violations.len()
        ));
    }
}
