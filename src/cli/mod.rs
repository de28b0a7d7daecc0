//! # Command-Line Interface
//!
//! A single command with three modes:
//!
//! | Mode | Flag | Effect |
//! |------|------|--------|
//! | Build | (default) | Scan, validate, write the manifest |
//! | Validate | `--validate [PATH]` | Check an existing manifest only |
//! | Watch | `--watch` | Rebuild on every corpus change |
//!
//! ## Output Formats
//!
//! All modes support `--format`:
//! - `text` (default) - Human-readable report
//! - `json` - Machine-parseable JSON
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) to trace each pipeline stage:
//! ```bash
//! skillmap --verbose --root ./corpus
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute; it returns the process
//! exit code.

mod app;
mod output;
mod report;
mod watch;

pub use app::{run, Cli};
pub use output::{Output, OutputFormat};
pub use watch::{IgnoreRules, RunQueue};
