//! Main CLI application structure

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use super::output::{Output, OutputFormat};
use super::{report, watch};
use crate::pipeline::{resolve_output, Pipeline, RunOptions};
use crate::storage::{manifest, Config, ManifestError};

#[derive(Parser)]
#[command(name = "skillmap")]
#[command(author, version, about = "Build and validate the manifest of a skill corpus")]
pub struct Cli {
    /// Output format (defaults to the global config, then text)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Corpus root directory
    #[arg(long, short = 'r', default_value = ".")]
    pub root: PathBuf,

    /// Manifest path (relative paths are resolved against the root)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Project config file (defaults to skillmap.toml in the root)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Check an existing manifest against the schema without scanning the corpus
    #[arg(long, value_name = "PATH", num_args = 0..=1, conflicts_with = "watch")]
    pub validate: Option<Option<PathBuf>>,

    /// Re-run whenever the corpus changes
    #[arg(long)]
    pub watch: bool,

    /// Any error fails the run
    #[arg(long, overrides_with = "no_strict")]
    pub strict: bool,

    /// Only parse errors fail the run
    #[arg(long = "no-strict", overrides_with = "strict")]
    pub no_strict: bool,

    /// Process units on a thread pool
    #[arg(long)]
    pub parallel: bool,

    /// Watch-mode quiet period in milliseconds
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,
}

impl Cli {
    /// Flag override for the strict policy, if any
    fn strict_override(&self) -> Option<bool> {
        match (self.strict, self.no_strict) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }

    /// Run options from the project config with flag overrides applied
    fn run_options(&self, config: &Config) -> Result<RunOptions> {
        let mut options = RunOptions::from_config(&self.root, &config.project)?;
        if let Some(path) = &self.output {
            options.output = resolve_output(&self.root, path);
        }
        if let Some(strict) = self.strict_override() {
            options.strict = strict;
        }
        options.parallel |= self.parallel;
        Ok(options)
    }
}

/// Main entry point for the CLI
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    execute(cli)
}

fn execute(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(&cli.root, cli.config.as_deref())?;
    let format = cli
        .format
        .unwrap_or_else(|| config.global.default_format.into());
    let output = Output::new(format, cli.verbose);

    output.verbose("skillmap starting");
    match &config.source {
        Some(path) => output.verbose_ctx("config", &format!("Loaded {}", path.display())),
        None => output.verbose_ctx("config", "No project config, using defaults"),
    }

    let options = cli.run_options(&config)?;

    if let Some(path) = &cli.validate {
        let path = path.clone().unwrap_or_else(|| options.output.clone());
        output.verbose_ctx("validate", &format!("Checking {}", path.display()));
        return match manifest::validate_file(&path) {
            Ok(()) => {
                report::print_validation(&output, &path, &[]);
                Ok(ExitCode::SUCCESS)
            }
            Err(ManifestError::Invalid(violations)) => {
                report::print_validation(&output, &path, &violations);
                Ok(ExitCode::FAILURE)
            }
            Err(e) => Err(e.into()),
        };
    }

    if cli.watch {
        let debounce = cli.debounce_ms.unwrap_or(config.project.watch.debounce_ms);
        output.verbose_ctx(
            "watch",
            &format!("strict={}, parallel={}", options.strict, options.parallel),
        );
        // Config edits take effect on the next run
        let reload = || cli.run_options(&Config::load(&cli.root, cli.config.as_deref())?);
        watch::watch(options, reload, Duration::from_millis(debounce), &output)?;
        return Ok(ExitCode::SUCCESS);
    }

    output.verbose_ctx(
        "run",
        &format!(
            "root={}, output={}, strict={}, parallel={}",
            options.root.display(),
            options.output.display(),
            options.strict,
            options.parallel
        ),
    );
    let outcome = Pipeline::new(&options, &output).run()?;
    report::print_outcome(&output, &outcome);

    Ok(if outcome.is_fatal() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
