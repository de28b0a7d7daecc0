//! Watch mode: re-run the pipeline when the corpus changes
//!
//! Changes are debounced, then a full run starts. Only one run is ever in
//! flight; changes seen while a run is active collapse into a single
//! follow-up run.

use std::path::{Component, Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;

use super::output::Output;
use super::report;
use crate::pipeline::{Pipeline, RunOptions};
use crate::storage::manifest::temp_path;

/// Tracks whether a run is active and whether another one is owed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunQueue {
    #[default]
    Idle,
    Running {
        pending: bool,
    },
}

impl RunQueue {
    /// Records a change. Returns true if the caller should start a run now.
    pub fn request(&mut self) -> bool {
        match self {
            RunQueue::Idle => {
                *self = RunQueue::Running { pending: false };
                true
            }
            RunQueue::Running { pending } => {
                *pending = true;
                false
            }
        }
    }

    /// Marks the active run finished. Returns true if a queued run should
    /// start now, in which case the queue stays `Running`.
    pub fn finish(&mut self) -> bool {
        match *self {
            RunQueue::Running { pending: true } => {
                *self = RunQueue::Running { pending: false };
                true
            }
            _ => {
                *self = RunQueue::Idle;
                false
            }
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, RunQueue::Running { .. })
    }
}

/// Paths whose changes never trigger a run
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    root: PathBuf,
    output: PathBuf,
    temp: PathBuf,
}

impl IgnoreRules {
    pub fn new(root: &Path, output: &Path) -> Self {
        let output = absolute(output);
        Self {
            root: absolute(root),
            temp: temp_path(&output),
            output,
        }
    }

    /// Checks if a path should be ignored by the watcher
    ///
    /// Event paths are resolved the same way as the root and output, so a
    /// root reached through a symlink still matches.
    pub fn should_ignore_path(&self, path: &Path) -> bool {
        let path = absolute(path);
        let path = path.as_path();
        if path == self.output || path == self.temp {
            return true;
        }

        // Editor backup and swap files
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        if name.ends_with('~') || name.ends_with(".swp") || name.ends_with(".swx") {
            return true;
        }

        // Hidden files and directories inside the corpus
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components().any(|c| match c {
            Component::Normal(part) => part.to_string_lossy().starts_with('.'),
            _ => false,
        })
    }
}

/// Canonicalizes as much of the path as exists
fn absolute(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => absolute(parent).join(name),
        _ => std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf()),
    }
}

/// Prints a timestamped watch event to stderr
fn log_event(message: &str) {
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    eprintln!("[{}] {}", timestamp, message);
}

/// Picks up config changes before a re-run; a bad config keeps the last
/// good options
fn refresh(
    options: &mut RunOptions,
    rules: &mut IgnoreRules,
    reload: &impl Fn() -> Result<RunOptions>,
) {
    match reload() {
        Ok(fresh) => {
            *rules = IgnoreRules::new(&fresh.root, &fresh.output);
            *options = fresh;
        }
        Err(e) => log_event(&format!("Config reload failed, keeping previous settings: {:#}", e)),
    }
}

/// Runs once and reports; failures are logged, never fatal to the loop
fn run_once(options: &RunOptions, output: &Output) {
    log_event("Run started");
    match Pipeline::new(options, output).run() {
        Ok(outcome) => {
            report::print_outcome(output, &outcome);
            log_event(&format!(
                "Run finished: {} error(s), {} warning(s)",
                outcome.report.error_count(),
                outcome.report.warning_count()
            ));
        }
        Err(e) => log_event(&format!("Run failed: {:#}", e)),
    }
}

/// Watches the corpus root until the watcher channel closes
///
/// `reload` rebuilds the run options before every re-run so edits to the
/// project config apply without a restart.
pub fn watch(
    mut options: RunOptions,
    reload: impl Fn() -> Result<RunOptions>,
    debounce: Duration,
    output: &Output,
) -> Result<()> {
    let mut rules = IgnoreRules::new(&options.root, &options.output);
    let mut queue = RunQueue::default();

    if queue.request() {
        run_once(&options, output);
        queue.finish();
    }

    // Set up file watcher with debouncing
    let (tx, rx) = mpsc::channel();
    let mut debouncer = new_debouncer(debounce, tx).context("Failed to create file watcher")?;

    debouncer
        .watcher()
        .watch(&options.root, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", options.root.display()))?;

    log_event(&format!(
        "Watching {} (debounce: {}ms)",
        options.root.display(),
        debounce.as_millis()
    ));

    // Main event loop
    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let relevant = events
                    .iter()
                    .filter(|e| !rules.should_ignore_path(&e.path))
                    .count();
                if relevant == 0 {
                    continue;
                }

                log_event(&format!("Detected {} change(s)", relevant));
                if !queue.request() {
                    continue;
                }

                loop {
                    refresh(&mut options, &mut rules, &reload);
                    run_once(&options, output);

                    // Changes that landed during the run
                    while let Ok(batch) = rx.try_recv() {
                        let changed = batch
                            .map(|events| events.iter().any(|e| !rules.should_ignore_path(&e.path)))
                            .unwrap_or(false);
                        if changed {
                            queue.request();
                        }
                    }

                    if !queue.finish() {
                        break;
                    }
                    log_event("Re-running for changes made during the last run");
                }
            }
            Ok(Err(error)) => {
                log_event(&format!("Watch error: {:?}", error));
            }
            Err(e) => {
                log_event(&format!("Channel error: {}", e));
                break;
            }
        }
    }

    Ok(())
}
