//! Configuration handling for skillmap
//!
//! Configuration is read from `skillmap.toml` at the corpus root (or an
//! explicit `--config` path) and `~/.config/skillmap/config.toml` (global).
//! Every key is optional.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Platform, ToolAllowList, UnitKind};

/// File name of the project config at the corpus root
pub const CONFIG_FILE: &str = "skillmap.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Where each kind of unit lives under the root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Layout {
    /// One subdirectory per skill
    pub skills_dir: String,

    /// Fixed file name inside each skill directory
    pub skill_file: String,

    pub agents_dir: String,
    pub commands_dir: String,
    pub rules_dir: String,

    /// Extension of flat unit files
    pub extension: String,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            skills_dir: "skills".to_string(),
            skill_file: "SKILL.md".to_string(),
            agents_dir: "agents".to_string(),
            commands_dir: "commands".to_string(),
            rules_dir: "rules".to_string(),
            extension: "md".to_string(),
        }
    }
}

impl Layout {
    /// Returns the subdirectory holding units of `kind`
    pub fn dir_for(&self, kind: UnitKind) -> &str {
        match kind {
            UnitKind::Skill => &self.skills_dir,
            UnitKind::Subagent => &self.agents_dir,
            UnitKind::Command => &self.commands_dir,
            UnitKind::Rule => &self.rules_dir,
        }
    }
}

/// Configuration for watch mode
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Quiet period before a change triggers a run
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 300 }
    }
}

/// Project-level configuration (`skillmap.toml`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Manifest path, relative to the root
    pub output: PathBuf,

    /// Treat every error as fatal for the exit code
    pub strict: bool,

    /// Run per-unit stages on a thread pool
    pub parallel: bool,

    pub layout: Layout,

    pub watch: WatchConfig,

    /// Extra allowed tool names, keyed by platform block name
    pub tools: BTreeMap<String, Vec<String>>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("manifest.json"),
            strict: true,
            parallel: false,
            layout: Layout::default(),
            watch: WatchConfig::default(),
            tools: BTreeMap::new(),
        }
    }
}

impl ProjectConfig {
    /// Built-in allow-lists extended with configured names
    pub fn tool_allow_list(&self) -> Result<ToolAllowList, ConfigError> {
        let mut allow = ToolAllowList::default();
        for (platform, names) in &self.tools {
            let platform: Platform = platform
                .parse()
                .map_err(|e: String| ConfigError::Invalid(format!("[tools]: {}", e)))?;
            allow.extend(platform, names.iter().cloned());
        }
        Ok(allow)
    }
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default output format (text or json)
    pub default_format: OutputFormat,
}

/// Output format for reports
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Combined configuration (global + project)
#[derive(Debug, Clone)]
pub struct Config {
    pub project: ProjectConfig,
    pub global: GlobalConfig,

    /// The project config file that was read, if any
    pub source: Option<PathBuf>,
}

impl Config {
    /// Loads configuration for a corpus root
    ///
    /// An explicit path must exist; the default `skillmap.toml` is optional.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        let global = Self::load_global()?;

        let (project, source) = match explicit {
            Some(path) => (Self::load_project_config(path)?, Some(path.to_path_buf())),
            None => {
                let path = root.join(CONFIG_FILE);
                if path.is_file() {
                    (Self::load_project_config(&path)?, Some(path))
                } else {
                    (ProjectConfig::default(), None)
                }
            }
        };

        Ok(Self {
            project,
            global,
            source,
        })
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "skillmap", "skillmap").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Loads global configuration
    fn load_global() -> Result<GlobalConfig> {
        let config_dir = match Self::global_config_dir() {
            Some(dir) => dir,
            None => return Ok(GlobalConfig::default()),
        };

        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            return Ok(GlobalConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read global config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse global config")
    }

    /// Loads project configuration from a file
    fn load_project_config(path: &Path) -> Result<ProjectConfig> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read project config: {}", path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .with_context(|| format!("Failed to parse project config: {}", path.display()))?;

        config
            .tool_allow_list()
            .with_context(|| format!("Invalid project config: {}", path.display()))?;

        Ok(config)
    }
}
