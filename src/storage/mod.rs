//! # Storage Layer
//!
//! Everything that touches the filesystem: corpus discovery, frontmatter
//! parsing, configuration and the manifest file.
//!
//! ## Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Units | Markdown + YAML frontmatter | `skills/<id>/SKILL.md`, `agents/<id>.md`, ... |
//! | Config | TOML | `skillmap.toml` at the root |
//! | Manifest | Pretty JSON, sorted keys | `manifest.json` (configurable) |
//!
//! ## Safety
//!
//! - Discovery and parsing are read-only
//! - The manifest is written atomically (temp file + rename)
//!
//! ## Key Types
//!
//! - [`Corpus`] - Lists unit files under a root
//! - [`Manifest`] - The emitted document
//! - [`Config`] - Project and global configuration

mod config;
mod corpus;
pub mod frontmatter;
pub mod manifest;

pub use config::{
    Config, ConfigError, GlobalConfig, Layout, OutputFormat, ProjectConfig, WatchConfig,
    CONFIG_FILE,
};
pub use corpus::{relative_display, Corpus, Discovery, LoaderError, SourceFile, UnreadableDir};
pub use frontmatter::{Document, FrontmatterError};
pub use manifest::{ConflictFinding, Manifest, ManifestError, Stats, UnitSummary, MANIFEST_VERSION};
