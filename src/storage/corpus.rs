//! Corpus discovery
//!
//! Walks the corpus root and lists unit files by kind-specific naming
//! convention. Discovery is read-only and deterministic: kinds in a fixed
//! order, paths sorted within each kind. Only an unusable root fails the
//! whole discovery; a kind directory that cannot be read is reported and
//! the other kinds are still listed.
//!
//! ```text
//! <root>/
//! ├── skills/<id>/SKILL.md
//! ├── agents/<id>.md
//! ├── commands/<id>.md
//! └── rules/<id>.md
//! ```

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::config::Layout;
use crate::domain::UnitKind;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Corpus root does not exist: {0}")]
    RootMissing(PathBuf),

    #[error("Corpus root is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// A discovered unit file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub kind: UnitKind,

    /// Absolute (or root-joined) path
    pub path: PathBuf,

    /// Path relative to the root, `/`-separated
    pub source_path: String,

    /// Directory name (skills) or file stem (everything else), lossily
    /// decoded when the name is not valid UTF-8
    pub stem: String,

    /// False when `stem` had to be decoded lossily
    pub name_is_utf8: bool,
}

impl SourceFile {
    /// Reads the raw file bytes
    pub fn read(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }
}

/// A directory discovery could not read
#[derive(Debug)]
pub struct UnreadableDir {
    pub kind: UnitKind,

    /// Path relative to the root, `/`-separated
    pub source_path: String,

    pub error: io::Error,
}

/// Result of walking a corpus root
#[derive(Debug, Default)]
pub struct Discovery {
    pub files: Vec<SourceFile>,
    pub unreadable: Vec<UnreadableDir>,
}

/// Discovers unit files under a corpus root
pub struct Corpus {
    root: PathBuf,
    layout: Layout,

    /// Paths never treated as units (the manifest and its temp file)
    exclude: Vec<PathBuf>,
}

impl Corpus {
    pub fn new(root: impl Into<PathBuf>, layout: Layout) -> Self {
        Self {
            root: root.into(),
            layout,
            exclude: Vec::new(),
        }
    }

    /// Skips the given path during discovery
    pub fn exclude(mut self, path: impl Into<PathBuf>) -> Self {
        self.exclude.push(path.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lists all unit files. Fails only when the root itself is unusable.
    pub fn discover(&self) -> Result<Discovery, LoaderError> {
        if !self.root.exists() {
            return Err(LoaderError::RootMissing(self.root.clone()));
        }
        if !self.root.is_dir() {
            return Err(LoaderError::NotADirectory(self.root.clone()));
        }

        let mut discovery = Discovery::default();
        for kind in UnitKind::all() {
            let dir = self.root.join(self.layout.dir_for(*kind));
            if !dir.is_dir() {
                continue;
            }

            let mut found = match kind {
                UnitKind::Skill => self.discover_nested(&dir, *kind, &mut discovery.unreadable),
                _ => self.discover_flat(&dir, *kind, &mut discovery.unreadable),
            };
            found.sort_by(|a, b| a.source_path.cmp(&b.source_path));
            discovery.files.extend(found);
        }

        Ok(discovery)
    }

    fn unreadable(&self, kind: UnitKind, path: &Path, error: io::Error) -> UnreadableDir {
        UnreadableDir {
            kind,
            source_path: relative_display(&self.root, path),
            error,
        }
    }

    /// One unit per subdirectory, in a fixed-name file
    fn discover_nested(
        &self,
        dir: &Path,
        kind: UnitKind,
        unreadable: &mut Vec<UnreadableDir>,
    ) -> Vec<SourceFile> {
        let mut files = Vec::new();

        let entries = match visible_entries(dir) {
            Ok(entries) => entries,
            Err(e) => {
                unreadable.push(self.unreadable(kind, dir, e));
                return files;
            }
        };

        for entry in entries {
            if !entry.is_dir() {
                continue;
            }
            let file = entry.join(&self.layout.skill_file);
            match fs::metadata(&file) {
                Ok(meta) if meta.is_file() => {}
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    unreadable.push(self.unreadable(kind, &entry, e));
                    continue;
                }
            }
            if self.is_excluded(&file) {
                continue;
            }
            if let Some(name) = entry.file_name() {
                files.push(self.source_file(kind, file.clone(), name));
            }
        }

        files
    }

    /// One unit per file with the configured extension
    fn discover_flat(
        &self,
        dir: &Path,
        kind: UnitKind,
        unreadable: &mut Vec<UnreadableDir>,
    ) -> Vec<SourceFile> {
        let mut files = Vec::new();

        let entries = match visible_entries(dir) {
            Ok(entries) => entries,
            Err(e) => {
                unreadable.push(self.unreadable(kind, dir, e));
                return files;
            }
        };

        for path in entries {
            if !path.is_file()
                || self.is_excluded(&path)
                || !path.extension().is_some_and(|e| e == self.layout.extension.as_str())
            {
                continue;
            }
            if let Some(stem) = path.file_stem().map(OsStr::to_os_string) {
                files.push(self.source_file(kind, path, &stem));
            }
        }

        files
    }

    fn source_file(&self, kind: UnitKind, path: PathBuf, stem: &OsStr) -> SourceFile {
        let source_path = relative_display(&self.root, &path);
        SourceFile {
            kind,
            path,
            source_path,
            stem: stem.to_string_lossy().into_owned(),
            name_is_utf8: stem.to_str().is_some(),
        }
    }

    fn is_excluded(&self, path: &Path) -> bool {
        self.exclude.iter().any(|ex| same_path(ex, path))
    }
}

/// Lists non-hidden entries of a directory
fn visible_entries(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if !hidden {
            entries.push(entry.path());
        }
    }
    Ok(entries)
}

/// Relative `/`-separated path for reports and the manifest
pub fn relative_display(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
