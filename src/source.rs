//! Configuration sources.
//!
//! A source yields, per discovered path, the sections of a key-only INI file
//! in declaration order. Each key is one rule line.
//!
//! ```text
//! [Forms]
//! 00012345|00054321|chance(50)
//!
//! [Forms|WhiterunLocation,-LocTypeDungeon]
//! ChairBase|ChairFancy
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::ManagerConfig;
use crate::error::SourceError;

/// One section of a source, with its keys in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Section name as written, without brackets.
    pub name: String,
    /// Rule lines in file order.
    pub keys: Vec<String>,
}

/// A section name split into its category and optional conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader<'a> {
    /// Text before the first `|`.
    pub category: &'a str,
    /// `Some` for conditional sections (`Category|cond1,cond2`).
    pub conditions: Option<Vec<&'a str>>,
}

impl Section {
    /// Splits the section name on `|`, then the conditions on `,`.
    #[must_use]
    pub fn header(&self) -> SectionHeader<'_> {
        match self.name.split_once('|') {
            Some((category, conditions)) => SectionHeader {
                category: category.trim(),
                conditions: Some(
                    conditions
                        .split(',')
                        .map(str::trim)
                        .filter(|c| !c.is_empty())
                        .collect(),
                ),
            },
            None => SectionHeader {
                category: self.name.trim(),
                conditions: None,
            },
        }
    }
}

/// Parses key-only INI text. Repeated section names are merged in load order.
pub fn parse_sections(text: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut current: Option<usize> = None;

    for raw in text.trim_start_matches('\u{feff}').lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim();
            current = Some(match sections.iter().position(|s| s.name == name) {
                Some(index) => index,
                None => {
                    sections.push(Section {
                        name: name.to_string(),
                        keys: Vec::new(),
                    });
                    sections.len() - 1
                }
            });
            continue;
        }

        let key = line.split_once('=').map_or(line, |(key, _)| key).trim();
        match current {
            Some(index) if !key.is_empty() => sections[index].keys.push(key.to_string()),
            Some(_) => {}
            None => debug!("ignoring key outside of any section: [{key}]"),
        }
    }

    sections
}

/// Config source discovery and reading.
pub trait ConfigSource: Send + Sync {
    /// Paths to process, in a stable order.
    fn discover(&self) -> Vec<String>;

    /// Sections of one path.
    fn read(&self, path: &str) -> Result<Vec<Section>, SourceError>;
}

/// In-memory source, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    files: Vec<(String, String)>,
}

impl InMemorySource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file. Files are discovered in insertion order.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>, text: impl Into<String>) -> Self {
        self.files.push((path.into(), text.into()));
        self
    }
}

impl ConfigSource for InMemorySource {
    fn discover(&self) -> Vec<String> {
        self.files.iter().map(|(path, _)| path.clone()).collect()
    }

    fn read(&self, path: &str) -> Result<Vec<Section>, SourceError> {
        self.files
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, text)| parse_sections(text))
            .ok_or_else(|| SourceError::Unreadable {
                path: PathBuf::from(path),
                reason: "no such in-memory file".to_string(),
            })
    }
}

/// Finds `*<suffix>.<extension>` files in a directory, sorted by file name.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
    suffix: String,
    extension: String,
}

impl DirectorySource {
    /// Creates a source over `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, suffix: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            suffix: suffix.into(),
            extension: extension.into(),
        }
    }

    /// Creates a source from the config's directory settings.
    #[must_use]
    pub fn from_config(config: &ManagerConfig) -> Self {
        Self::new(&config.data_dir, &config.suffix, &config.extension)
    }

    fn matches(&self, path: &Path) -> bool {
        let has_extension = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension));
        let has_suffix = path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.to_ascii_lowercase().ends_with(&self.suffix.to_ascii_lowercase()));
        has_extension && has_suffix
    }
}

impl ConfigSource for DirectorySource {
    fn discover(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("couldn't list {}: {err}", self.dir.display());
                return Vec::new();
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && self.matches(path))
            .collect();
        paths.sort_by_key(|path| path.file_name().map(|n| n.to_ascii_lowercase()));
        paths.into_iter().map(|p| p.to_string_lossy().into_owned()).collect()
    }

    fn read(&self, path: &str) -> Result<Vec<Section>, SourceError> {
        let text = fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: PathBuf::from(path),
            source,
        })?;
        Ok(parse_sections(&text))
    }
}
