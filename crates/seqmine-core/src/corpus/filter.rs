use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::MineError;
use crate::types::Result;

/// Exclusion-file value meaning "exclude nothing".
pub const EXCLUDE_NOTHING_SENTINEL: &str = "*none*";

/// Entries excluded when no exclusion file is configured.
///
/// Very large assemblies whose analysis can stall a worker for hours; there is
/// no per-record timeout, so keeping them out of default runs is the only
/// guard.
pub const DEFAULT_EXCLUDED_ENTRIES: &[&str] = &[
    "1VY4", "1VY5", "1VY6", "1VY7", "3J3Q", "3J3Y", "4UG0", "4V4B", "4V4G", "4V6X", "4V88",
    "4V8M", "4V9D", "5J7V", "5T2C", "6EK0", "6QZP", "6ZJ3", "7K00", "7A5G",
];

/// Where the exclusion set of a run comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExclusionSource {
    /// [`DEFAULT_EXCLUDED_ENTRIES`].
    #[default]
    Default,
    /// Exclude nothing.
    Nothing,
    /// Identifiers listed in a file.
    File(PathBuf),
}

impl ExclusionSource {
    /// Maps an optional command-line value onto a source; `*none*` disables
    /// exclusion entirely.
    pub fn from_arg(value: Option<&str>) -> Self {
        match value {
            None => Self::Default,
            Some(EXCLUDE_NOTHING_SENTINEL) => Self::Nothing,
            Some(path) => Self::File(PathBuf::from(path)),
        }
    }
}

/// Inclusion/exclusion predicate over record identifiers.
///
/// An empty include set accepts everything; an empty exclude set rejects
/// nothing. Built once per run and shared read-only between workers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
    include: HashSet<String>,
    exclude: HashSet<String>,
}

impl EntryFilter {
    pub fn new<I, E, S, T>(include: I, exclude: E) -> Self
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            include: include.into_iter().map(Into::into).collect(),
            exclude: exclude.into_iter().map(Into::into).collect(),
        }
    }

    /// Filter accepting every key.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Builds the filter of a run from an optional inclusion file and an
    /// exclusion source.
    pub fn from_sources(include_file: Option<&Path>, exclusion: &ExclusionSource) -> Result<Self> {
        let include = match include_file {
            Some(path) => read_entries_file(path)?,
            None => Vec::new(),
        };
        let exclude = match exclusion {
            ExclusionSource::Default => DEFAULT_EXCLUDED_ENTRIES
                .iter()
                .map(|entry| entry.to_string())
                .collect(),
            ExclusionSource::Nothing => Vec::new(),
            ExclusionSource::File(path) => read_entries_file(path)?,
        };

        Ok(Self::new(include, exclude))
    }

    pub fn accepts(&self, key: &str) -> bool {
        (self.include.is_empty() || self.include.contains(key))
            && (self.exclude.is_empty() || !self.exclude.contains(key))
    }

    pub fn include_len(&self) -> usize {
        self.include.len()
    }

    pub fn exclude_len(&self) -> usize {
        self.exclude.len()
    }
}

/// Reads identifiers from an entries file.
///
/// Identifiers are whitespace separated; `#` starts a comment that runs to the
/// end of the line. Order of first appearance is kept and duplicates dropped.
pub fn read_entries_file(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|error| MineError::EntriesFile {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })?;

    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    for line in contents.lines() {
        let line = line.split('#').next().unwrap_or_default();
        for token in line.split_whitespace() {
            if seen.insert(token) {
                entries.push(token.to_string());
            }
        }
    }

    Ok(entries)
}
