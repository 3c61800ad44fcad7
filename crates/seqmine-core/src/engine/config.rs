use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::MineError;
use crate::core::MAX_STATIC_CHUNK;
use crate::corpus::{ExclusionSource, ShardLayout, list_shards, read_entries_file};
use crate::types::{Result, ShardPath};

/// Where the containers of a run come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorpusSource {
    /// Every extensionless container directly inside a directory.
    Directory(PathBuf),
    /// Explicit identifiers resolved through the two-level [`ShardLayout`].
    Identifiers { root: PathBuf, ids: Vec<String> },
    /// Identifiers read from an entries file, resolved like `Identifiers`.
    IdentifierFile { root: PathBuf, path: PathBuf },
}

impl CorpusSource {
    /// Resolves the container list. Fails before any work is scheduled.
    pub fn resolve(&self) -> Result<Vec<ShardPath>> {
        match self {
            Self::Directory(directory) => list_shards(directory),
            Self::Identifiers { root, ids } => {
                ensure_directory(root)?;
                ShardLayout::new(root).resolve_all(ids.iter().map(String::as_str))
            }
            Self::IdentifierFile { root, path } => {
                ensure_directory(root)?;
                let ids = read_entries_file(path)?;
                ShardLayout::new(root).resolve_all(ids.iter().map(String::as_str))
            }
        }
    }
}

/// Scheduling strategy of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    /// Dynamic pool pulling one task per container from a shared queue.
    #[default]
    Pool,
    /// Partition-and-join over `workers * chunk` slices.
    Static { chunk: usize },
}

/// Settings consumed by [`super::BatchEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub corpus: CorpusSource,
    /// Worker threads; 0 selects the number of logical CPUs.
    pub workers: usize,
    /// Upper bound for pool growth; `None` keeps the pool at `workers`.
    pub max_workers: Option<usize>,
    pub strategy: Strategy,
    pub include_file: Option<PathBuf>,
    pub exclusion: ExclusionSource,
}

impl EngineConfig {
    pub fn new(corpus: CorpusSource) -> Self {
        Self {
            corpus,
            workers: 0,
            max_workers: None,
            strategy: Strategy::Pool,
            include_file: None,
            exclusion: ExclusionSource::Default,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = Some(max_workers);
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_include_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.include_file = Some(path.into());
        self
    }

    pub fn with_exclusion(mut self, exclusion: ExclusionSource) -> Self {
        self.exclusion = exclusion;
        self
    }

    /// Worker count after resolving the `0 = all CPUs` default.
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get().max(1)
        } else {
            self.workers
        }
    }

    pub fn effective_max_workers(&self) -> usize {
        self.max_workers
            .unwrap_or(0)
            .max(self.effective_workers())
    }

    pub fn validate(&self) -> Result<()> {
        if let Strategy::Static { chunk } = self.strategy {
            if chunk == 0 {
                return Err(MineError::InvalidConfig("static chunk factor must be at least 1"));
            }
            if chunk > MAX_STATIC_CHUNK {
                return Err(MineError::InvalidConfig("static chunk factor is too large"));
            }
            if self.effective_workers().checked_mul(chunk).is_none() {
                return Err(MineError::InvalidConfig("static slice count overflows"));
            }
        }
        if self.include_file.as_deref().is_some_and(is_empty_path) {
            return Err(MineError::InvalidConfig("include file path is empty"));
        }
        if let ExclusionSource::File(path) = &self.exclusion {
            if is_empty_path(path) {
                return Err(MineError::InvalidConfig("exclude file path is empty"));
            }
        }

        let corpus_root = match &self.corpus {
            CorpusSource::Directory(path) => path,
            CorpusSource::Identifiers { root, .. } | CorpusSource::IdentifierFile { root, .. } => {
                root
            }
        };
        if is_empty_path(corpus_root) {
            return Err(MineError::InvalidConfig("corpus path is empty"));
        }

        Ok(())
    }
}

fn is_empty_path(path: &Path) -> bool {
    path.as_os_str().is_empty()
}

fn ensure_directory(root: &Path) -> Result<()> {
    if root.is_dir() {
        Ok(())
    } else {
        Err(MineError::InvalidCorpusDirectory {
            path: root.to_path_buf(),
            reason: "not a directory".to_string(),
        })
    }
}
