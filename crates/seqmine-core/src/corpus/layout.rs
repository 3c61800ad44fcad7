use std::path::{Path, PathBuf};

use crate::MineError;
use crate::types::{Result, ShardPath};

/// Two-level directory layout keyed by the first two characters of an
/// identifier: `1abc` lives at `<root>/1a/1abc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardLayout {
    root: PathBuf,
}

impl ShardLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves the container path of one identifier.
    pub fn resolve(&self, id: &str) -> Result<ShardPath> {
        validate_identifier(id)?;
        let prefix = &id[..2];
        Ok(ShardPath::new(self.root.join(prefix).join(id)))
    }

    pub fn resolve_all<'a, I>(&self, ids: I) -> Result<Vec<ShardPath>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        ids.into_iter().map(|id| self.resolve(id)).collect()
    }
}

fn validate_identifier(id: &str) -> Result<()> {
    let valid = id.len() >= 2
        && id
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-');
    if valid {
        Ok(())
    } else {
        Err(MineError::InvalidIdentifier(id.to_string()))
    }
}
