use std::fs;
use std::path::Path;

use jwalk::WalkDir;

use crate::MineError;
use crate::types::{Result, ShardPath};

/// Lists the container files making up a corpus directory.
///
/// Only regular files directly inside `directory` are considered, and names
/// starting with `_` or `.` are ignored. Containers carry no extension, so any
/// accepted name containing a `.` fails the whole call with
/// [`MineError::AmbiguousShardFile`]; this catches a corpus path that points at
/// decoded or derived files by mistake.
///
/// The returned paths are sorted and unique.
pub fn list_shards(directory: impl AsRef<Path>) -> Result<Vec<ShardPath>> {
    let directory = directory.as_ref();
    let metadata = fs::metadata(directory).map_err(|error| invalid_directory(directory, error))?;
    if !metadata.is_dir() {
        return Err(MineError::InvalidCorpusDirectory {
            path: directory.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }

    let walker = WalkDir::new(directory)
        .max_depth(1)
        .skip_hidden(false)
        .follow_links(false)
        .sort(true);

    let mut shards = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|error| invalid_directory(directory, error))?;
        if entry.depth == 0 || !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if is_ignored(&name) {
            continue;
        }

        let path = entry.path();
        if name.contains('.') {
            return Err(MineError::AmbiguousShardFile { path });
        }
        shards.push(ShardPath::new(path));
    }

    shards.sort();
    shards.dedup();
    Ok(shards)
}

fn is_ignored(name: &str) -> bool {
    name.starts_with('_') || name.starts_with('.')
}

fn invalid_directory(directory: &Path, error: impl std::fmt::Display) -> MineError {
    MineError::InvalidCorpusDirectory {
        path: directory.to_path_buf(),
        reason: error.to_string(),
    }
}
