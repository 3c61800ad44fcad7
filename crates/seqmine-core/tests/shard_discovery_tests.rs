use std::fs;

use seqmine_core::{MineError, ShardLayout, ShardPath, list_shards};
use tempfile::TempDir;

#[test]
fn lists_extensionless_files_sorted() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    for name in ["part-00002", "part-00000", "part-00001"] {
        fs::write(dir.path().join(name), b"")?;
    }

    let shards = list_shards(dir.path())?;
    let expected: Vec<ShardPath> = ["part-00000", "part-00001", "part-00002"]
        .iter()
        .map(|name| ShardPath::new(dir.path().join(name)))
        .collect();
    assert_eq!(shards, expected);

    Ok(())
}

#[test]
fn skips_hidden_underscored_and_nested_entries() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    fs::write(dir.path().join("part-00000"), b"")?;
    fs::write(dir.path().join("_SUCCESS"), b"")?;
    fs::write(dir.path().join(".part-00000.crc"), b"")?;
    fs::write(dir.path().join("_logs.txt"), b"")?;
    fs::create_dir(dir.path().join("nested"))?;
    fs::write(dir.path().join("nested").join("part-00001"), b"")?;

    let shards = list_shards(dir.path())?;
    assert_eq!(shards, vec![ShardPath::new(dir.path().join("part-00000"))]);

    Ok(())
}

#[test]
fn empty_directory_yields_no_shards() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    assert!(list_shards(dir.path())?.is_empty());
    Ok(())
}

#[test]
fn dotted_name_fails_the_whole_listing() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    fs::write(dir.path().join("part-00000"), b"")?;
    fs::write(dir.path().join("1abc.json"), b"{}")?;

    match list_shards(dir.path()) {
        Err(MineError::AmbiguousShardFile { path }) => {
            assert_eq!(path, dir.path().join("1abc.json"));
        }
        other => panic!("unexpected result: {other:?}"),
    }

    Ok(())
}

#[test]
fn missing_directory_is_invalid() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let missing = dir.path().join("missing");

    let error = list_shards(&missing).expect_err("missing corpus must fail");
    assert!(matches!(error, MineError::InvalidCorpusDirectory { .. }));
    assert!(error.is_configuration());

    Ok(())
}

#[test]
fn regular_file_is_not_a_corpus_directory() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let file = dir.path().join("part-00000");
    fs::write(&file, b"")?;

    assert!(matches!(
        list_shards(&file),
        Err(MineError::InvalidCorpusDirectory { .. })
    ));

    Ok(())
}

#[test]
fn layout_resolves_identifiers_under_two_character_prefix() -> Result<(), Box<dyn std::error::Error>>
{
    let layout = ShardLayout::new("/data/corpus");
    let shards = layout.resolve_all(["1ABC", "9XYZ"])?;
    assert_eq!(
        shards,
        vec![
            ShardPath::new("/data/corpus/1A/1ABC"),
            ShardPath::new("/data/corpus/9X/9XYZ"),
        ]
    );

    assert!(matches!(
        layout.resolve("1AB.C"),
        Err(MineError::InvalidIdentifier(_))
    ));

    Ok(())
}
