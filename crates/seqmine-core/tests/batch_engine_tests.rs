use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use seqmine_core::{
    AnalysisError, BatchEngine, CollectCombiner, CorpusSource, CountCombiner, DecodeError,
    EngineConfig, ExclusionSource, MAX_STATIC_CHUNK, MineError, RecordKey, SequenceWriter,
    Strategy, WorkerTelemetry,
};
use tempfile::TempDir;

const SYNC_HASH: [u8; 16] = [0x5A; 16];

enum Entry {
    Record(&'static str, &'static str),
    Marker,
}

fn write_container(path: &Path, entries: &[Entry]) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = SequenceWriter::new(File::create(path)?, SYNC_HASH)?;
    for entry in entries {
        match entry {
            Entry::Record(key, payload) => writer.append(key, payload.as_bytes())?,
            Entry::Marker => writer.sync()?,
        }
    }
    writer.finish()?;
    Ok(())
}

/// Five containers covering every failure class: a decode failure, an
/// out-of-range and a panicking analysis, a default-excluded entry, a
/// too-long analysis, a truncated container and an empty one.
fn build_corpus() -> Result<TempDir, Box<dyn std::error::Error>> {
    use Entry::{Marker, Record};

    let dir = TempDir::new()?;
    let root = dir.path();
    write_container(
        &root.join("part-00000"),
        &[Record("1AAA", "1"), Record("1AAB", "2"), Record("1AAC", "bad")],
    )?;
    write_container(
        &root.join("part-00001"),
        &[Record("2AAA", "3"), Marker, Record("2AAB", "7"), Record("2AAC", "13")],
    )?;
    write_container(
        &root.join("part-00002"),
        &[Record("3AAA", "4"), Record("4V6X", "5"), Record("3AAB", "5000")],
    )?;

    let truncated = root.join("part-00003");
    write_container(&truncated, &[Record("5AAA", "6"), Record("5AAB", "8")])?;
    let bytes = fs::read(&truncated)?;
    fs::write(&truncated, &bytes[..bytes.len() - 1])?;

    write_container(&root.join("part-00004"), &[])?;
    fs::write(root.join("_SUCCESS"), b"")?;
    Ok(dir)
}

fn decode_number(payload: Bytes) -> Result<u64, DecodeError> {
    std::str::from_utf8(&payload)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| DecodeError::new("payload is not a number"))
}

fn parity(value: u64, _key: &RecordKey) -> Result<Vec<(&'static str, u64)>, AnalysisError> {
    match value {
        7 => Err(AnalysisError::OutOfRange(format!("{value} is unlucky"))),
        13 => panic!("analysis cannot handle {value}"),
        value if value > 1_000 => Err(AnalysisError::TooLong(value.to_string())),
        value => {
            let bucket = if value % 2 == 0 { "even" } else { "odd" };
            Ok(vec![(bucket, 1), ("sum", value)])
        }
    }
}

fn expected_counts() -> BTreeMap<&'static str, u64> {
    BTreeMap::from([("even", 3), ("odd", 2), ("sum", 16)])
}

#[test]
fn identical_results_for_every_strategy_and_thread_count() -> Result<(), Box<dyn std::error::Error>>
{
    let corpus = build_corpus()?;
    let strategies = [
        Strategy::Pool,
        Strategy::Static { chunk: 1 },
        Strategy::Static { chunk: 3 },
    ];

    for strategy in strategies {
        for workers in [1, 2, 8] {
            let config = EngineConfig::new(CorpusSource::Directory(corpus.path().to_path_buf()))
                .with_workers(workers)
                .with_strategy(strategy);
            let engine = BatchEngine::new(config)?;
            let mut combiner = CountCombiner::new();
            let stats = engine.run(decode_number, parity, &mut combiner)?;

            let context = format!("{strategy:?} with {workers} workers");
            assert_eq!(combiner.counts(), &expected_counts(), "{context}");
            assert_eq!(stats.workers, workers, "{context}");
            assert_eq!(stats.shards_total, 5, "{context}");
            assert_eq!(stats.shards_completed, 4, "{context}");
            assert_eq!(stats.shards_failed, 1, "{context}");
            assert_eq!(stats.frames_read, 10, "{context}");
            assert_eq!(stats.frames_filtered, 1, "{context}");
            assert_eq!(stats.records_decoded, 8, "{context}");
            assert_eq!(stats.decode_failures, 1, "{context}");
            assert_eq!(stats.records_analyzed, 5, "{context}");
            assert_eq!(stats.analysis_failures.out_of_range, 1, "{context}");
            assert_eq!(stats.analysis_failures.too_long, 1, "{context}");
            assert_eq!(stats.analysis_failures.panicked, 1, "{context}");
            assert_eq!(stats.analysis_failures.total(), 3, "{context}");
            assert_eq!(stats.partials_merged, 5, "{context}");
            assert_eq!(stats.worker_partials.iter().sum::<u64>(), 5, "{context}");
        }
    }

    Ok(())
}

#[test]
fn every_accepted_record_is_merged_exactly_once() -> Result<(), Box<dyn std::error::Error>> {
    let corpus = build_corpus()?;
    let config = EngineConfig::new(CorpusSource::Directory(corpus.path().to_path_buf()))
        .with_workers(3)
        .with_exclusion(ExclusionSource::Nothing);
    let engine = BatchEngine::new(config)?;

    let mut combiner = CollectCombiner::new();
    let identity = |value: u64, _key: &RecordKey| Ok(value);
    let stats = engine.run(decode_number, identity, &mut combiner)?;

    let mut keys: Vec<String> = combiner
        .items()
        .iter()
        .map(|(key, _)| key.to_string())
        .collect();
    keys.sort();
    assert_eq!(
        keys,
        vec!["1AAA", "1AAB", "2AAA", "2AAB", "2AAC", "3AAA", "3AAB", "4V6X", "5AAA"]
    );
    assert_eq!(stats.frames_filtered, 0);
    Ok(())
}

#[test]
fn include_and_exclude_files_restrict_records() -> Result<(), Box<dyn std::error::Error>> {
    let corpus = build_corpus()?;
    let lists = TempDir::new()?;
    let include = lists.path().join("include.txt");
    let exclude = lists.path().join("exclude.txt");
    fs::write(&include, "1AAA 1AAB\n2AAA # third\n")?;
    fs::write(&exclude, "1AAB\n")?;

    let config = EngineConfig::new(CorpusSource::Directory(corpus.path().to_path_buf()))
        .with_workers(2)
        .with_include_file(&include)
        .with_exclusion(ExclusionSource::File(exclude));
    let engine = BatchEngine::new(config)?;
    let mut combiner = CountCombiner::new();
    let stats = engine.run(decode_number, parity, &mut combiner)?;

    assert_eq!(
        combiner.counts(),
        &BTreeMap::from([("odd", 2), ("sum", 4)])
    );
    assert_eq!(stats.records_analyzed, 2);
    assert_eq!(stats.frames_filtered, 8);
    Ok(())
}

#[test]
fn identifier_corpus_uses_two_level_layout() -> Result<(), Box<dyn std::error::Error>> {
    let root = TempDir::new()?;
    for (id, payload) in [("1ABC", "10"), ("1ABD", "11"), ("2XYZ", "12")] {
        let directory = root.path().join(&id[..2]);
        fs::create_dir_all(&directory)?;
        write_container(&directory.join(id), &[Entry::Record(id, payload)])?;
    }

    let config = EngineConfig::new(CorpusSource::Identifiers {
        root: root.path().to_path_buf(),
        ids: vec!["1ABC".to_string(), "2XYZ".to_string()],
    })
    .with_workers(2)
    .with_strategy(Strategy::Static { chunk: 1 });
    let engine = BatchEngine::new(config)?;
    let mut combiner = CountCombiner::new();
    let stats = engine.run(decode_number, parity, &mut combiner)?;

    assert_eq!(
        combiner.counts(),
        &BTreeMap::from([("even", 2), ("sum", 22)])
    );
    assert_eq!(stats.shards_total, 2);
    Ok(())
}

#[test]
fn missing_identifier_container_fails_only_that_container() -> Result<(), Box<dyn std::error::Error>>
{
    let root = TempDir::new()?;
    let list = root.path().join("ids.txt");
    fs::create_dir_all(root.path().join("1A"))?;
    write_container(&root.path().join("1A").join("1ABC"), &[Entry::Record("1ABC", "2")])?;
    fs::write(&list, "1ABC\n9ZZZ\n")?;

    let config = EngineConfig::new(CorpusSource::IdentifierFile {
        root: root.path().to_path_buf(),
        path: list,
    })
    .with_workers(2);
    let engine = BatchEngine::new(config)?;
    let mut combiner = CountCombiner::new();
    let stats = engine.run(decode_number, parity, &mut combiner)?;

    assert_eq!(combiner.get(&"even"), 1);
    assert_eq!(stats.shards_completed, 1);
    assert_eq!(stats.shards_failed, 1);
    Ok(())
}

#[test]
fn configuration_errors_surface_before_any_work() -> Result<(), Box<dyn std::error::Error>> {
    let corpus = build_corpus()?;
    let analyzed = Arc::new(AtomicBool::new(false));
    let analysis = {
        let analyzed = Arc::clone(&analyzed);
        move |value: u64, _key: &RecordKey| {
            analyzed.store(true, Ordering::Release);
            Ok::<u64, AnalysisError>(value)
        }
    };

    let missing_corpus = EngineConfig::new(CorpusSource::Directory(corpus.path().join("missing")));
    let error = BatchEngine::new(missing_corpus)?
        .run(decode_number, analysis.clone(), &mut CollectCombiner::new())
        .expect_err("missing corpus must fail");
    assert!(matches!(error, MineError::InvalidCorpusDirectory { .. }));

    let missing_include = EngineConfig::new(CorpusSource::Directory(corpus.path().to_path_buf()))
        .with_include_file(corpus.path().join("no-such-list.txt"));
    let error = BatchEngine::new(missing_include)?
        .run(decode_number, analysis.clone(), &mut CollectCombiner::new())
        .expect_err("missing include file must fail");
    assert!(matches!(error, MineError::EntriesFile { .. }));

    fs::write(corpus.path().join("stray.json"), b"{}")?;
    let ambiguous = EngineConfig::new(CorpusSource::Directory(corpus.path().to_path_buf()));
    let error = BatchEngine::new(ambiguous)?
        .run(decode_number, analysis, &mut CollectCombiner::new())
        .expect_err("dotted corpus file must fail");
    assert!(matches!(error, MineError::AmbiguousShardFile { .. }));
    assert!(error.is_configuration());

    assert!(!analyzed.load(Ordering::Acquire));
    Ok(())
}

#[test]
fn invalid_settings_are_rejected_at_construction() {
    let zero_chunk = EngineConfig::new(CorpusSource::Directory("corpus".into()))
        .with_strategy(Strategy::Static { chunk: 0 });
    assert!(matches!(
        BatchEngine::new(zero_chunk),
        Err(MineError::InvalidConfig(_))
    ));

    let empty_path = EngineConfig::new(CorpusSource::Directory("".into()));
    assert!(matches!(
        BatchEngine::new(empty_path),
        Err(MineError::InvalidConfig(_))
    ));

    let huge_chunk = EngineConfig::new(CorpusSource::Directory("corpus".into()))
        .with_workers(8)
        .with_strategy(Strategy::Static { chunk: 1_000_000_000 });
    assert!(matches!(
        BatchEngine::new(huge_chunk),
        Err(MineError::InvalidConfig("static chunk factor is too large"))
    ));

    let largest_chunk = EngineConfig::new(CorpusSource::Directory("corpus".into()))
        .with_workers(8)
        .with_strategy(Strategy::Static { chunk: MAX_STATIC_CHUNK });
    assert!(BatchEngine::new(largest_chunk).is_ok());
}

#[derive(Default)]
struct CountingTelemetry {
    started: AtomicUsize,
    finished: AtomicUsize,
}

impl WorkerTelemetry for CountingTelemetry {
    fn on_queue_depth(&self, _worker_id: usize, _depth: usize) {}

    fn on_task_started(&self, _worker_id: usize, _task_kind: &str) {
        self.started.fetch_add(1, Ordering::AcqRel);
    }

    fn on_task_finished(&self, _worker_id: usize, _task_kind: &str, _elapsed: Duration) {
        self.finished.fetch_add(1, Ordering::AcqRel);
    }

    fn on_task_failed(&self, _worker_id: usize, _task_kind: &str, _elapsed: Duration) {}
}

#[test]
fn custom_telemetry_sees_one_task_per_container() -> Result<(), Box<dyn std::error::Error>> {
    let corpus = build_corpus()?;

    for strategy in [Strategy::Pool, Strategy::Static { chunk: 2 }] {
        let telemetry = Arc::new(CountingTelemetry::default());
        let config = EngineConfig::new(CorpusSource::Directory(corpus.path().to_path_buf()))
            .with_workers(2)
            .with_strategy(strategy);
        let engine = BatchEngine::new(config)?.with_telemetry(telemetry.clone());
        engine.run(decode_number, parity, &mut CountCombiner::new())?;

        assert_eq!(telemetry.started.load(Ordering::Acquire), 5, "{strategy:?}");
        assert_eq!(telemetry.finished.load(Ordering::Acquire), 5, "{strategy:?}");
    }

    Ok(())
}

#[test]
fn run_stats_serialize_for_reports() -> Result<(), Box<dyn std::error::Error>> {
    let corpus = build_corpus()?;
    let config =
        EngineConfig::new(CorpusSource::Directory(corpus.path().to_path_buf())).with_workers(2);
    let stats = BatchEngine::new(config)?.run(decode_number, parity, &mut CountCombiner::new())?;

    assert_eq!(stats.strategy, "pool");
    assert_eq!(stats.worker_partials.len(), 2);

    let report = serde_json::to_value(&stats)?;
    assert_eq!(report["shards_total"], 5);
    assert_eq!(report["analysis_failures"]["panicked"], 1);
    Ok(())
}
