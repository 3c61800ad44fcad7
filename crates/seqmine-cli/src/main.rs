use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use bytes::Bytes;
use clap::{Parser, Subcommand, ValueEnum};
use seqmine_core::{
    AnalysisError, ArchiveReader, BatchEngine, CorpusSource, CountCombiner, EngineConfig,
    ExclusionSource, LineFormatter, RawDecoder, RecordKey, RunStats, SequenceWriter,
    StreamCombiner, Strategy,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "seqmine",
    version,
    about = "Sequence-archive record miner",
    long_about = "Scan, inspect and build sequence-archive containers of structure records."
)]
struct Cli {
    /// Raise log verbosity to debug (RUST_LOG overrides).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a batch pass over every record of a corpus.
    Scan {
        /// Corpus directory (flat container files, or the layout root with --ids).
        corpus: PathBuf,

        /// Entries file naming the identifiers to resolve under <corpus>/<ab>/<id>.
        #[arg(long)]
        ids: Option<PathBuf>,

        /// Number of worker threads (defaults to CPU count).
        #[arg(long, default_value_t = num_cpus::get())]
        workers: usize,

        /// Upper bound for pool growth (defaults to --workers).
        #[arg(long)]
        max_workers: Option<usize>,

        /// Scheduling strategy.
        #[arg(long, value_enum, default_value_t = StrategyArg::Pool)]
        strategy: StrategyArg,

        /// Rounds per worker for the static strategy.
        #[arg(long, default_value_t = 1)]
        chunk: usize,

        /// Only keep records listed in this entries file.
        #[arg(long)]
        include: Option<PathBuf>,

        /// Drop records listed in this entries file ("*none*" keeps everything).
        #[arg(long)]
        exclude: Option<String>,

        /// What to print for the accepted records.
        #[arg(long, value_enum, default_value_t = ModeArg::Count)]
        mode: ModeArg,

        /// Write the run statistics as JSON to this path ("-" for stderr).
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// List the frames of one container.
    Inspect {
        /// Container file to read.
        container: PathBuf,
    },
    /// Build a container from a directory of payload files named by identifier.
    Pack {
        /// Destination container path.
        output: PathBuf,

        /// Directory whose files become records; each file name is the key.
        input: PathBuf,

        /// Emit a resync marker after this many records (0 disables).
        #[arg(long, default_value_t = 0)]
        sync_every: u64,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    Pool,
    Static,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Count accepted records per layout prefix.
    Count,
    /// Print every accepted key with its payload size, in completion order.
    List,
}

const PACK_SYNC_HASH: [u8; 16] = *b"seqmine-sync-v01";

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Scan {
            corpus,
            ids,
            workers,
            max_workers,
            strategy,
            chunk,
            include,
            exclude,
            mode,
            report,
        } => {
            let corpus = match ids {
                Some(path) => CorpusSource::IdentifierFile { root: corpus, path },
                None => CorpusSource::Directory(corpus),
            };
            let strategy = match strategy {
                StrategyArg::Pool => Strategy::Pool,
                StrategyArg::Static => Strategy::Static { chunk },
            };
            let mut config = EngineConfig::new(corpus)
                .with_workers(workers)
                .with_strategy(strategy)
                .with_exclusion(ExclusionSource::from_arg(exclude.as_deref()));
            if let Some(max_workers) = max_workers {
                config = config.with_max_workers(max_workers);
            }
            if let Some(include) = include {
                config = config.with_include_file(include);
            }

            scan_command(config, mode, report.as_deref())?
        }
        Commands::Inspect { container } => inspect_command(&container)?,
        Commands::Pack {
            output,
            input,
            sync_every,
        } => pack_command(&output, &input, sync_every)?,
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn scan_command(config: EngineConfig, mode: ModeArg, report: Option<&Path>) -> anyhow::Result<()> {
    let engine = BatchEngine::new(config)?;

    let stats = match mode {
        ModeArg::Count => {
            let mut combiner = CountCombiner::new();
            let stats = engine.run(RawDecoder, count_by_prefix, &mut combiner)?;

            let stdout = io::stdout();
            let mut out = stdout.lock();
            for (prefix, count) in combiner.counts() {
                writeln!(out, "{prefix}\t{count}")?;
            }
            writeln!(out, "total\t{}", combiner.total())?;
            stats
        }
        ModeArg::List => {
            let stdout = io::stdout();
            let mut combiner: StreamCombiner<_, LineFormatter<_, usize>> =
                StreamCombiner::lines(BufWriter::new(stdout.lock()));
            let stats = engine.run(RawDecoder, payload_size, &mut combiner)?;
            combiner.into_inner()?;
            stats
        }
    };

    eprintln!(
        "scanned {} containers ({} failed) in {}: {} records, {} filtered, {} decode failures, {} analysis failures",
        stats.shards_completed,
        stats.shards_failed,
        format_duration(stats.elapsed),
        stats.records_analyzed,
        stats.frames_filtered,
        stats.decode_failures,
        stats.analysis_failures.total(),
    );

    if let Some(path) = report {
        write_report(&stats, path)?;
    }

    Ok(())
}

fn count_by_prefix(_payload: Bytes, key: &RecordKey) -> Result<[(String, u64); 1], AnalysisError> {
    let prefix: String = key.as_str().chars().take(2).collect();
    Ok([(prefix, 1)])
}

fn payload_size(payload: Bytes, _key: &RecordKey) -> Result<usize, AnalysisError> {
    Ok(payload.len())
}

fn write_report(stats: &RunStats, path: &Path) -> anyhow::Result<()> {
    if path == Path::new("-") {
        serde_json::to_writer_pretty(io::stderr().lock(), stats)?;
        eprintln!();
        return Ok(());
    }

    let file = File::create(path)
        .with_context(|| format!("failed to create report {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), stats)?;
    Ok(())
}

fn inspect_command(container: &Path) -> anyhow::Result<()> {
    let mut reader = ArchiveReader::open(container)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut payload_bytes = 0u64;
    for frame in reader.frames() {
        let frame = frame?;
        payload_bytes += frame.payload.len() as u64;
        writeln!(out, "{}\t{}", frame.key, frame.payload.len())?;
    }

    eprintln!(
        "{}: {} frames, {} payload bytes, {} sync markers",
        container.display(),
        reader.frames_read(),
        payload_bytes,
        reader.markers_skipped()
    );
    Ok(())
}

fn pack_command(output: &Path, input: &Path, sync_every: u64) -> anyhow::Result<()> {
    if !input.is_dir() {
        bail!("{} is not a directory", input.display());
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(input)
        .with_context(|| format!("failed to read {}", input.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(key) = name.to_str() else {
            bail!("{} is not a valid identifier", entry.path().display());
        };
        if key.starts_with('.') || key.starts_with('_') {
            continue;
        }
        entries.push((key.to_string(), entry.path()));
    }
    entries.sort();

    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    let mut writer = SequenceWriter::new(BufWriter::new(file), PACK_SYNC_HASH)?;

    for (key, path) in &entries {
        let payload =
            fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        writer
            .append(key, &payload)
            .with_context(|| format!("failed to pack {}", path.display()))?;
        if sync_every > 0 && writer.records_written() % sync_every == 0 {
            writer.sync()?;
        }
    }

    let records = writer.records_written();
    writer.finish()?.flush()?;
    eprintln!("packed {records} records into {}", output.display());
    Ok(())
}

fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis >= 1_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{millis}ms")
    }
}
