use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid corpus directory {path}: {reason}")]
    InvalidCorpusDirectory { path: PathBuf, reason: String },
    #[error("ambiguous shard file {path}: container files must not carry an extension")]
    AmbiguousShardFile { path: PathBuf },
    #[error("unreadable entries file {path}: {reason}")]
    EntriesFile { path: PathBuf, reason: String },
    #[error("invalid record identifier {0:?}")]
    InvalidIdentifier(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("malformed archive: {0}")]
    MalformedArchive(&'static str),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error("worker pool is shut down; no new work accepted")]
    PoolClosed,
    #[error("worker thread panicked: {0}")]
    WorkerPanicked(String),
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<MineError>,
    },
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl MineError {
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// True for errors that are reported before any scheduling starts.
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::InvalidCorpusDirectory { .. }
            | Self::AmbiguousShardFile { .. }
            | Self::EntriesFile { .. }
            | Self::InvalidIdentifier(_)
            | Self::InvalidConfig(_) => true,
            Self::Context { source, .. } => source.is_configuration(),
            _ => false,
        }
    }
}

/// A payload that could not be turned into a structured record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("decode failed: {message}")]
pub struct DecodeError {
    pub message: String,
}

impl DecodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure raised by a caller-supplied analysis.
///
/// The variant is logged with every skipped record so that data-quality
/// problems (`OutOfRange`, `TooLong`) can be told apart from code bugs
/// (`Failed`, `Panicked`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("value out of expected range: {0}")]
    OutOfRange(String),
    #[error("value too long to represent: {0}")]
    TooLong(String),
    #[error("analysis failed: {0}")]
    Failed(String),
    #[error("analysis panicked: {0}")]
    Panicked(String),
}

impl AnalysisError {
    /// Stable label used in log lines and run statistics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OutOfRange(_) => "out_of_range",
            Self::TooLong(_) => "too_long",
            Self::Failed(_) => "failed",
            Self::Panicked(_) => "panicked",
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
