//! Corpus resolution: which containers to read and which records to keep.

pub mod discovery;
pub mod filter;
pub mod layout;

pub use discovery::list_shards;
pub use filter::{
    DEFAULT_EXCLUDED_ENTRIES, EXCLUDE_NOTHING_SENTINEL, EntryFilter, ExclusionSource,
    read_entries_file,
};
pub use layout::ShardLayout;
