//! Knowledge base backing deduplication and frequency-weighted selection.
//!
//! Records, per suite:
//! - suite metadata (creation time, end time, duration)
//! - completed sequences by fingerprint, to detect repeats
//! - per-event statistics: selection frequency and the terminal flag
//!
//! Every operation is scoped by suite id. Writes are durable when the call
//! returns, so reads in the same process see them immediately.

pub mod frequency;
pub mod memory;
pub mod sqlite;

use roamer_ir::Fingerprint;
use serde::{Deserialize, Serialize};

pub use frequency::FrequencyTable;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Suite not found: {0}")]
    NotFound(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Identity of a freshly created suite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteInfo {
    pub id: String,
    /// Unix seconds.
    pub creation_time: i64,
}

/// A persisted suite row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteRecord {
    pub id: String,
    pub creation_time: i64,
    pub end_time: Option<i64>,
    pub duration: Option<i64>,
}

/// Persistent store shared by the sequence generator, the suite generator
/// and the selection strategies.
///
/// `record_sequence` is idempotent: recording the same (suite, hash) twice
/// keeps the first row. `mark_terminal_event` and `bump_event_frequency`
/// share one statistic row per (suite, event); neither ever clears what the
/// other wrote.
pub trait KnowledgeBase: Send + Sync {
    fn create_suite(&self) -> Result<SuiteInfo, StoreError>;

    fn finalize_suite(&self, suite_id: &str, end_time: i64, duration: i64) -> Result<(), StoreError>;

    fn suite_details(&self, suite_id: &str) -> Result<SuiteRecord, StoreError>;

    fn record_sequence(
        &self,
        sequence_hash: &Fingerprint,
        suite_id: &str,
        creation_time: i64,
        duration: i64,
    ) -> Result<(), StoreError>;

    fn sequence_seen(&self, suite_id: &str, sequence_hash: &Fingerprint) -> Result<bool, StoreError>;

    /// Number of distinct sequences recorded for the suite.
    fn sequence_count(&self, suite_id: &str) -> Result<u64, StoreError>;

    fn mark_terminal_event(&self, event_hash: &Fingerprint, suite_id: &str) -> Result<(), StoreError>;

    fn is_terminal_event(&self, event_hash: &Fingerprint, suite_id: &str) -> Result<bool, StoreError>;

    fn bump_event_frequency(&self, event_hash: &Fingerprint, suite_id: &str) -> Result<(), StoreError>;

    /// Frequencies for the given hashes, in the given order. Unseen hashes map to 0.
    fn event_frequencies(
        &self,
        event_hashes: &[Fingerprint],
        suite_id: &str,
    ) -> Result<FrequencyTable, StoreError>;
}

/// Allocate a new suite identity stamped with the current wall-clock time.
pub(crate) fn new_suite_info() -> SuiteInfo {
    SuiteInfo {
        id: uuid::Uuid::new_v4().simple().to_string(),
        creation_time: chrono::Utc::now().timestamp(),
    }
}
