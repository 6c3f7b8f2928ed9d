use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use roamer_ir::Fingerprint;
use rusqlite::{params, Connection, OptionalExtension};

use crate::{new_suite_info, FrequencyTable, KnowledgeBase, StoreError, SuiteInfo, SuiteRecord};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS suites (
    id TEXT PRIMARY KEY,
    creation_time INTEGER NOT NULL,
    end_time INTEGER,
    duration INTEGER
);

CREATE TABLE IF NOT EXISTS sequences (
    hash TEXT NOT NULL,
    suite_id TEXT NOT NULL,
    creation_time INTEGER NOT NULL,
    duration INTEGER NOT NULL,
    PRIMARY KEY (suite_id, hash)
);

CREATE TABLE IF NOT EXISTS event_info (
    event_hash TEXT NOT NULL,
    suite_id TEXT NOT NULL,
    frequency INTEGER NOT NULL DEFAULT 0,
    is_terminal INTEGER NOT NULL DEFAULT 0,
    UNIQUE (event_hash, suite_id)
);
"#;

/// SQLite-backed knowledge base.
///
/// Each write is a single autocommit statement. The connection mutex
/// serializes read-modify-write of a statistic row.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// A private in-memory database.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Number of statistic rows for an event. Exposed for tests of the
    /// one-row-per-key guarantee.
    pub fn event_row_count(&self, event_hash: &Fingerprint, suite_id: &str) -> Result<u64, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM event_info WHERE event_hash = ?1 AND suite_id = ?2",
            params![event_hash.as_str(), suite_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

impl KnowledgeBase for SqliteStore {
    fn create_suite(&self) -> Result<SuiteInfo, StoreError> {
        let info = new_suite_info();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO suites (id, creation_time) VALUES (?1, ?2)",
            params![info.id, info.creation_time],
        )?;
        tracing::debug!(suite_id = %info.id, "created suite");
        Ok(info)
    }

    fn finalize_suite(&self, suite_id: &str, end_time: i64, duration: i64) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE suites SET end_time = ?2, duration = ?3 WHERE id = ?1",
            params![suite_id, end_time, duration],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(suite_id.to_string()));
        }
        Ok(())
    }

    fn suite_details(&self, suite_id: &str) -> Result<SuiteRecord, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, creation_time, end_time, duration FROM suites WHERE id = ?1",
            params![suite_id],
            |row| {
                Ok(SuiteRecord {
                    id: row.get(0)?,
                    creation_time: row.get(1)?,
                    end_time: row.get(2)?,
                    duration: row.get(3)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound(suite_id.to_string()))
    }

    fn record_sequence(
        &self,
        sequence_hash: &Fingerprint,
        suite_id: &str,
        creation_time: i64,
        duration: i64,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO sequences (hash, suite_id, creation_time, duration)
             VALUES (?1, ?2, ?3, ?4)",
            params![sequence_hash.as_str(), suite_id, creation_time, duration],
        )?;
        if inserted == 0 {
            tracing::debug!(%sequence_hash, "sequence already recorded");
        }
        Ok(())
    }

    fn sequence_seen(&self, suite_id: &str, sequence_hash: &Fingerprint) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM sequences WHERE suite_id = ?1 AND hash = ?2",
                params![suite_id, sequence_hash.as_str()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn sequence_count(&self, suite_id: &str) -> Result<u64, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sequences WHERE suite_id = ?1",
            params![suite_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn mark_terminal_event(&self, event_hash: &Fingerprint, suite_id: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO event_info (event_hash, suite_id, frequency, is_terminal)
             VALUES (?1, ?2, 1, 1)
             ON CONFLICT (event_hash, suite_id) DO UPDATE SET is_terminal = 1",
            params![event_hash.as_str(), suite_id],
        )?;
        Ok(())
    }

    fn is_terminal_event(&self, event_hash: &Fingerprint, suite_id: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let flag: Option<i64> = conn
            .query_row(
                "SELECT is_terminal FROM event_info WHERE event_hash = ?1 AND suite_id = ?2",
                params![event_hash.as_str(), suite_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(flag.unwrap_or(0) != 0)
    }

    fn bump_event_frequency(&self, event_hash: &Fingerprint, suite_id: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO event_info (event_hash, suite_id, frequency, is_terminal)
             VALUES (?1, ?2, 1, 0)
             ON CONFLICT (event_hash, suite_id) DO UPDATE SET frequency = frequency + 1",
            params![event_hash.as_str(), suite_id],
        )?;
        Ok(())
    }

    fn event_frequencies(
        &self,
        event_hashes: &[Fingerprint],
        suite_id: &str,
    ) -> Result<FrequencyTable, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT frequency FROM event_info WHERE event_hash = ?1 AND suite_id = ?2",
        )?;

        let mut table = FrequencyTable::new();
        for hash in event_hashes {
            let frequency: Option<i64> = stmt
                .query_row(params![hash.as_str(), suite_id], |row| row.get(0))
                .optional()?;
            table.insert(hash.clone(), frequency.unwrap_or(0) as u64);
        }
        Ok(table)
    }
}
