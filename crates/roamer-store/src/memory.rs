use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use roamer_ir::Fingerprint;

use crate::{new_suite_info, FrequencyTable, KnowledgeBase, StoreError, SuiteInfo, SuiteRecord};

#[derive(Debug, Clone, Copy, Default)]
struct EventStat {
    frequency: u64,
    is_terminal: bool,
}

#[derive(Debug, Default)]
struct Tables {
    suites: HashMap<String, SuiteRecord>,
    sequences: HashSet<(String, Fingerprint)>,
    events: HashMap<(String, Fingerprint), EventStat>,
}

/// In-process knowledge base with the same semantics as [`crate::SqliteStore`].
/// Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl KnowledgeBase for MemoryStore {
    fn create_suite(&self) -> Result<SuiteInfo, StoreError> {
        let info = new_suite_info();
        self.tables()?.suites.insert(
            info.id.clone(),
            SuiteRecord {
                id: info.id.clone(),
                creation_time: info.creation_time,
                end_time: None,
                duration: None,
            },
        );
        Ok(info)
    }

    fn finalize_suite(&self, suite_id: &str, end_time: i64, duration: i64) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        let suite = tables
            .suites
            .get_mut(suite_id)
            .ok_or_else(|| StoreError::NotFound(suite_id.to_string()))?;
        suite.end_time = Some(end_time);
        suite.duration = Some(duration);
        Ok(())
    }

    fn suite_details(&self, suite_id: &str) -> Result<SuiteRecord, StoreError> {
        self.tables()?
            .suites
            .get(suite_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(suite_id.to_string()))
    }

    fn record_sequence(
        &self,
        sequence_hash: &Fingerprint,
        suite_id: &str,
        _creation_time: i64,
        _duration: i64,
    ) -> Result<(), StoreError> {
        self.tables()?
            .sequences
            .insert((suite_id.to_string(), sequence_hash.clone()));
        Ok(())
    }

    fn sequence_seen(&self, suite_id: &str, sequence_hash: &Fingerprint) -> Result<bool, StoreError> {
        Ok(self
            .tables()?
            .sequences
            .contains(&(suite_id.to_string(), sequence_hash.clone())))
    }

    fn sequence_count(&self, suite_id: &str) -> Result<u64, StoreError> {
        Ok(self
            .tables()?
            .sequences
            .iter()
            .filter(|(suite, _)| suite == suite_id)
            .count() as u64)
    }

    fn mark_terminal_event(&self, event_hash: &Fingerprint, suite_id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        let stat = tables
            .events
            .entry((suite_id.to_string(), event_hash.clone()))
            .or_insert(EventStat {
                frequency: 1,
                is_terminal: false,
            });
        stat.is_terminal = true;
        Ok(())
    }

    fn is_terminal_event(&self, event_hash: &Fingerprint, suite_id: &str) -> Result<bool, StoreError> {
        Ok(self
            .tables()?
            .events
            .get(&(suite_id.to_string(), event_hash.clone()))
            .map(|s| s.is_terminal)
            .unwrap_or(false))
    }

    fn bump_event_frequency(&self, event_hash: &Fingerprint, suite_id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        tables
            .events
            .entry((suite_id.to_string(), event_hash.clone()))
            .and_modify(|s| s.frequency += 1)
            .or_insert(EventStat {
                frequency: 1,
                is_terminal: false,
            });
        Ok(())
    }

    fn event_frequencies(
        &self,
        event_hashes: &[Fingerprint],
        suite_id: &str,
    ) -> Result<FrequencyTable, StoreError> {
        let tables = self.tables()?;
        Ok(event_hashes
            .iter()
            .map(|hash| {
                let frequency = tables
                    .events
                    .get(&(suite_id.to_string(), hash.clone()))
                    .map(|s| s.frequency)
                    .unwrap_or(0);
                (hash.clone(), frequency)
            })
            .collect())
    }
}
