use std::collections::HashMap;

use roamer_ir::Fingerprint;

/// Event frequencies for one screen's candidates.
///
/// Keeps the caller's key order so strategies can break ties by
/// first-seen position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrequencyTable {
    entries: Vec<(Fingerprint, u64)>,
    index: HashMap<Fingerprint, usize>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a frequency. New keys are appended.
    pub fn insert(&mut self, hash: Fingerprint, frequency: u64) {
        match self.index.get(&hash) {
            Some(&i) => self.entries[i].1 = frequency,
            None => {
                self.index.insert(hash.clone(), self.entries.len());
                self.entries.push((hash, frequency));
            }
        }
    }

    /// Frequency of a hash, 0 if absent.
    pub fn get(&self, hash: &Fingerprint) -> u64 {
        self.index
            .get(hash)
            .map(|&i| self.entries[i].1)
            .unwrap_or(0)
    }

    pub fn contains(&self, hash: &Fingerprint) -> bool {
        self.index.contains_key(hash)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Fingerprint, u64)> {
        self.entries.iter().map(|(h, f)| (h, *f))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(Fingerprint, u64)> for FrequencyTable {
    fn from_iter<I: IntoIterator<Item = (Fingerprint, u64)>>(iter: I) -> Self {
        let mut table = FrequencyTable::new();
        for (hash, frequency) in iter {
            table.insert(hash, frequency);
        }
        table
    }
}
