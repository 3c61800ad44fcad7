use std::collections::BTreeMap;

use crate::types::{RecordKey, Result};

use super::Combiner;

/// Map-reduce combiner adding per-key counts.
///
/// Merging is commutative and associative: the final counts do not depend on
/// the order partials arrive in, hence not on thread count or strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountCombiner<K: Ord> {
    counts: BTreeMap<K, u64>,
}

impl<K: Ord> Default for CountCombiner<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord> CountCombiner<K> {
    pub fn new() -> Self {
        Self {
            counts: BTreeMap::new(),
        }
    }

    pub fn counts(&self) -> &BTreeMap<K, u64> {
        &self.counts
    }

    pub fn get(&self, key: &K) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Sum over all keys.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn into_counts(self) -> BTreeMap<K, u64> {
        self.counts
    }

    pub fn add_counts<I>(&mut self, partial: I)
    where
        I: IntoIterator<Item = (K, u64)>,
    {
        for (key, count) in partial {
            let entry = self.counts.entry(key).or_insert(0);
            *entry = entry.saturating_add(count);
        }
    }
}

impl<K, P> Combiner<P> for CountCombiner<K>
where
    K: Ord,
    P: IntoIterator<Item = (K, u64)>,
{
    type Output = BTreeMap<K, u64>;

    fn merge(&mut self, _key: &RecordKey, partial: P) -> Result<()> {
        self.add_counts(partial);
        Ok(())
    }

    fn finish(self) -> Result<Self::Output> {
        Ok(self.into_counts())
    }
}
