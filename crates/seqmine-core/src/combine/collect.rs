use crate::types::{RecordKey, Result};

use super::Combiner;

/// Keeps every partial result with its key, in merge order.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectCombiner<T> {
    items: Vec<(RecordKey, T)>,
}

impl<T> Default for CollectCombiner<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CollectCombiner<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn items(&self) -> &[(RecordKey, T)] {
        &self.items
    }
}

impl<T> Combiner<T> for CollectCombiner<T> {
    type Output = Vec<(RecordKey, T)>;

    fn merge(&mut self, key: &RecordKey, partial: T) -> Result<()> {
        self.items.push((key.clone(), partial));
        Ok(())
    }

    fn finish(self) -> Result<Self::Output> {
        Ok(self.items)
    }
}
