use crate::foundation::models::GenreDistribution;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CacheEntry {
    pub data: GenreDistribution,
    pub timestamp: u64, // epoch millis of the fetch that produced `data`
}

impl CacheEntry {
    pub fn new(data: GenreDistribution, timestamp: u64) -> Self {
        Self { data, timestamp }
    }

    /// Milliseconds elapsed since the entry was written. Saturates at zero when the
    /// clock has moved backwards.
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.timestamp)
    }
}
