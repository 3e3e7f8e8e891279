//! Stale-while-revalidate cache for genre distributions, one entry per period.
//!
//! | entry age              | result                                      |
//! |------------------------|---------------------------------------------|
//! | none, or `>= ttl`      | fetch now; serve the old entry if that fails |
//! | `> ttl / 2`, `< ttl`   | serve cached, refresh in the background     |
//! | `<= ttl / 2`           | serve cached                                |

use crate::cache::refresh::{RefreshEvent, RefreshWorker};
use crate::cache::source::{GenreSource, SourceError};
use crate::configuration::CacheSettings;
use crate::foundation::database::{cache_key, CacheEntry, CacheStore};
use crate::foundation::models::{GenreDistribution, Period};
use crate::foundation::utils::{Clock, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 32;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("no genre data available for {period}: {source}")]
    Unavailable {
        period: Period,
        #[source]
        source: SourceError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Empty,
    Fresh,
    Stale,
}

/// Classifies an entry: fresh while strictly younger than `ttl`.
pub fn entry_state(entry: Option<&CacheEntry>, now: u64, ttl: u64) -> EntryState {
    match entry {
        None => EntryState::Empty,
        Some(entry) if entry.age(now) < ttl => EntryState::Fresh,
        Some(_) => EntryState::Stale,
    }
}

/// How a lookup was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Served {
    /// Fresh entry, no refresh needed.
    Cached,
    /// Fresh entry past half its TTL; a background refresh was scheduled.
    Revalidating,
    /// Fetched synchronously and stored.
    Fetched,
    /// The fetch failed and an expired entry was served instead.
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub genres: GenreDistribution,
    pub served: Served,
}

/// The pieces both the foreground path and background refreshes need.
#[derive(Clone)]
pub(crate) struct CacheContext {
    source: Arc<dyn GenreSource>,
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
}

impl CacheContext {
    /// Store problems degrade to a cache miss rather than failing the lookup.
    fn read(&self, period: Period) -> Option<CacheEntry> {
        match self.store.get(&cache_key(period)) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(period = %period, error = %e, "Unreadable cache entry, treating as a miss");
                None
            }
        }
    }

    fn write(&self, period: Period, genres: &GenreDistribution) {
        let entry = CacheEntry::new(genres.clone(), self.clock.now_millis());
        if let Err(e) = self.store.set(&cache_key(period), &entry) {
            warn!(period = %period, error = %e, "Failed to write cache entry");
        }
    }

    pub(crate) async fn fetch_and_store(
        &self,
        period: Period,
    ) -> Result<GenreDistribution, SourceError> {
        let genres = self.source.fetch_genres(period).await?;
        self.write(period, &genres);
        Ok(genres)
    }
}

pub struct GenreCache {
    context: CacheContext,
    worker: RefreshWorker,
    ttl_ms: u64,
    prefetch_delay: Duration,
    prefetch_periods: Vec<Period>,
}

impl GenreCache {
    pub fn new(
        source: Arc<dyn GenreSource>,
        store: Arc<dyn CacheStore>,
        settings: &CacheSettings,
    ) -> Self {
        Self::with_clock(source, store, Arc::new(SystemClock), settings)
    }

    pub fn with_clock(
        source: Arc<dyn GenreSource>,
        store: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
        settings: &CacheSettings,
    ) -> Self {
        let context = CacheContext {
            source,
            store,
            clock,
        };

        Self {
            worker: RefreshWorker::new(context.clone(), EVENT_CAPACITY),
            context,
            ttl_ms: settings.ttl_ms,
            prefetch_delay: settings.prefetch_delay(),
            prefetch_periods: settings.prefetch_periods.clone(),
        }
    }

    /// Background refresh results. Subscribe before the lookup whose refresh you
    /// want to see.
    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.worker.subscribe()
    }

    pub fn state(&self, period: Period) -> EntryState {
        entry_state(
            self.context.read(period).as_ref(),
            self.context.clock.now_millis(),
            self.ttl_ms,
        )
    }

    /// Returns the genre distribution for `period`, from cache when possible.
    ///
    /// Fails only when the fetch fails and nothing at all is cached for the period.
    pub async fn get_genres(&self, period: Period) -> Result<Lookup, CacheError> {
        let now = self.context.clock.now_millis();
        let cached = self.context.read(period);

        if let Some(entry) = &cached {
            if entry_state(Some(entry), now, self.ttl_ms) == EntryState::Fresh {
                let age = entry.age(now);
                let served = if age > self.ttl_ms / 2 {
                    self.worker.schedule(period, Duration::ZERO);
                    Served::Revalidating
                } else {
                    Served::Cached
                };

                debug!(period = %period, age_ms = age, ?served, "Serving cached genres");
                return Ok(Lookup {
                    genres: entry.data.clone(),
                    served,
                });
            }
        }

        match self.context.fetch_and_store(period).await {
            Ok(genres) => {
                info!(period = %period, genres = genres.len(), "Fetched genres");
                Ok(Lookup {
                    genres,
                    served: Served::Fetched,
                })
            }
            Err(e) => match cached {
                Some(entry) => {
                    warn!(
                        period = %period,
                        age_ms = entry.age(now),
                        error = %e,
                        "Fetch failed, serving expired genres"
                    );
                    Ok(Lookup {
                        genres: entry.data,
                        served: Served::Fallback,
                    })
                }
                None => Err(CacheError::Unavailable { period, source: e }),
            },
        }
    }

    /// Schedules delayed background fetches for the configured adjacent periods that
    /// have nothing cached yet. Returns the periods that were scheduled.
    pub fn prefetch_adjacent(&self) -> Vec<Period> {
        self.prefetch(&self.prefetch_periods)
    }

    pub fn prefetch(&self, periods: &[Period]) -> Vec<Period> {
        let mut scheduled = Vec::new();
        for &period in periods {
            if self.context.read(period).is_none() {
                self.worker.schedule(period, self.prefetch_delay);
                scheduled.push(period);
            }
        }
        scheduled
    }
}
