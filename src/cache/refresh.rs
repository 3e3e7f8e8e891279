use crate::cache::genre_cache::CacheContext;
use crate::foundation::models::{GenreDistribution, Period};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Outcome of a background refresh or prefetch.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshEvent {
    Refreshed {
        period: Period,
        genres: GenreDistribution,
    },
    Failed {
        period: Period,
        error: String,
    },
}

impl RefreshEvent {
    pub fn period(&self) -> Period {
        match self {
            RefreshEvent::Refreshed { period, .. } | RefreshEvent::Failed { period, .. } => *period,
        }
    }
}

/// Runs cache refreshes off the caller's path.
///
/// Each scheduled refresh is its own task. Nobody awaits it and nothing cancels it.
/// Its result goes into the store and out on the event channel, never back to the
/// caller that scheduled it.
pub(crate) struct RefreshWorker {
    context: CacheContext,
    events: broadcast::Sender<RefreshEvent>,
}

impl RefreshWorker {
    pub(crate) fn new(context: CacheContext, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self { context, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.events.subscribe()
    }

    /// Spawns a refresh of `period` that starts after `delay`. Must be called from
    /// within a tokio runtime.
    pub fn schedule(&self, period: Period, delay: Duration) {
        let context = self.context.clone();
        let events = self.events.clone();

        debug!(period = %period, delay_ms = delay.as_millis() as u64, "Scheduling background refresh");

        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let event = match context.fetch_and_store(period).await {
                Ok(genres) => {
                    debug!(period = %period, genres = genres.len(), "Background refresh stored");
                    RefreshEvent::Refreshed { period, genres }
                }
                Err(e) => {
                    warn!(period = %period, error = %e, "Background refresh failed");
                    RefreshEvent::Failed {
                        period,
                        error: e.to_string(),
                    }
                }
            };

            // An error here only means nobody is subscribed.
            let _ = events.send(event);
        });
    }
}
