//! Turns a user's top artists into a ranked genre distribution.
//!
//! Each artist contributes `playcount × tag.count / 100` to every genre tag it carries.
//! Tag lookups run concurrently within a batch. Batches run one after another with a
//! fixed pause in between.

use crate::api_client::{Artist, ListeningHistory, Tag, UpstreamError};
use crate::configuration::AggregationSettings;
use crate::foundation::models::{Genre, GenreDistribution, Period};
use crate::foundation::utils::is_genre_tag;
use futures::future::join_all;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("failed to fetch top artists: {0}")]
    TopArtists(#[source] UpstreamError),
}

pub struct GenreAggregator<H> {
    history: H,
    settings: AggregationSettings,
}

impl<H: ListeningHistory> GenreAggregator<H> {
    pub fn new(history: H, settings: AggregationSettings) -> Self {
        Self { history, settings }
    }

    /// Computes the genre distribution for `period`.
    ///
    /// Only the top-artist lookup is fatal. An artist whose tags cannot be fetched
    /// simply contributes nothing.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use genrefm::{AggregationSettings, GenreAggregator, LastfmClient, LastfmSettings, Period};
    ///
    /// async fn example() -> Result<(), Box<dyn std::error::Error>> {
    ///     let settings = LastfmSettings::new("https://ws.audioscrobbler.com/2.0/", "key", "someone");
    ///     let aggregator = GenreAggregator::new(LastfmClient::new(&settings)?, AggregationSettings::default());
    ///
    ///     for genre in aggregator.analyze(Period::ThreeMonth).await? {
    ///         println!("{}: {:.0}", genre.name, genre.count);
    ///     }
    ///     Ok(())
    /// }
    /// ```
    #[instrument(skip(self), fields(period = %period))]
    pub async fn analyze(&self, period: Period) -> Result<GenreDistribution, AggregationError> {
        let artists = self
            .history
            .top_artists(period, self.settings.artist_limit)
            .await
            .map_err(AggregationError::TopArtists)?;

        if artists.is_empty() {
            info!("No listening history for period, returning no genres");
            return Ok(Vec::new());
        }

        let mut genre_counts: HashMap<String, f64> = HashMap::new();
        let batches: Vec<&[Artist]> = artists.chunks(self.settings.batch_size.max(1)).collect();
        let batch_count = batches.len();

        for (index, batch) in batches.into_iter().enumerate() {
            debug!(batch = index + 1, of = batch_count, artists = batch.len(), "Fetching tags");
            let tag_lists = self.fetch_batch_tags(batch).await;

            for (artist, tags) in batch.iter().zip(&tag_lists) {
                accumulate(&mut genre_counts, artist, tags);
            }

            if index + 1 < batch_count && !self.settings.batch_delay().is_zero() {
                tokio::time::sleep(self.settings.batch_delay()).await;
            }
        }

        let genres = rank_genres(genre_counts, self.settings.max_genres);
        info!(artists = artists.len(), genres = genres.len(), "Genre analysis complete");
        Ok(genres)
    }

    /// Fetches tags for every artist in the batch at once. The result lines up with
    /// `batch` index for index, whatever order the requests finish in.
    async fn fetch_batch_tags(&self, batch: &[Artist]) -> Vec<Vec<Tag>> {
        join_all(batch.iter().map(|artist| async move {
            match self.history.artist_top_tags(&artist.name).await {
                Ok(mut tags) => {
                    tags.truncate(self.settings.tags_per_artist);
                    tags
                }
                Err(e) => {
                    warn!(artist = %artist.name, error = %e, "Failed to fetch tags, skipping artist");
                    Vec::new()
                }
            }
        }))
        .await
    }
}

/// Adds one artist's weighted genre tags to the running totals.
fn accumulate(genre_counts: &mut HashMap<String, f64>, artist: &Artist, tags: &[Tag]) {
    for tag in tags.iter().filter(|tag| is_genre_tag(&tag.name)) {
        let weight = artist.playcount as f64 * (tag.count as f64 / 100.0);
        *genre_counts.entry(tag.name.clone()).or_insert(0.0) += weight;
    }
}

/// Heaviest first, ties by name, at most `max_genres` entries.
fn rank_genres(genre_counts: HashMap<String, f64>, max_genres: usize) -> GenreDistribution {
    let mut genres: Vec<Genre> = genre_counts
        .into_iter()
        .map(|(name, count)| Genre { name, count })
        .collect();

    genres.sort_by(|a, b| b.count.total_cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    genres.truncate(max_genres);
    genres
}
