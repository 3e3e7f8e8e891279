use crate::api_client::ListeningHistory;
use crate::foundation::models::{GenreDistribution, Period};
use crate::process::{AggregationError, GenreAggregator};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("genre service returned {status}: {message}")]
    Status { status: u16, message: String },
}

/// Where the cache gets fresh genre distributions from.
#[async_trait]
pub trait GenreSource: Send + Sync {
    async fn fetch_genres(&self, period: Period) -> Result<GenreDistribution, SourceError>;
}

/// Runs the aggregation in-process.
#[async_trait]
impl<H: ListeningHistory> GenreSource for GenreAggregator<H> {
    async fn fetch_genres(&self, period: Period) -> Result<GenreDistribution, SourceError> {
        Ok(self.analyze(period).await?)
    }
}

#[derive(Deserialize)]
struct GenresBody {
    genres: GenreDistribution,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Fetches from a `GET /genre-analysis?period=..` endpoint, such as the one
/// `genrefm serve` exposes.
pub struct HttpGenreSource {
    client: Client,
    endpoint: String,
}

impl HttpGenreSource {
    pub fn new(base_url: &str) -> Result<Self, SourceError> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/genre-analysis", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl GenreSource for HttpGenreSource {
    async fn fetch_genres(&self, period: Period) -> Result<GenreDistribution, SourceError> {
        debug!(endpoint = %self.endpoint, period = %period, "Requesting genre analysis");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("period", period.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<GenresBody>().await?.genres);
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string(),
        };

        Err(SourceError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let source = HttpGenreSource::new("http://127.0.0.1:3000/").unwrap();
        assert_eq!(source.endpoint, "http://127.0.0.1:3000/genre-analysis");

        let source = HttpGenreSource::new("http://example.test/site").unwrap();
        assert_eq!(source.endpoint, "http://example.test/site/genre-analysis");
    }
}
