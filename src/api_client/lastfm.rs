//! Read-only client for the Last.fm 2.0 web service.
//!
//! Wraps the `user.*` listening-history methods plus `artist.gettoptags`. Every
//! request is a GET carrying `api_key` and `format=json`.

use crate::api_client::models::{
    Artist, ChartRange, LovedTrack, LovedTracksResponse, RecentTrack, RecentTracksResponse, Tag,
    TopAlbum, TopAlbumsResponse, TopArtistsResponse, TopTagsResponse, TopTrack,
    TopTracksResponse, UserInfo, UserInfoResponse, WeeklyArtistChartResponse,
    WeeklyChartListResponse, WeeklyTrackChartResponse,
};
use crate::api_client::UpstreamError;
use crate::configuration::LastfmSettings;
use crate::foundation::models::Period;
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

/// The listening-history queries the genre aggregator depends on.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ListeningHistory: Send + Sync {
    /// Top artists for `period`, in the order upstream ranks them.
    async fn top_artists(&self, period: Period, limit: u32) -> Result<Vec<Artist>, UpstreamError>;

    /// Community tags for one artist, strongest first.
    async fn artist_top_tags(&self, artist: &str) -> Result<Vec<Tag>, UpstreamError>;
}

type DirectRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

pub struct LastfmClient {
    client: Client,
    base_url: String,
    api_key: String,
    username: String,
    rate_limiter: Option<DirectRateLimiter>,
}

impl LastfmClient {
    /// Builds a client from the `lastfm` configuration section.
    ///
    /// When `requests_per_second` is set, every request first waits on a token bucket
    /// holding that many tokens per second.
    pub fn new(settings: &LastfmSettings) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        let rate_limiter = settings
            .requests_per_second
            .and_then(NonZeroU32::new)
            .map(|rps| RateLimiter::direct(Quota::per_second(rps)));

        debug!(base_url = %settings.base_url, user = %settings.username, "Initialized Last.fm client");

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            username: settings.username.clone(),
            rate_limiter,
        })
    }

    /// Most recent scrobbles, newest first. A track that is playing right now comes
    /// first and is flagged with `now_playing`.
    pub async fn recent_tracks(&self, limit: u32) -> Result<Vec<RecentTrack>, UpstreamError> {
        let limit = limit.to_string();
        let response: RecentTracksResponse = self
            .request(&[
                ("method", "user.getrecenttracks"),
                ("user", self.username.as_str()),
                ("limit", limit.as_str()),
                ("extended", "1"),
            ])
            .await?;

        Ok(response
            .recenttracks
            .track
            .into_iter()
            .map(RecentTrack::from)
            .collect())
    }

    /// The track currently scrobbling, if any.
    pub async fn now_playing(&self) -> Result<Option<RecentTrack>, UpstreamError> {
        let tracks = self.recent_tracks(1).await?;
        Ok(tracks.into_iter().next().filter(|track| track.now_playing))
    }

    pub async fn top_tracks(
        &self,
        period: Period,
        limit: u32,
    ) -> Result<Vec<TopTrack>, UpstreamError> {
        let limit = limit.to_string();
        let response: TopTracksResponse = self
            .request(&[
                ("method", "user.gettoptracks"),
                ("user", self.username.as_str()),
                ("period", period.as_str()),
                ("limit", limit.as_str()),
            ])
            .await?;

        Ok(response
            .toptracks
            .track
            .into_iter()
            .map(TopTrack::from)
            .collect())
    }

    pub async fn top_albums(
        &self,
        period: Period,
        limit: u32,
    ) -> Result<Vec<TopAlbum>, UpstreamError> {
        let limit = limit.to_string();
        let response: TopAlbumsResponse = self
            .request(&[
                ("method", "user.gettopalbums"),
                ("user", self.username.as_str()),
                ("period", period.as_str()),
                ("limit", limit.as_str()),
            ])
            .await?;

        Ok(response
            .topalbums
            .album
            .into_iter()
            .map(TopAlbum::from)
            .collect())
    }

    pub async fn user_info(&self) -> Result<UserInfo, UpstreamError> {
        let response: UserInfoResponse = self
            .request(&[("method", "user.getinfo"), ("user", self.username.as_str())])
            .await?;

        Ok(response.user.into())
    }

    /// Weeks that charts are available for, oldest first.
    pub async fn weekly_chart_list(&self) -> Result<Vec<ChartRange>, UpstreamError> {
        let response: WeeklyChartListResponse = self
            .request(&[
                ("method", "user.getweeklychartlist"),
                ("user", self.username.as_str()),
            ])
            .await?;

        Ok(response.weeklychartlist.chart)
    }

    /// Artist chart for `range`, or for the most recent week when `None`.
    pub async fn weekly_artist_chart(
        &self,
        range: Option<ChartRange>,
    ) -> Result<Vec<Artist>, UpstreamError> {
        let response: WeeklyArtistChartResponse =
            self.weekly_chart("user.getweeklyartistchart", range).await?;

        Ok(response.weeklyartistchart.artist)
    }

    /// Track chart for `range`, or for the most recent week when `None`.
    pub async fn weekly_track_chart(
        &self,
        range: Option<ChartRange>,
    ) -> Result<Vec<TopTrack>, UpstreamError> {
        let response: WeeklyTrackChartResponse =
            self.weekly_chart("user.getweeklytrackchart", range).await?;

        Ok(response
            .weeklytrackchart
            .track
            .into_iter()
            .map(TopTrack::from)
            .collect())
    }

    /// One page of loved tracks, most recently loved first. Pages start at 1.
    pub async fn loved_tracks(
        &self,
        limit: u32,
        page: u32,
    ) -> Result<Vec<LovedTrack>, UpstreamError> {
        let limit = limit.to_string();
        let page = page.max(1).to_string();
        let response: LovedTracksResponse = self
            .request(&[
                ("method", "user.getlovedtracks"),
                ("user", self.username.as_str()),
                ("limit", limit.as_str()),
                ("page", page.as_str()),
            ])
            .await?;

        Ok(response
            .lovedtracks
            .track
            .into_iter()
            .map(LovedTrack::from)
            .collect())
    }

    /// Tags the user has applied, most used first. `count` is a usage count here, not
    /// a 0-100 weight.
    pub async fn user_top_tags(&self, limit: u32) -> Result<Vec<Tag>, UpstreamError> {
        let limit = limit.to_string();
        let response: TopTagsResponse = self
            .request(&[
                ("method", "user.gettoptags"),
                ("user", self.username.as_str()),
                ("limit", limit.as_str()),
            ])
            .await?;

        Ok(response.toptags.tag)
    }

    async fn weekly_chart<T: DeserializeOwned>(
        &self,
        method: &str,
        range: Option<ChartRange>,
    ) -> Result<T, UpstreamError> {
        let bounds = range.map(|range| (range.from.to_string(), range.to.to_string()));

        let mut params = vec![("method", method), ("user", self.username.as_str())];
        if let Some((from, to)) = &bounds {
            params.push(("from", from.as_str()));
            params.push(("to", to.as_str()));
        }

        self.request(&params).await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        params: &[(&str, &str)],
    ) -> Result<T, UpstreamError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        debug!(url = %self.base_url, ?params, "Querying Last.fm");

        let response = self
            .client
            .get(&self.base_url)
            .query(params)
            .query(&[("api_key", self.api_key.as_str()), ("format", "json")])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let value = parse_lastfm_body(status.as_u16(), status.is_success(), &body)?;

        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl ListeningHistory for LastfmClient {
    async fn top_artists(&self, period: Period, limit: u32) -> Result<Vec<Artist>, UpstreamError> {
        let limit = limit.to_string();
        let response: TopArtistsResponse = self
            .request(&[
                ("method", "user.gettopartists"),
                ("user", self.username.as_str()),
                ("period", period.as_str()),
                ("limit", limit.as_str()),
            ])
            .await?;

        Ok(response.topartists.artist)
    }

    async fn artist_top_tags(&self, artist: &str) -> Result<Vec<Tag>, UpstreamError> {
        let response: TopTagsResponse = self
            .request(&[("method", "artist.gettoptags"), ("artist", artist)])
            .await?;

        Ok(response.toptags.tag)
    }
}

/// Turns a raw Last.fm response into JSON, rejecting error statuses and embedded
/// `{"error": code, "message": ...}` bodies.
fn parse_lastfm_body(status: u16, success: bool, body: &str) -> Result<Value, UpstreamError> {
    let parsed = serde_json::from_str::<Value>(body);

    if let Ok(value) = &parsed {
        if let Some(code) = value.get("error").and_then(Value::as_i64) {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown Last.fm error")
                .to_string();
            return Err(UpstreamError::Api { code, message });
        }
    }

    if !success {
        return Err(UpstreamError::Status {
            status,
            body: body.to_string(),
        });
    }

    Ok(parsed?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_success_body() {
        let value = parse_lastfm_body(200, true, r#"{"toptags": {"tag": []}}"#).unwrap();
        assert!(value.get("toptags").is_some());
    }

    #[test]
    fn test_embedded_error_in_ok_response() {
        let err = parse_lastfm_body(200, true, r#"{"error": 6, "message": "User not found"}"#)
            .unwrap_err();

        match err {
            UpstreamError::Api { code, message } => {
                assert_eq!(code, 6);
                assert_eq!(message, "User not found");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_embedded_error_wins_over_status() {
        let err = parse_lastfm_body(403, false, r#"{"error": 10, "message": "Invalid API key"}"#)
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Api { code: 10, .. }));
    }

    #[test]
    fn test_error_status_without_json() {
        let err = parse_lastfm_body(502, false, "<html>Bad Gateway</html>").unwrap_err();

        match err {
            UpstreamError::Status { status, body } => {
                assert_eq!(status, 502);
                assert!(body.contains("Bad Gateway"));
            }
            other => panic!("expected Status error, got {other:?}"),
        }
    }

    #[test]
    fn test_garbage_success_body_is_a_decode_error() {
        let err = parse_lastfm_body(200, true, "not json").unwrap_err();
        assert!(matches!(err, UpstreamError::Decode(_)));
    }

    #[test]
    fn test_client_builds_with_and_without_throttle() {
        let mut settings = LastfmSettings::new("http://127.0.0.1:1/2.0/", "key", "someone");
        assert!(LastfmClient::new(&settings).unwrap().rate_limiter.is_none());

        settings.requests_per_second = Some(5);
        assert!(LastfmClient::new(&settings).unwrap().rate_limiter.is_some());

        settings.requests_per_second = Some(0);
        assert!(LastfmClient::new(&settings).unwrap().rate_limiter.is_none());
    }
}
