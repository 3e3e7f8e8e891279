//! Typed views over the Last.fm JSON payloads.
//!
//! Last.fm encodes most numbers as strings and collapses single-element lists into a
//! bare object, so the list and number fields go through lenient deserializers.

use serde::{Deserialize, Deserializer, Serialize};

/// A listening-history entry for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub name: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub playcount: u64,
}

impl Artist {
    pub fn new(name: impl Into<String>, playcount: u64) -> Self {
        Self {
            name: name.into(),
            playcount,
        }
    }
}

/// Community tag on an artist. `count` is a relative weight from 0 to 100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub count: u32,
}

impl Tag {
    pub fn new(name: impl Into<String>, count: u32) -> Self {
        Self {
            name: name.into(),
            count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentTrack {
    pub name: String,
    pub artist: String,
    pub album: Option<String>,
    pub now_playing: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TopArtistsResponse {
    pub topartists: TopArtistsPayload,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TopArtistsPayload {
    #[serde(default, deserialize_with = "one_or_many")]
    pub artist: Vec<Artist>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TopTagsResponse {
    pub toptags: TopTagsPayload,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TopTagsPayload {
    #[serde(default, deserialize_with = "one_or_many")]
    pub tag: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecentTracksResponse {
    pub recenttracks: RecentTracksPayload,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecentTracksPayload {
    #[serde(default, deserialize_with = "one_or_many")]
    pub track: Vec<RecentTrackPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecentTrackPayload {
    name: String,
    artist: NamedRef,
    #[serde(default)]
    album: Option<NamedRef>,
    #[serde(rename = "@attr", default)]
    attr: Option<TrackAttr>,
}

/// `{"#text": "..."}` in plain responses, `{"name": "..."}` with `extended=1`.
#[derive(Debug, Deserialize)]
struct NamedRef {
    #[serde(alias = "#text", default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct TrackAttr {
    #[serde(default)]
    nowplaying: Option<String>,
}

impl From<RecentTrackPayload> for RecentTrack {
    fn from(payload: RecentTrackPayload) -> Self {
        let now_playing = payload
            .attr
            .and_then(|attr| attr.nowplaying)
            .map(|flag| flag == "true")
            .unwrap_or(false);

        RecentTrack {
            name: payload.name,
            artist: payload.artist.name,
            album: payload
                .album
                .map(|album| album.name)
                .filter(|name| !name.is_empty()),
            now_playing,
        }
    }
}

/// A ranked track from `user.gettoptracks` or a weekly track chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopTrack {
    pub name: String,
    pub artist: String,
    pub playcount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopAlbum {
    pub name: String,
    pub artist: String,
    pub playcount: u64,
    pub rank: u32,
    pub url: String,
    /// Largest cover Last.fm offers, if it has any.
    pub artwork: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LovedTrack {
    pub name: String,
    pub artist: String,
    /// Unix seconds.
    pub loved_at: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub name: String,
    pub realname: Option<String>,
    pub country: Option<String>,
    pub playcount: u64,
    pub url: String,
    /// Unix seconds.
    pub registered: Option<u64>,
}

/// One week Last.fm keeps a chart for, as unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ChartRange {
    #[serde(deserialize_with = "lenient_u64")]
    pub from: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub to: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TopTracksResponse {
    pub toptracks: TrackList,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WeeklyTrackChartResponse {
    pub weeklytrackchart: TrackList,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TrackList {
    #[serde(default, deserialize_with = "one_or_many")]
    pub track: Vec<TrackPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TrackPayload {
    name: String,
    artist: NamedRef,
    #[serde(default, deserialize_with = "lenient_u64")]
    playcount: u64,
}

impl From<TrackPayload> for TopTrack {
    fn from(payload: TrackPayload) -> Self {
        TopTrack {
            name: payload.name,
            artist: payload.artist.name,
            playcount: payload.playcount,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WeeklyArtistChartResponse {
    pub weeklyartistchart: TopArtistsPayload,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TopAlbumsResponse {
    pub topalbums: AlbumList,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AlbumList {
    #[serde(default, deserialize_with = "one_or_many")]
    pub album: Vec<AlbumPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AlbumPayload {
    name: String,
    artist: NamedRef,
    #[serde(default, deserialize_with = "lenient_u64")]
    playcount: u64,
    #[serde(default)]
    url: String,
    #[serde(default, deserialize_with = "one_or_many")]
    image: Vec<Image>,
    #[serde(rename = "@attr", default)]
    attr: Option<RankAttr>,
}

#[derive(Debug, Deserialize)]
struct Image {
    #[serde(rename = "#text", default)]
    url: String,
    #[serde(default)]
    size: String,
}

#[derive(Debug, Deserialize)]
struct RankAttr {
    #[serde(default, deserialize_with = "lenient_u32")]
    rank: u32,
}

/// `extralarge`, then `large`, then whatever comes last.
fn pick_artwork(images: &[Image]) -> Option<String> {
    images
        .iter()
        .find(|image| image.size == "extralarge")
        .or_else(|| images.iter().find(|image| image.size == "large"))
        .or_else(|| images.last())
        .map(|image| image.url.clone())
        .filter(|url| !url.is_empty())
}

impl From<AlbumPayload> for TopAlbum {
    fn from(payload: AlbumPayload) -> Self {
        TopAlbum {
            artwork: pick_artwork(&payload.image),
            name: payload.name,
            artist: payload.artist.name,
            playcount: payload.playcount,
            rank: payload.attr.map(|attr| attr.rank).unwrap_or(0),
            url: payload.url,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LovedTracksResponse {
    pub lovedtracks: LovedTrackList,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LovedTrackList {
    #[serde(default, deserialize_with = "one_or_many")]
    pub track: Vec<LovedTrackPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LovedTrackPayload {
    name: String,
    artist: NamedRef,
    #[serde(default)]
    date: Option<ScrobbleDate>,
}

#[derive(Debug, Deserialize)]
struct ScrobbleDate {
    #[serde(deserialize_with = "lenient_u64")]
    uts: u64,
}

impl From<LovedTrackPayload> for LovedTrack {
    fn from(payload: LovedTrackPayload) -> Self {
        LovedTrack {
            name: payload.name,
            artist: payload.artist.name,
            loved_at: payload.date.map(|date| date.uts),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserInfoResponse {
    pub user: UserPayload,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserPayload {
    name: String,
    #[serde(default)]
    realname: String,
    #[serde(default)]
    country: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    playcount: u64,
    #[serde(default)]
    url: String,
    #[serde(default)]
    registered: Option<Registered>,
}

#[derive(Debug, Deserialize)]
struct Registered {
    #[serde(default, deserialize_with = "lenient_u64")]
    unixtime: u64,
}

/// Last.fm leaves unset profile fields empty or as the literal `"None"`.
fn profile_field(value: String) -> Option<String> {
    match value.trim() {
        "" | "None" => None,
        _ => Some(value),
    }
}

impl From<UserPayload> for UserInfo {
    fn from(payload: UserPayload) -> Self {
        UserInfo {
            name: payload.name,
            realname: profile_field(payload.realname),
            country: profile_field(payload.country),
            playcount: payload.playcount,
            url: payload.url,
            registered: payload
                .registered
                .map(|registered| registered.unixtime)
                .filter(|&unixtime| unixtime > 0),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WeeklyChartListResponse {
    pub weeklychartlist: ChartListPayload,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChartListPayload {
    #[serde(default, deserialize_with = "one_or_many")]
    pub chart: Vec<ChartRange>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(items) => items,
        OneOrMany::One(item) => vec![item],
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(u64),
    Text(String),
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => Ok(n),
        NumberOrText::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = lenient_u64(deserializer)?;
    u32::try_from(value).map_err(serde::de::Error::custom)
}
