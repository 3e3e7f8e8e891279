mod lastfm;
mod models;
mod upstream_error;

pub use lastfm::*;
pub use models::{
    Artist, ChartRange, LovedTrack, RecentTrack, Tag, TopAlbum, TopTrack, UserInfo,
};
pub use upstream_error::UpstreamError;
