pub mod api_client;
pub mod cache;
pub mod configuration;
pub mod foundation;
pub mod process;
pub mod server;
pub mod startup;

pub use api_client::{Artist, LastfmClient, ListeningHistory, RecentTrack, Tag, UpstreamError};
pub use cache::{
    CacheError, EntryState, GenreCache, GenreSource, HttpGenreSource, Lookup, RefreshEvent,
    Served, SourceError,
};
pub use configuration::*;
pub use foundation::database::*;
pub use foundation::models::{Genre, GenreDistribution, Period};
pub use process::{AggregationError, GenreAggregator};
