mod genre_cache;
mod refresh;
mod source;

pub use genre_cache::{entry_state, CacheError, EntryState, GenreCache, Lookup, Served};
pub use refresh::RefreshEvent;
pub use source::{GenreSource, HttpGenreSource, SourceError};
