mod aggregate;

pub use aggregate::{AggregationError, GenreAggregator};
