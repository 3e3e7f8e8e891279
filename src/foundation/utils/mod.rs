mod clock;
mod tag_filter;

pub use clock::{Clock, SystemClock};
pub use tag_filter::is_genre_tag;
