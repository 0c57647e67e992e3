pub mod media;
pub mod search;

pub use media::{MediaSearch, MediaSearchError, VideoResult, WebMediaSearch};
pub use search::SearchResult;
