use crate::error::ExtractError;
use async_trait::async_trait;
use model::{pagination::cursor::ExtractionCursor, records::batch::FetchResult};

pub mod identity;
pub mod paging;
pub mod time_span;
pub mod time_window;

pub use identity::IdentityExtractor;
pub use paging::PagingExtractor;
pub use time_span::TimeSpanExtractor;
pub use time_window::TimeWindowExtractor;

/// One bounded pull from the source collection.
///
/// Extractors are pure with respect to the cursor: the caller passes the
/// current position and receives the advanced position inside the
/// [`FetchResult`]. Nothing is persisted here and nothing is shared between
/// pipeline instances.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn fetch(&self, cursor: &ExtractionCursor) -> Result<FetchResult, ExtractError>;

    /// Short human-readable description for round logging.
    fn describe(&self) -> String;
}
