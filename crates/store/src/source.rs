use crate::{error::StoreError, query::RecordQuery};
use async_trait::async_trait;
use model::records::row::RowData;

/// Read side of a collection. The source is never written to and never
/// wrapped in a transaction; extraction relies only on filter + order +
/// offset/limit and a row count.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn find_all(&self, query: &RecordQuery) -> Result<Vec<RowData>, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;
}
