use crate::{error::StoreError, sink::RecordSink, source::RecordSource};
use async_trait::async_trait;
use std::sync::Arc;

/// Table directory of one connection, as seen by the bulk transfer: a list
/// of table names and a way to open each table for reading or writing.
#[async_trait]
pub trait TableCatalog: Send + Sync {
    async fn table_names(&self) -> Result<Vec<String>, StoreError>;

    async fn source(&self, table: &str) -> Result<Arc<dyn RecordSource>, StoreError>;

    async fn sink(&self, table: &str) -> Result<Arc<dyn RecordSink>, StoreError>;
}
