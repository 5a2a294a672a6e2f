use crate::error::StoreError;
use async_trait::async_trait;
use model::{core::value::Value, records::row::RowData};

/// Write side of a target collection. Transaction scope is driven by the
/// caller and covers exactly one batch; `commit`/`rollback` without a
/// preceding `begin_transaction` is an error.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn find_by_key(&self, field: &str, key: &Value) -> Result<Option<RowData>, StoreError>;

    /// Next key the sink would assign on an insert without an explicit key.
    async fn next_key(&self) -> Result<u64, StoreError>;

    async fn insert(&self, row: RowData) -> Result<(), StoreError>;

    async fn update(&self, key_field: &str, row: RowData) -> Result<(), StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;

    async fn begin_transaction(&self) -> Result<(), StoreError>;

    async fn commit(&self) -> Result<(), StoreError>;

    async fn rollback(&self) -> Result<(), StoreError>;
}
