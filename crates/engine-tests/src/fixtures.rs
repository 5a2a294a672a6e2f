use chrono::{DateTime, Utc};
use model::{
    core::value::{FieldValue, Value},
    records::row::RowData,
};
use std::sync::Arc;
use store::mem::MemTable;

pub fn ts(s: &str) -> DateTime<Utc> {
    s.parse().expect("fixture timestamp")
}

pub fn order(id: u64, status: &str) -> RowData {
    RowData::new(
        "orders",
        vec![
            FieldValue::new("id", Value::Uint(id)),
            FieldValue::new("status", Value::String(status.into())),
        ],
    )
}

pub fn event(id: u64, at: DateTime<Utc>) -> RowData {
    RowData::new(
        "events",
        vec![
            FieldValue::new("id", Value::Uint(id)),
            FieldValue::new("created_at", Value::Timestamp(at)),
        ],
    )
}

pub async fn orders_table(rows: Vec<RowData>) -> Arc<MemTable> {
    let table = Arc::new(MemTable::new("orders", "id"));
    table.seed(rows).await;
    table
}

pub async fn events_table(rows: Vec<RowData>) -> Arc<MemTable> {
    let table = Arc::new(MemTable::new("events", "id"));
    table.seed(rows).await;
    table
}

pub async fn ids_of(table: &MemTable) -> Vec<u64> {
    let mut ids: Vec<u64> = table
        .rows()
        .await
        .iter()
        .filter_map(|r| r.get_value("id").as_u64())
        .collect();
    ids.sort_unstable();
    ids
}
