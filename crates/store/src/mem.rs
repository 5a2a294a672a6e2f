use crate::{
    catalog::TableCatalog,
    error::StoreError,
    query::{OrderDir, RecordQuery},
    sink::RecordSink,
    source::RecordSource,
};
use async_trait::async_trait;
use model::{core::value::Value, records::row::RowData};
use std::{cmp::Ordering, collections::BTreeMap, sync::Arc};
use tokio::sync::RwLock;

struct Inner {
    rows: Vec<RowData>,
    next_key: u64,
    /// Pre-transaction snapshot; restored on rollback, dropped on commit.
    snapshot: Option<(Vec<RowData>, u64)>,
}

/// In-memory table implementing both collection seams. Serves as the
/// reference store for tests and for embedding the engine without a real
/// database behind it.
///
/// Transactions are snapshot-based: `begin_transaction` clones the row set,
/// `rollback` restores it, `commit` discards the snapshot. One transaction
/// at a time, matching the engine's one-batch transaction scope.
pub struct MemTable {
    name: String,
    key_field: String,
    inner: RwLock<Inner>,
}

impl MemTable {
    pub fn new(name: &str, key_field: &str) -> Self {
        MemTable {
            name: name.to_string(),
            key_field: key_field.to_string(),
            inner: RwLock::new(Inner {
                rows: Vec::new(),
                next_key: 1,
                snapshot: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    /// Bulk-load rows without transaction ceremony (test seeding).
    pub async fn seed(&self, rows: Vec<RowData>) {
        let mut inner = self.inner.write().await;
        for row in rows {
            let key = row.get_value(&self.key_field).as_u64();
            if let Some(id) = key {
                inner.next_key = inner.next_key.max(id + 1);
            }
            inner.rows.push(row);
        }
    }

    /// Snapshot of all rows, for assertions.
    pub async fn rows(&self) -> Vec<RowData> {
        self.inner.read().await.rows.clone()
    }

    fn key_matches(candidate: &Value, key: &Value) -> bool {
        candidate.try_cmp(key) == Some(Ordering::Equal)
    }

    fn sort_rows(rows: &mut [RowData], query: &RecordQuery) {
        if query.order.is_empty() {
            return;
        }
        rows.sort_by(|a, b| {
            for key in &query.order {
                let ord = a
                    .get_value(&key.field)
                    .try_cmp(&b.get_value(&key.field))
                    .unwrap_or(Ordering::Equal);
                let ord = match key.dir {
                    OrderDir::Asc => ord,
                    OrderDir::Desc => ord.reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }
}

#[async_trait]
impl RecordSource for MemTable {
    async fn find_all(&self, query: &RecordQuery) -> Result<Vec<RowData>, StoreError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<RowData> = match &query.filter {
            Some(predicate) => inner
                .rows
                .iter()
                .filter(|r| predicate.matches(r))
                .cloned()
                .collect(),
            None => inner.rows.clone(),
        };
        drop(inner);

        Self::sort_rows(&mut rows, query);

        let mut rows: Vec<RowData> = rows.into_iter().skip(query.offset).collect();
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.inner.read().await.rows.len() as u64)
    }
}

#[async_trait]
impl RecordSink for MemTable {
    async fn find_by_key(&self, field: &str, key: &Value) -> Result<Option<RowData>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .rows
            .iter()
            .find(|r| Self::key_matches(&r.get_value(field), key))
            .cloned())
    }

    async fn next_key(&self) -> Result<u64, StoreError> {
        Ok(self.inner.read().await.next_key)
    }

    async fn insert(&self, mut row: RowData) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        match row.get_value(&self.key_field) {
            Value::Null => {
                let id = inner.next_key;
                inner.next_key += 1;
                row.set_value(&self.key_field, Value::Uint(id));
            }
            key => {
                let duplicate = inner
                    .rows
                    .iter()
                    .any(|r| Self::key_matches(&r.get_value(&self.key_field), &key));
                if duplicate {
                    return Err(StoreError::DuplicateKey {
                        table: self.name.clone(),
                        key: key.to_string(),
                    });
                }
                if let Some(id) = key.as_u64() {
                    inner.next_key = inner.next_key.max(id + 1);
                }
            }
        }
        inner.rows.push(row);
        Ok(())
    }

    async fn update(&self, key_field: &str, row: RowData) -> Result<(), StoreError> {
        let key = row.get_value(key_field);
        let mut inner = self.inner.write().await;
        match inner
            .rows
            .iter_mut()
            .find(|r| Self::key_matches(&r.get_value(key_field), &key))
        {
            Some(slot) => {
                *slot = row;
                Ok(())
            }
            None => Err(StoreError::MissingRow {
                table: self.name.clone(),
                field: key_field.to_string(),
                key: key.to_string(),
            }),
        }
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.inner.read().await.rows.len() as u64)
    }

    async fn begin_transaction(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.snapshot.is_some() {
            return Err(StoreError::TransactionActive(self.name.clone()));
        }
        inner.snapshot = Some((inner.rows.clone(), inner.next_key));
        Ok(())
    }

    async fn commit(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.snapshot.take().is_none() {
            return Err(StoreError::NoTransaction(self.name.clone()));
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        match inner.snapshot.take() {
            Some((rows, next_key)) => {
                inner.rows = rows;
                inner.next_key = next_key;
                Ok(())
            }
            None => Err(StoreError::NoTransaction(self.name.clone())),
        }
    }
}

/// A fixed set of named [`MemTable`]s acting as one "connection" for the
/// bulk transfer.
#[derive(Default)]
pub struct MemCatalog {
    tables: BTreeMap<String, Arc<MemTable>>,
}

impl MemCatalog {
    pub fn new() -> Self {
        MemCatalog::default()
    }

    pub fn with_table(mut self, table: Arc<MemTable>) -> Self {
        self.tables.insert(table.name().to_string(), table);
        self
    }

    pub fn table(&self, name: &str) -> Option<Arc<MemTable>> {
        self.tables.get(name).cloned()
    }
}

#[async_trait]
impl TableCatalog for MemCatalog {
    async fn table_names(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.tables.keys().cloned().collect())
    }

    async fn source(&self, table: &str) -> Result<Arc<dyn RecordSource>, StoreError> {
        self.tables
            .get(table)
            .map(|t| t.clone() as Arc<dyn RecordSource>)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))
    }

    async fn sink(&self, table: &str) -> Result<Arc<dyn RecordSink>, StoreError> {
        self.tables
            .get(table)
            .map(|t| t.clone() as Arc<dyn RecordSink>)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{CmpOp, Predicate};
    use model::core::value::FieldValue;

    fn row(id: u64, name: &str) -> RowData {
        RowData::new(
            "users",
            vec![
                FieldValue::new("id", Value::Uint(id)),
                FieldValue::new("name", Value::String(name.into())),
            ],
        )
    }

    #[tokio::test]
    async fn filter_order_offset_limit() {
        let table = MemTable::new("users", "id");
        table
            .seed((1..=10).map(|i| row(i, &format!("u{i}"))).collect())
            .await;

        let q = RecordQuery::new()
            .filter(Predicate::cmp("id", CmpOp::GtEq, Value::Uint(3)))
            .order_by("id", OrderDir::Asc)
            .offset(2)
            .limit(3);
        let rows = RecordSource::find_all(&table, &q).await.unwrap();
        let ids: Vec<u64> = rows
            .iter()
            .map(|r| r.get_value("id").as_u64().unwrap())
            .collect();
        assert_eq!(ids, vec![5, 6, 7]);
    }

    #[tokio::test]
    async fn insert_assigns_and_tracks_keys() {
        let table = MemTable::new("users", "id");
        table
            .insert(RowData::new(
                "users",
                vec![FieldValue::new("name", Value::String("anon".into()))],
            ))
            .await
            .unwrap();
        table.insert(row(10, "ten")).await.unwrap();

        assert_eq!(table.next_key().await.unwrap(), 11);
        assert!(matches!(
            table.insert(row(10, "dup")).await,
            Err(StoreError::DuplicateKey { .. })
        ));
    }

    #[tokio::test]
    async fn rollback_restores_snapshot() {
        let table = MemTable::new("users", "id");
        table.seed(vec![row(1, "a")]).await;

        table.begin_transaction().await.unwrap();
        table.insert(row(2, "b")).await.unwrap();
        assert_eq!(RecordSink::count(&table).await.unwrap(), 2);

        table.rollback().await.unwrap();
        assert_eq!(RecordSink::count(&table).await.unwrap(), 1);
        assert!(matches!(
            table.commit().await,
            Err(StoreError::NoTransaction(_))
        ));
    }

    #[tokio::test]
    async fn commit_keeps_writes() {
        let table = MemTable::new("users", "id");
        table.begin_transaction().await.unwrap();
        table.insert(row(1, "a")).await.unwrap();
        table.commit().await.unwrap();
        assert_eq!(RecordSink::count(&table).await.unwrap(), 1);
    }
}
