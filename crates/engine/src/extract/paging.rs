use crate::{
    error::{ConfigError, ExtractError},
    extract::Extractor,
};
use async_trait::async_trait;
use model::{pagination::cursor::ExtractionCursor, records::batch::FetchResult};
use std::sync::Arc;
use store::{
    query::{Predicate, RecordQuery, SortKey},
    source::RecordSource,
};

/// Plain offset/limit paging over a caller-supplied stable sort. No
/// watermark is involved; a short page means the end of the data.
pub struct PagingExtractor {
    source: Arc<dyn RecordSource>,
    order: Vec<SortKey>,
    filter: Option<Predicate>,
}

impl PagingExtractor {
    pub fn new(source: Arc<dyn RecordSource>, order: Vec<SortKey>) -> Result<Self, ConfigError> {
        if order.is_empty() {
            return Err(ConfigError::MissingSortOrder);
        }
        Ok(PagingExtractor {
            source,
            order,
            filter: None,
        })
    }

    pub fn with_filter(mut self, filter: Predicate) -> Self {
        self.filter = Some(filter);
        self
    }
}

#[async_trait]
impl Extractor for PagingExtractor {
    async fn fetch(&self, cursor: &ExtractionCursor) -> Result<FetchResult, ExtractError> {
        let mut query = RecordQuery::new()
            .offset(cursor.row_offset)
            .limit(cursor.batch_size);
        for key in &self.order {
            query = query.order_by(&key.field, key.dir);
        }
        if let Some(filter) = &self.filter {
            query = query.filter(filter.clone());
        }

        let rows = self.source.find_all(&query).await?;
        let mut next = cursor.clone();
        next.row_offset += rows.len();
        let reached_end = rows.len() < cursor.batch_size;

        if rows.is_empty() {
            return Ok(FetchResult::empty(next, true));
        }
        Ok(FetchResult::with_rows(rows, next, reached_end))
    }

    fn describe(&self) -> String {
        let fields: Vec<&str> = self.order.iter().map(|k| k.field.as_str()).collect();
        format!("paging ordered by [{}]", fields.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::value::{FieldValue, Value};
    use model::records::row::RowData;
    use store::{mem::MemTable, query::OrderDir};

    fn row(id: u64) -> RowData {
        RowData::new("users", vec![FieldValue::new("id", Value::Uint(id))])
    }

    #[tokio::test]
    async fn short_page_signals_end_of_data() {
        let table = Arc::new(MemTable::new("users", "id"));
        table.seed((1..=5).map(row).collect()).await;
        let ex = PagingExtractor::new(
            table,
            vec![SortKey {
                field: "id".into(),
                dir: OrderDir::Asc,
            }],
        )
        .unwrap();

        let cursor = ExtractionCursor::new(2);
        let first = ex.fetch(&cursor).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first.next.row_offset, 2);
        assert!(!first.reached_end);

        let second = ex.fetch(&first.next).await.unwrap();
        let third = ex.fetch(&second.next).await.unwrap();
        assert_eq!(third.len(), 1);
        assert!(third.reached_end);

        let ids: Vec<u64> = first
            .rows
            .iter()
            .chain(&second.rows)
            .chain(&third.rows)
            .map(|r| r.get_value("id").as_u64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn requires_a_sort_order() {
        let table = Arc::new(MemTable::new("users", "id"));
        assert!(matches!(
            PagingExtractor::new(table, vec![]),
            Err(ConfigError::MissingSortOrder)
        ));
    }
}
