use crate::{
    error::{ConfigError, ExtractError},
    extract::Extractor,
};
use async_trait::async_trait;
use model::{
    core::value::Value,
    pagination::cursor::{ExtractionCursor, Watermark},
    records::batch::FetchResult,
};
use std::sync::Arc;
use store::{
    query::{CmpOp, OrderDir, Predicate, RecordQuery},
    source::RecordSource,
};

/// Extraction over a monotonically increasing integer id.
pub struct IdentityExtractor {
    source: Arc<dyn RecordSource>,
    id_field: String,
    filter: Option<Predicate>,
}

impl IdentityExtractor {
    pub fn new(source: Arc<dyn RecordSource>, id_field: &str) -> Result<Self, ConfigError> {
        if id_field.trim().is_empty() {
            return Err(ConfigError::EmptyOrderingField);
        }
        Ok(IdentityExtractor {
            source,
            id_field: id_field.to_string(),
            filter: None,
        })
    }

    pub fn with_filter(mut self, filter: Predicate) -> Self {
        self.filter = Some(filter);
        self
    }
}

#[async_trait]
impl Extractor for IdentityExtractor {
    async fn fetch(&self, cursor: &ExtractionCursor) -> Result<FetchResult, ExtractError> {
        let start = match cursor.start {
            Watermark::Unset => return Ok(FetchResult::not_ready(cursor.clone())),
            Watermark::Id(id) => id,
            actual => {
                return Err(ExtractError::WatermarkKind {
                    expected: "id",
                    actual,
                });
            }
        };

        let mut query = RecordQuery::new()
            .filter(Predicate::cmp(&self.id_field, CmpOp::GtEq, Value::Uint(start)))
            .order_by(&self.id_field, OrderDir::Asc)
            .limit(cursor.batch_size);
        if let Some(filter) = &self.filter {
            query = query.filter(filter.clone());
        }

        let rows = self.source.find_all(&query).await?;
        let Some(last) = rows.last() else {
            return Ok(FetchResult::empty(cursor.clone(), true));
        };

        let last_id = last
            .get_value(&self.id_field)
            .as_u64()
            .ok_or_else(|| ExtractError::MissingOrderingField(self.id_field.clone()))?;

        // The watermark stays on the last row's id, not id + 1: the boundary
        // row is re-read on the next round and deduplicated downstream by
        // the key-based merge. Do not "fix" this to an exclusive bound
        // without auditing every consumer that relies on the overlap.
        let mut next = cursor.clone();
        next.advance_to(Watermark::Id(last_id));

        let reached_end = rows.len() < cursor.batch_size;
        Ok(FetchResult::with_rows(rows, next, reached_end))
    }

    fn describe(&self) -> String {
        format!("identity over '{}'", self.id_field)
    }
}
