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

/// Offset paging inside a fixed `[start, end)` time range.
///
/// Both bounds stay put for the whole scan; progress lives entirely in
/// `row_offset`. A short or empty batch marks the end of the range and
/// resets the offset, so a later round rescans the same span from the top.
pub struct TimeSpanExtractor {
    source: Arc<dyn RecordSource>,
    ts_field: String,
    key_field: String,
    filter: Option<Predicate>,
}

impl TimeSpanExtractor {
    pub fn new(
        source: Arc<dyn RecordSource>,
        ts_field: &str,
        key_field: &str,
    ) -> Result<Self, ConfigError> {
        if ts_field.trim().is_empty() {
            return Err(ConfigError::EmptyOrderingField);
        }
        if key_field.trim().is_empty() {
            return Err(ConfigError::EmptyKeyField);
        }
        Ok(TimeSpanExtractor {
            source,
            ts_field: ts_field.to_string(),
            key_field: key_field.to_string(),
            filter: None,
        })
    }

    pub fn with_filter(mut self, filter: Predicate) -> Self {
        self.filter = Some(filter);
        self
    }
}

#[async_trait]
impl Extractor for TimeSpanExtractor {
    async fn fetch(&self, cursor: &ExtractionCursor) -> Result<FetchResult, ExtractError> {
        let start = match cursor.start {
            Watermark::Unset => return Ok(FetchResult::not_ready(cursor.clone())),
            Watermark::Timestamp(ts) => ts,
            actual => {
                return Err(ExtractError::WatermarkKind {
                    expected: "timestamp",
                    actual,
                });
            }
        };
        let end = match cursor.end {
            Some(Watermark::Timestamp(ts)) => ts,
            _ => return Err(ExtractError::UnboundedWindow),
        };

        let mut query = RecordQuery::new()
            .filter(
                Predicate::cmp(&self.ts_field, CmpOp::GtEq, Value::Timestamp(start))
                    .and(Predicate::cmp(&self.ts_field, CmpOp::Lt, Value::Timestamp(end))),
            )
            .order_by(&self.ts_field, OrderDir::Asc)
            .order_by(&self.key_field, OrderDir::Asc)
            .offset(cursor.row_offset)
            .limit(cursor.batch_size);
        if let Some(filter) = &self.filter {
            query = query.filter(filter.clone());
        }

        let rows = self.source.find_all(&query).await?;
        let mut next = cursor.clone();

        if rows.len() == cursor.batch_size {
            next.row_offset += rows.len();
            return Ok(FetchResult::with_rows(rows, next, false));
        }

        next.row_offset = 0;
        if rows.is_empty() {
            return Ok(FetchResult::empty(next, true));
        }
        Ok(FetchResult::with_rows(rows, next, true))
    }

    fn describe(&self) -> String {
        format!("time-span over '{}'", self.ts_field)
    }
}
