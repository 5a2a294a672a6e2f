use crate::{
    error::{ConfigError, ExtractError},
    extract::Extractor,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
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

/// Timestamp-windowed extraction with a duplicate-boundary tie-break.
///
/// Queries `[start, window_end)` where `window_end` is capped by the
/// optional fixed step, the optional hard end bound, and "now". Rows are
/// ordered `(timestamp asc, key asc)` so the intra-boundary `row_offset`
/// addresses a stable position.
///
/// The tricky part is a boundary timestamp shared by more rows than one
/// batch holds: `start` stays pinned on that timestamp and `row_offset`
/// counts the rows already consumed at it, so consecutive fetches neither
/// drop nor repeat rows. `start` only moves once a batch ends on a strictly
/// greater timestamp, or a short batch proves the boundary bucket is
/// exhausted.
pub struct TimeWindowExtractor {
    source: Arc<dyn RecordSource>,
    ts_field: String,
    key_field: String,
    filter: Option<Predicate>,
}

impl TimeWindowExtractor {
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
        Ok(TimeWindowExtractor {
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

    fn window_end(&self, cursor: &ExtractionCursor, start: DateTime<Utc>) -> DateTime<Utc> {
        let mut end = Utc::now();
        if let Some(step) = cursor.step() {
            end = end.min(start + step);
        }
        if let Some(Watermark::Timestamp(hard_end)) = cursor.end {
            end = end.min(hard_end);
        }
        end
    }

    fn row_ts(&self, row: &model::records::row::RowData) -> Result<DateTime<Utc>, ExtractError> {
        row.get_value(&self.ts_field)
            .as_timestamp()
            .ok_or_else(|| ExtractError::MissingOrderingField(self.ts_field.clone()))
    }
}

#[async_trait]
impl Extractor for TimeWindowExtractor {
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

        let window_end = self.window_end(cursor, start);
        if window_end <= start {
            let at_hard_end =
                matches!(cursor.end, Some(Watermark::Timestamp(end)) if start >= end);
            return Ok(FetchResult::empty(cursor.clone(), at_hard_end));
        }

        let mut query = RecordQuery::new()
            .filter(
                Predicate::cmp(&self.ts_field, CmpOp::GtEq, Value::Timestamp(start)).and(
                    Predicate::cmp(&self.ts_field, CmpOp::Lt, Value::Timestamp(window_end)),
                ),
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

        let Some(last) = rows.last() else {
            if cursor.step().is_some() {
                // Fixed-width scan over an empty window: close it and move on.
                next.advance_to(Watermark::Timestamp(window_end));
                return Ok(FetchResult::empty(next, false));
            }
            // Unbounded tail: stay put and wait for more data.
            return Ok(FetchResult::empty(next, true));
        };

        let last_ts = self.row_ts(last)?;

        if rows.len() == cursor.batch_size {
            // The window may hold more rows at last_ts than we have seen;
            // pin start on the boundary and remember how many of its rows
            // are already consumed.
            let mut at_boundary = 0;
            for row in &rows {
                if self.row_ts(row)? == last_ts {
                    at_boundary += 1;
                }
            }
            if last_ts == start {
                next.row_offset = cursor.row_offset + at_boundary;
            } else {
                next.start = Watermark::Timestamp(last_ts);
                next.row_offset = at_boundary;
            }
            return Ok(FetchResult::with_rows(rows, next, false));
        }

        // Short batch: everything at last_ts is consumed, step past it.
        next.advance_to(Watermark::Timestamp(last_ts + Duration::microseconds(1)));
        Ok(FetchResult::with_rows(rows, next, true))
    }

    fn describe(&self) -> String {
        format!("time-window over '{}'", self.ts_field)
    }
}
