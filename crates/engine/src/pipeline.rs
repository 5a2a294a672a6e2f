use crate::{
    error::{PipelineError, RecordError},
    extract::Extractor,
    settings::PipelineSettings,
    stats::Stats,
};
use async_trait::async_trait;
use model::{pagination::cursor::ExtractionCursor, records::row::RowData};
use std::time::Instant;
use store::error::StoreError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// What happened to one record inside a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Inserted,
    Updated,
    Unchanged,
}

/// Result of one `process()` round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// A batch was fetched and applied; `rows` records went through cleanly.
    Applied { rows: usize },
    /// The fetch came back empty; nothing to do this round.
    NoWork,
    /// The cursor has no usable start watermark yet.
    NotReady,
    Cancelled,
}

/// Consumer side of one batch. The orchestrator drives the lifecycle:
/// `on_init` once per pipeline lifetime, `begin`/`commit`/`rollback` around
/// each non-empty batch, `apply` per record, `on_drained` whenever a fetch
/// comes back empty.
#[async_trait]
pub trait BatchApplier: Send + Sync {
    async fn on_init(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn on_drained(&mut self) {}

    async fn begin(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn apply(&mut self, row: &RowData) -> Result<ApplyOutcome, RecordError>;

    async fn commit(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Adapts a plain per-record closure for pipelines without a target
/// collection (pure extraction hooks).
pub struct FnApplier<F>
where
    F: FnMut(&RowData) -> Result<ApplyOutcome, RecordError> + Send + Sync,
{
    f: F,
}

impl<F> FnApplier<F>
where
    F: FnMut(&RowData) -> Result<ApplyOutcome, RecordError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        FnApplier { f }
    }
}

#[async_trait]
impl<F> BatchApplier for FnApplier<F>
where
    F: FnMut(&RowData) -> Result<ApplyOutcome, RecordError> + Send + Sync,
{
    async fn apply(&mut self, row: &RowData) -> Result<ApplyOutcome, RecordError> {
        (self.f)(row)
    }
}

/// Drives the fetch -> apply-batch -> advance-cursor loop, one round per
/// `process()` call.
///
/// One logical worker per instance: `process()` takes `&mut self`, so a
/// caller cannot overlap rounds on the same pipeline, and independent
/// pipelines share no state. The in-memory cursor only moves past a batch
/// after the applier committed it; persisting the cursor (via a
/// `CursorStore`) stays the caller's job and happens after `process()`
/// returns, never before the data is durable.
pub struct Pipeline<A: BatchApplier> {
    settings: PipelineSettings,
    extractor: Box<dyn Extractor>,
    applier: A,
    cursor: ExtractionCursor,
    stats: Stats,
    cancel: CancellationToken,
    initialized: bool,
    consecutive_errors: u32,
    last_error: Option<String>,
}

impl<A: BatchApplier> Pipeline<A> {
    pub fn new(
        settings: PipelineSettings,
        extractor: Box<dyn Extractor>,
        cursor: ExtractionCursor,
        applier: A,
    ) -> Self {
        Pipeline {
            settings,
            extractor,
            applier,
            cursor,
            stats: Stats::new(),
            cancel: CancellationToken::new(),
            initialized: false,
            consecutive_errors: 0,
            last_error: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Cloned handle to the pipeline's counters.
    pub fn stats(&self) -> Stats {
        self.stats.clone()
    }

    /// Current cursor position, for persistence after a round.
    pub fn cursor(&self) -> &ExtractionCursor {
        &self.cursor
    }

    pub fn applier(&self) -> &A {
        &self.applier
    }

    /// Runs one round. Intended to be called repeatedly from an external
    /// scheduler; a fatal error aborts only the current round, and the next
    /// call retries from the last committed cursor position.
    pub async fn process(&mut self) -> Result<RoundOutcome, PipelineError> {
        // Cooperative stop, checked between rounds only; an in-flight batch
        // always completes.
        if self.cancel.is_cancelled() {
            return Ok(RoundOutcome::Cancelled);
        }
        if !self.settings.enabled {
            return Ok(RoundOutcome::NoWork);
        }
        if !self.initialized {
            self.init().await?;
        }

        let started = Instant::now();
        let fetched = self
            .extractor
            .fetch(&self.cursor)
            .await
            .map_err(|source| {
                let err = PipelineError::Fetch {
                    pipeline: self.settings.name.clone(),
                    source,
                };
                self.stats.record_error(&err.to_string());
                error!(pipeline = %self.settings.name, error = %err, "Fetch failed");
                err
            })?;

        if !fetched.ready {
            return Ok(RoundOutcome::NotReady);
        }

        if fetched.is_empty() {
            self.applier.on_drained().await;
            // An empty fetch may still close a window; adopting the cursor
            // here is safe because no rows ride on it.
            self.cursor = fetched.next;
            return Ok(RoundOutcome::NoWork);
        }

        let row_count = fetched.len();
        let applied = self.apply_batch(&fetched.rows).await?;

        // Data is durable; only now does the cursor move.
        self.cursor = fetched.next;
        self.stats.add_round();
        if applied.errors == 0 {
            self.stats.clear_message();
        }

        let elapsed = started.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;
        let rows_per_sec = if elapsed.as_secs_f64() > 0.0 {
            row_count as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };
        info!(
            pipeline = %self.settings.name,
            rows = row_count,
            applied = applied.clean,
            window = %self.extractor.describe(),
            position = ?self.cursor.start,
            row_offset = self.cursor.row_offset,
            duration_ms = elapsed_ms,
            rows_per_sec = %format!("{rows_per_sec:.2}"),
            "Round applied"
        );

        Ok(RoundOutcome::Applied {
            rows: applied.clean,
        })
    }

    async fn init(&mut self) -> Result<(), PipelineError> {
        self.settings.validate()?;
        if self.cursor.batch_size == 0 {
            return Err(crate::error::ConfigError::ZeroBatchSize.into());
        }
        if !self.cursor.bounds_valid() {
            return Err(crate::error::ConfigError::InvalidCursorBounds.into());
        }

        self.applier
            .on_init()
            .await
            .map_err(|source| PipelineError::Init {
                pipeline: self.settings.name.clone(),
                source,
            })?;

        info!(
            pipeline = %self.settings.name,
            window = %self.extractor.describe(),
            start = ?self.cursor.start,
            end = ?self.cursor.end,
            batch_size = self.cursor.batch_size,
            "Pipeline initialized"
        );
        self.initialized = true;
        Ok(())
    }

    async fn apply_batch(&mut self, rows: &[RowData]) -> Result<BatchReport, PipelineError> {
        self.applier
            .begin()
            .await
            .map_err(|source| self.fail_transaction(source))?;

        let mut report = BatchReport::default();
        for row in rows {
            match self.applier.apply(row).await {
                Ok(outcome) => {
                    self.consecutive_errors = 0;
                    self.last_error = None;
                    report.clean += 1;
                    self.stats.add_success(1);
                    match outcome {
                        ApplyOutcome::Inserted => self.stats.add_total(1),
                        ApplyOutcome::Updated => self.stats.add_changes(1),
                        ApplyOutcome::Unchanged => {}
                    }
                }
                Err(err) => {
                    // The same failure surfacing twice in a row (e.g. one
                    // cause rethrown through nested handlers) counts once.
                    if self.last_error.as_deref() == Some(err.message.as_str()) {
                        continue;
                    }
                    report.errors += 1;
                    self.consecutive_errors += 1;
                    self.last_error = Some(err.message.clone());
                    self.stats.record_error(&err.message);
                    error!(
                        pipeline = %self.settings.name,
                        error = %err,
                        consecutive = self.consecutive_errors,
                        "Record skipped"
                    );

                    if self.settings.max_errors > 0
                        && self.consecutive_errors >= self.settings.max_errors
                    {
                        let _ = self.applier.rollback().await;
                        let fatal = PipelineError::ErrorThreshold {
                            pipeline: self.settings.name.clone(),
                            count: self.consecutive_errors,
                            last: err.message,
                        };
                        error!(pipeline = %self.settings.name, error = %fatal, "Round aborted");
                        return Err(fatal);
                    }
                }
            }
        }

        if let Err(source) = self.applier.commit().await {
            let _ = self.applier.rollback().await;
            return Err(self.fail_transaction(source));
        }
        Ok(report)
    }

    fn fail_transaction(&self, source: StoreError) -> PipelineError {
        let err = PipelineError::Transaction {
            pipeline: self.settings.name.clone(),
            source,
        };
        self.stats.record_error(&err.to_string());
        error!(pipeline = %self.settings.name, error = %err, "Transaction failed");
        err
    }
}

#[derive(Debug, Default)]
struct BatchReport {
    clean: usize,
    errors: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::IdentityExtractor;
    use model::{
        core::value::{FieldValue, Value},
        pagination::cursor::Watermark,
    };
    use std::sync::Arc;
    use store::mem::MemTable;

    fn row(id: u64) -> RowData {
        RowData::new("orders", vec![FieldValue::new("id", Value::Uint(id))])
    }

    async fn pipeline_over(
        ids: std::ops::RangeInclusive<u64>,
        max_errors: u32,
        hook: impl FnMut(&RowData) -> Result<ApplyOutcome, RecordError> + Send + Sync,
    ) -> Pipeline<FnApplier<impl FnMut(&RowData) -> Result<ApplyOutcome, RecordError> + Send + Sync>>
    {
        let table = Arc::new(MemTable::new("orders", "id"));
        table.seed(ids.map(row).collect()).await;
        let extractor = IdentityExtractor::new(table, "id").unwrap();
        Pipeline::new(
            PipelineSettings::new("orders").with_max_errors(max_errors),
            Box::new(extractor),
            ExtractionCursor::new(4).with_start(Watermark::Id(1)),
            FnApplier::new(hook),
        )
    }

    #[tokio::test]
    async fn applies_batches_and_advances() {
        let mut p = pipeline_over(1..=6, 0, |_| Ok(ApplyOutcome::Inserted)).await;

        let first = p.process().await.unwrap();
        assert_eq!(first, RoundOutcome::Applied { rows: 4 });
        assert_eq!(p.cursor().start, Watermark::Id(4));

        let second = p.process().await.unwrap();
        // Boundary row 4 is re-delivered, so the short batch holds 3 rows.
        assert_eq!(second, RoundOutcome::Applied { rows: 3 });
        assert_eq!(p.cursor().start, Watermark::Id(6));

        let snap = p.stats().snapshot();
        assert_eq!(snap.rounds, 2);
        assert_eq!(snap.success, 7);
    }

    #[tokio::test]
    async fn tolerates_scattered_record_errors() {
        let mut failed = false;
        let mut p = pipeline_over(1..=4, 3, move |r| {
            if r.get_value("id") == Value::Uint(2) && !std::mem::replace(&mut failed, true) {
                Err(RecordError::new("bad record 2"))
            } else {
                Ok(ApplyOutcome::Inserted)
            }
        })
        .await;

        let outcome = p.process().await.unwrap();
        assert_eq!(outcome, RoundOutcome::Applied { rows: 3 });
        let snap = p.stats().snapshot();
        assert_eq!(snap.errors, 1);
        assert_eq!(snap.message.as_deref(), Some("bad record 2"));

        // The next fully clean round clears the sticky message.
        let outcome = p.process().await.unwrap();
        assert_eq!(outcome, RoundOutcome::Applied { rows: 1 });
        assert!(p.stats().snapshot().message.is_none());
    }

    #[tokio::test]
    async fn breaker_trips_after_consecutive_errors() {
        let mut p = pipeline_over(1..=10, 2, |r| {
            Err(RecordError::new(format!(
                "fail {}",
                r.get_value("id")
            )))
        })
        .await;

        let err = p.process().await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ErrorThreshold { count: 2, .. }
        ));
        // Cursor did not move past the failed batch.
        assert_eq!(p.cursor().start, Watermark::Id(1));
    }

    #[tokio::test]
    async fn repeated_identical_error_counts_once() {
        let mut p = pipeline_over(1..=4, 3, |_| Err(RecordError::new("same cause"))).await;

        // Every record fails with the same message; only the first one
        // counts, so the threshold of 3 is never reached.
        let outcome = p.process().await.unwrap();
        assert_eq!(outcome, RoundOutcome::Applied { rows: 0 });
        assert_eq!(p.stats().snapshot().errors, 1);
    }

    #[tokio::test]
    async fn zero_max_errors_disables_breaker() {
        let mut n = 0u64;
        let mut p = pipeline_over(1..=4, 0, move |_| {
            n += 1;
            Err(RecordError::new(format!("fail {n}")))
        })
        .await;

        let outcome = p.process().await.unwrap();
        assert_eq!(outcome, RoundOutcome::Applied { rows: 0 });
        assert_eq!(p.stats().snapshot().errors, 4);
    }

    #[tokio::test]
    async fn cancellation_checked_between_rounds() {
        let cancel = CancellationToken::new();
        let mut p = pipeline_over(1..=4, 0, |_| Ok(ApplyOutcome::Inserted))
            .await
            .with_cancel(cancel.clone());

        cancel.cancel();
        assert_eq!(p.process().await.unwrap(), RoundOutcome::Cancelled);
        assert_eq!(p.cursor().start, Watermark::Id(1));
    }

    #[tokio::test]
    async fn unset_cursor_reports_not_ready() {
        let table = Arc::new(MemTable::new("orders", "id"));
        let extractor = IdentityExtractor::new(table, "id").unwrap();
        let mut p = Pipeline::new(
            PipelineSettings::new("orders"),
            Box::new(extractor),
            ExtractionCursor::new(4),
            FnApplier::new(|_| Ok(ApplyOutcome::Inserted)),
        );
        assert_eq!(p.process().await.unwrap(), RoundOutcome::NotReady);
    }
}
