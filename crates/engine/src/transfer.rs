use crate::error::TransferError;
use model::core::value::Value;
use std::{collections::HashMap, sync::Arc, time::Instant};
use store::{
    catalog::TableCatalog,
    error::StoreError,
    query::{OrderDir, RecordQuery},
    sink::RecordSink,
    source::RecordSource,
};
use tracing::info;

/// Copy only the last `rows` rows of a table instead of the whole thing,
/// walking them oldest-first or newest-first.
#[derive(Debug, Clone, Copy)]
pub struct TailSlice {
    pub rows: usize,
    pub newest_first: bool,
}

#[derive(Debug, Clone)]
pub struct TableReport {
    pub table: String,
    pub copied: u64,
    pub skipped: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TransferReport {
    pub tables: Vec<TableReport>,
}

impl TransferReport {
    pub fn total_copied(&self) -> u64 {
        self.tables.iter().map(|t| t.copied).sum()
    }
}

/// One-shot whole-table mover between two catalogs.
///
/// Unlike the incremental sync this tolerates no per-record failures: each
/// table is copied inside a single target-side transaction and the first
/// error rolls the whole table back and propagates. One-shot migrations
/// want all-or-nothing; continuous sync wants forward progress.
pub struct TableTransfer {
    source: Arc<dyn TableCatalog>,
    target: Arc<dyn TableCatalog>,
    key_field: String,
    tables: Option<Vec<String>>,
    page_size: usize,
    skip_nonempty: bool,
    keep_identity: bool,
    partial: HashMap<String, TailSlice>,
}

impl TableTransfer {
    pub fn new(
        source: Arc<dyn TableCatalog>,
        target: Arc<dyn TableCatalog>,
        key_field: &str,
    ) -> Self {
        TableTransfer {
            source,
            target,
            key_field: key_field.to_string(),
            tables: None,
            page_size: 500,
            skip_nonempty: false,
            keep_identity: true,
            partial: HashMap::new(),
        }
    }

    /// Restrict the copy to an explicit table list instead of the whole
    /// source catalog.
    pub fn tables(mut self, tables: Vec<String>) -> Self {
        self.tables = Some(tables);
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Leave tables alone when the target side already holds rows.
    pub fn skip_nonempty(mut self) -> Self {
        self.skip_nonempty = true;
        self
    }

    /// When cleared, source key values are dropped and the target assigns
    /// fresh ones.
    pub fn keep_identity(mut self, keep: bool) -> Self {
        self.keep_identity = keep;
        self
    }

    /// Copy only the most recent slice of the named table.
    pub fn partial(mut self, table: &str, slice: TailSlice) -> Self {
        self.partial.insert(table.to_string(), slice);
        self
    }

    pub async fn run(&self) -> Result<TransferReport, TransferError> {
        let names = match &self.tables {
            Some(explicit) => explicit.clone(),
            None => self.source.table_names().await?,
        };

        let mut report = TransferReport::default();
        for name in names {
            report.tables.push(self.copy_table(&name).await?);
        }
        Ok(report)
    }

    async fn copy_table(&self, table: &str) -> Result<TableReport, TransferError> {
        let src = self.source.source(table).await?;
        let dst = self.target.sink(table).await?;

        if self.skip_nonempty {
            let existing = dst.count().await.map_err(|source| TransferError::Copy {
                table: table.to_string(),
                source,
            })?;
            if existing > 0 {
                info!(table, existing, "Target not empty, skipping table");
                return Ok(TableReport {
                    table: table.to_string(),
                    copied: 0,
                    skipped: true,
                });
            }
        }

        let started = Instant::now();
        dst.begin_transaction()
            .await
            .map_err(|source| TransferError::Copy {
                table: table.to_string(),
                source,
            })?;

        let copied = match self.copy_rows(table, src.as_ref(), dst.as_ref()).await {
            Ok(copied) => copied,
            Err(err) => {
                let _ = dst.rollback().await;
                return Err(err);
            }
        };

        if let Err(source) = dst.commit().await {
            let _ = dst.rollback().await;
            return Err(TransferError::Copy {
                table: table.to_string(),
                source,
            });
        }

        let elapsed = started.elapsed();
        let rows_per_sec = if elapsed.as_secs_f64() > 0.0 {
            copied as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };
        info!(
            table,
            copied,
            duration_ms = elapsed.as_millis() as u64,
            rows_per_sec = %format!("{rows_per_sec:.2}"),
            "Table copied"
        );

        Ok(TableReport {
            table: table.to_string(),
            copied,
            skipped: false,
        })
    }

    async fn copy_rows(
        &self,
        table: &str,
        src: &dyn RecordSource,
        dst: &dyn RecordSink,
    ) -> Result<u64, TransferError> {
        let wrap = |source: StoreError| TransferError::Copy {
            table: table.to_string(),
            source,
        };

        let slice = self.partial.get(table).copied();
        let (mut offset, dir, cap) = match slice {
            Some(s) if s.newest_first => (0, OrderDir::Desc, Some(s.rows)),
            Some(s) => {
                let total = src.count().await.map_err(wrap)? as usize;
                (total.saturating_sub(s.rows), OrderDir::Asc, Some(s.rows))
            }
            None => (0, OrderDir::Asc, None),
        };

        let mut copied = 0u64;
        loop {
            let page = match cap {
                Some(cap) => self.page_size.min(cap.saturating_sub(copied as usize)),
                None => self.page_size,
            };
            if page == 0 {
                break;
            }

            let query = RecordQuery::new()
                .order_by(&self.key_field, dir)
                .offset(offset)
                .limit(page);
            let rows = src.find_all(&query).await.map_err(wrap)?;
            let fetched = rows.len();

            for mut row in rows {
                if !self.keep_identity {
                    row.set_value(&self.key_field, Value::Null);
                }
                dst.insert(row).await.map_err(wrap)?;
                copied += 1;
            }

            if fetched < page {
                break;
            }
            offset += fetched;
        }
        Ok(copied)
    }
}
