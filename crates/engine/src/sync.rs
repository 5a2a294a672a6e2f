use crate::{
    error::{ConfigError, RecordError},
    pipeline::{ApplyOutcome, BatchApplier},
};
use async_trait::async_trait;
use model::records::row::RowData;
use std::sync::Arc;
use store::{error::StoreError, sink::RecordSink};
use tracing::info;

/// Merges fetched records into a target collection, with an adaptive
/// insert-only fast path for the initial backfill.
///
/// While the target is known to hold no overlapping rows (it was empty at
/// init), every record is written blind, skipping the existence lookup.
/// The first empty fetch means the extractor caught up to the live edge of
/// the source; from then on the source can emit re-touched rows as well as
/// new ones, so each record goes through get-or-create by its unique key.
/// The switch happens exactly once and never reverts within this applier's
/// lifetime.
pub struct SyncApplier {
    sink: Arc<dyn RecordSink>,
    key_field: String,
    insert_only: bool,
}

impl SyncApplier {
    pub fn new(sink: Arc<dyn RecordSink>, key_field: &str) -> Result<Self, ConfigError> {
        if key_field.trim().is_empty() {
            return Err(ConfigError::EmptyKeyField);
        }
        Ok(SyncApplier {
            sink,
            key_field: key_field.to_string(),
            insert_only: false,
        })
    }

    pub fn insert_only(&self) -> bool {
        self.insert_only
    }
}

#[async_trait]
impl BatchApplier for SyncApplier {
    async fn on_init(&mut self) -> Result<(), StoreError> {
        self.insert_only = self.sink.count().await? == 0;
        if self.insert_only {
            info!(key = %self.key_field, "Target is empty, backfilling insert-only");
        }
        Ok(())
    }

    async fn on_drained(&mut self) {
        if self.insert_only {
            info!(key = %self.key_field, "Backfill caught up, switching to merge writes");
            self.insert_only = false;
        }
    }

    async fn begin(&mut self) -> Result<(), StoreError> {
        self.sink.begin_transaction().await
    }

    async fn apply(&mut self, row: &RowData) -> Result<ApplyOutcome, RecordError> {
        let key = row.get_value(&self.key_field);
        if key.is_null() {
            return Err(RecordError::new(format!(
                "record has no value for key field '{}'",
                self.key_field
            )));
        }

        if self.insert_only {
            let mut target = RowData::new(&row.entity, Vec::new());
            target.copy_fields_from(row);
            self.sink.insert(target).await?;
            return Ok(ApplyOutcome::Inserted);
        }

        match self.sink.find_by_key(&self.key_field, &key).await? {
            None => {
                let mut target = RowData::new(&row.entity, Vec::new());
                target.copy_fields_from(row);
                self.sink.insert(target).await?;
                Ok(ApplyOutcome::Inserted)
            }
            Some(mut existing) => {
                if existing.copy_fields_from(row) == 0 {
                    // Identical field-for-field: skip the no-op update.
                    return Ok(ApplyOutcome::Unchanged);
                }
                self.sink.update(&self.key_field, existing).await?;
                Ok(ApplyOutcome::Updated)
            }
        }
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        self.sink.commit().await
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        self.sink.rollback().await
    }
}
