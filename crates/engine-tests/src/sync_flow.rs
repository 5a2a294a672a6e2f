#[cfg(test)]
mod tests {
    use crate::fixtures::{event, events_table, ids_of, order, orders_table, ts};
    use engine::{
        extract::{IdentityExtractor, TimeWindowExtractor},
        pipeline::{Pipeline, RoundOutcome},
        settings::PipelineSettings,
        sync::SyncApplier,
    };
    use model::{
        core::value::Value,
        pagination::cursor::{ExtractionCursor, Watermark},
    };
    use std::sync::Arc;
    use store::{mem::MemTable, sink::RecordSink};
    use tracing_test::traced_test;

    async fn sync_pipeline(
        source: Arc<MemTable>,
        target: Arc<MemTable>,
        cursor: ExtractionCursor,
    ) -> Pipeline<SyncApplier> {
        let extractor = IdentityExtractor::new(source, "id").unwrap();
        let applier = SyncApplier::new(target, "id").unwrap();
        Pipeline::new(
            PipelineSettings::new("orders-sync"),
            Box::new(extractor),
            cursor,
            applier,
        )
    }

    #[traced_test]
    #[tokio::test]
    async fn backfill_switches_to_merge_on_first_empty_fetch() {
        let t0 = ts("2024-05-01T00:00:00Z");
        let source = events_table(
            (1..=5)
                .map(|i| event(i, t0 + chrono::Duration::minutes(i as i64)))
                .collect(),
        )
        .await;
        let target = Arc::new(MemTable::new("events", "id"));

        let extractor = TimeWindowExtractor::new(source, "created_at", "id").unwrap();
        let applier = SyncApplier::new(target.clone(), "id").unwrap();
        let mut p = Pipeline::new(
            PipelineSettings::new("events-sync"),
            Box::new(extractor),
            ExtractionCursor::new(10).with_start(Watermark::Timestamp(t0)),
            applier,
        );

        // First round backfills everything in one short batch; the flag
        // stays up because no fetch has come back empty yet.
        assert_eq!(p.process().await.unwrap(), RoundOutcome::Applied { rows: 5 });
        assert!(p.applier().insert_only());
        assert_eq!(ids_of(&target).await, vec![1, 2, 3, 4, 5]);

        // The next round finds nothing: caught up, switch to merge writes.
        assert_eq!(p.process().await.unwrap(), RoundOutcome::NoWork);
        assert!(!p.applier().insert_only());
        assert!(logs_contain("Backfill caught up"));

        let snap = p.stats().snapshot();
        assert_eq!(snap.total, 5);
        assert_eq!(snap.changes, 0);
        assert_eq!(snap.rounds, 1);
    }

    #[tokio::test]
    async fn populated_target_never_enters_insert_only() {
        let source = orders_table(vec![order(1, "new")]).await;
        let target = orders_table(vec![order(1, "new")]).await;

        let mut p = sync_pipeline(
            source,
            target,
            ExtractionCursor::new(10).with_start(Watermark::Id(1)),
        )
        .await;

        p.process().await.unwrap();
        assert!(!p.applier().insert_only());
    }

    #[tokio::test]
    async fn merge_is_idempotent_across_reruns() {
        let source = orders_table(vec![
            order(1, "new"),
            order(2, "paid"),
            order(3, "shipped"),
        ])
        .await;
        let target = orders_table(vec![
            order(1, "new"),
            order(2, "paid"),
            order(3, "shipped"),
        ])
        .await;

        // First pass over an identical target: nothing to do.
        let mut p = sync_pipeline(
            source.clone(),
            target.clone(),
            ExtractionCursor::new(10).with_start(Watermark::Id(1)),
        )
        .await;
        assert_eq!(p.process().await.unwrap(), RoundOutcome::Applied { rows: 3 });
        let snap = p.stats().snapshot();
        assert_eq!(snap.total, 0);
        assert_eq!(snap.changes, 0);
        assert_eq!(snap.success, 3);

        // Touch one source row, then replay the same range twice.
        source
            .update("id", order(2, "refunded"))
            .await
            .unwrap();

        let mut p = sync_pipeline(
            source.clone(),
            target.clone(),
            ExtractionCursor::new(10).with_start(Watermark::Id(1)),
        )
        .await;
        p.process().await.unwrap();
        assert_eq!(p.stats().snapshot().changes, 1);

        let mut p = sync_pipeline(
            source,
            target.clone(),
            ExtractionCursor::new(10).with_start(Watermark::Id(1)),
        )
        .await;
        p.process().await.unwrap();
        // Second application of the same batch changes nothing.
        assert_eq!(p.stats().snapshot().changes, 0);
        assert_eq!(
            target
                .find_by_key("id", &Value::Uint(2))
                .await
                .unwrap()
                .unwrap()
                .get_value("status"),
            Value::String("refunded".into())
        );
    }

    #[tokio::test]
    async fn inclusive_boundary_redelivery_is_deduped_by_merge() {
        // Batch size 2 over ids 1..=4: every round after the first re-reads
        // the previous boundary row. With merge writes the overlap lands as
        // Unchanged instead of a duplicate.
        let source = orders_table((1..=4).map(|i| order(i, "new")).collect()).await;
        let target = orders_table(vec![order(99, "sentinel")]).await;

        let mut p = sync_pipeline(
            source,
            target.clone(),
            ExtractionCursor::new(2).with_start(Watermark::Id(1)),
        )
        .await;

        for _ in 0..4 {
            p.process().await.unwrap();
        }

        assert_eq!(ids_of(&target).await, vec![1, 2, 3, 4, 99]);
        let snap = p.stats().snapshot();
        assert_eq!(snap.total, 4);
        assert_eq!(snap.errors, 0);
    }
}
