use crate::error::CursorStoreError;
use async_trait::async_trait;
use model::pagination::cursor::ExtractionCursor;
use std::path::Path;

/// Persisted cursor state, keyed by pipeline name. The engine never calls
/// `save` itself: the caller persists after a round's target-side work has
/// committed, so a crash between the two re-delivers instead of losing rows.
#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn load(&self, pipeline: &str) -> Result<Option<ExtractionCursor>, CursorStoreError>;

    async fn save(
        &self,
        pipeline: &str,
        cursor: &ExtractionCursor,
    ) -> Result<(), CursorStoreError>;
}

pub struct SledCursorStore {
    db: sled::Db,
}

impl SledCursorStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, sled::Error> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    #[inline]
    fn key(pipeline: &str) -> String {
        format!("cursor:{pipeline}")
    }
}

#[async_trait]
impl CursorStore for SledCursorStore {
    async fn load(&self, pipeline: &str) -> Result<Option<ExtractionCursor>, CursorStoreError> {
        match self.db.get(Self::key(pipeline))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn save(
        &self,
        pipeline: &str,
        cursor: &ExtractionCursor,
    ) -> Result<(), CursorStoreError> {
        let bytes = bincode::serialize(cursor)?;
        self.db.insert(Self::key(pipeline), bytes)?;
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::pagination::cursor::Watermark;
    use tempfile::tempdir;

    #[tokio::test]
    async fn round_trips_a_cursor() {
        let dir = tempdir().unwrap();
        let store = SledCursorStore::open(dir.path()).unwrap();

        assert!(store.load("orders").await.unwrap().is_none());

        let mut cursor = ExtractionCursor::new(500)
            .with_start(Watermark::Id(42))
            .with_step_secs(3600);
        cursor.row_offset = 3;

        store.save("orders", &cursor).await.unwrap();
        let loaded = store.load("orders").await.unwrap().unwrap();
        assert_eq!(loaded, cursor);
    }

    #[tokio::test]
    async fn pipelines_are_isolated() {
        let dir = tempdir().unwrap();
        let store = SledCursorStore::open(dir.path()).unwrap();

        let a = ExtractionCursor::new(100).with_start(Watermark::Id(1));
        let b = ExtractionCursor::new(200).with_start(Watermark::Id(2));
        store.save("a", &a).await.unwrap();
        store.save("b", &b).await.unwrap();

        assert_eq!(store.load("a").await.unwrap().unwrap(), a);
        assert_eq!(store.load("b").await.unwrap().unwrap(), b);
    }
}
