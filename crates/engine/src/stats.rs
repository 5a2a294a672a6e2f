use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct Inner {
    total: AtomicU64,
    success: AtomicU64,
    changes: AtomicU64,
    rounds: AtomicU64,
    errors: AtomicU64,
    message: Mutex<Option<String>>,
}

/// Pipeline counters, updated only by the orchestrator and read-only for
/// everyone holding a cloned handle.
///
/// `total` counts newly inserted records, `changes` counts merged updates,
/// `success` counts every record applied without error, `rounds` counts
/// non-empty batches, `errors` is cumulative. `message` holds the last
/// error text and is cleared by the next fully clean round.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    inner: Arc<Inner>,
}

#[derive(Debug, Clone, Default)]
pub struct StatsSnapshot {
    pub total: u64,
    pub success: u64,
    pub changes: u64,
    pub rounds: u64,
    pub errors: u64,
    pub message: Option<String>,
}

impl Stats {
    pub fn new() -> Self {
        Stats::default()
    }

    pub fn add_total(&self, count: u64) {
        self.inner.total.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_success(&self, count: u64) {
        self.inner.success.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_changes(&self, count: u64) {
        self.inner.changes.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_round(&self) {
        self.inner.rounds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, message: &str) {
        self.inner.errors.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut slot) = self.inner.message.lock() {
            *slot = Some(message.to_string());
        }
    }

    pub fn clear_message(&self) {
        if let Ok(mut slot) = self.inner.message.lock() {
            *slot = None;
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total: self.inner.total.load(Ordering::Relaxed),
            success: self.inner.success.load(Ordering::Relaxed),
            changes: self.inner.changes.load(Ordering::Relaxed),
            rounds: self.inner.rounds.load(Ordering::Relaxed),
            errors: self.inner.errors.load(Ordering::Relaxed),
            message: self
                .inner
                .message
                .lock()
                .ok()
                .and_then(|slot| slot.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_share_one_accumulator() {
        let stats = Stats::new();
        let observer = stats.clone();

        stats.add_total(3);
        stats.add_changes(1);
        stats.record_error("boom");

        let snap = observer.snapshot();
        assert_eq!(snap.total, 3);
        assert_eq!(snap.changes, 1);
        assert_eq!(snap.errors, 1);
        assert_eq!(snap.message.as_deref(), Some("boom"));

        stats.clear_message();
        assert!(observer.snapshot().message.is_none());
    }
}
