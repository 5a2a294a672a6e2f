use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Position inside the source collection's ordering field.
///
/// `Unset` is the "never ran" sentinel: extractors refuse to fetch until the
/// caller (or a first successful round) has given the cursor a real start.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub enum Watermark {
    #[default]
    Unset,
    Id(u64),
    Timestamp(DateTime<Utc>),
}

impl Watermark {
    pub fn is_set(&self) -> bool {
        !matches!(self, Watermark::Unset)
    }

    pub fn as_id(&self) -> Option<u64> {
        match self {
            Watermark::Id(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Watermark::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Watermarks of the same kind order naturally; `Unset` sorts before
    /// everything. Mixed id/timestamp watermarks are not comparable.
    pub fn try_cmp(&self, other: &Watermark) -> Option<Ordering> {
        use Watermark::*;
        match (self, other) {
            (Unset, Unset) => Some(Ordering::Equal),
            (Unset, _) => Some(Ordering::Less),
            (_, Unset) => Some(Ordering::Greater),
            (Id(a), Id(b)) => Some(a.cmp(b)),
            (Timestamp(a), Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// Where extraction stands in the source collection.
///
/// The cursor is a plain value: extractors never mutate it, they return an
/// advanced copy inside the fetch result, and the caller decides when (and
/// whether) to persist it. `row_offset` is only nonzero while consecutive
/// rows share the exact `start` boundary value; it is the skip count inside
/// that value's bucket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionCursor {
    pub start: Watermark,
    pub end: Option<Watermark>,
    pub row_offset: usize,
    pub step_secs: Option<i64>,
    pub batch_size: usize,
}

impl ExtractionCursor {
    pub fn new(batch_size: usize) -> Self {
        ExtractionCursor {
            start: Watermark::Unset,
            end: None,
            row_offset: 0,
            step_secs: None,
            batch_size,
        }
    }

    pub fn with_start(mut self, start: Watermark) -> Self {
        self.start = start;
        self
    }

    pub fn with_end(mut self, end: Watermark) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_step_secs(mut self, secs: i64) -> Self {
        self.step_secs = Some(secs);
        self
    }

    pub fn step(&self) -> Option<Duration> {
        self.step_secs.map(Duration::seconds)
    }

    /// `start <= end` whenever an end bound is present.
    pub fn bounds_valid(&self) -> bool {
        let Some(end) = &self.end else { return true };
        if !self.start.is_set() {
            return true;
        }
        matches!(
            self.start.try_cmp(end),
            Some(Ordering::Less | Ordering::Equal)
        )
    }

    /// Moves `start` to a new watermark, resetting the intra-boundary
    /// offset. Any advance of `start` invalidates the old skip count.
    pub fn advance_to(&mut self, start: Watermark) {
        self.start = start;
        self.row_offset = 0;
    }

    /// Lexicographic `(start, row_offset)` position used to check monotonic
    /// progress across fetches.
    pub fn position_cmp(&self, other: &ExtractionCursor) -> Option<Ordering> {
        match self.start.try_cmp(&other.start)? {
            Ordering::Equal => Some(self.row_offset.cmp(&other.row_offset)),
            ord => Some(ord),
        }
    }
}
