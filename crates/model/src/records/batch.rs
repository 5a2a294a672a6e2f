use crate::{pagination::cursor::ExtractionCursor, records::row::RowData};

/// One bounded fetch: the rows plus the cursor to resume from.
///
/// Ownership of the rows transfers to the caller; the advanced cursor is
/// carried alongside them so the caller commits both together (data first,
/// cursor after).
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub rows: Vec<RowData>,
    pub next: ExtractionCursor,
    /// The extractor saw the end of the currently reachable data.
    pub reached_end: bool,
    /// False only when the cursor had no usable start watermark yet.
    pub ready: bool,
}

impl FetchResult {
    pub fn with_rows(rows: Vec<RowData>, next: ExtractionCursor, reached_end: bool) -> Self {
        FetchResult {
            rows,
            next,
            reached_end,
            ready: true,
        }
    }

    pub fn empty(next: ExtractionCursor, reached_end: bool) -> Self {
        FetchResult {
            rows: Vec::new(),
            next,
            reached_end,
            ready: true,
        }
    }

    pub fn not_ready(cursor: ExtractionCursor) -> Self {
        FetchResult {
            rows: Vec::new(),
            next: cursor,
            reached_end: false,
            ready: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}
