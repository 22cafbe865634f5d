//! Cursor math for paging through the journal newest-first.

use crate::types::SeqNo;

/// Sequence numbers of one history page: `from, from-1, …` down to
/// `max(1, from - size + 1)`. Empty when `from` is zero.
pub fn window_seqs(from: SeqNo, size: usize) -> Vec<SeqNo> {
    let size = size.max(1) as SeqNo;
    if from == 0 {
        return Vec::new();
    }
    let lowest = from.saturating_sub(size - 1).max(1);
    (lowest..=from).rev().collect()
}

/// "Load more" cursor over the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCursor {
    next_from: SeqNo,
    size: usize,
}

impl WindowCursor {
    /// Cursor starting at `latest` (usually the latest-trip counter).
    pub fn starting_at(latest: Option<SeqNo>, size: usize) -> Self {
        Self {
            next_from: latest.unwrap_or(0),
            size: size.max(1),
        }
    }

    /// True once every page was handed out.
    pub fn is_exhausted(&self) -> bool {
        self.next_from == 0
    }

    /// Page size.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Sequence numbers of the next page, advancing the cursor.
    pub fn advance(&mut self) -> Vec<SeqNo> {
        let seqs = window_seqs(self.next_from, self.size);
        self.next_from = self.next_from.saturating_sub(self.size as SeqNo);
        seqs
    }
}
