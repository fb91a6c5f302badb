//! Conversation history with a pending window
//!
//! The pending window is the contiguous suffix of history not yet covered by
//! the backend's continuation token. It is represented as a start index so
//! the suffix property holds by construction: everything before
//! `pending_start` has been acknowledged, everything at or after it is
//! pending.

use weft_wire::StoredItem;

/// Append-only conversation record
#[derive(Debug, Default, Clone)]
pub struct ConversationHistory {
    items: Vec<StoredItem>,
    pending_start: usize,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted items. Everything loaded is pending until a
    /// new continuation token is earned.
    pub fn from_items(items: Vec<StoredItem>) -> Self {
        Self {
            items,
            pending_start: 0,
        }
    }

    /// All items, oldest first
    pub fn items(&self) -> &[StoredItem] {
        &self.items
    }

    /// The suffix not yet covered by a continuation token
    pub fn pending(&self) -> &[StoredItem] {
        &self.items[self.pending_start..]
    }

    pub fn has_pending(&self) -> bool {
        self.pending_start < self.items.len()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append an item; it lands inside the pending window
    pub fn push(&mut self, item: StoredItem) {
        self.items.push(item);
    }

    /// Mark everything sent as covered by the current continuation token
    pub fn acknowledge(&mut self) {
        self.pending_start = self.items.len();
    }

    /// Widen the pending window to the whole history (token invalidated)
    pub fn reset_pending(&mut self) {
        self.pending_start = 0;
    }

    /// Swap in a new item sequence; everything becomes pending
    pub fn replace(&mut self, items: Vec<StoredItem>) {
        self.items = items;
        self.pending_start = 0;
    }

    /// Drop trailing tool calls that never received a result.
    ///
    /// A cancelled or failed turn can leave the history ending in calls whose
    /// results were never produced; submitting those makes backends reject
    /// the whole conversation. Interior call/result pairs are untouched.
    /// Idempotent.
    pub fn cleanup_orphans(&mut self) -> usize {
        let mut removed = 0;
        while self
            .items
            .last()
            .is_some_and(|item| item.is_tool_call())
        {
            self.items.pop();
            removed += 1;
        }
        if self.pending_start > self.items.len() {
            self.pending_start = self.items.len();
        }
        removed
    }
}
