//! Mutable conversation state outside the item history

use std::collections::HashMap;

use serde_json::Value;
use weft_wire::Usage;

/// Everything a thread tracks besides its items
#[derive(Debug, Clone)]
pub struct ThreadState {
    /// Continuation token covering the acknowledged history prefix
    pub continuation: Option<String>,
    /// Cumulative usage across the whole conversation
    pub usage: Usage,
    /// Context occupied by the most recent exchange, for the auto-compaction
    /// ratio test
    pub last_context: u32,
    /// Short human-readable summary for conversation listings
    pub summary: Option<String>,
    /// Whether this is a first-class conversation. Utility sub-threads run
    /// on copies: never persisted, never eventful.
    pub primary: bool,
    /// Structured tool results keyed by call id; cleared on compaction
    pub tool_results: HashMap<String, Value>,
    /// File path -> last-access epoch millis, kept for file-aware tools;
    /// cleared on compaction
    pub file_access: HashMap<String, i64>,
}

impl Default for ThreadState {
    fn default() -> Self {
        Self {
            continuation: None,
            usage: Usage::default(),
            last_context: 0,
            summary: None,
            primary: true,
            tool_results: HashMap::new(),
            file_access: HashMap::new(),
        }
    }
}

impl ThreadState {
    /// Record a file access at the current instant
    pub fn touch_file(&mut self, path: impl Into<String>) {
        self.file_access
            .insert(path.into(), chrono::Utc::now().timestamp_millis());
    }

    /// Post-compaction reset: the token no longer matches the rewritten
    /// history, cached results refer to items that are gone, and the last
    /// context measurement describes the history before the rewrite.
    pub fn reset_after_compaction(&mut self) {
        self.continuation = None;
        self.last_context = 0;
        self.tool_results.clear();
        self.file_access.clear();
    }
}
