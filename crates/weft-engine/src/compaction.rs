//! Context compaction support
//!
//! When a conversation approaches the model's context window the thread
//! compacts it: structurally via the backend when supported, otherwise by
//! summarizing the history into a single replacement message. This module
//! holds the trigger logic, token estimation, and prompts; the orchestration
//! lives on the thread.

use serde::{Deserialize, Serialize};
use weft_wire::StoredItem;

/// Configuration for context compaction
#[derive(Debug, Clone)]
pub struct CompactionConfig {
    /// Trigger automatic compaction once context utilization reaches this
    /// ratio of the window. Values outside (0, 1] disable the trigger.
    pub auto_ratio: f64,
    /// Turn off automatic compaction entirely (manual still works)
    pub disable_auto: bool,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            auto_ratio: 0.8,
            disable_auto: false,
        }
    }
}

/// Reason for compaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompactionReason {
    /// Context utilization crossed the configured ratio
    Threshold,
    /// Explicit request
    Manual,
}

/// Check whether context utilization warrants automatic compaction
pub fn should_compact(used: u32, window: u32, ratio: f64) -> bool {
    if ratio <= 0.0 || ratio > 1.0 {
        return false;
    }
    if window == 0 {
        return false;
    }
    (used as f64 / window as f64) >= ratio
}

// --- Token Estimation ---

/// Estimate token count for a single item (chars/4 heuristic)
pub fn estimate_tokens(item: &StoredItem) -> u32 {
    let char_count = match item {
        StoredItem::Message { text, payload, .. } => {
            text.len()
                + payload
                    .as_ref()
                    .map(|p| p.to_string().len())
                    .unwrap_or(0)
        }
        StoredItem::ToolCall {
            name, arguments, ..
        } => name.len() + arguments.len(),
        StoredItem::ToolResult { output, .. } => output.len(),
        StoredItem::Reasoning { text } => text.len(),
        StoredItem::Compaction { payload } | StoredItem::Unknown { payload, .. } => {
            payload.to_string().len()
        }
    };
    (char_count / 4) as u32
}

/// Estimate total tokens for a slice of items
pub fn estimate_total_tokens(items: &[StoredItem]) -> u32 {
    items.iter().map(estimate_tokens).sum()
}

// --- Prompts ---

/// Appended as a user message when a summary sub-thread compacts history
pub const COMPACT_PROMPT: &str = "\
Create a comprehensive summary of the conversation so far that preserves all \
essential context for continued development work. The summary should cover:

1. **Goal**: The user's primary objectives and detailed requirements.
2. **Progress**: What has been accomplished, with specific changes made.
3. **Key Decisions**: Important technical decisions and their reasons.
4. **Problems**: Errors encountered and how they were resolved.
5. **Next Steps**: What remains to be done, in order.
6. **Critical Context**: Constraints, preferences, file paths, and commands \
that would otherwise be lost.

Format your response as a structured summary using the headers above. Be \
thorough but concise; this summary will replace the conversation history, so \
it must stand alone.";

/// Asks for a one-line conversation title for listings
pub const SHORT_SUMMARY_PROMPT: &str = "\
Summarise the conversation in one sentence of at most 12 words. Use active, \
descriptive language without first-person pronouns and reply with the \
sentence only.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_compact_threshold() {
        assert!(should_compact(80_000, 100_000, 0.8));
        assert!(should_compact(95_000, 100_000, 0.8));
        assert!(!should_compact(79_999, 100_000, 0.8));
    }

    #[test]
    fn test_should_compact_rejects_bad_ratio() {
        assert!(!should_compact(99_000, 100_000, 0.0));
        assert!(!should_compact(99_000, 100_000, -0.5));
        assert!(!should_compact(99_000, 100_000, 1.5));
    }

    #[test]
    fn test_should_compact_rejects_zero_window() {
        assert!(!should_compact(50_000, 0, 0.8));
    }

    #[test]
    fn test_estimate_tokens_chars_over_four() {
        let item = StoredItem::user("a".repeat(400));
        assert_eq!(estimate_tokens(&item), 100);

        let call = StoredItem::tool_call("call_1", "bash", "x".repeat(96));
        assert_eq!(estimate_tokens(&call), 25);
    }

    #[test]
    fn test_estimate_total_sums_items() {
        let items = vec![
            StoredItem::user("a".repeat(40)),
            StoredItem::assistant("b".repeat(40)),
        ];
        assert_eq!(estimate_total_tokens(&items), 20);
    }
}
