//! Thread event types

use serde::{Deserialize, Serialize};
use weft_wire::Usage;

use crate::compaction::CompactionReason;

/// Events emitted while a thread runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ThreadEvent {
    /// A send started processing
    ThreadStart,

    /// A new turn started
    TurnStart { turn: u32 },

    /// Assistant text delta
    TextDelta { delta: String },

    /// Thinking block opened
    ReasoningStart,

    /// Thinking text delta
    ReasoningDelta { delta: String },

    /// Thinking block closed
    ReasoningEnd,

    /// Tool-call fragment streamed from the model
    ToolCallUpdate {
        index: usize,
        name: Option<String>,
        arguments: Option<String>,
    },

    /// The reply's output blocks finished
    BlockEnd,

    /// Tool execution started
    ToolStart {
        call_id: String,
        name: String,
        arguments: String,
    },

    /// Tool execution completed
    ToolEnd {
        call_id: String,
        name: String,
        output: String,
        is_error: bool,
    },

    /// A turn completed
    TurnEnd { turn: u32, usage: Usage },

    /// Context compaction started
    CompactionStart { reason: CompactionReason },

    /// Context compaction completed
    CompactionEnd {
        tokens_before: u32,
        tokens_after: u32,
    },

    /// The send finished
    ThreadEnd { turns: u32, usage: Usage },

    /// Error occurred
    Error { message: String },
}

impl ThreadEvent {
    /// Check if this is a terminal event
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ThreadEvent::ThreadEnd { .. } | ThreadEvent::Error { .. }
        )
    }
}
