//! Core wire types shared by backends and the engine

use serde::{Deserialize, Serialize};

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input: u32,
    pub output: u32,
    pub cache_read: u32,
    pub cache_write: u32,
    /// Reasoning tokens billed as output
    pub reasoning: u32,
}

impl Usage {
    /// Accumulate another exchange's usage into this one
    pub fn add(&mut self, other: &Usage) {
        self.input += other.input;
        self.output += other.output;
        self.cache_read += other.cache_read;
        self.cache_write += other.cache_write;
        self.reasoning += other.reasoning;
    }

    /// Context occupied by the exchange this usage describes: everything the
    /// model read plus everything it wrote
    pub fn total_context(&self) -> u32 {
        self.input + self.cache_read + self.output
    }
}

/// Tool definition advertised to the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name (used in API calls)
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON Schema for parameters
    pub parameters: serde_json::Value,
}

impl ToolSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A tool invocation accumulated from a reply stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallRequest {
    pub call_id: String,
    pub name: String,
    /// Raw JSON-text arguments, concatenated across stream fragments
    pub arguments: String,
}

/// One fully-interpreted model reply
#[derive(Debug, Clone, Default)]
pub struct Reply {
    /// Assistant text, concatenated across deltas
    pub text: String,
    /// Thinking text, if the model produced any
    pub reasoning: Option<String>,
    /// Tool invocations in stream order
    pub calls: Vec<ToolCallRequest>,
    pub usage: Usage,
    /// Continuation token for the next submission, when the backend issues one
    pub response_id: Option<String>,
}

impl Reply {
    pub fn tools_used(&self) -> bool {
        !self.calls.is_empty()
    }
}
