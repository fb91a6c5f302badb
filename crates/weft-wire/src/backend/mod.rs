//! Backend abstraction
//!
//! A [`Backend`] owns one wire protocol: it submits conversation input and
//! decodes the provider's stream into [`WireEvent`]s. Capabilities that vary
//! across providers (continuation tokens, native compaction) are declared in
//! the [`BackendProfile`] so the engine never needs provider-specific
//! branches.

pub mod responses;

pub use responses::ResponsesBackend;

use crate::error::Result;
use crate::item::StoredItem;
use crate::stream::WireEventStream;
use crate::types::ToolSpec;
use async_trait::async_trait;

/// Static capabilities of a backend
#[derive(Debug, Clone)]
pub struct BackendProfile {
    /// Provider identity, recorded with persisted conversations
    pub provider: String,
    /// Whether submissions may replace already-sent history with a
    /// continuation token
    pub supports_continuation: bool,
    /// Whether the backend can structurally compact history itself
    pub supports_compaction: bool,
}

/// One submission to the backend
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub model: String,
    /// Items to send. When `continuation` is set this is only the suffix the
    /// token does not cover.
    pub input: Vec<StoredItem>,
    pub instructions: Option<String>,
    pub tools: Vec<ToolSpec>,
    /// Continuation token standing for everything already submitted
    pub continuation: Option<String>,
    pub max_output_tokens: Option<u32>,
}

/// A conversation backend
#[async_trait]
pub trait Backend: Send + Sync {
    /// Capabilities and identity of this backend
    fn profile(&self) -> BackendProfile;

    /// Submit input and stream the reply
    async fn submit(&self, request: SubmitRequest) -> Result<WireEventStream>;

    /// Structurally compact history into a smaller item sequence.
    ///
    /// Only called when the profile advertises compaction support. An empty
    /// result means the backend declined; callers fall back to summarization.
    async fn compact(&self, items: &[StoredItem], model: &str) -> Result<Vec<StoredItem>>;
}
