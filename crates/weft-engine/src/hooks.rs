//! Follow-up hooks
//!
//! When a turn ends without tool calls the thread is about to stop. Hooks
//! get one look at that moment and may inject further user input, which
//! keeps the loop running. Queued follow-up work, "are you sure" prompts,
//! and multi-step plans all hang off this seam.

use async_trait::async_trait;

/// Consulted whenever a reply terminates with no tool calls
#[async_trait]
pub trait FollowUpHook: Send + Sync {
    /// Return user messages to append before the loop continues. An empty
    /// vec lets the thread stop.
    async fn on_stop(&self, final_text: &str, turns: u32) -> Vec<String>;
}
