//! weft-engine: the conversational engine
//!
//! This crate drives multi-turn conversations over a [`weft_wire::Backend`]:
//! the turn loop with tool execution, continuation-token bookkeeping,
//! retries, context compaction, and conversation persistence.

pub mod attach;
pub mod compaction;
pub mod error;
pub mod events;
pub mod handle;
pub mod history;
pub mod hooks;
pub mod resilience;
pub mod state;
pub mod store;
pub mod thread;
pub mod tool;

pub use compaction::{CompactionConfig, CompactionReason};
pub use error::{Error, Result};
pub use events::ThreadEvent;
pub use handle::ThreadHandle;
pub use history::ConversationHistory;
pub use hooks::FollowUpHook;
pub use resilience::RetryPolicy;
pub use state::ThreadState;
pub use store::{ConversationRecord, ConversationStore, ConversationSummary, FileStore};
pub use thread::{SendOptions, Thread, ThreadConfig};
pub use tool::{BoxedTool, Tool, ToolOutcome, to_tool_spec};
