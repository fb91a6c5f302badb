//! weft-wire: wire-level conversation model
//!
//! This crate defines the stored-item history model, the streaming event
//! protocol with its interpreter, and the backend abstraction the engine
//! drives. One concrete backend is included: the OpenAI Responses API.

pub mod backend;
pub mod error;
pub mod item;
pub mod stream;
pub mod types;

pub use backend::{Backend, BackendProfile, ResponsesBackend, SubmitRequest};
pub use error::{Error, Result};
pub use item::{Role, StoredItem};
pub use stream::{EventSink, Interpreter, NullSink, WireEvent, WireEventStream};
pub use types::{Reply, ToolCallRequest, ToolSpec, Usage};
