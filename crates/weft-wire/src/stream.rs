//! Streaming events and the stream interpreter
//!
//! Backends translate their wire protocol into [`WireEvent`]s. The
//! [`Interpreter`] consumes that stream, forwards display signals to an
//! [`EventSink`], and accumulates the final [`Reply`]. Signal ordering is
//! normalized here so sinks never see interleaving the protocol allows but
//! displays cannot render: reasoning opens before its first delta and closes
//! before any text or tool-call signal, and `block_end` fires exactly once
//! before the terminal outcome, even when the response failed after partial
//! content was already delivered.

use crate::error::{Error, Result};
use crate::types::{Reply, ToolCallRequest, Usage};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::{Stream, StreamExt};

/// Events produced by a backend's stream decoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireEvent {
    /// The backend opened a response and issued its continuation id
    Created { response_id: String },
    /// Assistant text delta
    TextDelta { delta: String },
    /// Thinking text delta
    ReasoningDelta { delta: String },
    /// The backend closed its reasoning output
    ReasoningEnd,
    /// Tool-call fragment. `name` and `arguments` fragments accumulate per
    /// index; neither ever overwrites what came before.
    ToolCallDelta {
        index: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        arguments: Option<String>,
    },
    /// The response finished all of its output
    Completed { usage: Usage },
    /// The response stopped before finishing (truncation, filter, failure)
    Incomplete { reason: String },
}

impl WireEvent {
    /// Check if this event ends the response
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WireEvent::Completed { .. } | WireEvent::Incomplete { .. }
        )
    }
}

/// A stream of wire events; transport failures surface as `Err` items
pub type WireEventStream = Pin<Box<dyn Stream<Item = Result<WireEvent>> + Send>>;

/// Display signals synthesized while interpreting a reply stream
///
/// All methods default to no-ops so sinks implement only what they render.
pub trait EventSink: Send {
    fn text_delta(&mut self, _delta: &str) {}
    fn reasoning_start(&mut self) {}
    fn reasoning_delta(&mut self, _delta: &str) {}
    fn reasoning_end(&mut self) {}
    fn tool_call_delta(&mut self, _index: usize, _name: Option<&str>, _arguments: Option<&str>) {}
    fn block_end(&mut self) {}
}

/// Sink that discards every signal
pub struct NullSink;

impl EventSink for NullSink {}

/// Accumulates a [`Reply`] from wire events while forwarding display signals
#[derive(Debug, Default)]
pub struct Interpreter {
    text: String,
    reasoning: String,
    reasoning_open: bool,
    calls: Vec<ToolCallRequest>,
    response_id: Option<String>,
    saw_content: bool,
    block_ended: bool,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one wire event. Returns the terminal outcome once the stream
    /// reaches it; partial signals have already been forwarded by then.
    pub fn feed(
        &mut self,
        event: WireEvent,
        sink: &mut dyn EventSink,
    ) -> Option<Result<Reply>> {
        match event {
            WireEvent::Created { response_id } => {
                self.response_id = Some(response_id);
                None
            }
            WireEvent::TextDelta { delta } => {
                self.close_reasoning(sink);
                self.saw_content = true;
                sink.text_delta(&delta);
                self.text.push_str(&delta);
                None
            }
            WireEvent::ReasoningDelta { delta } => {
                if !self.reasoning_open {
                    self.reasoning_open = true;
                    sink.reasoning_start();
                }
                self.saw_content = true;
                sink.reasoning_delta(&delta);
                self.reasoning.push_str(&delta);
                None
            }
            WireEvent::ReasoningEnd => {
                self.close_reasoning(sink);
                None
            }
            WireEvent::ToolCallDelta {
                index,
                call_id,
                name,
                arguments,
            } => {
                self.close_reasoning(sink);
                self.saw_content = true;
                sink.tool_call_delta(index, name.as_deref(), arguments.as_deref());
                let call = self.ensure_call(index);
                if let Some(id) = call_id {
                    call.call_id = id;
                }
                if let Some(fragment) = name {
                    call.name.push_str(&fragment);
                }
                if let Some(fragment) = arguments {
                    call.arguments.push_str(&fragment);
                }
                None
            }
            WireEvent::Completed { usage } => {
                self.finish_blocks(sink);
                Some(Ok(self.take_reply(usage)))
            }
            WireEvent::Incomplete { reason } => {
                self.finish_blocks(sink);
                Some(Err(Error::Incomplete { reason }))
            }
        }
    }

    /// Drive a whole event stream to its terminal outcome
    pub async fn interpret(
        mut stream: WireEventStream,
        sink: &mut dyn EventSink,
    ) -> Result<Reply> {
        let mut interpreter = Interpreter::new();
        while let Some(event) = stream.next().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    // Partial content was already forwarded; close it out
                    // before surfacing the failure.
                    if interpreter.saw_content {
                        interpreter.finish_blocks(sink);
                    }
                    return Err(e);
                }
            };
            if let Some(outcome) = interpreter.feed(event, sink) {
                return outcome;
            }
        }
        Err(Error::UnexpectedResponse(
            "stream ended without a terminal event".into(),
        ))
    }

    fn close_reasoning(&mut self, sink: &mut dyn EventSink) {
        if self.reasoning_open {
            self.reasoning_open = false;
            sink.reasoning_end();
        }
    }

    fn finish_blocks(&mut self, sink: &mut dyn EventSink) {
        self.close_reasoning(sink);
        if !self.block_ended {
            self.block_ended = true;
            sink.block_end();
        }
    }

    fn ensure_call(&mut self, index: usize) -> &mut ToolCallRequest {
        while self.calls.len() <= index {
            self.calls.push(ToolCallRequest::default());
        }
        &mut self.calls[index]
    }

    fn take_reply(&mut self, usage: Usage) -> Reply {
        Reply {
            text: std::mem::take(&mut self.text),
            reasoning: if self.reasoning.is_empty() {
                None
            } else {
                Some(std::mem::take(&mut self.reasoning))
            },
            calls: std::mem::take(&mut self.calls),
            usage,
            response_id: self.response_id.take(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        events: Vec<String>,
    }

    impl EventSink for RecordingSink {
        fn text_delta(&mut self, delta: &str) {
            self.events.push(format!("text_delta:{delta}"));
        }
        fn reasoning_start(&mut self) {
            self.events.push("reasoning_start".into());
        }
        fn reasoning_delta(&mut self, delta: &str) {
            self.events.push(format!("reasoning_delta:{delta}"));
        }
        fn reasoning_end(&mut self) {
            self.events.push("reasoning_end".into());
        }
        fn tool_call_delta(&mut self, index: usize, name: Option<&str>, arguments: Option<&str>) {
            self.events.push(format!(
                "tool_call_delta:{index}:{}:{}",
                name.unwrap_or(""),
                arguments.unwrap_or("")
            ));
        }
        fn block_end(&mut self) {
            self.events.push("block_end".into());
        }
    }

    fn event_stream(events: Vec<Result<WireEvent>>) -> WireEventStream {
        Box::pin(tokio_stream::iter(events))
    }

    fn text(delta: &str) -> Result<WireEvent> {
        Ok(WireEvent::TextDelta {
            delta: delta.into(),
        })
    }

    fn reasoning(delta: &str) -> Result<WireEvent> {
        Ok(WireEvent::ReasoningDelta {
            delta: delta.into(),
        })
    }

    fn completed() -> Result<WireEvent> {
        Ok(WireEvent::Completed {
            usage: Usage {
                input: 10,
                output: 5,
                ..Default::default()
            },
        })
    }

    fn call_fragment(
        index: usize,
        call_id: Option<&str>,
        name: Option<&str>,
        arguments: Option<&str>,
    ) -> Result<WireEvent> {
        Ok(WireEvent::ToolCallDelta {
            index,
            call_id: call_id.map(Into::into),
            name: name.map(Into::into),
            arguments: arguments.map(Into::into),
        })
    }

    #[tokio::test]
    async fn test_reasoning_then_text_signal_order() {
        let stream = event_stream(vec![reasoning("Thought"), text("Answer"), completed()]);
        let mut sink = RecordingSink::default();

        let reply = Interpreter::interpret(stream, &mut sink).await.unwrap();

        assert_eq!(
            sink.events,
            vec![
                "reasoning_start",
                "reasoning_delta:Thought",
                "reasoning_end",
                "text_delta:Answer",
                "block_end",
            ]
        );
        assert_eq!(reply.text, "Answer");
        assert_eq!(reply.reasoning.as_deref(), Some("Thought"));
        assert!(!reply.tools_used());
    }

    #[tokio::test]
    async fn test_incomplete_after_partial_text() {
        let stream = event_stream(vec![
            text("Partial"),
            Ok(WireEvent::Incomplete {
                reason: "max_output_tokens".into(),
            }),
        ]);
        let mut sink = RecordingSink::default();

        let err = Interpreter::interpret(stream, &mut sink)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("response incomplete"));
        assert!(err.to_string().contains("max_output_tokens"));
        // The partial delta was delivered and the block closed exactly once
        assert_eq!(sink.events, vec!["text_delta:Partial", "block_end"]);
    }

    #[tokio::test]
    async fn test_tool_call_fragments_concatenate() {
        let stream = event_stream(vec![
            call_fragment(0, Some("call_1"), Some("ba"), None),
            call_fragment(0, None, Some("sh"), Some(r#"{"com"#)),
            call_fragment(0, None, None, Some(r#"mand":"ls"}"#)),
            completed(),
        ]);
        let mut sink = RecordingSink::default();

        let reply = Interpreter::interpret(stream, &mut sink).await.unwrap();

        assert_eq!(reply.calls.len(), 1);
        assert_eq!(reply.calls[0].call_id, "call_1");
        assert_eq!(reply.calls[0].name, "bash");
        assert_eq!(reply.calls[0].arguments, r#"{"command":"ls"}"#);
    }

    #[tokio::test]
    async fn test_parallel_tool_calls_keyed_by_index() {
        let stream = event_stream(vec![
            call_fragment(0, Some("call_a"), Some("read"), Some(r#"{"path":"#)),
            call_fragment(1, Some("call_b"), Some("grep"), Some(r#"{"pattern":"x"}"#)),
            call_fragment(0, None, None, Some(r#""a.rs"}"#)),
            completed(),
        ]);
        let mut sink = NullSink;

        let reply = Interpreter::interpret(stream, &mut sink).await.unwrap();

        assert_eq!(reply.calls.len(), 2);
        assert_eq!(reply.calls[0].name, "read");
        assert_eq!(reply.calls[0].arguments, r#"{"path":"a.rs"}"#);
        assert_eq!(reply.calls[1].name, "grep");
        assert_eq!(reply.calls[1].arguments, r#"{"pattern":"x"}"#);
    }

    #[tokio::test]
    async fn test_tool_delta_closes_open_reasoning() {
        let stream = event_stream(vec![
            reasoning("planning"),
            call_fragment(0, Some("call_1"), Some("bash"), Some("{}")),
            completed(),
        ]);
        let mut sink = RecordingSink::default();

        Interpreter::interpret(stream, &mut sink).await.unwrap();

        assert_eq!(
            sink.events,
            vec![
                "reasoning_start",
                "reasoning_delta:planning",
                "reasoning_end",
                "tool_call_delta:0:bash:{}",
                "block_end",
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_without_terminal_is_error() {
        let stream = event_stream(vec![text("half a reply")]);
        let mut sink = NullSink;

        let err = Interpreter::interpret(stream, &mut sink)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UnexpectedResponse(_)));
    }

    #[tokio::test]
    async fn test_mid_stream_error_closes_delivered_content() {
        let stream = event_stream(vec![
            text("some"),
            Err(Error::Sse("connection reset".into())),
        ]);
        let mut sink = RecordingSink::default();

        let err = Interpreter::interpret(stream, &mut sink)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Sse(_)));
        assert_eq!(sink.events, vec!["text_delta:some", "block_end"]);
    }

    #[tokio::test]
    async fn test_created_captures_response_id() {
        let stream = event_stream(vec![
            Ok(WireEvent::Created {
                response_id: "resp_123".into(),
            }),
            text("ok"),
            completed(),
        ]);
        let mut sink = NullSink;

        let reply = Interpreter::interpret(stream, &mut sink).await.unwrap();

        assert_eq!(reply.response_id.as_deref(), Some("resp_123"));
        assert_eq!(reply.usage.input, 10);
        assert_eq!(reply.usage.output, 5);
    }

    #[tokio::test]
    async fn test_reasoning_end_event_is_idempotent() {
        let stream = event_stream(vec![
            reasoning("hm"),
            Ok(WireEvent::ReasoningEnd),
            Ok(WireEvent::ReasoningEnd),
            text("done"),
            completed(),
        ]);
        let mut sink = RecordingSink::default();

        Interpreter::interpret(stream, &mut sink).await.unwrap();

        let ends = sink
            .events
            .iter()
            .filter(|e| *e == "reasoning_end")
            .count();
        assert_eq!(ends, 1);
    }
}
