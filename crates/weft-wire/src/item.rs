//! Stored conversation items
//!
//! A conversation is a flat sequence of [`StoredItem`]s. Items encode to a
//! flat record with a `type` tag; decoding dispatches on the tag and folds
//! anything unrecognized into [`StoredItem::Unknown`] with the original
//! value intact, so records written by a newer version survive a round trip
//! through an older one.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Author of a message item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Assistant,
    System,
    Developer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Developer => "developer",
        }
    }
}

/// One entry in a conversation history
#[derive(Debug, Clone, PartialEq)]
pub enum StoredItem {
    /// Plain text exchanged with the model. `payload` optionally carries the
    /// full wire content (e.g. multimodal input) and round-trips unchanged.
    Message {
        role: Role,
        text: String,
        payload: Option<Value>,
    },
    /// A tool invocation requested by the model. `arguments` is the raw
    /// JSON-text argument string accumulated from the stream.
    ToolCall {
        call_id: String,
        name: String,
        arguments: String,
    },
    /// The outcome paired to a tool call by `call_id`
    ToolResult { call_id: String, output: String },
    /// Display-only thinking text; never resubmitted to the backend
    Reasoning { text: String },
    /// Opaque compaction artifact returned by the backend; round-trips unchanged
    Compaction { payload: Value },
    /// An item kind this version does not recognize, preserved verbatim
    Unknown { kind: String, payload: Value },
}

impl StoredItem {
    /// Create a user message
    pub fn user(text: impl Into<String>) -> Self {
        Self::Message {
            role: Role::User,
            text: text.into(),
            payload: None,
        }
    }

    /// Create a user message carrying explicit wire content
    pub fn user_with_payload(text: impl Into<String>, payload: Value) -> Self {
        Self::Message {
            role: Role::User,
            text: text.into(),
            payload: Some(payload),
        }
    }

    /// Create an assistant message
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Message {
            role: Role::Assistant,
            text: text.into(),
            payload: None,
        }
    }

    /// Create a tool call item
    pub fn tool_call(
        call_id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self::ToolCall {
            call_id: call_id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Create a tool result item
    pub fn tool_result(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self::ToolResult {
            call_id: call_id.into(),
            output: output.into(),
        }
    }

    /// Create a reasoning item
    pub fn reasoning(text: impl Into<String>) -> Self {
        Self::Reasoning { text: text.into() }
    }

    /// Create a compaction artifact item
    pub fn compaction(payload: Value) -> Self {
        Self::Compaction { payload }
    }

    /// The wire tag for this item
    pub fn kind(&self) -> &str {
        match self {
            StoredItem::Message { .. } => "message",
            StoredItem::ToolCall { .. } => "tool_call",
            StoredItem::ToolResult { .. } => "tool_result",
            StoredItem::Reasoning { .. } => "reasoning",
            StoredItem::Compaction { .. } => "compaction",
            StoredItem::Unknown { kind, .. } => kind,
        }
    }

    pub fn is_tool_call(&self) -> bool {
        matches!(self, StoredItem::ToolCall { .. })
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self, StoredItem::ToolResult { .. })
    }

    /// The call id, for tool calls and tool results
    pub fn call_id(&self) -> Option<&str> {
        match self {
            StoredItem::ToolCall { call_id, .. } | StoredItem::ToolResult { call_id, .. } => {
                Some(call_id)
            }
            _ => None,
        }
    }

    /// The text content, for message and reasoning items
    pub fn text(&self) -> Option<&str> {
        match self {
            StoredItem::Message { text, .. } | StoredItem::Reasoning { text } => Some(text),
            _ => None,
        }
    }
}

/// Flat wire/storage record for a stored item
#[derive(Debug, Default, Serialize, Deserialize)]
struct ItemRecord {
    #[serde(rename = "type")]
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    arguments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
}

impl Serialize for StoredItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            StoredItem::Unknown { payload, .. } => payload.serialize(serializer),
            StoredItem::Message {
                role,
                text,
                payload,
            } => ItemRecord {
                kind: "message".into(),
                role: Some(*role),
                text: Some(text.clone()),
                payload: payload.clone(),
                ..Default::default()
            }
            .serialize(serializer),
            StoredItem::ToolCall {
                call_id,
                name,
                arguments,
            } => ItemRecord {
                kind: "tool_call".into(),
                call_id: Some(call_id.clone()),
                name: Some(name.clone()),
                arguments: Some(arguments.clone()),
                ..Default::default()
            }
            .serialize(serializer),
            StoredItem::ToolResult { call_id, output } => ItemRecord {
                kind: "tool_result".into(),
                call_id: Some(call_id.clone()),
                output: Some(output.clone()),
                ..Default::default()
            }
            .serialize(serializer),
            StoredItem::Reasoning { text } => ItemRecord {
                kind: "reasoning".into(),
                text: Some(text.clone()),
                ..Default::default()
            }
            .serialize(serializer),
            StoredItem::Compaction { payload } => ItemRecord {
                kind: "compaction".into(),
                payload: Some(payload.clone()),
                ..Default::default()
            }
            .serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for StoredItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        match kind.as_str() {
            "message" | "tool_call" | "tool_result" | "reasoning" | "compaction" => {
                let record: ItemRecord =
                    serde_json::from_value(value).map_err(D::Error::custom)?;
                Ok(Self::from_record(record))
            }
            _ => Ok(StoredItem::Unknown {
                kind,
                payload: value,
            }),
        }
    }
}

impl StoredItem {
    fn from_record(record: ItemRecord) -> Self {
        match record.kind.as_str() {
            "message" => StoredItem::Message {
                role: record.role.unwrap_or_default(),
                text: record.text.unwrap_or_default(),
                payload: record.payload,
            },
            "tool_call" => StoredItem::ToolCall {
                call_id: record.call_id.unwrap_or_default(),
                name: record.name.unwrap_or_default(),
                arguments: record.arguments.unwrap_or_default(),
            },
            "tool_result" => StoredItem::ToolResult {
                call_id: record.call_id.unwrap_or_default(),
                output: record.output.unwrap_or_default(),
            },
            "reasoning" => StoredItem::Reasoning {
                text: record.text.unwrap_or_default(),
            },
            _ => StoredItem::Compaction {
                payload: record.payload.unwrap_or(Value::Null),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn round_trip(item: &StoredItem) -> StoredItem {
        let encoded = serde_json::to_string(item).unwrap();
        serde_json::from_str(&encoded).unwrap()
    }

    #[test]
    fn test_message_round_trip() {
        let item = StoredItem::user("list the files");
        assert_eq!(round_trip(&item), item);

        let encoded = serde_json::to_value(&item).unwrap();
        assert_eq!(encoded["type"], "message");
        assert_eq!(encoded["role"], "user");
        assert!(encoded.get("payload").is_none());
    }

    #[test]
    fn test_message_payload_round_trip() {
        let payload = json!({
            "role": "user",
            "content": [
                {"type": "input_text", "text": "what is this?"},
                {"type": "input_image", "image_url": "data:image/png;base64,AAAA"}
            ]
        });
        let item = StoredItem::user_with_payload("what is this?", payload.clone());
        let back = round_trip(&item);
        match back {
            StoredItem::Message { payload: Some(p), .. } => assert_eq!(p, payload),
            other => panic!("expected message with payload, got {other:?}"),
        }
    }

    #[test]
    fn test_tool_call_round_trip() {
        let item = StoredItem::tool_call("call_1", "bash", r#"{"command":"ls"}"#);
        assert_eq!(round_trip(&item), item);
        assert!(item.is_tool_call());
        assert_eq!(item.call_id(), Some("call_1"));
    }

    #[test]
    fn test_tool_result_round_trip() {
        let item = StoredItem::tool_result("call_1", "main.rs\nlib.rs");
        assert_eq!(round_trip(&item), item);
        assert!(item.is_tool_result());
    }

    #[test]
    fn test_reasoning_round_trip() {
        let item = StoredItem::reasoning("the user wants a file listing");
        assert_eq!(round_trip(&item), item);
        assert_eq!(item.text(), Some("the user wants a file listing"));
    }

    #[test]
    fn test_compaction_round_trip() {
        let item = StoredItem::compaction(json!({"encrypted_content": "opaque-blob"}));
        assert_eq!(round_trip(&item), item);
    }

    #[test]
    fn test_unknown_kind_preserved_verbatim() {
        let original = json!({
            "type": "item_reference",
            "id": "ref_42",
            "nested": {"a": [1, 2, 3]}
        });
        let item: StoredItem = serde_json::from_value(original.clone()).unwrap();
        match &item {
            StoredItem::Unknown { kind, payload } => {
                assert_eq!(kind, "item_reference");
                assert_eq!(payload, &original);
            }
            other => panic!("expected unknown item, got {other:?}"),
        }
        // Re-encoding emits the original value untouched
        assert_eq!(serde_json::to_value(&item).unwrap(), original);
    }

    #[test]
    fn test_missing_fields_tolerated() {
        let item: StoredItem = serde_json::from_value(json!({"type": "message"})).unwrap();
        assert_eq!(item, StoredItem::user(""));
    }
}
