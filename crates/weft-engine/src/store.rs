//! Conversation persistence
//!
//! A [`ConversationStore`] saves and loads full conversation records so a
//! thread can be resumed across process restarts. The bundled [`FileStore`]
//! keeps one JSON file per conversation and writes atomically via a temp
//! file plus rename, so a crash mid-save never corrupts an existing record.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use weft_wire::{StoredItem, Usage};

use crate::error::Result;

/// Everything needed to resume a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Conversation id (uuid)
    pub id: String,
    /// Provider tag of the backend that produced this record
    pub provider: String,
    /// Full conversation history
    pub items: Vec<StoredItem>,
    /// Cumulative token usage
    #[serde(default)]
    pub usage: Usage,
    /// Server-side continuation token, if the last turn produced one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation: Option<String>,
    /// One-line summary for listings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Free-form key/value metadata
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Structured tool outputs keyed by call id
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tool_results: HashMap<String, Value>,
    /// Creation time (unix millis)
    pub created_at: i64,
    /// Last save time (unix millis)
    pub updated_at: i64,
}

/// A listing entry, cheap enough to show without loading full histories
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    pub provider: String,
    pub summary: Option<String>,
    pub item_count: usize,
    pub updated_at: i64,
}

impl ConversationRecord {
    fn to_summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id.clone(),
            provider: self.provider.clone(),
            summary: self.summary.clone(),
            item_count: self.items.len(),
            updated_at: self.updated_at,
        }
    }
}

/// Storage backend for conversation records
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Persist a record, replacing any previous version
    async fn save(&self, record: &ConversationRecord) -> Result<()>;

    /// Load a record by id
    ///
    /// Missing or unreadable records load as `Ok(None)` so callers always
    /// get a fresh start rather than an error.
    async fn load(&self, id: &str) -> Result<Option<ConversationRecord>>;

    /// Remove a record by id. Removing a missing record is not an error.
    async fn delete(&self, id: &str) -> Result<()>;

    /// List every stored conversation, most recently updated first
    async fn list(&self) -> Result<Vec<ConversationSummary>>;
}

/// File-based store: one pretty-printed JSON file per conversation
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Store under the platform data directory (`<data>/weft/conversations`)
    pub fn new() -> Self {
        let root = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("weft")
            .join("conversations");
        Self { root }
    }

    /// Store under an explicit root directory
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.json", id))
    }
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for FileStore {
    async fn save(&self, record: &ConversationRecord) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;

        let path = self.path_for(&record.id);
        let tmp_path = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(record)
            .map_err(|e| crate::error::Error::Store(e.to_string()))?;

        // Write to a temp file first so a crash never truncates the record
        tokio::fs::write(&tmp_path, &content).await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<ConversationRecord>> {
        let path = self.path_for(id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&content) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!(
                    id = %id,
                    error = %e,
                    "conversation record unreadable, starting fresh"
                );
                Ok(None)
            }
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let path = self.path_for(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<ConversationSummary>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut summaries = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable record");
                    continue;
                }
            };
            match serde_json::from_str::<ConversationRecord>(&content) {
                Ok(record) => summaries.push(record.to_summary()),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping corrupt record");
                }
            }
        }

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_wire::Role;

    fn sample_record(id: &str) -> ConversationRecord {
        let mut metadata = BTreeMap::new();
        metadata.insert("model".to_string(), "gpt-5".to_string());
        let mut tool_results = HashMap::new();
        tool_results.insert(
            "call_1".to_string(),
            serde_json::json!({"files": ["a.txt", "b.txt"]}),
        );
        ConversationRecord {
            id: id.to_string(),
            provider: "openai-responses".to_string(),
            items: vec![
                StoredItem::user("list the files"),
                StoredItem::reasoning("the user wants a directory listing"),
                StoredItem::tool_call("call_1", "ls", "{}"),
                StoredItem::tool_result("call_1", "a.txt\nb.txt"),
                StoredItem::assistant("Two files: a.txt and b.txt."),
            ],
            usage: Usage {
                input: 120,
                output: 40,
                cache_read: 30,
                cache_write: 0,
                reasoning: 0,
            },
            continuation: Some("resp_abc".to_string()),
            summary: Some("Listing workspace files".to_string()),
            metadata,
            tool_results,
            created_at: 1_700_000_000_000,
            updated_at: 1_700_000_060_000,
        }
    }

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::with_root(tmp.path());

        let original = sample_record("conv-1");
        store.save(&original).await.unwrap();

        let loaded = store.load("conv-1").await.unwrap().unwrap();
        assert_eq!(loaded.id, original.id);
        assert_eq!(loaded.provider, original.provider);
        assert_eq!(loaded.items, original.items);
        assert_eq!(loaded.continuation.as_deref(), Some("resp_abc"));
        assert_eq!(loaded.usage.input, 120);
        assert_eq!(loaded.metadata.get("model").map(String::as_str), Some("gpt-5"));
        assert_eq!(loaded.tool_results["call_1"]["files"][0], "a.txt");
        assert_eq!(loaded.created_at, original.created_at);

        match &loaded.items[0] {
            StoredItem::Message { role, text, .. } => {
                assert_eq!(*role, Role::User);
                assert_eq!(text, "list the files");
            }
            other => panic!("expected user message, got {:?}", other),
        }
        match &loaded.items[2] {
            StoredItem::ToolCall { call_id, name, .. } => {
                assert_eq!(call_id, "call_1");
                assert_eq!(name, "ls");
            }
            other => panic!("expected tool call, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_load_missing_returns_none() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::with_root(tmp.path());

        let loaded = store.load("no-such-id").await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_load_corrupt_returns_none() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::with_root(tmp.path());

        tokio::fs::write(tmp.path().join("bad.json"), "{ not json")
            .await
            .unwrap();

        let loaded = store.load("bad").await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_save_leaves_no_temp_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::with_root(tmp.path());

        store.save(&sample_record("conv-2")).await.unwrap();

        assert!(tmp.path().join("conv-2.json").exists());
        assert!(!tmp.path().join("conv-2.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_save_replaces_previous_version() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::with_root(tmp.path());

        let mut record = sample_record("conv-3");
        store.save(&record).await.unwrap();

        record.items.push(StoredItem::user("and the sizes?"));
        record.updated_at += 1000;
        store.save(&record).await.unwrap();

        let loaded = store.load("conv-3").await.unwrap().unwrap();
        assert_eq!(loaded.items.len(), 6);
        assert_eq!(loaded.updated_at, record.updated_at);
    }

    #[tokio::test]
    async fn test_delete_then_load_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::with_root(tmp.path());

        store.save(&sample_record("conv-4")).await.unwrap();
        store.delete("conv-4").await.unwrap();

        assert!(store.load("conv-4").await.unwrap().is_none());
        // deleting again is fine
        store.delete("conv-4").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_sorted_most_recent_first() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::with_root(tmp.path());

        let mut older = sample_record("conv-old");
        older.updated_at = 1_000;
        let mut newer = sample_record("conv-new");
        newer.updated_at = 2_000;

        store.save(&older).await.unwrap();
        store.save(&newer).await.unwrap();
        // corrupt files are skipped, not fatal
        tokio::fs::write(tmp.path().join("junk.json"), "nope")
            .await
            .unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "conv-new");
        assert_eq!(listed[1].id, "conv-old");
        assert_eq!(listed[0].item_count, 5);
    }

    #[tokio::test]
    async fn test_list_empty_root() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::with_root(tmp.path().join("never-created"));
        let listed = store.list().await.unwrap();
        assert!(listed.is_empty());
    }
}
