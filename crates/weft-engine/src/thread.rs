//! The conversation thread and its turn loop
//!
//! A [`Thread`] owns one conversation: its item history, the backend it
//! submits to, the tools the model may call, and the bookkeeping that keeps
//! server-side state and local state in agreement. [`Thread::send`] runs the
//! full loop for one user input: submit, stream, execute tools, and repeat
//! until the model stops calling tools, a turn limit is reached, or the
//! handle is aborted.
//!
//! Continuation bookkeeping is the part worth reading twice. When the
//! backend issues a response id, that id stands for everything submitted in
//! the turn plus the reply's own output items, so both are acknowledged
//! together; only tool results and later user input stay pending for the
//! next submission. A token the server no longer recognizes is dropped and
//! the full history is resubmitted exactly once.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use weft_wire::{
    Backend, EventSink, Interpreter, Reply, StoredItem, SubmitRequest, ToolCallRequest,
};

use crate::{
    attach,
    compaction::{self, COMPACT_PROMPT, CompactionConfig, CompactionReason, SHORT_SUMMARY_PROMPT},
    error::{Error, Result},
    events::ThreadEvent,
    handle::ThreadHandle,
    history::ConversationHistory,
    hooks::FollowUpHook,
    resilience::{RetryPolicy, is_retryable_error, is_stale_continuation},
    state::ThreadState,
    store::{ConversationRecord, ConversationStore},
    tool::{BoxedTool, ToolOutcome, to_tool_spec},
};

/// Thread configuration
#[derive(Debug, Clone)]
pub struct ThreadConfig {
    /// Model for regular turns
    pub model: String,
    /// Cheaper model for utility turns (summaries); falls back to `model`
    pub weak_model: Option<String>,
    /// System prompt sent as instructions with every submission
    pub system_prompt: Option<String>,
    /// Maximum turns per send; 0 means unbounded
    pub max_turns: u32,
    /// Cap on output tokens per response
    pub max_output_tokens: Option<u32>,
    /// Context window of the model, for the auto-compaction trigger
    pub context_window: u32,
    /// Context compaction configuration
    pub compaction: CompactionConfig,
    /// Retry policy for backend submissions
    pub retry: RetryPolicy,
}

/// Per-send options
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Image attachments (https URLs, data URLs, or local paths)
    pub images: Vec<String>,
    /// Override the configured turn limit for this send
    pub max_turns: Option<u32>,
    /// Submit without tools
    pub no_tools: bool,
    /// Skip persistence for this send
    pub no_save: bool,
    /// Skip the automatic compaction check
    pub disable_auto_compact: bool,
    /// Use the weak model for this send
    pub use_weak_model: bool,
}

/// A single conversation and its turn loop
pub struct Thread {
    id: String,
    config: ThreadConfig,
    backend: Arc<dyn Backend>,
    history: ConversationHistory,
    state: ThreadState,
    tools: Vec<BoxedTool>,
    hooks: Vec<Arc<dyn FollowUpHook>>,
    event_tx: broadcast::Sender<ThreadEvent>,
    handle: ThreadHandle,
    store: Option<Arc<dyn ConversationStore>>,
    save_lock: Arc<tokio::sync::Mutex<()>>,
    metadata: BTreeMap<String, String>,
    created_at: i64,

    /// Cached compiled JSON schema validators keyed by tool name
    schema_cache: HashMap<String, Arc<jsonschema::Validator>>,
}

impl Thread {
    /// Create a new thread with an empty history
    pub fn new(config: ThreadConfig, backend: Arc<dyn Backend>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            config,
            backend,
            history: ConversationHistory::new(),
            state: ThreadState::default(),
            tools: Vec::new(),
            hooks: Vec::new(),
            event_tx,
            handle: ThreadHandle::new(),
            store: None,
            save_lock: Arc::new(tokio::sync::Mutex::new(())),
            metadata: BTreeMap::new(),
            created_at: chrono::Utc::now().timestamp_millis(),
            schema_cache: HashMap::new(),
        }
    }

    /// Attach a persistence store
    pub fn with_store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Resume a conversation from the store.
    ///
    /// A missing record, an unreadable record, or a record written by a
    /// different provider all produce a fresh thread under the requested id;
    /// resumption never fails on bad stored state.
    pub async fn resume(
        config: ThreadConfig,
        backend: Arc<dyn Backend>,
        store: Arc<dyn ConversationStore>,
        id: &str,
    ) -> Result<Self> {
        let mut thread = Self::new(config, backend);
        thread.id = id.to_string();

        let provider = thread.backend.profile().provider;
        match store.load(id).await? {
            Some(record) if record.provider == provider => {
                thread.history = ConversationHistory::from_items(record.items);
                let removed = thread.history.cleanup_orphans();
                if removed > 0 {
                    tracing::warn!(id = %id, removed, "dropped orphaned tool calls from stored history");
                }
                // The persisted token covers the whole stored item list; if
                // cleanup changed that list the token no longer matches.
                if removed == 0 && record.continuation.is_some() {
                    thread.state.continuation = record.continuation;
                    thread.history.acknowledge();
                }
                thread.state.usage = record.usage;
                thread.state.summary = record.summary;
                thread.state.tool_results = record.tool_results;
                thread.metadata = record.metadata;
                thread.created_at = record.created_at;
            }
            Some(record) => {
                tracing::warn!(
                    id = %id,
                    stored = %record.provider,
                    current = %provider,
                    "conversation belongs to a different provider, starting fresh"
                );
            }
            None => {}
        }

        thread.store = Some(store);
        Ok(thread)
    }

    /// Conversation id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Subscribe to thread events
    pub fn subscribe(&self) -> broadcast::Receiver<ThreadEvent> {
        self.event_tx.subscribe()
    }

    /// A cloneable handle for aborting and observing this thread
    pub fn handle(&self) -> ThreadHandle {
        self.handle.clone()
    }

    /// Current thread state
    pub fn state(&self) -> &ThreadState {
        &self.state
    }

    /// Full conversation history, oldest first
    pub fn items(&self) -> &[StoredItem] {
        self.history.items()
    }

    /// Thread configuration
    pub fn config(&self) -> &ThreadConfig {
        &self.config
    }

    /// Set the system prompt
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.config.system_prompt = Some(prompt.into());
    }

    /// Register a tool
    pub fn add_tool(&mut self, tool: BoxedTool) {
        self.cache_tool_schema(&tool);
        self.tools.push(tool);
    }

    /// Replace all registered tools
    pub fn set_tools(&mut self, tools: Vec<BoxedTool>) {
        self.schema_cache.clear();
        for tool in &tools {
            self.cache_tool_schema(tool);
        }
        self.tools = tools;
    }

    /// Names of the registered tools
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Register a follow-up hook
    pub fn add_hook(&mut self, hook: Arc<dyn FollowUpHook>) {
        self.hooks.push(hook);
    }

    /// Free-form metadata persisted with the conversation
    pub fn metadata_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.metadata
    }

    /// Compile and cache the JSON schema validator for a tool.
    fn cache_tool_schema(&mut self, tool: &BoxedTool) {
        let schema = tool.parameters_schema();
        match jsonschema::validator_for(&schema) {
            Ok(validator) => {
                self.schema_cache
                    .insert(tool.name().to_string(), Arc::new(validator));
            }
            Err(e) => {
                tracing::warn!(
                    "invalid tool parameter schema for '{}', skipping validation: {}",
                    tool.name(),
                    e
                );
            }
        }
    }

    /// Send user input and run the turn loop until the model stops.
    ///
    /// Returns the final assistant text. Aborting via the handle and hitting
    /// the turn limit both end the send cleanly with the text produced so
    /// far; only backend and tool-plumbing failures surface as errors.
    pub async fn send(&mut self, input: &str, opts: SendOptions) -> Result<String> {
        let cancel = self.handle.reset_cancel();
        self.handle.set_running(true);
        let _ = self.event_tx.send(ThreadEvent::ThreadStart);

        let user_item = attach::build_user_message(input, &opts.images).await;
        self.history.push(user_item);

        let model = if opts.use_weak_model {
            self.config
                .weak_model
                .clone()
                .unwrap_or_else(|| self.config.model.clone())
        } else {
            self.config.model.clone()
        };
        let max_turns = opts.max_turns.unwrap_or(self.config.max_turns);

        let mut turns: u32 = 0;
        let mut final_text = String::new();

        let result = loop {
            if cancel.is_cancelled() {
                tracing::info!("send cancelled, stopping");
                break Ok(final_text.clone());
            }
            if max_turns > 0 && turns >= max_turns {
                tracing::warn!(turns, max_turns, "reached maximum turn limit, stopping");
                break Ok(final_text.clone());
            }

            if !opts.disable_auto_compact
                && !self.config.compaction.disable_auto
                && compaction::should_compact(
                    self.state.last_context,
                    self.config.context_window,
                    self.config.compaction.auto_ratio,
                )
            {
                if let Err(e) = self.compact(CompactionReason::Threshold).await {
                    tracing::warn!("automatic compaction failed: {e}");
                }
            }

            turns += 1;
            let _ = self.event_tx.send(ThreadEvent::TurnStart { turn: turns });

            let reply = match self.run_turn(&opts, &model, &cancel).await {
                Ok(reply) => reply,
                Err(e) => {
                    if cancel.is_cancelled() {
                        tracing::info!("send cancelled, stopping");
                        break Ok(final_text.clone());
                    }
                    break Err(e);
                }
            };

            // Fold the reply into history. The reply's output items are part
            // of the server state its response id stands for, so they are
            // acknowledged together with everything submitted this turn.
            // Tool results pushed below stay pending for the next submission.
            if let Some(reasoning) = &reply.reasoning {
                self.history.push(StoredItem::reasoning(reasoning));
            }
            if !reply.text.is_empty() {
                self.history.push(StoredItem::assistant(&reply.text));
                final_text = reply.text.clone();
            }
            for call in &reply.calls {
                self.history
                    .push(StoredItem::tool_call(&call.call_id, &call.name, &call.arguments));
            }
            if let Some(id) = &reply.response_id {
                self.state.continuation = Some(id.clone());
                self.history.acknowledge();
            }

            self.state.usage.add(&reply.usage);
            self.state.last_context = reply.usage.total_context();
            let _ = self.event_tx.send(ThreadEvent::TurnEnd {
                turn: turns,
                usage: reply.usage,
            });

            if !reply.tools_used() {
                let follow_ups = self.collect_follow_ups(&final_text, turns).await;
                if follow_ups.is_empty() {
                    break Ok(final_text.clone());
                }
                tracing::info!(count = follow_ups.len(), "follow-up hooks continued the conversation");
                for message in follow_ups {
                    self.history.push(StoredItem::user(message));
                }
                continue;
            }

            if self.execute_tool_calls(&reply.calls, &cancel).await {
                // Cancelled mid-execution; remaining calls received skipped
                // results so the history stays paired.
                break Ok(final_text.clone());
            }
        };

        self.history.cleanup_orphans();

        if let Err(e) = &result {
            let _ = self.event_tx.send(ThreadEvent::Error {
                message: e.to_string(),
            });
        }

        if result.is_ok() && !opts.no_save {
            if let Err(e) = self.persist().await {
                tracing::warn!("failed to save conversation: {e}");
            }
        }

        let _ = self.event_tx.send(ThreadEvent::ThreadEnd {
            turns,
            usage: self.state.usage,
        });
        self.handle.set_running(false);

        result
    }

    /// `send` behind a boxed future. Compaction re-enters `send` on a
    /// sub-thread, which would otherwise make the future type recursive.
    fn send_boxed<'a>(
        &'a mut self,
        input: &'a str,
        opts: SendOptions,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(self.send(input, opts))
    }

    /// One model exchange: build the request, submit with retries, and fall
    /// back to full history exactly once if the continuation token is stale.
    async fn run_turn(
        &mut self,
        opts: &SendOptions,
        model: &str,
        cancel: &CancellationToken,
    ) -> Result<Reply> {
        let request = self.build_request(opts, model);
        let sent_continuation = request.continuation.is_some();

        let first = self.submit_with_retry(&request, cancel).await;
        match first {
            Err(e) if sent_continuation && is_stale_continuation(&e.to_string()) => {
                tracing::warn!("continuation token rejected, resubmitting full history: {e}");
                self.state.continuation = None;
                self.history.reset_pending();
                let request = self.build_request(opts, model);
                self.submit_with_retry(&request, cancel).await
            }
            other => other,
        }
    }

    /// Decide between the pending window and the full history.
    fn build_request(&self, opts: &SendOptions, model: &str) -> SubmitRequest {
        let profile = self.backend.profile();
        let use_continuation = self.state.continuation.is_some()
            && self.history.has_pending()
            && profile.supports_continuation;

        let input = if use_continuation {
            self.history.pending().to_vec()
        } else {
            self.history.items().to_vec()
        };

        SubmitRequest {
            model: model.to_string(),
            input,
            instructions: self.config.system_prompt.clone(),
            tools: if opts.no_tools {
                Vec::new()
            } else {
                self.tools.iter().map(|t| to_tool_spec(t.as_ref())).collect()
            },
            continuation: if use_continuation {
                self.state.continuation.clone()
            } else {
                None
            },
            max_output_tokens: self.config.max_output_tokens,
        }
    }

    /// Submit with bounded exponential backoff.
    ///
    /// Non-retryable errors fail fast with their original cause. When every
    /// attempt fails the returned error lists each attempt's failure.
    async fn submit_with_retry(
        &self,
        request: &SubmitRequest,
        cancel: &CancellationToken,
    ) -> Result<Reply> {
        let mut errors: Vec<String> = Vec::new();

        for attempt in 0..=self.config.retry.max_retries {
            if attempt > 0 {
                let delay = self.config.retry.delay_for_attempt(attempt - 1);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying submission: {}",
                    errors.last().map(String::as_str).unwrap_or("unknown error")
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(weft_wire::Error::Aborted.into()),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            match self.submit_once(request, cancel).await {
                Ok(reply) => return Ok(reply),
                Err(e) => {
                    let retryable = e.is_retryable() || is_retryable_error(&e.to_string());
                    if !retryable {
                        return Err(e);
                    }
                    errors.push(e.to_string());
                }
            }
        }

        Err(Error::Exhausted {
            attempts: errors.len(),
            errors,
        })
    }

    /// A single submission: open the stream and interpret it to a reply,
    /// forwarding display signals to subscribers.
    async fn submit_once(
        &self,
        request: &SubmitRequest,
        cancel: &CancellationToken,
    ) -> Result<Reply> {
        let stream = tokio::select! {
            _ = cancel.cancelled() => return Err(weft_wire::Error::Aborted.into()),
            result = self.backend.submit(request.clone()) => result?,
        };

        let mut sink = BroadcastSink { tx: &self.event_tx };
        let reply = tokio::select! {
            _ = cancel.cancelled() => return Err(weft_wire::Error::Aborted.into()),
            result = Interpreter::interpret(stream, &mut sink) => result?,
        };
        Ok(reply)
    }

    /// Execute the reply's tool calls in order. Returns `true` if the send
    /// was cancelled; every call still receives a result so the history
    /// never ends with an unanswered call.
    async fn execute_tool_calls(
        &mut self,
        calls: &[ToolCallRequest],
        cancel: &CancellationToken,
    ) -> bool {
        let mut cancelled = false;

        for (idx, call) in calls.iter().enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                self.skip_remaining_calls(&calls[idx..]);
                break;
            }

            let _ = self.event_tx.send(ThreadEvent::ToolStart {
                call_id: call.call_id.clone(),
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            });

            let outcome = self.run_tool(call, cancel).await;

            if let Some(structured) = &outcome.structured {
                self.state
                    .tool_results
                    .insert(call.call_id.clone(), structured.clone());
                if !outcome.is_error {
                    if let Some(path) = structured.get("filePath").and_then(|v| v.as_str()) {
                        self.state.touch_file(path);
                    }
                }
            }

            let _ = self.event_tx.send(ThreadEvent::ToolEnd {
                call_id: call.call_id.clone(),
                name: call.name.clone(),
                output: outcome.output.clone(),
                is_error: outcome.is_error,
            });

            self.history
                .push(StoredItem::tool_result(&call.call_id, &outcome.output));
        }

        cancelled
    }

    /// Locate, validate, and execute one tool call.
    async fn run_tool(&self, call: &ToolCallRequest, cancel: &CancellationToken) -> ToolOutcome {
        let Some(tool) = self.tools.iter().find(|t| t.name() == call.name) else {
            return ToolOutcome::error(format!("Tool not found: {}", call.name));
        };

        // Models omit the arguments object entirely for parameterless tools
        let raw = if call.arguments.trim().is_empty() {
            "{}"
        } else {
            call.arguments.as_str()
        };
        let args: serde_json::Value = match serde_json::from_str(raw) {
            Ok(args) => args,
            Err(e) => {
                return ToolOutcome::error(format!(
                    "Invalid tool arguments for {}: {}",
                    call.name, e
                ));
            }
        };

        if let Some(message) = self
            .schema_cache
            .get(call.name.as_str())
            .and_then(|validator| validate_with_validator(&args, validator))
        {
            return ToolOutcome::error(message);
        }

        tool.execute(&call.call_id, args, cancel.child_token()).await
    }

    /// Answer calls that will not run with skipped results.
    fn skip_remaining_calls(&mut self, calls: &[ToolCallRequest]) {
        for call in calls {
            let _ = self.event_tx.send(ThreadEvent::ToolStart {
                call_id: call.call_id.clone(),
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            });
            let outcome = ToolOutcome::error("Skipped: send was cancelled");
            let _ = self.event_tx.send(ThreadEvent::ToolEnd {
                call_id: call.call_id.clone(),
                name: call.name.clone(),
                output: outcome.output.clone(),
                is_error: outcome.is_error,
            });
            self.history
                .push(StoredItem::tool_result(&call.call_id, &outcome.output));
        }
    }

    /// Ask every hook whether the conversation should continue.
    async fn collect_follow_ups(&self, final_text: &str, turns: u32) -> Vec<String> {
        let mut messages = Vec::new();
        for hook in &self.hooks {
            messages.extend(hook.on_stop(final_text, turns).await);
        }
        messages
    }

    /// Compact the conversation history.
    ///
    /// Tries the backend's structural compaction first, then falls back to
    /// summarizing the history into a single replacement message. The
    /// history is only swapped after a tier fully succeeds; if both tiers
    /// fail it is left untouched and the error names both causes.
    pub async fn compact(&mut self, reason: CompactionReason) -> Result<()> {
        if self.history.is_empty() {
            return Ok(());
        }

        let _ = self.event_tx.send(ThreadEvent::CompactionStart { reason });
        let tokens_before = compaction::estimate_total_tokens(self.history.items());

        let structural = if self.backend.profile().supports_compaction {
            let compacted = self
                .backend
                .compact(self.history.items(), &self.config.model)
                .await;
            match compacted {
                Ok(items) if !items.is_empty() => {
                    self.history.replace(items);
                    self.state.reset_after_compaction();
                    self.finish_compaction(tokens_before);
                    return Ok(());
                }
                Ok(_) => "backend declined to compact".to_string(),
                Err(e) => e.to_string(),
            }
        } else {
            "backend does not support structural compaction".to_string()
        };

        tracing::warn!("structural compaction unavailable ({structural}), summarizing instead");

        match self.summarize_history().await {
            Ok(summary) => {
                self.history.replace(vec![StoredItem::user(summary)]);
                self.state.reset_after_compaction();
                self.finish_compaction(tokens_before);
                Ok(())
            }
            Err(e) => Err(Error::Compaction {
                structural,
                fallback: e.to_string(),
            }),
        }
    }

    fn finish_compaction(&self, tokens_before: u32) {
        let tokens_after = compaction::estimate_total_tokens(self.history.items());
        tracing::info!(tokens_before, tokens_after, "compaction complete");
        let _ = self.event_tx.send(ThreadEvent::CompactionEnd {
            tokens_before,
            tokens_after,
        });
    }

    /// Produce a stand-alone summary of the history on a detached sub-thread.
    async fn summarize_history(&self) -> Result<String> {
        let mut sub = self.sub_thread(self.history.items().to_vec());
        let opts = SendOptions {
            no_tools: true,
            no_save: true,
            disable_auto_compact: true,
            max_turns: Some(1),
            ..Default::default()
        };
        let summary = sub.send_boxed(COMPACT_PROMPT, opts).await?;
        if summary.trim().is_empty() {
            return Err(Error::Other("summary sub-thread produced no text".into()));
        }
        Ok(summary)
    }

    /// A detached utility thread over a copy of this thread's items. Shares
    /// the backend; never persisted, never eventful to our subscribers.
    fn sub_thread(&self, items: Vec<StoredItem>) -> Thread {
        let mut thread = Thread::new(self.config.clone(), Arc::clone(&self.backend));
        thread.history = ConversationHistory::from_items(items);
        thread.state.primary = false;
        thread
    }

    /// Persist this conversation via an explicit save.
    pub async fn save(&mut self) -> Result<()> {
        self.persist().await
    }

    async fn persist(&mut self) -> Result<()> {
        let Some(store) = self.store.clone() else {
            return Ok(());
        };
        if !self.state.primary {
            return Ok(());
        }

        let removed = self.history.cleanup_orphans();
        if removed > 0 {
            // The token refers to a response containing the popped calls
            self.state.continuation = None;
            self.history.reset_pending();
        }

        if !self.history.is_empty() {
            self.refresh_summary().await;
        }

        let record = self.to_record();
        let _guard = self.save_lock.lock().await;
        store.save(&record).await
    }

    /// Regenerate the listing summary on a weak-model sub-thread. Failures
    /// keep the previous summary; a save never fails on its summary.
    async fn refresh_summary(&mut self) {
        let mut sub = self.sub_thread(self.history.items().to_vec());
        let opts = SendOptions {
            use_weak_model: true,
            no_tools: true,
            no_save: true,
            disable_auto_compact: true,
            max_turns: Some(1),
            ..Default::default()
        };
        match sub.send_boxed(SHORT_SUMMARY_PROMPT, opts).await {
            Ok(text) if !text.trim().is_empty() => {
                self.state.summary = Some(text.trim().to_string());
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("failed to generate conversation summary: {e}"),
        }
    }

    fn to_record(&self) -> ConversationRecord {
        ConversationRecord {
            id: self.id.clone(),
            provider: self.backend.profile().provider,
            items: self.history.items().to_vec(),
            usage: self.state.usage,
            // A token is only useful if it covers the whole item list;
            // mid-window saves resubmit full history on resume instead.
            continuation: if self.history.has_pending() {
                None
            } else {
                self.state.continuation.clone()
            },
            summary: self.state.summary.clone(),
            metadata: self.metadata.clone(),
            tool_results: self.state.tool_results.clone(),
            created_at: self.created_at,
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Forwards interpreter signals to thread subscribers
struct BroadcastSink<'a> {
    tx: &'a broadcast::Sender<ThreadEvent>,
}

impl EventSink for BroadcastSink<'_> {
    fn text_delta(&mut self, delta: &str) {
        let _ = self.tx.send(ThreadEvent::TextDelta {
            delta: delta.to_string(),
        });
    }

    fn reasoning_start(&mut self) {
        let _ = self.tx.send(ThreadEvent::ReasoningStart);
    }

    fn reasoning_delta(&mut self, delta: &str) {
        let _ = self.tx.send(ThreadEvent::ReasoningDelta {
            delta: delta.to_string(),
        });
    }

    fn reasoning_end(&mut self) {
        let _ = self.tx.send(ThreadEvent::ReasoningEnd);
    }

    fn tool_call_delta(&mut self, index: usize, name: Option<&str>, arguments: Option<&str>) {
        let _ = self.tx.send(ThreadEvent::ToolCallUpdate {
            index,
            name: name.map(str::to_string),
            arguments: arguments.map(str::to_string),
        });
    }

    fn block_end(&mut self) {
        let _ = self.tx.send(ThreadEvent::BlockEnd);
    }
}

/// Validate tool arguments using a pre-compiled validator.
/// Returns `Some(error_message)` if validation fails, `None` if valid.
fn validate_with_validator(
    args: &serde_json::Value,
    validator: &jsonschema::Validator,
) -> Option<String> {
    let errors: Vec<String> = validator
        .iter_errors(args)
        .map(|e| {
            let path = e.instance_path.to_string();
            if path.is_empty() {
                e.to_string()
            } else {
                format!("{}: {}", path, e)
            }
        })
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(format!(
            "Tool argument validation failed:\n{}",
            errors.join("\n")
        ))
    }
}
