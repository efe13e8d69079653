// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The active-run notifier: the single actor that owns "what is currently
//! visible for the thread the caller is looking at" and drives it forward —
//! starting runs, threading the event stream through the reducer, handing
//! pending tool calls off to the registry, and folding a run's terminal
//! state back into the thread history cache.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::StreamExt;
use serde_json::Value;
use thiserror::Error;

use agui_model::{
    ActiveRunState, CompletionResult, Conversation, Message, MessageState, Role, RunStatus,
    StreamingState, ToolCallMessage, ToolCallStatus,
};
use agui_proto::{MessageId, RoomId, RunId, RunInput, ThreadId, ThreadKey, WireMessage, WireRole};
use agui_tools::ToolRegistry;

use crate::cache::ThreadHistoryCache;
use crate::citation;
use crate::endpoints;
use crate::handle::{CancelToken, RunHandle};
use crate::registry::RunRegistry;
use crate::transport::Transport;

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("startRun called while another startRun is already in progress")]
    ConcurrentStart,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("createRun response did not contain a runId")]
    MissingRunId,
}

/// Everything the notifier needs from the embedding application, gathered
/// in one place so construction reads as a single wiring step rather than a
/// long parameter list.
pub struct RuntimeContext {
    pub transport: Arc<dyn Transport>,
    pub tools: ToolRegistry,
    pub registry: Arc<RunRegistry>,
    pub cache: Arc<ThreadHistoryCache>,
    pub default_server_id: String,
    pub max_tool_depth: u32,
    pub unary_call_timeout: std::time::Duration,
}

/// One-level-deep merge of a per-run `initialState` overlay onto the cached
/// `aguiState`: a key present in both that's an object in both is merged
/// key-by-key; anything else in the overlay replaces the base value
/// outright. Distinct from (and shallower than) the fully recursive merge
/// `agui_config::loader` applies across config layers — config files are
/// small and trusted, a single run's `initialState` is untrusted caller
/// input and only ever needs to patch top-level fields.
pub fn merge_initial_state(base: &Value, overlay: &Value) -> Value {
    let Some(overlay_obj) = overlay.as_object() else {
        return if overlay.is_null() { base.clone() } else { overlay.clone() };
    };
    let mut result = base.as_object().cloned().unwrap_or_default();
    for (key, value) in overlay_obj {
        match (result.get(key), value) {
            (Some(Value::Object(base_map)), Value::Object(overlay_map)) => {
                let mut merged = base_map.clone();
                for (k, v) in overlay_map {
                    merged.insert(k.clone(), v.clone());
                }
                result.insert(key.clone(), Value::Object(merged));
            }
            _ => {
                result.insert(key.clone(), value.clone());
            }
        }
    }
    Value::Object(result)
}

fn role_to_wire(role: Role) -> WireRole {
    match role {
        Role::User => WireRole::User,
        Role::Assistant => WireRole::Assistant,
        Role::System => WireRole::System,
    }
}

/// Converts conversation-side messages to the shape `runAgent` expects on
/// the wire. A `ToolCallMessage` expands to one wire message per tool call,
/// tagged with `tool_call_id` so the server can correlate results with the
/// calls it made.
fn to_wire(messages: &[Message]) -> Vec<WireMessage> {
    let mut out = Vec::with_capacity(messages.len());
    for message in messages {
        match message {
            Message::Text(text) => {
                out.push(WireMessage {
                    id: text.id.clone(),
                    role: role_to_wire(text.user),
                    content: text.text.clone(),
                    tool_call_id: None,
                });
            }
            Message::ToolCall(tool_call_message) => {
                for call in &tool_call_message.tool_calls {
                    out.push(WireMessage {
                        id: MessageId::new(format!("{}_{}", tool_call_message.id, call.id)),
                        role: WireRole::Tool,
                        content: call.result.clone().unwrap_or_default(),
                        tool_call_id: Some(call.id.as_str().to_string()),
                    });
                }
            }
        }
    }
    out
}

pub struct ActiveRunNotifier {
    ctx: RuntimeContext,
    viewed_key: Mutex<Option<ThreadKey>>,
    current_handle: Mutex<Option<Arc<RunHandle>>>,
    visible_state: Mutex<ActiveRunState>,
    unread: Mutex<HashSet<ThreadKey>>,
    is_starting: AtomicBool,
    id_seq: AtomicU64,
}

impl ActiveRunNotifier {
    pub fn new(ctx: RuntimeContext) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            viewed_key: Mutex::new(None),
            current_handle: Mutex::new(None),
            visible_state: Mutex::new(ActiveRunState::Idle),
            unread: Mutex::new(HashSet::new()),
            is_starting: AtomicBool::new(false),
            id_seq: AtomicU64::new(0),
        })
    }

    pub fn visible_state(&self) -> ActiveRunState {
        self.visible_state.lock().expect("visible state lock poisoned").clone()
    }

    pub fn unread_threads(&self) -> Vec<ThreadKey> {
        self.unread.lock().expect("unread set lock poisoned").iter().cloned().collect()
    }

    fn next_stamp(&self) -> u64 {
        self.id_seq.fetch_add(1, Ordering::SeqCst)
    }

    fn key_for(&self, room_id: &RoomId, thread_id: &ThreadId) -> ThreadKey {
        ThreadKey::with_server(self.ctx.default_server_id.clone(), room_id.clone(), thread_id.clone())
    }

    /// Begins a new run for `thread_id`, seeding it with the thread's cached
    /// history plus a fresh user message. Only one `start_run` may be in
    /// its synchronous prologue at a time; a concurrent caller is rejected
    /// rather than queued.
    pub async fn start_run(
        self: &Arc<Self>,
        room_id: RoomId,
        thread_id: ThreadId,
        user_message_text: String,
        existing_run_id: Option<RunId>,
        initial_state: Option<Value>,
    ) -> Result<(), NotifierError> {
        if self
            .is_starting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(NotifierError::ConcurrentStart);
        }
        let result = self
            .start_run_inner(room_id, thread_id, user_message_text, existing_run_id, initial_state)
            .await;
        self.is_starting.store(false, Ordering::SeqCst);
        result
    }

    async fn start_run_inner(
        self: &Arc<Self>,
        room_id: RoomId,
        thread_id: ThreadId,
        user_message_text: String,
        existing_run_id: Option<RunId>,
        initial_state: Option<Value>,
    ) -> Result<(), NotifierError> {
        let key = self.key_for(&room_id, &thread_id);
        let cancel_token = CancelToken::new();

        let run_id = match existing_run_id.filter(|id| !id.as_str().is_empty()) {
            Some(id) => id,
            None => {
                let endpoint = endpoints::create_run_endpoint(&room_id, &thread_id);
                let body = self
                    .ctx
                    .transport
                    .post(&endpoint, serde_json::json!({}), &cancel_token, Some(self.ctx.unary_call_timeout))
                    .await
                    .map_err(|e| NotifierError::Transport(e.to_string()))?;
                let run_id = body.get("runId").and_then(Value::as_str).ok_or(NotifierError::MissingRunId)?;
                RunId::from(run_id)
            }
        };

        let stamp = self.next_stamp();
        let user_message_id = MessageId::new(format!("user_{stamp}"));
        let user_message = Message::text(user_message_id.clone(), Role::User, user_message_text, Utc::now());

        let history = self.ctx.cache.get(&key);
        let mut messages = history.messages;
        messages.push(user_message);
        let agui_state_at_start = history.agui_state;

        let merged_state = match &initial_state {
            Some(overlay) => merge_initial_state(&agui_state_at_start, overlay),
            None => agui_state_at_start.clone(),
        };

        let input = RunInput {
            thread_id: thread_id.clone(),
            run_id: run_id.clone(),
            messages: to_wire(&messages),
            state: merged_state,
        };
        let endpoint = endpoints::run_endpoint(&room_id, &thread_id, &run_id);

        let stream = self
            .ctx
            .transport
            .run_agent(&endpoint, input, cancel_token.clone())
            .await
            .map_err(|e| NotifierError::Transport(e.to_string()))?;

        let mut conversation = Conversation::with_history(thread_id, messages, agui_state_at_start.clone());
        conversation.status = RunStatus::Running(run_id.clone());

        let handle = Arc::new(RunHandle::new(
            key.clone(),
            run_id,
            cancel_token,
            user_message_id,
            agui_state_at_start,
            0,
            ActiveRunState::Running(conversation, StreamingState::awaiting_text()),
        ));

        self.ctx.registry.register_run(handle.clone());
        {
            let mut current = self.current_handle.lock().expect("current handle lock poisoned");
            let should_project = match current.as_ref() {
                None => true,
                Some(existing) => existing.key == key,
            };
            if should_project {
                *current = Some(handle.clone());
                *self.visible_state.lock().expect("visible state lock poisoned") = handle.current_state();
            }
        }

        self.clone().spawn_driver(handle, stream);
        Ok(())
    }

    fn spawn_driver(self: Arc<Self>, handle: Arc<RunHandle>, stream: crate::transport::EventStream) {
        let notifier = self.clone();
        let driven_handle = handle.clone();
        let task = tokio::spawn(async move {
            notifier.drive(driven_handle, stream).await;
        });
        handle.set_subscription(task);
    }

    /// Feeds each event through the reducer, projecting the updated state
    /// when `handle` is the one currently visible. A `RunError` event is
    /// treated as immediately terminal; every other event keeps the stream
    /// open until it ends naturally, at which point `on_done` decides
    /// whether pending tool calls need executing before the run is
    /// `Completed`.
    async fn drive(self: Arc<Self>, handle: Arc<RunHandle>, mut stream: crate::transport::EventStream) {
        while let Some(event) = stream.next().await {
            if handle.cancel_token.is_cancelled() {
                return;
            }
            let (conversation, streaming) = match handle.current_state() {
                ActiveRunState::Running(conversation, streaming) => (conversation, streaming),
                _ => return,
            };
            let (conversation, streaming) = agui_core::process(conversation, streaming, &event);
            if let RunStatus::Failed(message) = &conversation.status {
                self.finish(&handle, conversation.clone(), CompletionResult::Failed(message.clone()));
                return;
            }
            handle.set_state(ActiveRunState::Running(conversation, streaming));
            self.project_if_visible(&handle);
        }
        self.on_done(handle).await;
    }

    fn project_if_visible(&self, handle: &Arc<RunHandle>) {
        let current = self.current_handle.lock().expect("current handle lock poisoned");
        if current.as_ref().map(|h| Arc::ptr_eq(h, handle)).unwrap_or(false) {
            *self.visible_state.lock().expect("visible state lock poisoned") = handle.current_state();
        }
    }

    fn is_current(&self, handle: &Arc<RunHandle>) -> bool {
        self.ctx
            .registry
            .get_handle(&handle.key)
            .map(|current| Arc::ptr_eq(&current, handle))
            .unwrap_or(false)
    }

    /// The stream ended. If the conversation carries pending tool calls,
    /// hand them to `execute_tools_and_continue`; otherwise the run is done.
    async fn on_done(self: Arc<Self>, handle: Arc<RunHandle>) {
        let conversation = match handle.current_state() {
            ActiveRunState::Running(conversation, _) => conversation,
            _ => return,
        };
        let pending: Vec<_> = conversation
            .tool_calls
            .iter()
            .filter(|tc| tc.status == ToolCallStatus::Pending)
            .cloned()
            .collect();

        if pending.is_empty() {
            self.finish(&handle, conversation, CompletionResult::Success);
            return;
        }

        handle.set_state(ActiveRunState::ExecutingTools(conversation, pending));
        self.project_if_visible(&handle);
        self.execute_tools_and_continue(handle).await;
    }

    /// Executes every pending tool call concurrently, appends the results as
    /// a single `ToolCallMessage`, and opens a continuation run carrying the
    /// updated history forward. Bails out to `Failed` once `max_tool_depth`
    /// hops have been spent — a misbehaving tool/agent pair that never
    /// stops calling tools must not loop forever.
    async fn execute_tools_and_continue(self: Arc<Self>, handle: Arc<RunHandle>) {
        if handle.depth >= self.ctx.max_tool_depth {
            if let ActiveRunState::ExecutingTools(mut conversation, _) = handle.current_state() {
                conversation.tool_calls.clear();
                self.finish(&handle, conversation, CompletionResult::Failed("tool execution depth limit exceeded".to_string()));
            }
            return;
        }

        let (mut conversation, pending) = match handle.current_state() {
            ActiveRunState::ExecutingTools(conversation, pending) => (conversation, pending),
            _ => return,
        };

        let tools = self.ctx.tools.clone();
        let results = futures::future::join_all(pending.into_iter().map(|mut call| {
            let tools = tools.clone();
            async move {
                match tools.execute(&call).await {
                    Ok(result) => call.complete(result),
                    Err(err) => call.fail(err.to_string()),
                }
                call
            }
        }))
        .await;

        if handle.cancel_token.is_cancelled() || !self.is_current(&handle) {
            return;
        }

        let stamp = self.next_stamp();
        conversation.messages.push(Message::ToolCall(ToolCallMessage {
            id: MessageId::new(format!("tool_call_{stamp}")),
            user: Role::Assistant,
            tool_calls: results,
            created_at: Utc::now(),
        }));
        conversation.tool_calls.clear();

        let create_endpoint = endpoints::create_run_endpoint(&handle.key.room_id, &handle.key.thread_id);
        let run_id = match self
            .ctx
            .transport
            .post(&create_endpoint, serde_json::json!({}), &handle.cancel_token, Some(self.ctx.unary_call_timeout))
            .await
        {
            Ok(body) => match body.get("runId").and_then(Value::as_str) {
                Some(id) => RunId::from(id),
                None => {
                    self.finish(&handle, conversation, CompletionResult::Failed("createRun response did not contain a runId".to_string()));
                    return;
                }
            },
            Err(err) => {
                self.finish(&handle, conversation, CompletionResult::Failed(err.to_string()));
                return;
            }
        };

        if handle.cancel_token.is_cancelled() || !self.is_current(&handle) {
            return;
        }

        let new_handle = Arc::new(RunHandle::new(
            handle.key.clone(),
            run_id.clone(),
            CancelToken::new(),
            handle.user_message_id.clone(),
            handle.previous_agui_state.clone(),
            handle.depth + 1,
            ActiveRunState::Running(conversation.clone(), StreamingState::awaiting_text()),
        ));

        let input = RunInput {
            thread_id: handle.key.thread_id.clone(),
            run_id,
            messages: to_wire(&conversation.messages),
            state: conversation.agui_state.clone(),
        };
        let run_endpoint = endpoints::run_endpoint(&handle.key.room_id, &handle.key.thread_id, &new_handle.run_id);
        let stream = match self
            .ctx
            .transport
            .run_agent(&run_endpoint, input, new_handle.cancel_token.clone())
            .await
        {
            Ok(stream) => stream,
            Err(err) => {
                self.finish(&handle, conversation, CompletionResult::Failed(err.to_string()));
                return;
            }
        };

        if !self.ctx.registry.replace_run(&handle, new_handle.clone()) {
            new_handle.dispose();
            return;
        }

        {
            let mut current = self.current_handle.lock().expect("current handle lock poisoned");
            if current.as_ref().map(|h| Arc::ptr_eq(h, &handle)).unwrap_or(false) {
                *current = Some(new_handle.clone());
                *self.visible_state.lock().expect("visible state lock poisoned") = new_handle.current_state();
            }
        }

        self.spawn_driver(new_handle, stream);
    }

    /// Folds the run's terminal state into the thread history cache,
    /// correlates any newly surfaced citations onto the originating user
    /// message, removes the handle from the registry, and disposes it. If
    /// the caller isn't currently viewing this thread, the thread is marked
    /// unread instead of clearing the visible state.
    fn finish(&self, handle: &Arc<RunHandle>, mut conversation: Conversation, result: CompletionResult) {
        if handle.cancel_token.is_cancelled() && !matches!(result, CompletionResult::Cancelled(_)) {
            return;
        }

        let citations = citation::extract_new_citations(&handle.previous_agui_state, &conversation.agui_state);
        if !citations.is_empty() {
            conversation.message_states.insert(
                handle.user_message_id.clone(),
                MessageState {
                    user_message_id: handle.user_message_id.clone(),
                    source_references: citations,
                    run_id: Some(handle.run_id.clone()),
                },
            );
        }

        handle.set_state(ActiveRunState::Completed(conversation.clone(), result.clone()));
        self.ctx.registry.complete_run(handle, result.clone());
        self.ctx.cache.merge_on_completion(&handle.key, &conversation);

        let mut current = self.current_handle.lock().expect("current handle lock poisoned");
        if current.as_ref().map(|h| Arc::ptr_eq(h, handle)).unwrap_or(false) {
            *current = None;
            *self.visible_state.lock().expect("visible state lock poisoned") = ActiveRunState::Completed(conversation, result);
        } else if !matches!(result, CompletionResult::Cancelled(_)) {
            drop(current);
            self.unread.lock().expect("unread set lock poisoned").insert(handle.key.clone());
        }
        handle.dispose();
    }

    /// Cancels the currently viewed run, if any. Synchronous and final: by
    /// the time this returns the handle has reached `Completed{Cancelled}`
    /// and its background stream task has been aborted — the asynchronous
    /// "dispose runs in the background" framing is unnecessary here since
    /// disposal only ever does cheap, non-blocking bookkeeping.
    pub fn cancel_run(&self) {
        let handle = self.current_handle.lock().expect("current handle lock poisoned").clone();
        let Some(handle) = handle else { return };
        let conversation = match handle.current_state() {
            ActiveRunState::Running(conversation, _) => conversation,
            ActiveRunState::ExecutingTools(conversation, _) => conversation,
            ActiveRunState::Completed(..) | ActiveRunState::Idle => return,
        };
        let mut conversation = conversation;
        let message = "cancelled by caller".to_string();
        conversation.status = RunStatus::Cancelled(message.clone());
        self.finish(&handle, conversation, CompletionResult::Cancelled(message));
    }

    /// Switches which thread the caller is looking at, syncing the visible
    /// state to that thread's live handle (if any) and clearing its unread
    /// marker. Passing `None` means no thread is currently in view.
    pub fn set_viewed(&self, key: Option<ThreadKey>) {
        if let Some(key) = &key {
            self.unread.lock().expect("unread set lock poisoned").remove(key);
        }
        *self.viewed_key.lock().expect("viewed key lock poisoned") = key.clone();

        match key.and_then(|k| self.ctx.registry.get_handle(&k)) {
            Some(handle) => {
                *self.visible_state.lock().expect("visible state lock poisoned") = handle.current_state();
                *self.current_handle.lock().expect("current handle lock poisoned") = Some(handle);
            }
            None => {
                *self.current_handle.lock().expect("current handle lock poisoned") = None;
                *self.visible_state.lock().expect("visible state lock poisoned") = ActiveRunState::Idle;
            }
        }
    }
}
