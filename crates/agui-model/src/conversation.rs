// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;

use serde_json::Value;

use agui_proto::{MessageId, RunId, ThreadId};

use crate::message::{Message, MessageState};
use crate::tool_call::ToolCallInfo;

/// Current status of the run that owns this `Conversation`.
#[derive(Clone, Debug, PartialEq)]
pub enum RunStatus {
    Idle,
    Running(RunId),
    Completed,
    Failed(String),
    Cancelled(String),
}

/// Owned by the notifier for the current run; owned by the thread history
/// cache for idle threads. A pure value type — never aliased. The reducer
/// always returns a new `Conversation`; callers swap rather than mutate
/// shared references.
#[derive(Clone, Debug, PartialEq)]
pub struct Conversation {
    pub thread_id: ThreadId,
    pub messages: Vec<Message>,
    /// Only entries in `streaming`, `pending`, or `executing` ever live
    /// here; terminal entries are consumed into a `ToolCallMessage` and
    /// removed.
    pub tool_calls: Vec<ToolCallInfo>,
    pub agui_state: Value,
    pub message_states: HashMap<MessageId, MessageState>,
    pub status: RunStatus,
}

impl Conversation {
    pub fn new(thread_id: ThreadId) -> Self {
        Self {
            thread_id,
            messages: Vec::new(),
            tool_calls: Vec::new(),
            agui_state: Value::Null,
            message_states: HashMap::new(),
            status: RunStatus::Idle,
        }
    }

    pub fn with_history(thread_id: ThreadId, messages: Vec<Message>, agui_state: Value) -> Self {
        Self { messages, agui_state, ..Self::new(thread_id) }
    }

    pub fn tool_call_mut(&mut self, id: &agui_proto::ToolCallId) -> Option<&mut ToolCallInfo> {
        self.tool_calls.iter_mut().find(|tc| &tc.id == id)
    }

    pub fn pending_tool_calls(&self) -> Vec<&ToolCallInfo> {
        self.tool_calls
            .iter()
            .filter(|tc| tc.status == crate::tool_call::ToolCallStatus::Pending)
            .collect()
    }
}
