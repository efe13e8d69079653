// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::BTreeSet;

use agui_proto::MessageId;

use crate::message::Role;

/// Activity hint accumulated across a run, surfaced for UI purposes only —
/// never affects reducer correctness.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CurrentActivity {
    Thinking,
    ToolCall { all_tool_names: BTreeSet<String> },
}

/// Transient, per-active-run buffers the reducer threads through while a
/// stream is in flight. Replaced wholesale on every reduction — never
/// mutated in place by callers.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamingState {
    AwaitingText {
        current_activity: Option<CurrentActivity>,
        buffered_thinking_text: String,
        is_thinking_streaming: bool,
    },
    TextStreaming {
        message_id: MessageId,
        user: Role,
        text: String,
        thinking_text: String,
        is_thinking_streaming: bool,
    },
}

impl StreamingState {
    pub fn awaiting_text() -> Self {
        StreamingState::AwaitingText {
            current_activity: None,
            buffered_thinking_text: String::new(),
            is_thinking_streaming: false,
        }
    }

    pub fn is_thinking_streaming(&self) -> bool {
        match self {
            StreamingState::AwaitingText { is_thinking_streaming, .. } => *is_thinking_streaming,
            StreamingState::TextStreaming { is_thinking_streaming, .. } => *is_thinking_streaming,
        }
    }
}

impl Default for StreamingState {
    fn default() -> Self {
        Self::awaiting_text()
    }
}
