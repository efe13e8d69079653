// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use crate::conversation::Conversation;
use crate::streaming::StreamingState;
use crate::tool_call::ToolCallInfo;

#[derive(Clone, Debug, PartialEq)]
pub enum CompletionResult {
    Success,
    Failed(String),
    Cancelled(String),
}

/// The notifier's externally visible state for whichever thread is
/// currently being projected.
#[derive(Clone, Debug, PartialEq)]
pub enum ActiveRunState {
    Idle,
    Running(Conversation, StreamingState),
    ExecutingTools(Conversation, Vec<ToolCallInfo>),
    Completed(Conversation, CompletionResult),
}

impl ActiveRunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActiveRunState::Completed(..))
    }
}
