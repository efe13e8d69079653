// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tool_call::ToolCallInfo;
use agui_proto::MessageId;

/// `user`, `assistant`, `system`. `TextMessageStart`'s role mapping
/// collapses `developer` into `system` — an intentional conflation, not an
/// oversight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Maps an optional wire `role` string onto a `Role`, defaulting to
    /// `Assistant` when absent. `developer` and `system` both become
    /// `System`; anything else recognized as `user` becomes `User`.
    pub fn from_wire(role: Option<&str>) -> Self {
        match role {
            Some("user") => Role::User,
            Some("system") | Some("developer") => Role::System,
            _ => Role::Assistant,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextMessage {
    pub id: MessageId,
    pub user: Role,
    pub text: String,
    pub thinking_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallMessage {
    pub id: MessageId,
    /// Always `Role::Assistant`.
    pub user: Role,
    pub tool_calls: Vec<ToolCallInfo>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Message {
    Text(TextMessage),
    ToolCall(ToolCallMessage),
}

impl Message {
    pub fn text(id: MessageId, user: Role, text: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Message::Text(TextMessage { id, user, text: text.into(), thinking_text: None, created_at })
    }

    pub fn id(&self) -> &MessageId {
        match self {
            Message::Text(m) => &m.id,
            Message::ToolCall(m) => &m.id,
        }
    }
}

/// Per-user-message metadata correlated by `userMessageId`: citations
/// surfaced by the schema-firewalled diff of `aguiState` across a run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageState {
    pub user_message_id: MessageId,
    pub source_references: Vec<SourceReference>,
    pub run_id: Option<agui_proto::RunId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceReference {
    pub uri: String,
    pub title: Option<String>,
    pub snippet: Option<String>,
}
