// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::MessageId;

/// The role tag carried on wire messages. `Developer` and `System` both map
/// to `System` on the conversation side (see `agui-model::Role`); the wire
/// form keeps them distinct because some servers emit `developer` for
/// system-prompt-equivalent turns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireRole {
    User,
    Assistant,
    System,
    Developer,
    Tool,
}

/// A message in the shape the AG-UI wire protocol expects inside
/// `runAgent`'s `input.messages` array.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WireMessage {
    pub id: MessageId,
    pub role: WireRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl WireMessage {
    pub fn user(id: MessageId, content: impl Into<String>) -> Self {
        Self { id, role: WireRole::User, content: content.into(), tool_call_id: None }
    }

    pub fn assistant(id: MessageId, content: impl Into<String>) -> Self {
        Self { id, role: WireRole::Assistant, content: content.into(), tool_call_id: None }
    }
}

/// The body of a `runAgent` request: `{threadId, runId, messages, state}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunInput {
    pub thread_id: crate::ids::ThreadId,
    pub run_id: crate::ids::RunId,
    pub messages: Vec<WireMessage>,
    pub state: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_message_serializes_lowercase_role() {
        let msg = WireMessage::user(MessageId::from("m1"), "hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
    }
}
