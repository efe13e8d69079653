// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};

use agui_proto::ToolCallId;

/// `streaming --end--> pending --exec start--> executing --success--> completed`
/// `                                       \--failure--> failed`
///
/// Terminal states are never downgraded; see `ToolCallInfo::advance_to`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    Streaming,
    Pending,
    Executing,
    Completed,
    Failed,
}

impl ToolCallStatus {
    fn rank(self) -> u8 {
        match self {
            ToolCallStatus::Streaming => 0,
            ToolCallStatus::Pending => 1,
            ToolCallStatus::Executing => 2,
            ToolCallStatus::Completed | ToolCallStatus::Failed => 3,
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, ToolCallStatus::Completed | ToolCallStatus::Failed)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallInfo {
    pub id: ToolCallId,
    pub name: String,
    /// Raw JSON string, accumulated from streamed argument deltas.
    pub arguments: String,
    pub result: Option<String>,
    pub status: ToolCallStatus,
}

impl ToolCallInfo {
    pub fn new_streaming(id: ToolCallId, name: impl Into<String>) -> Self {
        Self { id, name: name.into(), arguments: String::new(), result: None, status: ToolCallStatus::Streaming }
    }

    /// Advances the status monotonically. A request to move to a rank at or
    /// behind the current one (or out of a terminal state) is a no-op — this
    /// is what makes a late/duplicate `ToolCallEnd` harmless.
    pub fn advance_to(&mut self, next: ToolCallStatus) {
        if self.status.is_terminal() {
            return;
        }
        if next.rank() > self.status.rank() {
            self.status = next;
        }
    }

    pub fn complete(&mut self, result: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.result = Some(result.into());
        self.status = ToolCallStatus::Completed;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.result = Some(message.into());
        self.status = ToolCallStatus::Failed;
    }
}
