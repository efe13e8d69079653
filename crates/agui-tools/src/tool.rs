// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::Value;

use agui_model::ToolCallInfo;

/// Schema metadata for a tool, exported to the agent server so it knows
/// what the client can execute.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters_schema: Value,
}

/// Every client-side tool implements this. `execute` receives the raw tool
/// call (name plus the accumulated, still-unparsed JSON argument string) and
/// returns the raw string result the continuation run carries forward.
///
/// Argument parsing is the tool's own concern — the registry and notifier
/// never inspect `arguments` beyond forwarding it; a tool that can't parse
/// its own arguments reports that as an `Err` like any other execution
/// failure, not as a distinct error kind.
#[async_trait]
pub trait ClientTool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn execute(&self, call: &ToolCallInfo) -> Result<String, String>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub struct EchoTool;

    #[async_trait]
    impl ClientTool for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "echo".to_string(),
                description: "echoes its arguments back".to_string(),
                parameters_schema: serde_json::json!({ "type": "object" }),
            }
        }

        async fn execute(&self, call: &ToolCallInfo) -> Result<String, String> {
            Ok(call.arguments.clone())
        }
    }

    pub struct FailingTool;

    #[async_trait]
    impl ClientTool for FailingTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "always_fails".to_string(),
                description: "always returns an error".to_string(),
                parameters_schema: serde_json::json!({ "type": "object" }),
            }
        }

        async fn execute(&self, _call: &ToolCallInfo) -> Result<String, String> {
            Err("timeout".to_string())
        }
    }

    pub struct CountingTool {
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl ClientTool for CountingTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "counter".to_string(),
                description: "counts invocations".to_string(),
                parameters_schema: serde_json::json!({ "type": "object" }),
            }
        }

        async fn execute(&self, _call: &ToolCallInfo) -> Result<String, String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(n.to_string())
        }
    }
}
