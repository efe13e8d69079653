// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Arc;

use agui_model::ToolCallInfo;

use crate::tool::{ClientTool, ToolDefinition};

/// Why a tool execution didn't produce a result. Both variants are
/// per-tool failures the notifier records on the individual `ToolCallInfo`
/// — neither ever escalates to a fatal run error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolExecError {
    #[error("no tool registered under name `{0}`")]
    NotFound(String),
    #[error("{0}")]
    ExecutionFailed(String),
}

/// Persistent mapping `toolName -> ClientTool`. `register` returns a new
/// registry rather than mutating in place, so a caller can compose
/// variants (e.g. a per-run registry that adds one extra tool) without
/// affecting anyone else holding the original.
///
/// Internally this clones an `Arc`-keyed map on every `register`, which is
/// cheap relative to re-registering tools on every run — the map is small
/// and the values are reference-counted, not deep-copied.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Arc<HashMap<String, Arc<dyn ClientTool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new registry with `tool` added (or replacing any existing
    /// tool under the same name).
    pub fn register(&self, tool: Arc<dyn ClientTool>) -> Self {
        let mut next = (*self.tools).clone();
        next.insert(tool.definition().name.clone(), tool);
        Self { tools: Arc::new(next) }
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn ClientTool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn schemas(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Delegates to the named tool's executor, returning the raw string
    /// result. Both a missing tool and an executor failure are reported as
    /// `ToolExecError`; the notifier treats either as a per-tool failure,
    /// never a fatal run error.
    pub async fn execute(&self, call: &ToolCallInfo) -> Result<String, ToolExecError> {
        match self.lookup(&call.name) {
            Some(tool) => tool.execute(call).await.map_err(ToolExecError::ExecutionFailed),
            None => Err(ToolExecError::NotFound(call.name.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::test_support::{EchoTool, FailingTool};
    use agui_proto::ToolCallId;

    fn tc(name: &str) -> ToolCallInfo {
        let mut t = ToolCallInfo::new_streaming(ToolCallId::from("tc1"), name);
        t.arguments = "{}".to_string();
        t
    }

    #[test]
    fn register_is_persistent() {
        let base = ToolRegistry::new();
        let with_echo = base.register(Arc::new(EchoTool));
        assert!(!base.contains("echo"));
        assert!(with_echo.contains("echo"));
    }

    #[tokio::test]
    async fn execute_delegates_to_tool() {
        let registry = ToolRegistry::new().register(Arc::new(EchoTool));
        let result = registry.execute(&tc("echo")).await.unwrap();
        assert_eq!(result, "{}");
    }

    #[tokio::test]
    async fn execute_unknown_tool_is_not_found() {
        let registry = ToolRegistry::new();
        let err = registry.execute(&tc("nope")).await.unwrap_err();
        assert!(matches!(err, ToolExecError::NotFound(name) if name == "nope"));
    }

    #[tokio::test]
    async fn execute_surfaces_executor_failure_as_per_tool_error() {
        let registry = ToolRegistry::new().register(Arc::new(FailingTool));
        let err = registry.execute(&tc("always_fails")).await.unwrap_err();
        assert!(matches!(err, ToolExecError::ExecutionFailed(msg) if msg == "timeout"));
    }

    #[test]
    fn register_replaces_same_name() {
        let registry = ToolRegistry::new()
            .register(Arc::new(EchoTool))
            .register(Arc::new(EchoTool));
        assert_eq!(registry.names().len(), 1);
    }
}
