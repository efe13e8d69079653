// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};

fn default_max_tool_depth() -> u32 {
    10
}

fn default_unary_call_timeout_secs() -> u64 {
    30
}

fn default_server_id() -> String {
    "default".to_string()
}

/// Runtime tunables for the conversation engine. None of these change the
/// engine's semantics — they're knobs intentionally kept out of compiled
/// constants (`max_tool_depth`, unary call timeouts, the default server id
/// for single-server deployments).
///
/// The struct is deliberately small: config *loading* (the source of truth —
/// a remote config service, a CLI flag parser) is out of scope for the core;
/// only the shape of the tunables and a reusable layered-merge loader live
/// here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// The bound on continuation-run recursion before
    /// `executeToolsAndContinue` aborts the run as `Failed`.
    #[serde(default = "default_max_tool_depth")]
    pub max_tool_depth: u32,
    /// Default timeout applied to `Transport::post` calls that don't supply
    /// their own (`createRun`, metadata updates, room/thread listing).
    /// Streams (`runAgent`) are intentionally unbounded.
    #[serde(default = "default_unary_call_timeout_secs")]
    pub unary_call_timeout_secs: u64,
    /// `ThreadKey.server_id` used when the caller doesn't specify one —
    /// single-server deployments never need to think about this field.
    #[serde(default = "default_server_id")]
    pub default_server_id: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_tool_depth: default_max_tool_depth(),
            unary_call_timeout_secs: default_unary_call_timeout_secs(),
            default_server_id: default_server_id(),
        }
    }
}

impl RuntimeConfig {
    pub fn unary_call_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.unary_call_timeout_secs)
    }
}
