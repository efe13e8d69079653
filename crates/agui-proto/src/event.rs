// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{MessageId, RunId, ThreadId, ToolCallId};

/// Every event kind the core knows how to interpret. `type` on the wire is
/// SCREAMING_SNAKE_CASE; see `KNOWN_TYPES` for the exhaustive list.
///
/// `Unknown` is the fallback for any `type` this codec doesn't recognize —
/// decoding never fails outright on an unfamiliar event, matching the
/// "malformed events surface as `UnknownEvent`, never as transport errors"
/// contract.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    RunStarted { thread_id: ThreadId, run_id: RunId },
    RunFinished { thread_id: ThreadId, run_id: RunId },
    RunError { message: String, code: Option<String> },
    StepStarted { step_name: String },
    StepFinished { step_name: String },
    TextMessageStart { message_id: MessageId, role: Option<String> },
    TextMessageContent { message_id: MessageId, delta: String },
    TextMessageEnd { message_id: MessageId },
    ThinkingTextMessageStart,
    ThinkingTextMessageContent { delta: String },
    ThinkingTextMessageEnd,
    ToolCallStart { tool_call_id: ToolCallId, tool_call_name: String },
    ToolCallArgs { tool_call_id: ToolCallId, delta: String },
    ToolCallEnd { tool_call_id: ToolCallId },
    ToolCallResult { message_id: MessageId, tool_call_id: ToolCallId, content: Value },
    StateSnapshot { snapshot: Value },
    /// Two wire shapes collapse here: the canonical array form (`patches`)
    /// and the older flat form (`delta_type`/`delta_path`/`delta_value`).
    /// Normalizing one into the other is the JSON-Patch engine's job, not
    /// the codec's — this variant just carries whichever shape arrived.
    StateDelta {
        patches: Option<Vec<Value>>,
        delta_type: Option<String>,
        delta_path: Option<String>,
        delta_value: Option<Value>,
    },
    ActivitySnapshot { message_id: MessageId, activity_type: String, content: Value },
    ActivityDelta { message_id: MessageId, activity_type: String, patch: Vec<Value> },
    MessagesSnapshot { messages: Vec<Value> },
    Custom { name: String, value: Value },
    /// Fallback for any `type` not in the exhaustive list, or for a known
    /// type whose payload didn't deserialize cleanly.
    Unknown { raw_type: String, raw_json: Value },
}

/// Shadow of `Event` minus `Unknown`, used purely to get serde's tagged-enum
/// derive for the happy path. Field shapes mirror `Event` exactly so mapping
/// between the two is a straight variant-for-variant copy.
#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum WireEvent {
    RunStarted { thread_id: ThreadId, run_id: RunId },
    RunFinished { thread_id: ThreadId, run_id: RunId },
    RunError {
        #[serde(default = "default_error_message")]
        message: String,
        #[serde(default)]
        code: Option<String>,
    },
    StepStarted { step_name: String },
    StepFinished { step_name: String },
    TextMessageStart {
        message_id: MessageId,
        #[serde(default)]
        role: Option<String>,
    },
    TextMessageContent {
        message_id: MessageId,
        #[serde(default)]
        delta: String,
    },
    TextMessageEnd { message_id: MessageId },
    ThinkingTextMessageStart {},
    ThinkingTextMessageContent {
        #[serde(default)]
        delta: String,
    },
    ThinkingTextMessageEnd {},
    ToolCallStart {
        tool_call_id: ToolCallId,
        tool_call_name: String,
    },
    ToolCallArgs {
        tool_call_id: ToolCallId,
        #[serde(default)]
        delta: String,
    },
    ToolCallEnd { tool_call_id: ToolCallId },
    ToolCallResult {
        message_id: MessageId,
        tool_call_id: ToolCallId,
        #[serde(default)]
        content: Value,
    },
    StateSnapshot {
        #[serde(default)]
        snapshot: Value,
    },
    StateDelta {
        #[serde(default)]
        patches: Option<Vec<Value>>,
        #[serde(default)]
        delta_type: Option<String>,
        #[serde(default)]
        delta_path: Option<String>,
        #[serde(default)]
        delta_value: Option<Value>,
    },
    ActivitySnapshot {
        message_id: MessageId,
        activity_type: String,
        #[serde(default)]
        content: Value,
    },
    ActivityDelta {
        message_id: MessageId,
        activity_type: String,
        #[serde(default)]
        patch: Vec<Value>,
    },
    MessagesSnapshot {
        #[serde(default)]
        messages: Vec<Value>,
    },
    Custom {
        name: String,
        #[serde(default)]
        value: Value,
    },
}

fn default_error_message() -> String {
    "Unknown error".to_string()
}

impl From<WireEvent> for Event {
    fn from(w: WireEvent) -> Self {
        match w {
            WireEvent::RunStarted { thread_id, run_id } => Event::RunStarted { thread_id, run_id },
            WireEvent::RunFinished { thread_id, run_id } => Event::RunFinished { thread_id, run_id },
            WireEvent::RunError { message, code } => Event::RunError { message, code },
            WireEvent::StepStarted { step_name } => Event::StepStarted { step_name },
            WireEvent::StepFinished { step_name } => Event::StepFinished { step_name },
            WireEvent::TextMessageStart { message_id, role } => {
                Event::TextMessageStart { message_id, role }
            }
            WireEvent::TextMessageContent { message_id, delta } => {
                Event::TextMessageContent { message_id, delta }
            }
            WireEvent::TextMessageEnd { message_id } => Event::TextMessageEnd { message_id },
            WireEvent::ThinkingTextMessageStart {} => Event::ThinkingTextMessageStart,
            WireEvent::ThinkingTextMessageContent { delta } => {
                Event::ThinkingTextMessageContent { delta }
            }
            WireEvent::ThinkingTextMessageEnd {} => Event::ThinkingTextMessageEnd,
            WireEvent::ToolCallStart { tool_call_id, tool_call_name } => {
                Event::ToolCallStart { tool_call_id, tool_call_name }
            }
            WireEvent::ToolCallArgs { tool_call_id, delta } => {
                Event::ToolCallArgs { tool_call_id, delta }
            }
            WireEvent::ToolCallEnd { tool_call_id } => Event::ToolCallEnd { tool_call_id },
            WireEvent::ToolCallResult { message_id, tool_call_id, content } => {
                Event::ToolCallResult { message_id, tool_call_id, content }
            }
            WireEvent::StateSnapshot { snapshot } => Event::StateSnapshot { snapshot },
            WireEvent::StateDelta { patches, delta_type, delta_path, delta_value } => {
                Event::StateDelta { patches, delta_type, delta_path, delta_value }
            }
            WireEvent::ActivitySnapshot { message_id, activity_type, content } => {
                Event::ActivitySnapshot { message_id, activity_type, content }
            }
            WireEvent::ActivityDelta { message_id, activity_type, patch } => {
                Event::ActivityDelta { message_id, activity_type, patch }
            }
            WireEvent::MessagesSnapshot { messages } => Event::MessagesSnapshot { messages },
            WireEvent::Custom { name, value } => Event::Custom { name, value },
        }
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let raw_type = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        match serde_json::from_value::<WireEvent>(value.clone()) {
            Ok(known) => Ok(Event::from(known)),
            Err(_) => Ok(Event::Unknown { raw_type, raw_json: value }),
        }
    }
}

impl Serialize for Event {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Event::Unknown { raw_json, .. } => raw_json.serialize(serializer),
            other => {
                let wire = match other.clone() {
                    Event::RunStarted { thread_id, run_id } => WireEvent::RunStarted { thread_id, run_id },
                    Event::RunFinished { thread_id, run_id } => WireEvent::RunFinished { thread_id, run_id },
                    Event::RunError { message, code } => WireEvent::RunError { message, code },
                    Event::StepStarted { step_name } => WireEvent::StepStarted { step_name },
                    Event::StepFinished { step_name } => WireEvent::StepFinished { step_name },
                    Event::TextMessageStart { message_id, role } => {
                        WireEvent::TextMessageStart { message_id, role }
                    }
                    Event::TextMessageContent { message_id, delta } => {
                        WireEvent::TextMessageContent { message_id, delta }
                    }
                    Event::TextMessageEnd { message_id } => WireEvent::TextMessageEnd { message_id },
                    Event::ThinkingTextMessageStart => WireEvent::ThinkingTextMessageStart {},
                    Event::ThinkingTextMessageContent { delta } => {
                        WireEvent::ThinkingTextMessageContent { delta }
                    }
                    Event::ThinkingTextMessageEnd => WireEvent::ThinkingTextMessageEnd {},
                    Event::ToolCallStart { tool_call_id, tool_call_name } => {
                        WireEvent::ToolCallStart { tool_call_id, tool_call_name }
                    }
                    Event::ToolCallArgs { tool_call_id, delta } => {
                        WireEvent::ToolCallArgs { tool_call_id, delta }
                    }
                    Event::ToolCallEnd { tool_call_id } => WireEvent::ToolCallEnd { tool_call_id },
                    Event::ToolCallResult { message_id, tool_call_id, content } => {
                        WireEvent::ToolCallResult { message_id, tool_call_id, content }
                    }
                    Event::StateSnapshot { snapshot } => WireEvent::StateSnapshot { snapshot },
                    Event::StateDelta { patches, delta_type, delta_path, delta_value } => {
                        WireEvent::StateDelta { patches, delta_type, delta_path, delta_value }
                    }
                    Event::ActivitySnapshot { message_id, activity_type, content } => {
                        WireEvent::ActivitySnapshot { message_id, activity_type, content }
                    }
                    Event::ActivityDelta { message_id, activity_type, patch } => {
                        WireEvent::ActivityDelta { message_id, activity_type, patch }
                    }
                    Event::MessagesSnapshot { messages } => WireEvent::MessagesSnapshot { messages },
                    Event::Custom { name, value } => WireEvent::Custom { name, value },
                    Event::Unknown { .. } => unreachable!("handled above"),
                };
                wire.serialize(serializer)
            }
        }
    }
}

/// The exhaustive list of event type tags this protocol version knows about.
pub const KNOWN_TYPES: &[&str] = &[
    "RUN_STARTED",
    "RUN_FINISHED",
    "RUN_ERROR",
    "STEP_STARTED",
    "STEP_FINISHED",
    "TEXT_MESSAGE_START",
    "TEXT_MESSAGE_CONTENT",
    "TEXT_MESSAGE_END",
    "THINKING_TEXT_MESSAGE_START",
    "THINKING_TEXT_MESSAGE_CONTENT",
    "THINKING_TEXT_MESSAGE_END",
    "TOOL_CALL_START",
    "TOOL_CALL_ARGS",
    "TOOL_CALL_END",
    "TOOL_CALL_RESULT",
    "STATE_SNAPSHOT",
    "STATE_DELTA",
    "ACTIVITY_SNAPSHOT",
    "ACTIVITY_DELTA",
    "MESSAGES_SNAPSHOT",
    "CUSTOM",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_run_started() {
        let json = serde_json::json!({"type": "RUN_STARTED", "thread_id": "t1", "run_id": "r1"});
        let event: Event = serde_json::from_value(json).unwrap();
        assert_eq!(
            event,
            Event::RunStarted { thread_id: ThreadId::from("t1"), run_id: RunId::from("r1") }
        );
    }

    #[test]
    fn unknown_type_falls_back_without_error() {
        let json = serde_json::json!({"type": "SOMETHING_NEW", "foo": 1});
        let event: Event = serde_json::from_value(json.clone()).unwrap();
        match event {
            Event::Unknown { raw_type, raw_json } => {
                assert_eq!(raw_type, "SOMETHING_NEW");
                assert_eq!(raw_json, json);
            }
            other => panic!("expected Unknown, got {other:?}"),
        }
    }

    #[test]
    fn run_error_defaults_message_when_missing() {
        let json = serde_json::json!({"type": "RUN_ERROR"});
        let event: Event = serde_json::from_value(json).unwrap();
        assert_eq!(
            event,
            Event::RunError { message: "Unknown error".to_string(), code: None }
        );
    }

    #[test]
    fn round_trip_is_stable() {
        let event = Event::TextMessageContent {
            message_id: MessageId::from("m1"),
            delta: "hi".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn state_delta_flat_form_round_trips() {
        let json = serde_json::json!({
            "type": "STATE_DELTA",
            "delta_type": "replace",
            "delta_path": "/count",
            "delta_value": 1,
        });
        let event: Event = serde_json::from_value(json).unwrap();
        match event {
            Event::StateDelta { patches, delta_type, delta_path, delta_value } => {
                assert!(patches.is_none());
                assert_eq!(delta_type.as_deref(), Some("replace"));
                assert_eq!(delta_path.as_deref(), Some("/count"));
                assert_eq!(delta_value, Some(serde_json::json!(1)));
            }
            other => panic!("expected StateDelta, got {other:?}"),
        }
    }
}
