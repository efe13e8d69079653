// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use chrono::Utc;

use agui_model::{
    Conversation, CurrentActivity, Message, Role, RunStatus, StreamingState, TextMessage,
    ToolCallInfo, ToolCallStatus,
};
use agui_patch::StateDeltaProcessor;
use agui_proto::Event;

/// `process(conversation, streaming, event) -> (conversation', streaming')`.
///
/// Deterministic and pure: the only inputs are the three arguments, the only
/// outputs are the two return values. Concurrent invocation on disjoint
/// `(conversation, streaming)` pairs is safe because nothing here reaches
/// outside its arguments — no clock reads gate behavior, no I/O, no shared
/// mutable state.
pub fn process(
    mut conversation: Conversation,
    mut streaming: StreamingState,
    event: &Event,
) -> (Conversation, StreamingState) {
    match event {
        Event::RunStarted { run_id, .. } => {
            conversation.status = RunStatus::Running(run_id.clone());
        }
        Event::RunFinished { .. } => {
            conversation.status = RunStatus::Completed;
        }
        Event::RunError { message, .. } => {
            conversation.status = RunStatus::Failed(message.clone());
        }
        Event::StepStarted { .. } | Event::StepFinished { .. } => {
            // No-op on conversation; no activity signal carried by steps.
        }
        Event::TextMessageStart { message_id, role } => {
            let buffered_thinking = match &streaming {
                StreamingState::AwaitingText { buffered_thinking_text, .. } => buffered_thinking_text.clone(),
                StreamingState::TextStreaming { thinking_text, .. } => thinking_text.clone(),
            };
            streaming = StreamingState::TextStreaming {
                message_id: message_id.clone(),
                user: Role::from_wire(role.as_deref()),
                text: String::new(),
                thinking_text: buffered_thinking,
                is_thinking_streaming: streaming.is_thinking_streaming(),
            };
        }
        Event::TextMessageContent { message_id, delta } => {
            if let StreamingState::TextStreaming { message_id: current_id, text, .. } = &mut streaming {
                if current_id == message_id {
                    text.push_str(delta);
                }
            }
        }
        Event::TextMessageEnd { message_id } => {
            if let StreamingState::TextStreaming { message_id: current_id, user, text, thinking_text, .. } =
                &streaming
            {
                if current_id == message_id {
                    conversation.messages.push(Message::Text(TextMessage {
                        id: current_id.clone(),
                        user: *user,
                        text: text.clone(),
                        thinking_text: if thinking_text.is_empty() { None } else { Some(thinking_text.clone()) },
                        created_at: Utc::now(),
                    }));
                    streaming = StreamingState::awaiting_text();
                }
            }
        }
        Event::ThinkingTextMessageStart => {
            set_thinking_streaming(&mut streaming, true);
            set_activity(&mut streaming, CurrentActivity::Thinking);
        }
        Event::ThinkingTextMessageContent { delta } => match &mut streaming {
            StreamingState::AwaitingText { buffered_thinking_text, .. } => {
                buffered_thinking_text.push_str(delta);
            }
            StreamingState::TextStreaming { thinking_text, .. } => {
                thinking_text.push_str(delta);
            }
        },
        Event::ThinkingTextMessageEnd => {
            set_thinking_streaming(&mut streaming, false);
        }
        Event::ToolCallStart { tool_call_id, tool_call_name } => {
            conversation
                .tool_calls
                .push(ToolCallInfo::new_streaming(tool_call_id.clone(), tool_call_name.clone()));
            add_tool_name_to_activity(&mut streaming, tool_call_name);
        }
        Event::ToolCallArgs { tool_call_id, delta } => {
            if let Some(tc) = conversation.tool_call_mut(tool_call_id) {
                if tc.status == ToolCallStatus::Streaming {
                    tc.arguments.push_str(delta);
                }
            }
        }
        Event::ToolCallEnd { tool_call_id } => {
            if let Some(tc) = conversation.tool_call_mut(tool_call_id) {
                tc.advance_to(ToolCallStatus::Pending);
            }
        }
        Event::ToolCallResult { .. } => {
            // Server-initiated tool results are out of scope for the
            // client-side tool-execution loop; passthrough only.
        }
        Event::StateSnapshot { snapshot } => {
            conversation.agui_state = snapshot.clone();
        }
        Event::StateDelta { .. } => {
            match StateDeltaProcessor::reduce(&conversation.agui_state, event) {
                Ok(result) => {
                    conversation.agui_state = result.state;
                    if !result.success {
                        if let Some(err) = result.error {
                            tracing::warn!(thread_id = %conversation.thread_id, error = %err, "state delta op failed, state preserved up to the failure point");
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(thread_id = %conversation.thread_id, error = %err, "state delta event could not be normalized into ops, state preserved");
                }
            }
        }
        Event::MessagesSnapshot { .. }
        | Event::ActivitySnapshot { .. }
        | Event::ActivityDelta { .. }
        | Event::Custom { .. }
        | Event::Unknown { .. } => {
            // Passthrough: conversation and streaming unchanged.
        }
    }
    (conversation, streaming)
}

fn set_thinking_streaming(streaming: &mut StreamingState, value: bool) {
    match streaming {
        StreamingState::AwaitingText { is_thinking_streaming, .. } => *is_thinking_streaming = value,
        StreamingState::TextStreaming { is_thinking_streaming, .. } => *is_thinking_streaming = value,
    }
}

fn set_activity(streaming: &mut StreamingState, activity: CurrentActivity) {
    if let StreamingState::AwaitingText { current_activity, .. } = streaming {
        *current_activity = Some(activity);
    }
}

fn add_tool_name_to_activity(streaming: &mut StreamingState, name: &str) {
    if let StreamingState::AwaitingText { current_activity, .. } = streaming {
        match current_activity {
            Some(CurrentActivity::ToolCall { all_tool_names }) => {
                all_tool_names.insert(name.to_string());
            }
            _ => {
                let mut names = std::collections::BTreeSet::new();
                names.insert(name.to_string());
                *current_activity = Some(CurrentActivity::ToolCall { all_tool_names: names });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agui_proto::{MessageId, RunId, ThreadId, ToolCallId};

    fn empty_conversation() -> Conversation {
        Conversation::new(ThreadId::from("t1"))
    }

    fn run_events(events: Vec<Event>) -> (Conversation, StreamingState) {
        let mut conversation = empty_conversation();
        let mut streaming = StreamingState::awaiting_text();
        for event in &events {
            let (c, s) = process(conversation, streaming, event);
            conversation = c;
            streaming = s;
        }
        (conversation, streaming)
    }

    // Scenario 1: happy text turn.
    #[test]
    fn happy_text_turn() {
        let (conversation, streaming) = run_events(vec![
            Event::RunStarted { thread_id: ThreadId::from("t1"), run_id: RunId::from("r1") },
            Event::TextMessageStart { message_id: MessageId::from("m1"), role: None },
            Event::TextMessageContent { message_id: MessageId::from("m1"), delta: "Hello".into() },
            Event::TextMessageContent { message_id: MessageId::from("m1"), delta: " world".into() },
            Event::TextMessageEnd { message_id: MessageId::from("m1") },
            Event::RunFinished { thread_id: ThreadId::from("t1"), run_id: RunId::from("r1") },
        ]);
        assert_eq!(conversation.messages.len(), 1);
        match &conversation.messages[0] {
            Message::Text(m) => {
                assert_eq!(m.id, MessageId::from("m1"));
                assert_eq!(m.user, Role::Assistant);
                assert_eq!(m.text, "Hello world");
            }
            other => panic!("expected text message, got {other:?}"),
        }
        assert_eq!(conversation.status, RunStatus::Completed);
        assert_eq!(streaming, StreamingState::awaiting_text());
    }

    // Scenario 2 (reducer half): tool roundtrip leaves a pending tool call.
    #[test]
    fn tool_call_reaches_pending() {
        let (conversation, _) = run_events(vec![
            Event::RunStarted { thread_id: ThreadId::from("t1"), run_id: RunId::from("r1") },
            Event::ToolCallStart { tool_call_id: ToolCallId::from("tc1"), tool_call_name: "get_secret_number".into() },
            Event::ToolCallArgs { tool_call_id: ToolCallId::from("tc1"), delta: "{\"name\":\"alice\"}".into() },
            Event::ToolCallEnd { tool_call_id: ToolCallId::from("tc1") },
            Event::RunFinished { thread_id: ThreadId::from("t1"), run_id: RunId::from("r1") },
        ]);
        assert_eq!(conversation.tool_calls.len(), 1);
        let tc = &conversation.tool_calls[0];
        assert_eq!(tc.status, ToolCallStatus::Pending);
        assert_eq!(tc.arguments, "{\"name\":\"alice\"}");
    }

    // Scenario 5: late ToolCallEnd is a no-op once already pending.
    #[test]
    fn late_tool_call_end_is_noop() {
        let (conversation, _) = run_events(vec![
            Event::ToolCallStart { tool_call_id: ToolCallId::from("tc1"), tool_call_name: "x".into() },
            Event::ToolCallArgs { tool_call_id: ToolCallId::from("tc1"), delta: "{}".into() },
            Event::ToolCallEnd { tool_call_id: ToolCallId::from("tc1") },
            Event::ToolCallEnd { tool_call_id: ToolCallId::from("tc1") },
        ]);
        assert_eq!(conversation.tool_calls[0].status, ToolCallStatus::Pending);
    }

    #[test]
    fn mismatched_message_id_is_ignored() {
        let (conversation, streaming) = run_events(vec![
            Event::TextMessageStart { message_id: MessageId::from("m1"), role: None },
            Event::TextMessageContent { message_id: MessageId::from("wrong"), delta: "nope".into() },
            Event::TextMessageEnd { message_id: MessageId::from("wrong") },
        ]);
        assert!(conversation.messages.is_empty());
        match streaming {
            StreamingState::TextStreaming { text, .. } => assert_eq!(text, ""),
            other => panic!("expected still streaming, got {other:?}"),
        }
    }

    #[test]
    fn args_ignored_once_past_streaming() {
        let (conversation, _) = run_events(vec![
            Event::ToolCallStart { tool_call_id: ToolCallId::from("tc1"), tool_call_name: "x".into() },
            Event::ToolCallEnd { tool_call_id: ToolCallId::from("tc1") },
            Event::ToolCallArgs { tool_call_id: ToolCallId::from("tc1"), delta: "late".into() },
        ]);
        assert_eq!(conversation.tool_calls[0].arguments, "");
    }

    #[test]
    fn thinking_text_carries_into_next_text_streaming() {
        let (_, streaming) = run_events(vec![
            Event::ThinkingTextMessageStart,
            Event::ThinkingTextMessageContent { delta: "pondering".into() },
            Event::ThinkingTextMessageEnd,
            Event::TextMessageStart { message_id: MessageId::from("m1"), role: None },
        ]);
        match streaming {
            StreamingState::TextStreaming { thinking_text, is_thinking_streaming, .. } => {
                assert_eq!(thinking_text, "pondering");
                assert!(!is_thinking_streaming);
            }
            other => panic!("expected text streaming, got {other:?}"),
        }
    }

    #[test]
    fn run_error_transitions_to_failed() {
        let (conversation, _) = run_events(vec![Event::RunError {
            message: "boom".into(),
            code: None,
        }]);
        assert_eq!(conversation.status, RunStatus::Failed("boom".into()));
    }

    #[test]
    fn state_snapshot_replaces_wholesale() {
        let (conversation, _) = run_events(vec![Event::StateSnapshot {
            snapshot: serde_json::json!({"a": 1}),
        }]);
        assert_eq!(conversation.agui_state, serde_json::json!({"a": 1}));
    }

    #[test]
    fn reducer_is_pure_and_repeatable() {
        let conversation = empty_conversation();
        let streaming = StreamingState::awaiting_text();
        let event = Event::TextMessageStart { message_id: MessageId::from("m1"), role: Some("user".into()) };
        let (c1, s1) = process(conversation.clone(), streaming.clone(), &event);
        let (c2, s2) = process(conversation, streaming, &event);
        assert_eq!(c1, c2);
        assert_eq!(s1, s2);
    }

    // TextMessageEnd stamps `created_at` from the wall clock, so the two
    // conversations below are never byte-for-byte equal; purity here means
    // the state-machine fields (id, user, text, status, streaming reset)
    // are identical regardless of when each call ran, not that the full
    // struct is.
    #[test]
    fn text_message_end_is_pure_over_state_machine_fields() {
        let events = vec![
            Event::TextMessageStart { message_id: MessageId::from("m1"), role: Some("user".into()) },
            Event::TextMessageContent { message_id: MessageId::from("m1"), delta: "hi".into() },
            Event::TextMessageEnd { message_id: MessageId::from("m1") },
        ];
        let run = || {
            let mut conversation = empty_conversation();
            let mut streaming = StreamingState::awaiting_text();
            for event in &events {
                let (c, s) = process(conversation, streaming, event);
                conversation = c;
                streaming = s;
            }
            (conversation, streaming)
        };
        let (c1, s1) = run();
        let (c2, s2) = run();
        assert_eq!(c1.status, c2.status);
        assert_eq!(s1, s2);
        match (&c1.messages[0], &c2.messages[0]) {
            (Message::Text(m1), Message::Text(m2)) => {
                assert_eq!(m1.id, m2.id);
                assert_eq!(m1.user, m2.user);
                assert_eq!(m1.text, m2.text);
                assert_eq!(m1.thinking_text, m2.thinking_text);
            }
            other => panic!("expected text messages, got {other:?}"),
        }
    }
}
