// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The thread history cache: messages, shared state, and per-message state
//! that survive across runs for a given thread.
//!
//! Reads happen from `startRun` — any number of threads may be priming a
//! new run concurrently — while writes only ever happen from a run's
//! completion callback, so a `std::sync::RwLock` fits the single-writer,
//! concurrent-reader access pattern.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;

use agui_model::{Conversation, MessageState};
use agui_proto::{MessageId, ThreadKey};

/// Everything `startRun` needs to prime a new run with prior context.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ThreadHistory {
    pub messages: Vec<agui_model::Message>,
    pub agui_state: Value,
    pub message_states: HashMap<MessageId, MessageState>,
}

impl ThreadHistory {
    fn empty() -> Self {
        Self { messages: Vec::new(), agui_state: Value::Null, message_states: HashMap::new() }
    }
}

#[derive(Default)]
pub struct ThreadHistoryCache {
    inner: RwLock<HashMap<ThreadKey, ThreadHistory>>,
}

impl ThreadHistoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached entry for `key`, or an empty one if the thread has
    /// never completed a run.
    pub fn get(&self, key: &ThreadKey) -> ThreadHistory {
        self.inner
            .read()
            .expect("thread history cache lock poisoned")
            .get(key)
            .cloned()
            .unwrap_or_else(ThreadHistory::empty)
    }

    /// Merges a just-terminated conversation's new messages and shared
    /// state into the cached entry: `cache[key].messages` becomes the
    /// cached prefix plus the run's new messages, with no duplication and
    /// no reordering. Existing `messageStates` are preserved and the new
    /// ones layered on top.
    ///
    /// `conversation.messages` already contains the cached prefix (it was
    /// seeded with it in `startRun` step 4), so merging is append-only on
    /// whatever's genuinely new: we simply adopt `conversation.messages` and
    /// `conversation.aguiState` wholesale, since the conversation was built
    /// by extending the cached prefix rather than starting from scratch.
    pub fn merge_on_completion(&self, key: &ThreadKey, conversation: &Conversation) {
        let mut map = self.inner.write().expect("thread history cache lock poisoned");
        let entry = map.entry(key.clone()).or_insert_with(ThreadHistory::empty);
        entry.messages = conversation.messages.clone();
        entry.agui_state = conversation.agui_state.clone();
        for (id, state) in &conversation.message_states {
            entry.message_states.insert(id.clone(), state.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agui_model::{Conversation, Role};
    use agui_proto::{RoomId, ThreadId};
    use chrono::Utc;

    fn key() -> ThreadKey {
        ThreadKey::new(RoomId::from("room"), ThreadId::from("t1"))
    }

    #[test]
    fn get_on_unknown_thread_returns_empty_document() {
        let cache = ThreadHistoryCache::new();
        let history = cache.get(&key());
        assert!(history.messages.is_empty());
        assert_eq!(history.agui_state, Value::Null);
    }

    #[test]
    fn merge_appends_without_duplicating_cached_prefix() {
        let cache = ThreadHistoryCache::new();
        let mut conv = Conversation::new(ThreadId::from("t1"));
        conv.messages.push(agui_model::Message::text(
            MessageId::from("m1"),
            Role::User,
            "hi",
            Utc::now(),
        ));
        cache.merge_on_completion(&key(), &conv);

        let mut next_conv = Conversation::new(ThreadId::from("t1"));
        next_conv.messages = conv.messages.clone();
        next_conv.messages.push(agui_model::Message::text(
            MessageId::from("m2"),
            Role::Assistant,
            "hello",
            Utc::now(),
        ));
        cache.merge_on_completion(&key(), &next_conv);

        let history = cache.get(&key());
        assert_eq!(history.messages.len(), 2);
        assert_eq!(history.messages[0].id(), &MessageId::from("m1"));
        assert_eq!(history.messages[1].id(), &MessageId::from("m2"));
    }

    #[test]
    fn merge_preserves_existing_message_states() {
        let cache = ThreadHistoryCache::new();
        let mut conv = Conversation::new(ThreadId::from("t1"));
        conv.message_states.insert(
            MessageId::from("u1"),
            MessageState { user_message_id: MessageId::from("u1"), source_references: vec![], run_id: None },
        );
        cache.merge_on_completion(&key(), &conv);

        let mut next_conv = Conversation::new(ThreadId::from("t1"));
        next_conv.message_states.insert(
            MessageId::from("u2"),
            MessageState { user_message_id: MessageId::from("u2"), source_references: vec![], run_id: None },
        );
        cache.merge_on_completion(&key(), &next_conv);

        let history = cache.get(&key());
        assert!(history.message_states.contains_key(&MessageId::from("u1")));
        assert!(history.message_states.contains_key(&MessageId::from("u2")));
    }
}
