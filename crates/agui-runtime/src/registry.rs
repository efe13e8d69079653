// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The run registry: a concurrent `ThreadKey -> RunHandle` index with a
//! totally-ordered lifecycle broadcast stream.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use agui_model::CompletionResult;
use agui_proto::ThreadKey;
use tokio::sync::broadcast;

use crate::handle::RunHandle;

/// Totally ordered per-key broadcast: `RunStarted` precedes any
/// `RunReplaced` precedes `RunCompleted`.
#[derive(Clone, Debug)]
pub enum LifecycleEvent {
    RunStarted(ThreadKey),
    RunReplaced(ThreadKey),
    RunCompleted(ThreadKey, CompletionResult),
}

/// Concurrent index `ThreadKey -> RunHandle`, guarded by a single `Mutex` —
/// operations are fast (pointer bookkeeping, no I/O) so a coarse lock is
/// simpler than sharding and still gives linearizable registry operations.
pub struct RunRegistry {
    inner: Mutex<HashMap<ThreadKey, Arc<RunHandle>>>,
    lifecycle_tx: broadcast::Sender<LifecycleEvent>,
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RunRegistry {
    pub fn new() -> Self {
        let (lifecycle_tx, _) = broadcast::channel(1024);
        Self { inner: Mutex::new(HashMap::new()), lifecycle_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.lifecycle_tx.subscribe()
    }

    /// Atomically insert `handle`. If a handle already exists for its key,
    /// the old one is disposed first.
    pub fn register_run(&self, handle: Arc<RunHandle>) {
        let key = handle.key.clone();
        let old = {
            let mut map = self.inner.lock().expect("registry lock poisoned");
            map.insert(key.clone(), handle)
        };
        if let Some(old) = old {
            old.dispose();
        }
        self.broadcast(LifecycleEvent::RunStarted(key));
    }

    pub fn get_handle(&self, key: &ThreadKey) -> Option<Arc<RunHandle>> {
        self.inner.lock().expect("registry lock poisoned").get(key).cloned()
    }

    /// Removes the entry iff it still equals `handle` (by pointer identity),
    /// then emits `RunCompleted`. A handle that's already been replaced is
    /// left alone — the replacement owns the key now.
    pub fn complete_run(&self, handle: &Arc<RunHandle>, result: CompletionResult) {
        let removed = {
            let mut map = self.inner.lock().expect("registry lock poisoned");
            match map.get(&handle.key) {
                Some(current) if Arc::ptr_eq(current, handle) => {
                    map.remove(&handle.key);
                    true
                }
                _ => false,
            }
        };
        if removed {
            self.broadcast(LifecycleEvent::RunCompleted(handle.key.clone(), result));
        }
    }

    /// Atomic compare-and-set: succeeds iff `index[old.key] == old` at the
    /// instant of swap. On success the old handle is disposed and
    /// `RunReplaced` is emitted; on failure the caller must dispose
    /// `new_handle` itself.
    pub fn replace_run(&self, old: &Arc<RunHandle>, new_handle: Arc<RunHandle>) -> bool {
        let swapped = {
            let mut map = self.inner.lock().expect("registry lock poisoned");
            match map.get(&old.key) {
                Some(current) if Arc::ptr_eq(current, old) => {
                    map.insert(old.key.clone(), new_handle);
                    true
                }
                _ => false,
            }
        };
        if swapped {
            old.dispose();
            self.broadcast(LifecycleEvent::RunReplaced(old.key.clone()));
        }
        swapped
    }

    /// Emits a lifecycle event without touching the index — used when the
    /// notifier has already torn the handle down out-of-band (e.g. the
    /// synchronous half of `cancelRun`, which completes through the
    /// registry via `complete_run` directly and never needs this path, but
    /// is kept available for callers that manage handle lifetime
    /// themselves).
    pub fn notify_completion(&self, key: ThreadKey, result: CompletionResult) {
        self.broadcast(LifecycleEvent::RunCompleted(key, result));
    }

    /// Cancels and disposes every held handle, then drops all lifecycle
    /// subscribers.
    pub fn dispose(&self) {
        let mut map = self.inner.lock().expect("registry lock poisoned");
        for (_, handle) in map.drain() {
            handle.dispose();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn broadcast(&self, event: LifecycleEvent) {
        // No subscribers is fine — nobody's watching yet.
        let _ = self.lifecycle_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agui_model::ActiveRunState;
    use agui_proto::{MessageId, RoomId, RunId, ThreadId};
    use serde_json::Value;

    fn key(t: &str) -> ThreadKey {
        ThreadKey::new(RoomId::from("room"), ThreadId::from(t))
    }

    fn handle(t: &str, run: &str) -> Arc<RunHandle> {
        Arc::new(RunHandle::new(
            key(t),
            RunId::from(run),
            crate::handle::CancelToken::new(),
            MessageId::from("m1"),
            Value::Null,
            0,
            ActiveRunState::Idle,
        ))
    }

    #[test]
    fn register_then_get_round_trips() {
        let registry = RunRegistry::new();
        let h = handle("t1", "r1");
        registry.register_run(h.clone());
        let found = registry.get_handle(&key("t1")).unwrap();
        assert!(Arc::ptr_eq(&found, &h));
    }

    #[test]
    fn registering_over_existing_disposes_the_old_handle() {
        let registry = RunRegistry::new();
        let first = handle("t1", "r1");
        let second = handle("t1", "r2");
        registry.register_run(first.clone());
        registry.register_run(second.clone());
        assert!(first.cancel_token.is_cancelled());
        assert!(!second.cancel_token.is_cancelled());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn complete_run_removes_only_if_still_current() {
        let registry = RunRegistry::new();
        let h = handle("t1", "r1");
        registry.register_run(h.clone());
        let stale = handle("t1", "r-stale");
        registry.complete_run(&stale, CompletionResult::Success);
        assert!(registry.get_handle(&key("t1")).is_some(), "stale handle must not evict the live one");
        registry.complete_run(&h, CompletionResult::Success);
        assert!(registry.get_handle(&key("t1")).is_none());
    }

    #[test]
    fn replace_run_is_atomic_compare_and_swap() {
        let registry = RunRegistry::new();
        let first = handle("t1", "r1");
        registry.register_run(first.clone());

        let second = handle("t1", "r2");
        assert!(registry.replace_run(&first, second.clone()));
        assert!(first.cancel_token.is_cancelled());
        let found = registry.get_handle(&key("t1")).unwrap();
        assert!(Arc::ptr_eq(&found, &second));

        // Replacing against the now-stale `first` handle must fail.
        let third = handle("t1", "r3");
        assert!(!registry.replace_run(&first, third));
        let found = registry.get_handle(&key("t1")).unwrap();
        assert!(Arc::ptr_eq(&found, &second));
    }

    #[test]
    fn lifecycle_events_are_totally_ordered_per_key() {
        let registry = RunRegistry::new();
        let mut rx = registry.subscribe();
        let first = handle("t1", "r1");
        registry.register_run(first.clone());
        let second = handle("t1", "r2");
        registry.replace_run(&first, second.clone());
        registry.complete_run(&second, CompletionResult::Success);

        let mut seen = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            seen.push(match ev {
                LifecycleEvent::RunStarted(_) => "started",
                LifecycleEvent::RunReplaced(_) => "replaced",
                LifecycleEvent::RunCompleted(..) => "completed",
            });
        }
        assert_eq!(seen, vec!["started", "replaced", "completed"]);
    }

    #[test]
    fn dispose_cancels_every_held_handle() {
        let registry = RunRegistry::new();
        let a = handle("t1", "r1");
        let b = handle("t2", "r2");
        registry.register_run(a.clone());
        registry.register_run(b.clone());
        registry.dispose();
        assert!(a.cancel_token.is_cancelled());
        assert!(b.cancel_token.is_cancelled());
        assert!(registry.is_empty());
    }
}
