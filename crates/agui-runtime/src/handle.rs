// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The cooperative cancellation flag and the per-run ownership record.
//!
//! A run's ownership is a single record keyed by cancellation: cancelling is
//! a flag flip rather than a one-shot send, cheap to check at every
//! suspension point without consuming anything, and disposal additionally
//! aborts the background task streaming events for this run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use agui_model::ActiveRunState;
use agui_proto::{MessageId, RunId, ThreadKey};

/// A cooperative, monotonic cancellation flag. Once set it can never be
/// cleared — cancellation is idempotent and one-directional. Cheap to
/// clone — every task touching a run holds one.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CancelToken({})", self.is_cancelled())
    }
}

/// The client-side ownership record for one live run. Exactly one
/// `RunHandle` exists per live run; the registry is the sole owner, the
/// notifier holds only a non-owning `Arc` clone for UI-state projection.
/// `state` is the handle's own view of `ActiveRunState`, mutated by the
/// event-subscription callback as the reducer advances it — this may lag
/// behind the notifier's externally visible state when the handle isn't the
/// one currently being viewed.
pub struct RunHandle {
    pub key: ThreadKey,
    pub run_id: RunId,
    pub cancel_token: CancelToken,
    pub user_message_id: MessageId,
    /// Snapshot of `aguiState` taken at run start, used by the citation
    /// extractor to diff against the terminal state.
    pub previous_agui_state: Value,
    /// Tool-execution hop count; bounded by `RuntimeConfig::max_tool_depth`.
    pub depth: u32,
    pub state: Mutex<ActiveRunState>,
    /// The task driving this run's event stream, if one has been spawned
    /// yet. Aborted on disposal so a stale stream can never deliver another
    /// callback after the handle is torn down.
    subscription: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl RunHandle {
    /// `cancel_token` is taken rather than created internally so the caller
    /// can share the exact token already handed to the `createRun` /
    /// `runAgent` transport calls that preceded handle construction — a
    /// cancellation observed mid-`startRun` must be visible on the handle
    /// that results from it.
    pub fn new(
        key: ThreadKey,
        run_id: RunId,
        cancel_token: CancelToken,
        user_message_id: MessageId,
        previous_agui_state: Value,
        depth: u32,
        initial_state: ActiveRunState,
    ) -> Self {
        Self {
            key,
            run_id,
            cancel_token,
            user_message_id,
            previous_agui_state,
            depth,
            state: Mutex::new(initial_state),
            subscription: Mutex::new(None),
        }
    }

    /// Attach the task driving this handle's event stream. Replaces (and
    /// aborts) any prior subscription — a handle only ever drives one
    /// stream at a time.
    pub fn set_subscription(&self, task: tokio::task::JoinHandle<()>) {
        let mut slot = self.subscription.lock().expect("subscription lock poisoned");
        if let Some(old) = slot.replace(task) {
            old.abort();
        }
    }

    pub fn current_state(&self) -> ActiveRunState {
        self.state.lock().expect("state lock poisoned").clone()
    }

    pub fn set_state(&self, next: ActiveRunState) {
        *self.state.lock().expect("state lock poisoned") = next;
    }

    /// Idempotent: cancels the token, aborts the subscription task, and
    /// drops its slot. Safe to call more than once or concurrently from
    /// both the cancel path and the normal completion path.
    pub fn dispose(&self) {
        self.cancel_token.cancel();
        if let Some(task) = self
            .subscription
            .lock()
            .expect("subscription lock poisoned")
            .take()
        {
            task.abort();
        }
    }
}
