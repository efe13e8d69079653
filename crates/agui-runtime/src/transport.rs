// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;
use thiserror::Error;

use agui_proto::{Event, RunInput};

use crate::handle::CancelToken;

/// The error taxonomy surfaced to the core from the transport boundary.
/// Connection pooling, TLS, and retry policy all live on the other side of
/// this trait — the core only ever sees one of these five outcomes.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("authentication failed")]
    AuthFailure,
    #[error("not found")]
    NotFound,
    #[error("api error: {0}")]
    ApiError(String),
    #[error("network failure: {0}")]
    NetworkFailure(String),
    #[error("cancelled")]
    Cancelled,
}

pub type EventStream = Pin<Box<dyn Stream<Item = Event> + Send>>;

/// What the core consumes from the outside world: a unary JSON request/
/// response call and a long-lived decoded event stream. Everything else
/// (HTTP, auth headers, retries, TLS) is the implementor's concern.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(
        &self,
        endpoint: &str,
        body: Value,
        cancel: &CancelToken,
        timeout: Option<Duration>,
    ) -> Result<Value, TransportError>;

    /// Opens a server-sent event stream and yields decoded events in
    /// arrival order. Malformed payloads decode to `Event::Unknown`
    /// upstream in `agui-proto`, never as a `TransportError` here.
    async fn run_agent(
        &self,
        endpoint: &str,
        input: RunInput,
        cancel: CancelToken,
    ) -> Result<EventStream, TransportError>;
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use futures::stream;
    use std::sync::Mutex;

    /// An in-memory `Transport` for reducer/notifier tests: `post` always
    /// returns a canned `runId`, `run_agent` replays a fixed event sequence
    /// handed to it up front (keyed by call order).
    pub struct FakeTransport {
        pub runs_created: Mutex<u64>,
        pub scripted_events: Mutex<Vec<Vec<Event>>>,
    }

    impl FakeTransport {
        pub fn new(scripted_events: Vec<Vec<Event>>) -> Self {
            Self { runs_created: Mutex::new(0), scripted_events: Mutex::new(scripted_events) }
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn post(
            &self,
            _endpoint: &str,
            _body: Value,
            _cancel: &CancelToken,
            _timeout: Option<Duration>,
        ) -> Result<Value, TransportError> {
            let mut n = self.runs_created.lock().unwrap();
            *n += 1;
            Ok(serde_json::json!({ "runId": format!("r{n}") }))
        }

        async fn run_agent(
            &self,
            _endpoint: &str,
            _input: RunInput,
            _cancel: CancelToken,
        ) -> Result<EventStream, TransportError> {
            let mut scripted = self.scripted_events.lock().unwrap();
            let events = if scripted.is_empty() { Vec::new() } else { scripted.remove(0) };
            Ok(Box::pin(stream::iter(events)))
        }
    }
}
