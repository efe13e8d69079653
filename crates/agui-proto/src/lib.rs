// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Wire types for the AG-UI event stream: identifiers, the tagged `Event`
//! enum, and the message shape sent in `runAgent` request bodies.

mod event;
mod ids;
mod wire_message;

pub use event::{Event, KNOWN_TYPES};
pub use ids::{MessageId, RoomId, RunId, ThreadId, ThreadKey, ToolCallId};
pub use wire_message::{RunInput, WireMessage, WireRole};
