// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

// Opaque identifiers. Uniqueness scope: room globally; thread within room;
// run within thread; message/tool-call within run. Ordering is not implied
// by identifier form.
opaque_id!(RoomId);
opaque_id!(ThreadId);
opaque_id!(RunId);
opaque_id!(MessageId);
opaque_id!(ToolCallId);

/// `(serverId, roomId, threadId)`. `serverId` defaults to `"default"` in
/// single-server deployments.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadKey {
    pub server_id: String,
    pub room_id: RoomId,
    pub thread_id: ThreadId,
}

impl ThreadKey {
    pub fn new(room_id: RoomId, thread_id: ThreadId) -> Self {
        Self {
            server_id: "default".to_string(),
            room_id,
            thread_id,
        }
    }

    pub fn with_server(server_id: impl Into<String>, room_id: RoomId, thread_id: ThreadId) -> Self {
        Self {
            server_id: server_id.into(),
            room_id,
            thread_id,
        }
    }
}

impl fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.server_id, self.room_id, self.thread_id)
    }
}
