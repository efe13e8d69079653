// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! REST surface endpoint builders. Pure string formatting — the actual HTTP
//! verbs and headers are the `Transport` implementor's concern.

use agui_proto::{RoomId, RunId, ThreadId};

pub fn list_threads_endpoint(room_id: &RoomId) -> String {
    format!("rooms/{room_id}/agui")
}

pub fn create_thread_endpoint(room_id: &RoomId) -> String {
    format!("rooms/{room_id}/agui")
}

pub fn create_run_endpoint(room_id: &RoomId, thread_id: &ThreadId) -> String {
    format!("rooms/{room_id}/agui/{thread_id}")
}

pub fn run_endpoint(room_id: &RoomId, thread_id: &ThreadId, run_id: &RunId) -> String {
    format!("rooms/{room_id}/agui/{thread_id}/{run_id}")
}

pub fn delete_thread_endpoint(room_id: &RoomId, thread_id: &ThreadId) -> String {
    format!("rooms/{room_id}/agui/{thread_id}")
}
