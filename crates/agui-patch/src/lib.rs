// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! RFC 6902 JSON-Patch evaluator for the shared `aguiState` document.
//!
//! Every apply function is pure: on success it returns a new `Value`; on
//! failure the caller's original state is left untouched (these functions
//! never mutate their input, so "preserve on failure" falls out of the
//! signature rather than needing special-case rollback logic).

use agui_proto::Event;
use serde_json::Value;
use thiserror::Error;

/// One normalized RFC 6902 operation.
#[derive(Clone, Debug, PartialEq)]
pub struct PatchOp {
    pub op: String,
    pub path: String,
    pub value: Option<Value>,
    pub from: Option<String>,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum PatchError {
    #[error("patch op missing required `op` field")]
    MissingOp,
    #[error("patch op missing required `path` field")]
    MissingPath,
    #[error("unknown patch op `{0}`")]
    UnknownOp(String),
    #[error("invalid json pointer `{0}`")]
    InvalidPath(String),
    #[error("`{0}` requires a `from` field")]
    MissingFrom(&'static str),
    #[error("replace target does not exist at `{0}`")]
    NoSuchTarget(String),
    #[error("array index out of range at `{0}`")]
    IndexOutOfRange(String),
    #[error("`{0}` requires a `value` field")]
    MissingValue(&'static str),
    #[error("state delta event carried neither patches nor a flat delta")]
    EmptyDelta,
}

/// The result of a fail-fast `apply_all`: on failure, `state` is the state
/// at the point of failure (the prefix's last valid state), not the input.
#[derive(Clone, Debug)]
pub struct ApplyAllResult {
    pub success: bool,
    pub state: Value,
    pub error: Option<PatchError>,
    /// Index of the op that failed, if any.
    pub failed_at: Option<usize>,
}

/// Per-op outcome for the "continue past failures" variant.
#[derive(Clone, Debug)]
pub struct OpOutcome {
    pub success: bool,
    pub error: Option<PatchError>,
}

/// Normalize a `StateDelta` event payload into a list of ops. The wire
/// protocol carries either a canonical array of ops (`patches`) or an older
/// flat single-op form (`delta_type`/`delta_path`/`delta_value`).
pub fn normalize_delta(event: &Event) -> Result<Vec<PatchOp>, PatchError> {
    let Event::StateDelta { patches, delta_type, delta_path, delta_value } = event else {
        return Err(PatchError::EmptyDelta);
    };
    if let Some(patches) = patches {
        patches.iter().map(parse_op).collect()
    } else if let Some(delta_type) = delta_type {
        let path = delta_path.clone().ok_or(PatchError::MissingPath)?;
        Ok(vec![PatchOp {
            op: delta_type.clone(),
            path,
            value: delta_value.clone(),
            from: None,
        }])
    } else {
        Err(PatchError::EmptyDelta)
    }
}

fn parse_op(raw: &Value) -> Result<PatchOp, PatchError> {
    let obj = raw.as_object().ok_or(PatchError::MissingOp)?;
    let op = obj
        .get("op")
        .and_then(Value::as_str)
        .ok_or(PatchError::MissingOp)?
        .to_string();
    let path = obj
        .get("path")
        .and_then(Value::as_str)
        .ok_or(PatchError::MissingPath)?
        .to_string();
    let value = obj.get("value").cloned();
    let from = obj.get("from").and_then(Value::as_str).map(str::to_string);
    Ok(PatchOp { op, path, value, from })
}

/// Apply one op to `state`, returning the new value. Never mutates `state`.
pub fn apply(state: &Value, op: &PatchOp) -> Result<Value, PatchError> {
    match op.op.as_str() {
        "add" => apply_add(state, &op.path, require_value(op, "add")?),
        "remove" => apply_remove(state, &op.path),
        "replace" => apply_replace(state, &op.path, require_value(op, "replace")?),
        "move" => {
            let from = op.from.as_deref().ok_or(PatchError::MissingFrom("move"))?;
            let value = get_pointer(state, from)?.clone();
            let removed = apply_remove(state, from)?;
            apply_add(&removed, &op.path, &value)
        }
        "copy" => {
            let from = op.from.as_deref().ok_or(PatchError::MissingFrom("copy"))?;
            let value = get_pointer(state, from)?.clone();
            apply_add(state, &op.path, &value)
        }
        "test" => {
            let expected = require_value(op, "test")?;
            let actual = get_pointer(state, &op.path)?;
            if actual == expected {
                Ok(state.clone())
            } else {
                Err(PatchError::NoSuchTarget(op.path.clone()))
            }
        }
        other => Err(PatchError::UnknownOp(other.to_string())),
    }
}

fn require_value<'a>(op: &'a PatchOp, name: &'static str) -> Result<&'a Value, PatchError> {
    op.value.as_ref().ok_or(PatchError::MissingValue(name))
}

/// Sequential, fail-fast: the first error stops the batch and `state` is the
/// prefix's last valid value, never the raw input, and never a partially
/// applied value from the failing op.
pub fn apply_all(state: &Value, ops: &[PatchOp]) -> ApplyAllResult {
    let mut current = state.clone();
    for (idx, op) in ops.iter().enumerate() {
        match apply(&current, op) {
            Ok(next) => current = next,
            Err(err) => {
                return ApplyAllResult {
                    success: false,
                    state: current,
                    error: Some(err),
                    failed_at: Some(idx),
                };
            }
        }
    }
    ApplyAllResult { success: true, state: current, error: None, failed_at: None }
}

/// Continues past failures: every op is attempted against the last good
/// state, failures are reported per-op, and the last good state carries
/// forward instead of being rolled back to the pre-batch input.
pub fn apply_all_continue(state: &Value, ops: &[PatchOp]) -> (Value, Vec<OpOutcome>) {
    let mut current = state.clone();
    let mut outcomes = Vec::with_capacity(ops.len());
    for op in ops {
        match apply(&current, op) {
            Ok(next) => {
                current = next;
                outcomes.push(OpOutcome { success: true, error: None });
            }
            Err(err) => {
                tracing::warn!(op = %op.op, path = %op.path, error = %err, "patch op failed, continuing");
                outcomes.push(OpOutcome { success: false, error: Some(err) });
            }
        }
    }
    (current, outcomes)
}

fn split_pointer(path: &str) -> Result<Vec<String>, PatchError> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    if !path.starts_with('/') {
        return Err(PatchError::InvalidPath(path.to_string()));
    }
    Ok(path[1..]
        .split('/')
        .map(|tok| tok.replace("~1", "/").replace("~0", "~"))
        .collect())
}

fn get_pointer<'a>(state: &'a Value, path: &str) -> Result<&'a Value, PatchError> {
    let tokens = split_pointer(path)?;
    let mut current = state;
    for tok in &tokens {
        current = match current {
            Value::Object(map) => map
                .get(tok)
                .ok_or_else(|| PatchError::NoSuchTarget(path.to_string()))?,
            Value::Array(arr) => {
                let idx: usize = tok
                    .parse()
                    .map_err(|_| PatchError::InvalidPath(path.to_string()))?;
                arr.get(idx)
                    .ok_or_else(|| PatchError::IndexOutOfRange(path.to_string()))?
            }
            _ => return Err(PatchError::NoSuchTarget(path.to_string())),
        };
    }
    Ok(current)
}

fn apply_add(state: &Value, path: &str, value: &Value) -> Result<Value, PatchError> {
    let tokens = split_pointer(path)?;
    if tokens.is_empty() {
        return Ok(value.clone());
    }
    let mut out = state.clone();
    set_at(&mut out, &tokens, value.clone(), Mutation::Add, path)?;
    Ok(out)
}

fn apply_replace(state: &Value, path: &str, value: &Value) -> Result<Value, PatchError> {
    let tokens = split_pointer(path)?;
    if tokens.is_empty() {
        return Ok(value.clone());
    }
    // replace requires the target to already exist.
    get_pointer(state, path)?;
    let mut out = state.clone();
    set_at(&mut out, &tokens, value.clone(), Mutation::Replace, path)?;
    Ok(out)
}

fn apply_remove(state: &Value, path: &str) -> Result<Value, PatchError> {
    let tokens = split_pointer(path)?;
    if tokens.is_empty() {
        return Err(PatchError::InvalidPath(path.to_string()));
    }
    get_pointer(state, path)?;
    let mut out = state.clone();
    remove_at(&mut out, &tokens, path)?;
    Ok(out)
}

enum Mutation {
    Add,
    Replace,
}

fn set_at(
    node: &mut Value,
    tokens: &[String],
    value: Value,
    mutation: Mutation,
    full_path: &str,
) -> Result<(), PatchError> {
    let (head, rest) = tokens.split_first().expect("non-empty tokens");
    if rest.is_empty() {
        match node {
            Value::Object(map) => {
                map.insert(head.clone(), value);
                Ok(())
            }
            Value::Array(arr) => {
                if head == "-" {
                    arr.push(value);
                    return Ok(());
                }
                let idx: usize = head
                    .parse()
                    .map_err(|_| PatchError::InvalidPath(full_path.to_string()))?;
                match mutation {
                    Mutation::Add => {
                        if idx > arr.len() {
                            return Err(PatchError::IndexOutOfRange(full_path.to_string()));
                        }
                        arr.insert(idx, value);
                    }
                    Mutation::Replace => {
                        if idx >= arr.len() {
                            return Err(PatchError::IndexOutOfRange(full_path.to_string()));
                        }
                        arr[idx] = value;
                    }
                }
                Ok(())
            }
            _ => Err(PatchError::NoSuchTarget(full_path.to_string())),
        }
    } else {
        let child = match node {
            Value::Object(map) => map
                .get_mut(head)
                .ok_or_else(|| PatchError::NoSuchTarget(full_path.to_string()))?,
            Value::Array(arr) => {
                let idx: usize = head
                    .parse()
                    .map_err(|_| PatchError::InvalidPath(full_path.to_string()))?;
                arr.get_mut(idx)
                    .ok_or_else(|| PatchError::IndexOutOfRange(full_path.to_string()))?
            }
            _ => return Err(PatchError::NoSuchTarget(full_path.to_string())),
        };
        set_at(child, rest, value, mutation, full_path)
    }
}

fn remove_at(node: &mut Value, tokens: &[String], full_path: &str) -> Result<(), PatchError> {
    let (head, rest) = tokens.split_first().expect("non-empty tokens");
    if rest.is_empty() {
        match node {
            Value::Object(map) => {
                map.remove(head)
                    .ok_or_else(|| PatchError::NoSuchTarget(full_path.to_string()))?;
                Ok(())
            }
            Value::Array(arr) => {
                let idx: usize = head
                    .parse()
                    .map_err(|_| PatchError::InvalidPath(full_path.to_string()))?;
                if idx >= arr.len() {
                    return Err(PatchError::IndexOutOfRange(full_path.to_string()));
                }
                arr.remove(idx);
                Ok(())
            }
            _ => Err(PatchError::NoSuchTarget(full_path.to_string())),
        }
    } else {
        let child = match node {
            Value::Object(map) => map
                .get_mut(head)
                .ok_or_else(|| PatchError::NoSuchTarget(full_path.to_string()))?,
            Value::Array(arr) => {
                let idx: usize = head
                    .parse()
                    .map_err(|_| PatchError::InvalidPath(full_path.to_string()))?;
                arr.get_mut(idx)
                    .ok_or_else(|| PatchError::IndexOutOfRange(full_path.to_string()))?
            }
            _ => return Err(PatchError::NoSuchTarget(full_path.to_string())),
        };
        remove_at(child, rest, full_path)
    }
}

/// Higher-level wrapper over a `StateDelta` event: applies the normalized
/// op list to `aguiState`. Two modes are offered since callers need either
/// behavior depending on context: `reduce` is fail-fast (the event
/// processor's default), `reduce_continue` keeps going past bad ops and
/// reports per-op outcomes.
pub struct StateDeltaProcessor;

impl StateDeltaProcessor {
    pub fn reduce(state: &Value, event: &Event) -> Result<ApplyAllResult, PatchError> {
        let ops = normalize_delta(event)?;
        Ok(apply_all(state, &ops))
    }

    pub fn reduce_continue(state: &Value, event: &Event) -> Result<(Value, Vec<OpOutcome>), PatchError> {
        let ops = normalize_delta(event)?;
        Ok(apply_all_continue(state, &ops))
    }
}
