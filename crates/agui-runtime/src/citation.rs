// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The citation extractor: a schema-firewalled diff of `aguiState` across a
//! run, correlating newly introduced source references with the user
//! message that started it. Malformed entries are dropped rather than
//! surfaced as errors, the same defensive-parsing stance `agui-patch` takes
//! toward malformed patch fragments.

use serde_json::Value;

use agui_model::SourceReference;

/// The top-level `aguiState` keys searched for a citation array, tried in
/// order. The first one present as a JSON array wins.
const CITATION_KEYS: &[&str] = &["citations", "sources"];

fn citation_array(state: &Value) -> &[Value] {
    for key in CITATION_KEYS {
        if let Some(arr) = state.get(key).and_then(Value::as_array) {
            return arr;
        }
    }
    &[]
}

/// Diffs `previous` against `current` and returns the `SourceReference`s
/// that are new in `current` — present in `current`'s citation array but
/// not (by structural equality) in `previous`'s. Any entry that doesn't
/// deserialize cleanly into a `SourceReference` is silently dropped (the
/// "schema firewall"): malformed entries never surface as an error.
pub fn extract_new_citations(previous: &Value, current: &Value) -> Vec<SourceReference> {
    let previous_entries = citation_array(previous);
    citation_array(current)
        .iter()
        .filter(|entry| !previous_entries.contains(entry))
        .filter_map(|entry| serde_json::from_value::<SourceReference>(entry.clone()).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn no_citations_key_yields_empty() {
        let out = extract_new_citations(&json!({}), &json!({"other": 1}));
        assert!(out.is_empty());
    }

    #[test]
    fn new_citation_is_surfaced() {
        let previous = json!({"citations": []});
        let current = json!({"citations": [{"uri": "https://example.com", "title": "Example"}]});
        let out = extract_new_citations(&previous, &current);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].uri, "https://example.com");
        assert_eq!(out[0].title.as_deref(), Some("Example"));
    }

    #[test]
    fn already_present_citation_is_not_repeated() {
        let entry = json!({"uri": "https://example.com"});
        let previous = json!({"citations": [entry]});
        let current = json!({"citations": [entry]});
        assert!(extract_new_citations(&previous, &current).is_empty());
    }

    #[test]
    fn malformed_entry_is_dropped_not_errored() {
        let previous = json!({"citations": []});
        let current = json!({"citations": [{"not_a_uri_field": true}]});
        // Missing required `uri` field fails to deserialize; dropped silently.
        assert!(extract_new_citations(&previous, &current).is_empty());
    }

    #[test]
    fn sources_key_is_an_accepted_alias() {
        let previous = json!({});
        let current = json!({"sources": [{"uri": "u1"}]});
        let out = extract_new_citations(&previous, &current);
        assert_eq!(out.len(), 1);
    }
}
