//! Query-string conventions and the newline-delimited bulk payload format.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::warn;

use sift::types::IndexName;
use sift::Document;

/// Default hit-count cap when `size` is absent or unparseable.
pub const DEFAULT_SEARCH_SIZE: usize = 10;

/// `pretty` semantics: present with no value or `"true"` → indented JSON;
/// `"false"` or anything unrecognized → compact.
pub fn pretty_param(params: &HashMap<String, String>) -> bool {
    match params.get("pretty") {
        Some(v) => matches!(v.as_str(), "" | "true"),
        None => false,
    }
}

/// `size` falls back to [`DEFAULT_SEARCH_SIZE`] on absence or parse failure.
pub fn size_param(params: &HashMap<String, String>) -> usize {
    params
        .get("size")
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_SEARCH_SIZE)
}

/// The query expression, already percent-decoded by the router; absent → "".
pub fn query_param(params: &HashMap<String, String>) -> String {
    params.get("q").cloned().unwrap_or_default()
}

struct BulkAction {
    index: IndexName,
    id: String,
}

/// Parsed bulk payload: documents grouped per target index, ready for one
/// catalog `index` call per group.
#[derive(Default)]
pub struct BulkPayload {
    pub groups: IndexMap<IndexName, Vec<Document>>,
    pub docs: usize,
    pub skipped: usize,
}

/// Parse a newline-delimited bulk body: alternating action-metadata and
/// data lines. Data lines are tagged with the `_id` from the preceding
/// action line. Malformed lines are skipped with a warning, never fatal
/// to the rest of the payload.
pub fn parse_bulk(body: &str) -> BulkPayload {
    let mut payload = BulkPayload::default();
    let mut pending: Option<BulkAction> = None;

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match pending.take() {
            None => match parse_action(line) {
                Some(action) => pending = Some(action),
                None => {
                    warn!("skipping malformed bulk action line: {}", line);
                    payload.skipped += 1;
                }
            },
            Some(action) => {
                let doc = serde_json::from_str::<serde_json::Value>(line)
                    .ok()
                    .and_then(|v| Document::from_json_tagged(action.id.clone(), &v).ok());
                match doc {
                    Some(doc) => {
                        payload.groups.entry(action.index).or_default().push(doc);
                        payload.docs += 1;
                    }
                    None => {
                        warn!("skipping malformed bulk data line: {}", line);
                        payload.skipped += 1;
                    }
                }
            }
        }
    }

    if pending.is_some() {
        warn!("bulk payload ended with a dangling action line");
        payload.skipped += 1;
    }
    payload
}

/// An action line is `{"<op>": {"_index": "...", "_id": "..."}}`. Every op
/// is treated as an index/upsert; the op name is not interpreted further.
fn parse_action(line: &str) -> Option<BulkAction> {
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    let (_op, meta) = value.as_object()?.iter().next()?;
    let index = meta.get("_index")?.as_str()?;
    let id = meta.get("_id")?.as_str()?;
    Some(BulkAction {
        index: index.to_string(),
        id: id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn pretty_defaults_off_and_accepts_bare_flag() {
        assert!(!pretty_param(&params(&[])));
        assert!(pretty_param(&params(&[("pretty", "")])));
        assert!(pretty_param(&params(&[("pretty", "true")])));
        assert!(!pretty_param(&params(&[("pretty", "false")])));
        assert!(!pretty_param(&params(&[("pretty", "yes")])));
    }

    #[test]
    fn size_falls_back_to_default() {
        assert_eq!(size_param(&params(&[])), 10);
        assert_eq!(size_param(&params(&[("size", "3")])), 3);
        assert_eq!(size_param(&params(&[("size", "not-a-number")])), 10);
    }

    #[test]
    fn bulk_groups_documents_per_index() {
        let body = concat!(
            "{\"index\":{\"_index\":\"a\",\"_id\":\"1\"}}\n",
            "{\"title\":\"first\"}\n",
            "{\"index\":{\"_index\":\"b\",\"_id\":\"2\"}}\n",
            "{\"title\":\"second\"}\n",
            "{\"index\":{\"_index\":\"a\",\"_id\":\"3\"}}\n",
            "{\"title\":\"third\"}\n",
        );
        let payload = parse_bulk(body);
        assert_eq!(payload.docs, 3);
        assert_eq!(payload.skipped, 0);
        assert_eq!(payload.groups["a"].len(), 2);
        assert_eq!(payload.groups["b"].len(), 1);
        assert_eq!(payload.groups["a"][0].id, "1");
        assert_eq!(payload.groups["a"][1].id, "3");
    }

    #[test]
    fn bulk_tags_data_lines_with_the_action_id() {
        let body = "{\"index\":{\"_index\":\"t\",\"_id\":\"9\"}}\n{\"title\":\"a\"}\n";
        let payload = parse_bulk(body);
        let doc = &payload.groups["t"][0];
        assert_eq!(doc.id, "9");
        assert_eq!(doc.to_json()["id"], serde_json::json!("9"));
    }

    #[test]
    fn bulk_skips_malformed_lines_without_aborting() {
        let body = concat!(
            "not json at all\n",
            "{\"index\":{\"_index\":\"t\",\"_id\":\"1\"}}\n",
            "{\"title\":\"ok\"}\n",
            "{\"index\":{\"_index\":\"t\",\"_id\":\"2\"}}\n",
            "also not json\n",
        );
        let payload = parse_bulk(body);
        assert_eq!(payload.docs, 1);
        assert_eq!(payload.skipped, 2);
        assert_eq!(payload.groups["t"][0].id, "1");
    }

    #[test]
    fn bulk_action_without_id_is_skipped() {
        let body = "{\"index\":{\"_index\":\"t\"}}\n{\"title\":\"a\"}\n";
        let payload = parse_bulk(body);
        assert_eq!(payload.docs, 0);
        // The bad action line and the data line that follows it are both
        // accounted for: the data line is consumed as the next action.
        assert!(payload.skipped >= 1);
    }

    #[test]
    fn bulk_dangling_action_is_counted() {
        let body = "{\"index\":{\"_index\":\"t\",\"_id\":\"1\"}}\n";
        let payload = parse_bulk(body);
        assert_eq!(payload.docs, 0);
        assert_eq!(payload.skipped, 1);
    }
}
