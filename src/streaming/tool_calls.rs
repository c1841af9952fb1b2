//! Tool-call fragment aggregation
//!
//! Providers deliver function calls in pieces. Two keying disciplines exist:
//!
//! - **by id**: each fragment is a complete call that may carry an explicit id.
//!   Without one, an id is synthesized from the `(name, arguments)` signature and
//!   reused for identical signatures, which collapses gateway retransmissions.
//! - **by index**: fragments reference a positional output index before any id
//!   is known; a later fragment may back-fill the id.
//!
//! Records are finalized once, after the event loop.

use std::collections::{BTreeMap, HashMap};

/// Longest tool-name hint kept in a synthesized id.
const MAX_TOOL_HINT_CHARS: usize = 48;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallRecord {
    /// Empty until known for index-keyed records
    pub tool_use_id: String,
    pub tool_name: String,
    pub arguments_json: String,
    pub output_index: Option<u64>,
}

/// How a fragment changes the accumulated arguments string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentsUpdate {
    /// Streaming delta, appended
    Append(String),
    /// Complete snapshot, replaces everything accumulated so far (ignored when empty)
    Replace(String),
    Keep,
}

/// One index-keyed fragment.
#[derive(Debug, Clone)]
pub struct ToolCallFragment {
    pub call_id: String,
    pub name: String,
    pub arguments: ArgumentsUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCallKeying {
    ById,
    ByIndex,
}

#[derive(Debug, Clone, Default)]
struct Slot {
    record: ToolCallRecord,
    /// Id was synthesized from the signature
    synthetic: bool,
    /// Merged into another record; skipped at finalization
    retired: bool,
}

#[derive(Debug, Clone)]
pub struct ToolCallAggregator {
    keying: ToolCallKeying,
    slots: Vec<Slot>,
    by_id: HashMap<String, usize>,
    ids_by_signature: HashMap<(String, String), String>,
    by_index: BTreeMap<u64, usize>,
    seq: u64,
}

impl ToolCallAggregator {
    pub fn new(keying: ToolCallKeying) -> Self {
        Self {
            keying,
            slots: Vec::new(),
            by_id: HashMap::new(),
            ids_by_signature: HashMap::new(),
            by_index: BTreeMap::new(),
            seq: 0,
        }
    }

    pub fn by_id() -> Self {
        Self::new(ToolCallKeying::ById)
    }

    pub fn by_index() -> Self {
        Self::new(ToolCallKeying::ByIndex)
    }

    /// Record a complete call (id-keyed discipline). Returns the id it was
    /// filed under, or `None` when the name is empty.
    ///
    /// Repeats of the same id keep their first-seen position and take the
    /// latest arguments.
    pub fn observe_call(
        &mut self,
        explicit_id: Option<&str>,
        tool_name: &str,
        arguments_json: &str,
    ) -> Option<String> {
        let tool_name = tool_name.trim();
        if tool_name.is_empty() {
            return None;
        }
        let signature = (tool_name.to_string(), arguments_json.to_string());
        let explicit_id = explicit_id.map(str::trim).filter(|id| !id.is_empty());

        let id = match explicit_id {
            Some(id) => {
                self.adopt_explicit_id(&signature, id);
                id.to_string()
            }
            None => match self.ids_by_signature.get(&signature) {
                Some(id) => id.clone(),
                None => {
                    self.seq += 1;
                    let id = format!("tool-{}-{}", sanitize_tool_hint(tool_name), self.seq);
                    self.ids_by_signature.insert(signature, id.clone());
                    id
                }
            },
        };

        match self.by_id.get(&id) {
            Some(&pos) => {
                let rec = &mut self.slots[pos].record;
                rec.tool_name = tool_name.to_string();
                rec.arguments_json = arguments_json.to_string();
            }
            None => {
                self.by_id.insert(id.clone(), self.slots.len());
                self.slots.push(Slot {
                    record: ToolCallRecord {
                        tool_use_id: id.clone(),
                        tool_name: tool_name.to_string(),
                        arguments_json: arguments_json.to_string(),
                        output_index: None,
                    },
                    synthetic: explicit_id.is_none(),
                    retired: false,
                });
            }
        }
        Some(id)
    }

    /// An explicit id replaces a synthetic id previously assigned to the same
    /// signature, and becomes the id reused for that signature from now on.
    /// When the explicit id already has its own record, the synthetic record
    /// is merged into it.
    fn adopt_explicit_id(&mut self, signature: &(String, String), id: &str) {
        let previous = self
            .ids_by_signature
            .insert(signature.clone(), id.to_string());
        let Some(previous) = previous.filter(|p| p != id) else {
            return;
        };
        let Some(&pos) = self.by_id.get(&previous) else {
            return;
        };
        if !self.slots[pos].synthetic {
            return;
        }
        self.by_id.remove(&previous);
        if self.by_id.contains_key(id) {
            self.slots[pos].retired = true;
        } else {
            self.by_id.insert(id.to_string(), pos);
            let slot = &mut self.slots[pos];
            slot.record.tool_use_id = id.to_string();
            slot.synthetic = false;
        }
    }

    /// Record a fragment for an output index (index-keyed discipline).
    pub fn observe_at_index(&mut self, output_index: u64, fragment: ToolCallFragment) {
        let pos = match self.by_index.get(&output_index) {
            Some(&pos) => pos,
            None => {
                let pos = self.slots.len();
                self.slots.push(Slot {
                    record: ToolCallRecord {
                        output_index: Some(output_index),
                        ..Default::default()
                    },
                    ..Default::default()
                });
                self.by_index.insert(output_index, pos);
                pos
            }
        };

        let rec = &mut self.slots[pos].record;
        let call_id = fragment.call_id.trim();
        if !call_id.is_empty() {
            rec.tool_use_id = call_id.to_string();
        }
        let name = fragment.name.trim();
        if !name.is_empty() {
            rec.tool_name = name.to_string();
        }
        match fragment.arguments {
            ArgumentsUpdate::Append(delta) => rec.arguments_json.push_str(&delta),
            ArgumentsUpdate::Replace(snapshot) if !snapshot.is_empty() => {
                rec.arguments_json = snapshot;
            }
            ArgumentsUpdate::Replace(_) | ArgumentsUpdate::Keep => {}
        }
    }

    /// Final records: by index order or first-seen order; merged and nameless
    /// records dropped.
    pub fn finalize(self) -> Vec<ToolCallRecord> {
        let Self {
            keying,
            slots,
            by_index,
            ..
        } = self;
        let ordered: Vec<Slot> = match keying {
            ToolCallKeying::ById => slots,
            ToolCallKeying::ByIndex => {
                let mut slots: Vec<Option<Slot>> = slots.into_iter().map(Some).collect();
                by_index
                    .values()
                    .filter_map(|&pos| slots.get_mut(pos).and_then(Option::take))
                    .collect()
            }
        };
        ordered
            .into_iter()
            .filter(|slot| !slot.retired && !slot.record.tool_name.trim().is_empty())
            .map(|slot| slot.record)
            .collect()
    }
}

/// Reduce a tool name to `[A-Za-z0-9_-]` for use inside a synthesized id.
pub fn sanitize_tool_hint(tool_name: &str) -> String {
    let hint: String = tool_name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_TOOL_HINT_CHARS)
        .collect();
    if hint.is_empty() {
        "tool".to_string()
    } else {
        hint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(s: &str) -> ToolCallFragment {
        ToolCallFragment {
            call_id: String::new(),
            name: String::new(),
            arguments: ArgumentsUpdate::Append(s.to_string()),
        }
    }

    #[test]
    fn identical_signatures_without_id_collapse() {
        let mut agg = ToolCallAggregator::by_id();
        let a = agg.observe_call(None, "lookup", r#"{"q":"x"}"#).unwrap();
        let b = agg.observe_call(None, "lookup", r#"{"q":"x"}"#).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "tool-lookup-1");

        let c = agg.observe_call(None, "lookup", r#"{"q":"y"}"#).unwrap();
        assert_eq!(c, "tool-lookup-2");
        assert_eq!(agg.finalize().len(), 2);
    }

    #[test]
    fn explicit_id_wins_over_synthetic() {
        let mut agg = ToolCallAggregator::by_id();
        agg.observe_call(None, "lookup", "{}");
        agg.observe_call(Some("call-9"), "lookup", "{}");
        // later id-less resend of the same signature reuses the explicit id
        assert_eq!(agg.observe_call(None, "lookup", "{}").as_deref(), Some("call-9"));

        let records = agg.finalize();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tool_use_id, "call-9");
    }

    #[test]
    fn synthetic_record_merges_into_existing_explicit_record() {
        let mut agg = ToolCallAggregator::by_id();
        agg.observe_call(Some("E"), "a", r#"{"x":1}"#);
        assert_eq!(agg.observe_call(None, "a", r#"{"x":2}"#).as_deref(), Some("tool-a-1"));
        agg.observe_call(Some("E"), "a", r#"{"x":2}"#);
        assert_eq!(agg.observe_call(None, "a", r#"{"x":2}"#).as_deref(), Some("E"));

        let records = agg.finalize();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tool_use_id, "E");
        assert_eq!(records[0].arguments_json, r#"{"x":2}"#);
    }

    #[test]
    fn explicit_ids_keep_first_seen_order_and_latest_args() {
        let mut agg = ToolCallAggregator::by_id();
        agg.observe_call(Some("b"), "second", "{}");
        agg.observe_call(Some("a"), "first", r#"{"x":1}"#);
        agg.observe_call(Some("b"), "second", r#"{"y":2}"#);
        let records = agg.finalize();
        assert_eq!(records[0].tool_use_id, "b");
        assert_eq!(records[0].arguments_json, r#"{"y":2}"#);
        assert_eq!(records[1].tool_use_id, "a");
    }

    #[test]
    fn empty_names_are_ignored() {
        let mut agg = ToolCallAggregator::by_id();
        assert!(agg.observe_call(Some("x"), "  ", "{}").is_none());
        assert!(agg.finalize().is_empty());
    }

    #[test]
    fn index_deltas_concatenate_in_arrival_order() {
        let mut agg = ToolCallAggregator::by_index();
        agg.observe_at_index(
            0,
            ToolCallFragment {
                call_id: String::new(),
                name: "lookup".to_string(),
                arguments: ArgumentsUpdate::Keep,
            },
        );
        agg.observe_at_index(0, delta(r#"{"q":"#));
        agg.observe_at_index(0, delta(r#""x"}"#));
        agg.observe_at_index(
            0,
            ToolCallFragment {
                call_id: "call_1".to_string(),
                name: String::new(),
                arguments: ArgumentsUpdate::Keep,
            },
        );
        let records = agg.finalize();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tool_use_id, "call_1");
        assert_eq!(records[0].arguments_json, r#"{"q":"x"}"#);
        assert_eq!(records[0].output_index, Some(0));
    }

    #[test]
    fn snapshot_replaces_accumulated_arguments() {
        let mut agg = ToolCallAggregator::by_index();
        agg.observe_at_index(2, delta(r#"{"a":1,"#));
        agg.observe_at_index(2, delta(r#""b":2}"#));
        agg.observe_at_index(
            2,
            ToolCallFragment {
                call_id: String::new(),
                name: "f".to_string(),
                arguments: ArgumentsUpdate::Replace(r#"{"a":1}"#.to_string()),
            },
        );
        let records = agg.finalize();
        assert_eq!(records[0].arguments_json, r#"{"a":1}"#);
    }

    #[test]
    fn index_records_are_emitted_sorted_by_index() {
        let mut agg = ToolCallAggregator::by_index();
        for (idx, name) in [(3u64, "c"), (1, "a"), (2, "")] {
            agg.observe_at_index(
                idx,
                ToolCallFragment {
                    call_id: format!("id{idx}"),
                    name: name.to_string(),
                    arguments: ArgumentsUpdate::Keep,
                },
            );
        }
        let names: Vec<_> = agg.finalize().into_iter().map(|r| r.tool_name).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn sanitizes_hints() {
        assert_eq!(sanitize_tool_hint("get weather!"), "get_weather_");
        assert_eq!(sanitize_tool_hint(""), "tool");
        assert_eq!(sanitize_tool_hint(&"x".repeat(80)).len(), 48);
    }
}
