//! Text delta reconciliation
//!
//! Some gateways resend the full text-so-far instead of a true delta, and some
//! skip deltas entirely and only send a final snapshot. These helpers turn
//! either shape back into the portion not yet emitted.

use std::collections::BTreeMap;

/// Result of reconciling one chunk against the running text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDelta {
    pub delta: String,
    pub full_text: String,
}

/// Reconcile `new_chunk` (a delta or a cumulative resend) against `previous_full_text`.
///
/// A chunk that starts with the previous text is a cumulative resend and only
/// its suffix is new; anything else is appended as a pure delta.
pub fn derive_cumulative_text_delta(previous_full_text: &str, new_chunk: &str) -> TextDelta {
    if new_chunk.is_empty() {
        return TextDelta {
            delta: String::new(),
            full_text: previous_full_text.to_string(),
        };
    }
    match new_chunk.strip_prefix(previous_full_text) {
        Some(rest) => TextDelta {
            delta: rest.to_string(),
            full_text: new_chunk.to_string(),
        },
        None => TextDelta {
            delta: new_chunk.to_string(),
            full_text: format!("{previous_full_text}{new_chunk}"),
        },
    }
}

/// Running state for [`derive_cumulative_text_delta`].
#[derive(Debug, Clone, Default)]
pub struct CumulativeText {
    full_text: String,
}

impl CumulativeText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning the true delta (possibly empty).
    pub fn push(&mut self, chunk: &str) -> String {
        if chunk.is_empty() {
            return String::new();
        }
        let TextDelta { delta, full_text } = derive_cumulative_text_delta(&self.full_text, chunk);
        self.full_text = full_text;
        delta
    }

    pub fn full_text(&self) -> &str {
        &self.full_text
    }
}

/// Per-output-index record of text already emitted as deltas.
#[derive(Debug, Clone, Default)]
pub struct OutputTextTracker {
    pushed: BTreeMap<u64, String>,
}

impl OutputTextTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_delta(&mut self, index: u64, text: &str) {
        self.pushed.entry(index).or_default().push_str(text);
    }

    /// Apply the final text of one output, returning what was never pushed.
    ///
    /// When `full_text` does not extend the pushed buffer (deltas were skipped
    /// or diverged) the whole text is returned. Afterwards the buffer equals
    /// `full_text`, so a repeated call yields nothing.
    pub fn apply_final_text(&mut self, index: u64, full_text: &str) -> String {
        if full_text.is_empty() {
            return String::new();
        }
        let pushed = self.pushed.entry(index).or_default();
        let rest = full_text
            .strip_prefix(pushed.as_str())
            .unwrap_or(full_text)
            .to_string();
        *pushed = full_text.to_string();
        rest
    }

    /// Apply a snapshot covering every output (the concatenation in index order).
    pub fn apply_final_text_all(&mut self, full_text: &str) -> String {
        if full_text.is_empty() {
            return String::new();
        }
        let combined = self.combined_text();
        match full_text.strip_prefix(combined.as_str()) {
            Some(rest) => {
                let rest = rest.to_string();
                if !rest.is_empty() {
                    let last = self.pushed.keys().next_back().copied().unwrap_or(0);
                    self.push_delta(last, &rest);
                }
                rest
            }
            None => {
                let first = self.pushed.keys().next().copied().unwrap_or(0);
                self.pushed.clear();
                self.pushed.insert(first, full_text.to_string());
                full_text.to_string()
            }
        }
    }

    /// All pushed text in index order.
    pub fn combined_text(&self) -> String {
        self.pushed.values().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn cumulative_resend_yields_suffix() {
        let d = derive_cumulative_text_delta("Hello", "Hello world");
        assert_eq!(d.delta, " world");
        assert_eq!(d.full_text, "Hello world");
    }

    #[test]
    fn unrelated_chunk_is_a_pure_delta() {
        let d = derive_cumulative_text_delta("Hello", " there");
        assert_eq!(d.delta, " there");
        assert_eq!(d.full_text, "Hello there");
    }

    #[test]
    fn empty_chunk_changes_nothing() {
        let mut text = CumulativeText::new();
        assert_eq!(text.push("abc"), "abc");
        assert_eq!(text.push(""), "");
        assert_eq!(text.full_text(), "abc");
        // exact resend carries no new text
        assert_eq!(text.push("abc"), "");
    }

    #[test]
    fn tracker_strips_pushed_prefix_and_is_idempotent() {
        let mut tracker = OutputTextTracker::new();
        tracker.push_delta(0, "a");
        tracker.push_delta(0, "b");
        assert_eq!(tracker.apply_final_text(0, "ab"), "");
        assert_eq!(tracker.apply_final_text(0, "abc"), "c");
        assert_eq!(tracker.apply_final_text(0, "abc"), "");
    }

    #[test]
    fn tracker_returns_full_text_when_deltas_were_skipped() {
        let mut tracker = OutputTextTracker::new();
        tracker.push_delta(1, "xyz");
        assert_eq!(tracker.apply_final_text(1, "hello"), "hello");
        assert_eq!(tracker.apply_final_text(1, "hello"), "");
        assert_eq!(tracker.apply_final_text(2, "other"), "other");
    }

    #[test]
    fn tracker_applies_aggregate_snapshot_across_indices() {
        let mut tracker = OutputTextTracker::new();
        tracker.push_delta(1, "Hello ");
        tracker.push_delta(1, "world");
        assert_eq!(tracker.apply_final_text_all("Hello world"), "");
        assert_eq!(tracker.apply_final_text_all("Hello world!"), "!");
        assert_eq!(tracker.apply_final_text_all("Hello world!"), "");
        assert_eq!(tracker.apply_final_text_all("Different"), "Different");
        assert_eq!(tracker.apply_final_text_all("Different"), "");
    }

    proptest! {
        #[test]
        fn resend_of_previous_yields_exact_suffix(prev in ".{0,24}", x in ".{0,24}") {
            let chunk = format!("{prev}{x}");
            let d = derive_cumulative_text_delta(&prev, &chunk);
            prop_assert_eq!(d.delta, x);
            prop_assert_eq!(d.full_text, chunk);
        }

        #[test]
        fn full_text_never_shrinks(chunks in proptest::collection::vec(".{0,8}", 0..12)) {
            let mut text = CumulativeText::new();
            let mut last_len = 0;
            for c in &chunks {
                let delta = text.push(c);
                prop_assert!(text.full_text().len() >= last_len);
                prop_assert!(text.full_text().ends_with(delta.as_str()));
                last_len = text.full_text().len();
            }
        }

        #[test]
        fn non_prefix_chunk_grows_by_its_length(prev in "[a-m]{1,12}", chunk in "[n-z]{1,12}") {
            let d = derive_cumulative_text_delta(&prev, &chunk);
            prop_assert_eq!(d.full_text.len(), prev.len() + chunk.len());
            prop_assert_eq!(d.delta, chunk);
        }
    }
}
