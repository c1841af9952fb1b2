//! Stop-reason and usage extraction
//!
//! Completion signals come in two shapes: a candidate `finishReason`
//! (Gemini) and a response `status` with `incomplete_details.reason`
//! (Responses). Both map onto [`StopReason`]. Whether upstream supplied a
//! reason at all is tracked separately from the mapped value, so an absent
//! reason is never confused with an explicit `Other`.

use crate::types::{StopReason, TokenUsage};
use crate::utils::json::{normalize_non_negative_int, normalize_string};
use serde_json::Value;

/// Last observed stop reason of a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopReasonState {
    reason: Option<StopReason>,
}

impl StopReasonState {
    /// Record an observation; `None` (nothing supplied) leaves the state untouched.
    pub fn observe(&mut self, observed: Option<StopReason>) {
        if observed.is_some() {
            self.reason = observed;
        }
    }

    pub fn seen(&self) -> bool {
        self.reason.is_some()
    }

    pub fn reason(&self) -> Option<StopReason> {
        self.reason
    }
}

/// Map a Gemini `finishReason`. Empty input means "not supplied".
pub fn map_gemini_finish_reason(finish_reason: &str) -> Option<StopReason> {
    let reason = finish_reason.trim();
    if reason.is_empty() {
        return None;
    }
    Some(match reason.to_ascii_uppercase().as_str() {
        "STOP" => StopReason::Stop,
        "MAX_TOKENS" => StopReason::MaxTokens,
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" | "IMAGE_SAFETY" => {
            StopReason::Safety
        }
        _ => StopReason::Other,
    })
}

/// Stop reason of a Gemini candidate object.
pub fn extract_gemini_stop_reason(candidate: Option<&Value>) -> Option<StopReason> {
    let candidate = candidate?;
    map_gemini_finish_reason(&normalize_string(candidate.get("finishReason")))
}

/// Stop reason of a Responses object from its `status`.
pub fn extract_responses_stop_reason(response: &Value) -> Option<StopReason> {
    let status = normalize_string(response.get("status")).to_ascii_lowercase();
    match status.as_str() {
        "completed" => Some(StopReason::Stop),
        "incomplete" => {
            let reason = normalize_string(
                response
                    .get("incomplete_details")
                    .and_then(|d| d.get("reason")),
            );
            Some(match reason.as_str() {
                "max_output_tokens" => StopReason::MaxTokens,
                "content_filter" => StopReason::Safety,
                _ => StopReason::Other,
            })
        }
        "failed" | "cancelled" => Some(StopReason::Other),
        _ => None,
    }
}

/// Usage from a Gemini `usageMetadata` object.
pub fn extract_gemini_usage(json: &Value) -> TokenUsage {
    let Some(meta) = json.get("usageMetadata") else {
        return TokenUsage::default();
    };
    TokenUsage {
        input_tokens: normalize_non_negative_int(meta.get("promptTokenCount")),
        output_tokens: normalize_non_negative_int(meta.get("candidatesTokenCount")),
        cache_read_input_tokens: normalize_non_negative_int(meta.get("cachedContentTokenCount")),
    }
}

/// Usage from a Responses `usage` object.
pub fn extract_responses_usage(usage: Option<&Value>) -> TokenUsage {
    let Some(usage) = usage.filter(|u| u.is_object()) else {
        return TokenUsage::default();
    };
    TokenUsage {
        input_tokens: normalize_non_negative_int(usage.get("input_tokens")),
        output_tokens: normalize_non_negative_int(usage.get("output_tokens")),
        cache_read_input_tokens: normalize_non_negative_int(
            usage
                .get("input_tokens_details")
                .and_then(|d| d.get("cached_tokens")),
        ),
    }
}
