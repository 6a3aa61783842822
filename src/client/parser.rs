//! Tolerant parsing of model replies
//!
//! Models wrap JSON in markdown fences or surround it with prose even when
//! asked for JSON only. Parsing locates the outermost brace pair and decodes
//! it into a typed [`AnalysisResult`]; anything else fails closed with
//! [`ClientError::MalformedResponse`].

use super::ClientError;
use crate::log_debug;
use crate::types::AnalysisResult;

/// Longest reply excerpt carried in a parse error
const PREVIEW_CHARS: usize = 500;

/// Strip markdown fence artifacts and keep the outermost `{ ... }` slice.
///
/// Text with no brace pair is returned with fences and whitespace removed so
/// the caller's decode step reports the failure.
pub fn clean_json_string(raw: &str) -> String {
    let trimmed = raw.trim();

    let without_fence = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```JSON"))
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let without_fence = without_fence
        .trim_end()
        .strip_suffix("```")
        .unwrap_or(without_fence)
        .trim();

    match (without_fence.find('{'), without_fence.rfind('}')) {
        (Some(start), Some(end)) if end > start => without_fence[start..=end].to_string(),
        _ => without_fence.to_string(),
    }
}

/// Parse a raw model reply into an [`AnalysisResult`]
pub fn parse_analysis(raw: &str) -> Result<AnalysisResult, ClientError> {
    log_debug!("Parsing model reply - {} chars", raw.len());

    let cleaned = clean_json_string(raw);
    match serde_json::from_str::<AnalysisResult>(&cleaned) {
        Ok(result) => {
            log_debug!("Model reply parsed successfully");
            Ok(result.normalized())
        }
        Err(e) => {
            log_debug!("Model reply parse failed: {}", e);
            Err(ClientError::MalformedResponse {
                reason: e.to_string(),
                preview: raw.chars().take(PREVIEW_CHARS).collect(),
            })
        }
    }
}
