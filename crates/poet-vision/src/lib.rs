//! Vision stages - photo analysis and poem composition
//!
//! This crate provides:
//! - The generative backend seam (Gemini over HTTP, dryrun offline)
//! - The analysis stage and its `analyzePhoto` tool binding
//! - The composition stage, which may call that tool while generating

pub mod ai;
pub mod analysis;
pub mod composition;
pub mod tools;

// Re-export main types for convenience
pub use ai::backend::{GenerationRequest, GenerativeBackend};
pub use ai::dryrun::DryrunBackend;
pub use ai::gemini::{GeminiBackend, GeminiConfig};
pub use analysis::AnalysisStage;
pub use composition::{Composer, CompositionStage};
pub use tools::{
    AnalyzePhotoTool, Tool, ToolBox, ToolDeclaration, ToolLimits, ToolReply, ToolSession,
    ANALYZE_PHOTO_TOOL, ATTACHED_PHOTO,
};

use poet_types::{Error, Result};
use serde_json::Value;

/// Parse a model's text answer into a JSON value.
///
/// Fails with `GenerationFailed` when no JSON can be recovered.
pub fn parse_structured_output(backend: &str, response: &str) -> Result<Value> {
    if response.trim().is_empty() {
        return Err(Error::generation(format!("{} returned an empty response", backend)));
    }
    let json_str = extract_json_from_response(response);
    serde_json::from_str(&json_str).map_err(|e| {
        let truncated: String = response.chars().take(200).collect();
        Error::generation(format!(
            "{} returned no parseable structured output: {} | raw: {}",
            backend, e, truncated
        ))
    })
}

/// Extract JSON from response (handles markdown code blocks)
pub fn extract_json_from_response(response: &str) -> String {
    let response = response.trim();

    // Check for markdown code block
    if response.starts_with("```") {
        if let Some(end) = response.rfind("```") {
            let start = response.find('\n').map(|i| i + 1).unwrap_or(3);
            if start < end {
                return response[start..end].trim().to_string();
            }
        }
    }

    // Try to find JSON object directly
    if let Some(start) = response.find('{') {
        if let Some(end) = response.rfind('}') {
            if start < end {
                return response[start..=end].to_string();
            }
        }
    }

    response.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_markdown() {
        let response = "```json\n{\"poem\": \"a\"}\n```";
        assert_eq!(extract_json_from_response(response), "{\"poem\": \"a\"}");
    }

    #[test]
    fn test_extract_json_plain() {
        let response = "{\"poem\": \"a\"}";
        assert_eq!(extract_json_from_response(response), "{\"poem\": \"a\"}");
    }

    #[test]
    fn test_extract_json_with_text() {
        let response = "Here is the result: {\"poem\": \"a\"} end";
        assert_eq!(extract_json_from_response(response), "{\"poem\": \"a\"}");
    }

    #[test]
    fn test_parse_structured_output_failures() {
        let err = parse_structured_output("test", "   ").unwrap_err();
        assert!(err.is_generation_failed());

        let err = parse_structured_output("test", "I could not see the photo.").unwrap_err();
        assert!(err.is_generation_failed());
        assert!(err.to_string().contains("no parseable structured output"));
    }
}
