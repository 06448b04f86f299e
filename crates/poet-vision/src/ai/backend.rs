//! Generative backend seam
//!
//! A backend turns a prompt, an attached photo, and an output schema into a
//! JSON object. It may call the tools offered through a [`ToolSession`]
//! while generating.

use crate::tools::ToolSession;
use async_trait::async_trait;
use poet_types::{Error, ImageDatum, Result, Schema};
use serde_json::Value;

/// One structured generation request
pub struct GenerationRequest<'a> {
    pub prompt: String,
    pub image: &'a ImageDatum,
    pub output_schema: &'static Schema,
    pub tools: Option<&'a ToolSession>,
}

impl<'a> GenerationRequest<'a> {
    pub fn new(prompt: String, image: &'a ImageDatum, output_schema: &'static Schema) -> Self {
        Self {
            prompt,
            image,
            output_schema,
            tools: None,
        }
    }

    pub fn with_tools(mut self, tools: &'a ToolSession) -> Self {
        self.tools = Some(tools);
        self
    }
}

/// "Generate structured text from a prompt + schema"
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: GenerationRequest<'_>) -> Result<Value>;
}

/// Reject output that is not a JSON object at all.
///
/// Objects that merely miss fields are left for the contract check.
pub fn expect_structured(backend: &str, value: Value) -> Result<Value> {
    if value.is_object() {
        return Ok(value);
    }
    Err(Error::generation(format!(
        "{} returned no structured output",
        backend
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expect_structured() {
        assert!(expect_structured("test", json!({ "poem": "x" })).is_ok());
        let err = expect_structured("test", Value::Null).unwrap_err();
        assert!(err.is_generation_failed());
        assert!(expect_structured("test", json!("text")).is_err());
    }
}
