//! Gemini `generateContent` backend with function calling

use crate::ai::backend::{GenerationRequest, GenerativeBackend};
use crate::ai::prompts::build_schema_instructions;
use crate::parse_structured_output;
use crate::tools::{ToolReply, ToolSession};
use async_trait::async_trait;
use poet_types::{ConfigError, Error, ImageDatum, Result};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Connection settings for [`GeminiBackend`]
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub request_timeout: Duration,
}

impl GeminiConfig {
    /// Read the API key from `GEMINI_API_KEY` or `GOOGLE_API_KEY`
    pub fn from_env(model: Option<String>, api_base: Option<String>) -> Result<Self> {
        let api_key = non_empty_env("GEMINI_API_KEY")
            .or_else(|| non_empty_env("GOOGLE_API_KEY"))
            .ok_or_else(|| ConfigError::MissingApiKey("GEMINI_API_KEY".to_string()))?;
        let api_base = api_base
            .or_else(|| non_empty_env("GEMINI_API_BASE"))
            .map(|base| base.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Ok(Self {
            api_base,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            request_timeout: Duration::from_secs(90),
        })
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

pub struct GeminiBackend {
    config: GeminiConfig,
    http: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        let trimmed = self.config.model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{}", trimmed)
        };
        format!("{}/{}:generateContent", self.config.api_base, model_path)
    }

    async fn post(&self, payload: &Value) -> Result<Value> {
        let response = self
            .http
            .post(self.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .timeout(self.config.request_timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::generation(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::generation(format!("Gemini response body read failed: {}", e)))?;
        if !status.is_success() {
            return Err(Error::generation(format!(
                "Gemini request failed ({}): {}",
                status.as_u16(),
                truncate_text(&body, 512)
            )));
        }
        serde_json::from_str(&body)
            .map_err(|e| Error::generation(format!("Gemini returned invalid JSON payload: {}", e)))
    }
}

#[async_trait]
impl GenerativeBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: GenerationRequest<'_>) -> Result<Value> {
        let mut contents = vec![json!({
            "role": "user",
            "parts": initial_parts(&request),
        })];

        // One round per admitted call, one to relay a refusal, one to answer
        let rounds = request
            .tools
            .map(|session| session.limits().max_calls + 2)
            .unwrap_or(1);

        for round in 0..rounds {
            let allow_calls = round + 1 < rounds
                && request.tools.map_or(false, |session| session.remaining() > 0);
            let payload = build_payload(&contents, &request, allow_calls);
            debug!(model = %self.config.model, round, allow_calls, "posting generateContent");
            let response = self.post(&payload).await?;

            let parts = first_candidate_parts(&response)?;
            let calls = function_calls(&parts);
            if calls.is_empty() {
                return parse_structured_output("Gemini", &candidate_text(&parts));
            }

            let Some(session) = request.tools else {
                return Err(Error::generation(
                    "Gemini requested a tool call but no tools were offered",
                ));
            };
            contents.push(json!({ "role": "model", "parts": parts }));
            contents.push(json!({
                "role": "user",
                "parts": answer_calls(session, calls).await?,
            }));
        }

        Err(Error::generation(format!(
            "Gemini kept requesting tools after {} round(s)",
            rounds
        )))
    }
}

fn initial_parts(request: &GenerationRequest<'_>) -> Vec<Value> {
    let mut prompt = request.prompt.clone();
    if request.tools.is_some() {
        prompt.push_str(&build_schema_instructions(request.output_schema));
    }
    vec![inline_image_part(request.image), json!({ "text": prompt })]
}

fn inline_image_part(image: &ImageDatum) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.mime_type(),
            "data": image.payload(),
        }
    })
}

/// With `allow_calls` false the tools stay declared, so earlier calls in
/// `contents` remain valid, but the model must answer with text.
fn build_payload(
    contents: &[Value],
    request: &GenerationRequest<'_>,
    allow_calls: bool,
) -> Value {
    let mut payload = json!({ "contents": contents });

    match request.tools {
        Some(session) => {
            let declarations: Vec<Value> = session
                .declarations()
                .into_iter()
                .map(|decl| {
                    json!({
                        "name": decl.name,
                        "description": decl.description,
                        "parameters": gemini_schema(&decl.input_schema.to_json_schema()),
                    })
                })
                .collect();
            payload["tools"] = json!([{ "functionDeclarations": declarations }]);
            let mode = if allow_calls { "AUTO" } else { "NONE" };
            payload["toolConfig"] = json!({ "functionCallingConfig": { "mode": mode } });
        }
        None => {
            payload["generationConfig"] = json!({
                "responseMimeType": "application/json",
                "responseSchema": gemini_schema(&request.output_schema.to_json_schema()),
            });
        }
    }
    payload
}

/// Gemini's schema dialect uses upper-case type names and rejects
/// object-level descriptions in some models
fn gemini_schema(schema: &Value) -> Value {
    let mut out = schema.clone();
    if let Some(object) = out.as_object_mut() {
        object.remove("description");
        object.insert("type".to_string(), json!("OBJECT"));
        if let Some(props) = object.get_mut("properties").and_then(Value::as_object_mut) {
            for prop in props.values_mut() {
                if let Some(p) = prop.as_object_mut() {
                    p.insert("type".to_string(), json!("STRING"));
                }
            }
        }
    }
    out
}

fn first_candidate_parts(response: &Value) -> Result<Vec<Value>> {
    let candidate = response
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .ok_or_else(|| {
            let reason = response
                .pointer("/promptFeedback/blockReason")
                .and_then(Value::as_str)
                .unwrap_or("no candidates");
            Error::generation(format!("Gemini returned no output ({})", reason))
        })?;

    let parts = candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    if parts.is_empty() {
        let reason = candidate
            .get("finishReason")
            .and_then(Value::as_str)
            .unwrap_or("empty content");
        return Err(Error::generation(format!(
            "Gemini returned no output ({})",
            reason
        )));
    }
    Ok(parts)
}

fn function_calls(parts: &[Value]) -> Vec<(String, Value)> {
    parts
        .iter()
        .filter_map(|part| part.get("functionCall"))
        .filter_map(|call| {
            let name = call.get("name").and_then(Value::as_str)?;
            let args = call.get("args").cloned().unwrap_or(Value::Null);
            Some((name.to_string(), args))
        })
        .collect()
}

fn candidate_text(parts: &[Value]) -> String {
    parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("")
}

/// Run requested calls and build `functionResponse` parts.
///
/// Refusals go back to the model; tool errors abort generation unchanged.
async fn answer_calls(session: &ToolSession, calls: Vec<(String, Value)>) -> Result<Vec<Value>> {
    let mut responses = Vec::with_capacity(calls.len());
    for (name, args) in calls {
        let response = match session.invoke(&name, args).await? {
            ToolReply::Output(output) => {
                info!(tool = %name, "tool output returned to Gemini");
                output
            }
            ToolReply::Refused(reason) => {
                warn!(tool = %name, %reason, "tool call refused");
                json!({ "error": reason })
            }
        };
        responses.push(json!({
            "functionResponse": {
                "name": name,
                "response": response,
            }
        }));
    }
    Ok(responses)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
