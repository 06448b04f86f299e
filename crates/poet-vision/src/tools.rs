//! Tool calling between the composition backend and the analysis stage

use crate::analysis::AnalysisStage;
use async_trait::async_trait;
use poet_types::schema::{ANALYZE_REQUEST, ANALYZE_RESPONSE};
use poet_types::{AnalyzeRequest, Contract, Error, ImageDatum, Result, Schema};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Argument value standing for the photo attached to the current request
pub const ATTACHED_PHOTO: &str = "attached:photo";

/// Registered name of the analysis tool
pub const ANALYZE_PHOTO_TOOL: &str = "analyzePhoto";

/// A capability the backend may invoke mid-generation
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> &'static Schema;
    fn output_schema(&self) -> &'static Schema;

    async fn call(&self, input: Value) -> Result<Value>;
}

/// What a backend needs to declare a tool to the model
#[derive(Debug, Clone)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub input_schema: &'static Schema,
    pub output_schema: &'static Schema,
}

/// Per-compose bounds on tool use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolLimits {
    pub max_calls: usize,
    pub timeout: Duration,
}

impl Default for ToolLimits {
    fn default() -> Self {
        Self {
            max_calls: 1,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Outcome of a tool call as seen by the backend
#[derive(Debug, Clone, PartialEq)]
pub enum ToolReply {
    Output(Value),
    /// Not executed; the reason should be relayed to the model
    Refused(String),
}

/// Declared tools plus their limits
#[derive(Clone, Default)]
pub struct ToolBox {
    tools: Vec<Arc<dyn Tool>>,
    limits: ToolLimits,
}

impl ToolBox {
    pub fn new(limits: ToolLimits) -> Self {
        Self {
            tools: Vec::new(),
            limits,
        }
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn limits(&self) -> ToolLimits {
        self.limits
    }

    /// Open a session bound to the photo of one compose call
    pub fn session(&self, photo: &ImageDatum) -> ToolSession {
        ToolSession {
            tools: self.tools.clone(),
            limits: self.limits,
            photo: photo.clone(),
            calls: AtomicUsize::new(0),
        }
    }
}

/// Tool access for a single compose call
pub struct ToolSession {
    tools: Vec<Arc<dyn Tool>>,
    limits: ToolLimits,
    photo: ImageDatum,
    calls: AtomicUsize,
}

impl ToolSession {
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.tools
            .iter()
            .map(|t| ToolDeclaration {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
                output_schema: t.output_schema(),
            })
            .collect()
    }

    pub fn limits(&self) -> ToolLimits {
        self.limits
    }

    /// Number of calls that were admitted
    pub fn calls_made(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> usize {
        self.limits.max_calls.saturating_sub(self.calls_made())
    }

    /// Invoke a tool by name.
    ///
    /// Unknown tools and calls past the budget are refused without running
    /// anything. Errors raised by the tool itself are returned unchanged;
    /// a timeout becomes `GenerationFailed`.
    pub async fn invoke(&self, name: &str, args: Value) -> Result<ToolReply> {
        let Some(tool) = self.tools.iter().find(|t| t.name() == name) else {
            warn!(tool = name, "backend requested an unknown tool");
            return Ok(ToolReply::Refused(format!("Unknown tool `{}`.", name)));
        };

        let max = self.limits.max_calls;
        let admitted = self
            .calls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < max).then_some(n + 1)
            });
        let call_number = match admitted {
            Ok(previous) => previous + 1,
            Err(_) => {
                warn!(tool = name, max_calls = max, "tool call budget exhausted");
                return Ok(ToolReply::Refused(format!(
                    "Tool `{}` may be called at most {} time(s) per request.",
                    name, max
                )));
            }
        };

        let args = self.resolve_attached_photo(args);
        info!(tool = name, call = call_number, "invoking tool");

        match tokio::time::timeout(self.limits.timeout, tool.call(args)).await {
            Ok(result) => result.map(ToolReply::Output),
            Err(_) => Err(Error::generation(format!(
                "tool `{}` timed out after {}s",
                name,
                self.limits.timeout.as_secs_f32()
            ))),
        }
    }

    /// Substitute the attached photo for a missing or placeholder
    /// `photoDataUri` argument
    fn resolve_attached_photo(&self, args: Value) -> Value {
        let mut object = match args {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let needs_photo = match object.get("photoDataUri") {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty() || s == ATTACHED_PHOTO,
            Some(_) => false,
        };
        if needs_photo {
            object.insert(
                "photoDataUri".to_string(),
                Value::String(self.photo.to_data_uri()),
            );
        }
        Value::Object(object)
    }
}

/// Binds `analyzePhoto` to [`AnalysisStage::analyze_request`].
///
/// Converts between the JSON tool protocol and the typed contracts and
/// nothing more; stage errors pass through untouched.
pub struct AnalyzePhotoTool {
    stage: Arc<AnalysisStage>,
}

impl AnalyzePhotoTool {
    pub fn new(stage: Arc<AnalysisStage>) -> Self {
        Self { stage }
    }
}

#[async_trait]
impl Tool for AnalyzePhotoTool {
    fn name(&self) -> &str {
        ANALYZE_PHOTO_TOOL
    }

    fn description(&self) -> &str {
        "Analyzes a photo and extracts key elements, emotions, and themes."
    }

    fn input_schema(&self) -> &'static Schema {
        &ANALYZE_REQUEST
    }

    fn output_schema(&self) -> &'static Schema {
        &ANALYZE_RESPONSE
    }

    async fn call(&self, input: Value) -> Result<Value> {
        let request = AnalyzeRequest::from_value(input)?;
        let result = self.stage.analyze_request(request).await?;
        result.to_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool {
        delay: Duration,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes its input"
        }

        fn input_schema(&self) -> &'static Schema {
            &ANALYZE_REQUEST
        }

        fn output_schema(&self) -> &'static Schema {
            &ANALYZE_REQUEST
        }

        async fn call(&self, input: Value) -> Result<Value> {
            tokio::time::sleep(self.delay).await;
            Ok(input)
        }
    }

    fn photo() -> ImageDatum {
        ImageDatum::from_bytes("image/png", b"\x89PNG\r\n\x1a\n").unwrap()
    }

    fn toolbox(max_calls: usize, timeout: Duration, delay: Duration) -> ToolBox {
        ToolBox::new(ToolLimits { max_calls, timeout }).with_tool(Arc::new(EchoTool { delay }))
    }

    #[tokio::test]
    async fn test_attached_photo_is_substituted() {
        let session = toolbox(2, Duration::from_secs(1), Duration::ZERO).session(&photo());

        let reply = session
            .invoke("echo", json!({ "photoDataUri": ATTACHED_PHOTO }))
            .await
            .unwrap();
        assert_eq!(
            reply,
            ToolReply::Output(json!({ "photoDataUri": photo().to_data_uri() }))
        );

        let reply = session.invoke("echo", Value::Null).await.unwrap();
        assert_eq!(
            reply,
            ToolReply::Output(json!({ "photoDataUri": photo().to_data_uri() }))
        );
    }

    #[tokio::test]
    async fn test_budget_refuses_extra_calls() {
        let session = toolbox(1, Duration::from_secs(1), Duration::ZERO).session(&photo());

        let first = session.invoke("echo", json!({})).await.unwrap();
        assert!(matches!(first, ToolReply::Output(_)));

        let second = session.invoke("echo", json!({})).await.unwrap();
        assert!(matches!(second, ToolReply::Refused(_)));
        assert_eq!(session.calls_made(), 1);
        assert_eq!(session.remaining(), 0);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_refused() {
        let session = toolbox(1, Duration::from_secs(1), Duration::ZERO).session(&photo());
        let reply = session.invoke("missing", json!({})).await.unwrap();
        assert!(matches!(reply, ToolReply::Refused(msg) if msg.contains("missing")));
        assert_eq!(session.calls_made(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_tool_times_out() {
        let session =
            toolbox(1, Duration::from_millis(50), Duration::from_secs(5)).session(&photo());
        let err = session.invoke("echo", json!({})).await.unwrap_err();
        assert!(err.is_generation_failed());
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut tools = ToolBox::default();
        tools.register(Arc::new(EchoTool { delay: Duration::ZERO }));
        tools.register(Arc::new(EchoTool { delay: Duration::ZERO }));
        assert_eq!(tools.names(), vec!["echo".to_string()]);
    }
}
