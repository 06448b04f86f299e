//! Integration tests for the analysis → composition pipeline

use async_trait::async_trait;
use poet_types::{ComposeRequest, Error, ImageDatum, Result};
use poet_vision::{
    Composer, CompositionStage, DryrunBackend, GenerationRequest, GenerativeBackend, ToolLimits,
    ToolReply, ANALYZE_PHOTO_TOOL, ATTACHED_PHOTO,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Backend answering from a script.
///
/// Analysis requests get `analysis`; compose requests first call the
/// analysis tool `tool_calls` times, then answer with `poem` (or a poem
/// built from the tool output when `poem` is `None`).
struct ScriptedBackend {
    analysis: Value,
    poem: Option<Value>,
    tool_calls: usize,
    analyze_count: AtomicUsize,
    compose_count: AtomicUsize,
    refusals: AtomicUsize,
}

impl ScriptedBackend {
    fn new(analysis: Value, tool_calls: usize) -> Self {
        Self {
            analysis,
            poem: None,
            tool_calls,
            analyze_count: AtomicUsize::new(0),
            compose_count: AtomicUsize::new(0),
            refusals: AtomicUsize::new(0),
        }
    }

    fn with_poem(mut self, poem: Value) -> Self {
        self.poem = Some(poem);
        self
    }
}

#[async_trait]
impl GenerativeBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: GenerationRequest<'_>) -> Result<Value> {
        match request.output_schema.name {
            "AnalyzeResponse" => {
                self.analyze_count.fetch_add(1, Ordering::SeqCst);
                Ok(self.analysis.clone())
            }
            "ComposeResponse" => {
                self.compose_count.fetch_add(1, Ordering::SeqCst);
                let mut seen = Vec::new();
                if let Some(session) = request.tools {
                    for _ in 0..self.tool_calls {
                        let args = json!({ "photoDataUri": ATTACHED_PHOTO });
                        match session.invoke(ANALYZE_PHOTO_TOOL, args).await? {
                            ToolReply::Output(v) => seen.push(v),
                            ToolReply::Refused(_) => {
                                self.refusals.fetch_add(1, Ordering::SeqCst);
                            }
                        }
                    }
                }
                if let Some(poem) = &self.poem {
                    return Ok(poem.clone());
                }
                let elements = seen
                    .first()
                    .and_then(|v| v["elements"].as_str())
                    .unwrap_or("an unknown scene");
                Ok(json!({ "poem": format!("I saw {}\nand it was enough.", elements) }))
            }
            other => panic!("unexpected schema {}", other),
        }
    }
}

fn photo() -> ImageDatum {
    ImageDatum::from_bytes("image/jpeg", b"\xFF\xD8\xFF\xE0\x00\x10JFIF").unwrap()
}

fn dog_analysis() -> Value {
    json!({
        "elements": "a dog on grass",
        "emotions": "joy",
        "themes": "companionship",
    })
}

#[tokio::test]
async fn test_compose_uses_analysis_tool_once() {
    let backend = Arc::new(ScriptedBackend::new(dog_analysis(), 1));
    let stage = CompositionStage::new(backend.clone(), ToolLimits::default());

    let poem = stage.compose(&photo()).await.unwrap();

    assert!(poem.poem.contains("a dog on grass"));
    assert_eq!(backend.analyze_count.load(Ordering::SeqCst), 1);
    assert_eq!(backend.compose_count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_compose_without_tool_call() {
    let backend = Arc::new(ScriptedBackend::new(dog_analysis(), 0));
    let stage = CompositionStage::new(backend.clone(), ToolLimits::default());

    let poem = stage.compose(&photo()).await.unwrap();

    assert!(!poem.poem.trim().is_empty());
    assert_eq!(backend.analyze_count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_extra_tool_calls_are_refused() {
    let backend = Arc::new(ScriptedBackend::new(dog_analysis(), 3));
    let stage = CompositionStage::new(backend.clone(), ToolLimits::default());

    stage.compose(&photo()).await.unwrap();

    assert_eq!(backend.analyze_count.load(Ordering::SeqCst), 1);
    assert_eq!(backend.refusals.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_raised_limit_allows_more_calls() {
    let backend = Arc::new(ScriptedBackend::new(dog_analysis(), 2));
    let limits = ToolLimits {
        max_calls: 2,
        ..ToolLimits::default()
    };
    let stage = CompositionStage::new(backend.clone(), limits);

    stage.compose(&photo()).await.unwrap();

    assert_eq!(backend.analyze_count.load(Ordering::SeqCst), 2);
    assert_eq!(backend.refusals.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_zero_limit_offers_no_tools() {
    let backend = Arc::new(ScriptedBackend::new(dog_analysis(), 1));
    let limits = ToolLimits {
        max_calls: 0,
        ..ToolLimits::default()
    };
    let stage = CompositionStage::new(backend.clone(), limits);

    let poem = stage.compose(&photo()).await.unwrap();

    assert!(poem.poem.contains("an unknown scene"));
    assert_eq!(backend.analyze_count.load(Ordering::SeqCst), 0);
    assert_eq!(backend.refusals.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_analysis_error_propagates_unchanged() {
    let partial = json!({ "elements": "a dog", "emotions": "", "themes": "play" });
    let backend = Arc::new(ScriptedBackend::new(partial, 1));
    let stage = CompositionStage::new(backend, ToolLimits::default());

    let err = stage.compose(&photo()).await.unwrap_err();

    match err {
        Error::SchemaViolation { contract, reason } => {
            assert_eq!(contract, "AnalyzeResponse");
            assert!(reason.contains("emotions"));
        }
        other => panic!("expected schema violation, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_poem_is_rejected() {
    let backend =
        Arc::new(ScriptedBackend::new(dog_analysis(), 0).with_poem(json!({ "poem": "  \n " })));
    let stage = CompositionStage::new(backend, ToolLimits::default());

    let err = stage.compose(&photo()).await.unwrap_err();
    assert!(err.is_schema_violation());
}

#[tokio::test]
async fn test_missing_output_is_generation_failure() {
    let backend = Arc::new(ScriptedBackend::new(dog_analysis(), 0).with_poem(Value::Null));
    let stage = CompositionStage::new(backend, ToolLimits::default());

    let err = stage.compose(&photo()).await.unwrap_err();
    assert!(err.is_generation_failed());
}

#[tokio::test]
async fn test_invalid_request_skips_backend() {
    let backend = Arc::new(ScriptedBackend::new(dog_analysis(), 1));
    let stage = CompositionStage::new(backend.clone(), ToolLimits::default());

    let err = stage
        .compose_request(ComposeRequest {
            photo_data_uri: "data:application/pdf;base64,JVBERi0=".to_string(),
        })
        .await
        .unwrap_err();

    assert!(err.is_schema_violation());
    assert_eq!(backend.compose_count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_dryrun_pipeline_end_to_end() {
    let stage = CompositionStage::new(Arc::new(DryrunBackend), ToolLimits::default());

    let poem = stage.compose(&photo()).await.unwrap();

    assert!(poem.poem.contains("quiet curiosity"));
    assert!(poem.line_count() <= 10);
}

/// Live test against Gemini
#[tokio::test]
#[ignore] // Run with: GEMINI_API_KEY=... cargo test -- --ignored
async fn test_gemini_compose_live() {
    let config = poet_vision::GeminiConfig::from_env(None, None).unwrap();
    let backend = Arc::new(poet_vision::GeminiBackend::new(config));
    let stage = CompositionStage::new(backend, ToolLimits::default());

    // 1x1 transparent PNG
    let png = ImageDatum::parse(
        "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=",
    )
    .unwrap();
    let poem = stage.compose(&png).await.unwrap();
    println!("{}", poem.poem);
    assert!(!poem.poem.is_empty());
}
