//! Composition stage: photo → poem, with the analysis stage offered as a tool

use crate::ai::backend::{expect_structured, GenerationRequest, GenerativeBackend};
use crate::ai::prompts::{build_compose_prompt, MAX_POEM_LINES};
use crate::analysis::AnalysisStage;
use crate::tools::{AnalyzePhotoTool, ToolBox, ToolLimits, ANALYZE_PHOTO_TOOL, ATTACHED_PHOTO};
use async_trait::async_trait;
use poet_types::schema::COMPOSE_RESPONSE;
use poet_types::{ComposeRequest, Contract, ImageDatum, PoemResult, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Anything that can turn a photo into a poem
#[async_trait]
pub trait Composer: Send + Sync {
    async fn compose(&self, photo: &ImageDatum) -> Result<PoemResult>;
}

/// Stateless composition stage
pub struct CompositionStage {
    backend: Arc<dyn GenerativeBackend>,
    tools: ToolBox,
}

impl CompositionStage {
    /// Wire the standard pipeline: the analysis stage runs on the same
    /// backend and is offered as `analyzePhoto`.
    pub fn new(backend: Arc<dyn GenerativeBackend>, limits: ToolLimits) -> Self {
        let analysis = Arc::new(AnalysisStage::new(backend.clone()));
        let tools = ToolBox::new(limits).with_tool(Arc::new(AnalyzePhotoTool::new(analysis)));
        Self::with_tools(backend, tools)
    }

    pub fn with_tools(backend: Arc<dyn GenerativeBackend>, tools: ToolBox) -> Self {
        Self { backend, tools }
    }

    pub fn tools(&self) -> &ToolBox {
        &self.tools
    }

    pub async fn compose_request(&self, request: ComposeRequest) -> Result<PoemResult> {
        request.validate()?;
        let photo = request.photo()?;

        // A zero call budget means the tools are not offered at all
        let offer_tools = !self.tools.is_empty() && self.tools.limits().max_calls > 0;
        let tool_name = self
            .tools
            .names()
            .into_iter()
            .find(|name| offer_tools && name == ANALYZE_PHOTO_TOOL);
        let prompt = build_compose_prompt(tool_name.as_deref(), ATTACHED_PHOTO);

        let session = self.tools.session(&photo);
        let mut generation = GenerationRequest::new(prompt, &photo, &COMPOSE_RESPONSE);
        if offer_tools {
            generation = generation.with_tools(&session);
        }

        let start = Instant::now();
        debug!(
            backend = self.backend.name(),
            tools = ?self.tools.names(),
            offer_tools,
            "composition started"
        );

        let outcome = self
            .backend
            .generate(generation)
            .await
            .and_then(|value| expect_structured(self.backend.name(), value))
            .and_then(PoemResult::from_value);

        match &outcome {
            Ok(poem) => {
                let lines = poem.line_count();
                if lines > MAX_POEM_LINES {
                    debug!(lines, "poem is longer than requested");
                }
                info!(
                    tool_calls = session.calls_made(),
                    lines,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "composition finished"
                );
            }
            Err(e) => warn!(error = %e, tool_calls = session.calls_made(), "composition failed"),
        }
        outcome
    }
}

#[async_trait]
impl Composer for CompositionStage {
    async fn compose(&self, photo: &ImageDatum) -> Result<PoemResult> {
        self.compose_request(ComposeRequest::new(photo)).await
    }
}
