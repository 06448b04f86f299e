//! Analysis stage: photo → elements, emotions, themes

use crate::ai::backend::{expect_structured, GenerationRequest, GenerativeBackend};
use crate::ai::prompts::build_analysis_prompt;
use poet_types::schema::ANALYZE_RESPONSE;
use poet_types::{AnalysisResult, AnalyzeRequest, Contract, ImageDatum, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Stateless analysis stage.
///
/// One backend call per invocation. No caching and no retry.
pub struct AnalysisStage {
    backend: Arc<dyn GenerativeBackend>,
}

impl AnalysisStage {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { backend }
    }

    pub async fn analyze(&self, photo: &ImageDatum) -> Result<AnalysisResult> {
        self.analyze_request(AnalyzeRequest::new(photo)).await
    }

    /// Run the stage on a request contract.
    ///
    /// The request is validated before the backend is contacted and the
    /// response is validated before it is returned.
    pub async fn analyze_request(&self, request: AnalyzeRequest) -> Result<AnalysisResult> {
        request.validate()?;
        let photo = request.photo()?;

        let start = Instant::now();
        debug!(
            backend = self.backend.name(),
            mime = photo.mime_type(),
            bytes = photo.byte_len(),
            "analysis started"
        );

        let request = GenerationRequest::new(build_analysis_prompt(), &photo, &ANALYZE_RESPONSE);
        let outcome = self
            .backend
            .generate(request)
            .await
            .and_then(|value| expect_structured(self.backend.name(), value))
            .and_then(AnalysisResult::from_value);

        match &outcome {
            Ok(_) => debug!(elapsed_ms = start.elapsed().as_millis() as u64, "analysis finished"),
            Err(e) => warn!(error = %e, "analysis failed"),
        }
        outcome
    }
}
