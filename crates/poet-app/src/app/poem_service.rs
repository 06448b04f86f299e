//! Poem Service - wires a configured backend into the vision stages
//!
//! The service owns one backend and shares it between:
//! 1. The analysis stage (standalone `analyze` command)
//! 2. The composition stage, whose `analyzePhoto` tool runs analysis
//!    against the same backend

use crate::config::Config;
use poet_types::{AnalysisResult, ConfigError, ImageDatum, PoemResult, Result};
use poet_vision::{
    AnalysisStage, Composer, CompositionStage, DryrunBackend, GeminiBackend, GeminiConfig,
    GenerativeBackend,
};
use std::sync::Arc;
use tracing::info;

/// Build the backend named in `config`
pub fn build_backend(config: &Config) -> Result<Arc<dyn GenerativeBackend>> {
    match config.backend.as_str() {
        "gemini" => {
            let gemini = GeminiConfig::from_env(Some(config.model.clone()), config.api_base.clone())?
                .with_request_timeout(config.request_timeout());
            Ok(Arc::new(GeminiBackend::new(gemini)))
        }
        "dryrun" => Ok(Arc::new(DryrunBackend)),
        other => Err(ConfigError::UnknownBackend(other.to_string()).into()),
    }
}

pub struct PoemService {
    analysis: Arc<AnalysisStage>,
    composition: Arc<CompositionStage>,
}

impl PoemService {
    pub fn new(backend: Arc<dyn GenerativeBackend>, config: &Config) -> Self {
        Self {
            analysis: Arc::new(AnalysisStage::new(Arc::clone(&backend))),
            composition: Arc::new(CompositionStage::new(backend, config.tool_limits())),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let backend = build_backend(config)?;
        info!(
            backend = backend.name(),
            tool_call_limit = config.tool_call_limit,
            "poem service ready"
        );
        Ok(Self::new(backend, config))
    }

    pub async fn analyze(&self, photo: &ImageDatum) -> Result<AnalysisResult> {
        self.analysis.analyze(photo).await
    }

    pub async fn compose(&self, photo: &ImageDatum) -> Result<PoemResult> {
        self.composition.compose(photo).await
    }

    /// Composer handle for the intake controller
    pub fn composer(&self) -> Arc<dyn Composer> {
        self.composition.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_backend_rejected() {
        let config = Config::default().with_backend(Some("ollama".to_string()));
        let err = PoemService::from_config(&config).err().unwrap();
        assert_eq!(
            err.to_string(),
            "Configuration error: Unknown backend: ollama"
        );
    }

    #[test]
    fn test_dryrun_backend_name() {
        let config = Config::default().with_backend(Some("dryrun".to_string()));
        let backend = build_backend(&config).unwrap();
        assert_eq!(backend.name(), "dryrun");
    }

    #[tokio::test]
    async fn test_dryrun_service_composes() {
        let config = Config::default().with_backend(Some("dryrun".to_string()));
        let service = PoemService::from_config(&config).unwrap();
        let photo = ImageDatum::from_bytes("image/png", b"\x89PNG\r\n\x1a\n").unwrap();

        let analysis = service.analyze(&photo).await.unwrap();
        assert!(!analysis.elements.trim().is_empty());

        let poem = service.compose(&photo).await.unwrap();
        assert!(poem.line_count() >= 1);
    }
}
