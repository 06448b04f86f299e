//! Core types for photo-poet

mod error;
mod image_datum;
pub mod schema;

pub use error::*;
pub use image_datum::{is_image_mime, ImageDatum};
pub use schema::{
    AnalysisResult, AnalyzeRequest, AnalyzeResponse, ComposeRequest, ComposeResponse, Contract,
    FieldSpec, PoemResult, Schema,
};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Output format for results
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
