//! Schema registry for the analysis and composition stages
//!
//! Each stage boundary has a request and a response contract. A contract is a
//! plain serde struct paired with a static [`Schema`] describing its fields.
//! The schema is what gets handed to the generative backend as a structured
//! output constraint, and it is also what [`Contract::from_value`] checks
//! untrusted backend output against.

use crate::error::{Error, Result};
use crate::image_datum::ImageDatum;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// One text field of a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub description: &'static str,
}

/// Static description of a contract's shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    pub name: &'static str,
    pub description: &'static str,
    pub fields: &'static [FieldSpec],
}

impl Schema {
    /// Render as a JSON Schema object
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in self.fields {
            properties.insert(
                field.name.to_string(),
                json!({
                    "type": "string",
                    "description": field.description,
                }),
            );
        }
        let required: Vec<&str> = self.fields.iter().map(|f| f.name).collect();

        json!({
            "type": "object",
            "description": self.description,
            "properties": properties,
            "required": required,
        })
    }

    /// Check that a JSON value carries every field as non-blank text
    pub fn check(&self, value: &Value) -> Result<()> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::schema(self.name, "expected a JSON object"))?;

        for field in self.fields {
            match object.get(field.name) {
                None | Some(Value::Null) => {
                    return Err(Error::schema(
                        self.name,
                        format!("missing field `{}`", field.name),
                    ));
                }
                Some(Value::String(text)) if text.trim().is_empty() => {
                    return Err(Error::schema(
                        self.name,
                        format!("field `{}` is empty", field.name),
                    ));
                }
                Some(Value::String(_)) => {}
                Some(_) => {
                    return Err(Error::schema(
                        self.name,
                        format!("field `{}` must be a string", field.name),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// A typed stage contract
pub trait Contract: Serialize + DeserializeOwned {
    const SCHEMA: &'static Schema;

    /// Extra checks beyond field presence
    fn check_semantics(&self) -> Result<()> {
        Ok(())
    }

    /// Validate an already-typed value
    fn validate(&self) -> Result<()> {
        let value = serde_json::to_value(self)?;
        Self::SCHEMA.check(&value)?;
        self.check_semantics()
    }

    /// Validate and convert untrusted JSON
    fn from_value(value: Value) -> Result<Self> {
        Self::SCHEMA.check(&value)?;
        let parsed: Self = serde_json::from_value(value)
            .map_err(|e| Error::schema(Self::SCHEMA.name, e.to_string()))?;
        parsed.check_semantics()?;
        Ok(parsed)
    }

    fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

const PHOTO_TO_ANALYZE: &str = "A photo to analyze, as a data URI that must include a MIME type and use Base64 encoding. Expected format: 'data:<mimetype>;base64,<encoded_data>'.";
const PHOTO_TO_INSPIRE: &str = "A photo to inspire the poem, as a data URI that must include a MIME type and use Base64 encoding. Expected format: 'data:<mimetype>;base64,<encoded_data>'.";

pub const ANALYZE_REQUEST: Schema = Schema {
    name: "AnalyzeRequest",
    description: "Input of the photo analysis stage.",
    fields: &[FieldSpec {
        name: "photoDataUri",
        description: PHOTO_TO_ANALYZE,
    }],
};

pub const ANALYZE_RESPONSE: Schema = Schema {
    name: "AnalyzeResponse",
    description: "Key elements, emotions, and themes of a photo.",
    fields: &[
        FieldSpec {
            name: "elements",
            description: "Key elements found in the photo.",
        },
        FieldSpec {
            name: "emotions",
            description: "Emotions evoked by the photo.",
        },
        FieldSpec {
            name: "themes",
            description: "Themes present in the photo.",
        },
    ],
};

pub const COMPOSE_REQUEST: Schema = Schema {
    name: "ComposeRequest",
    description: "Input of the poem composition stage.",
    fields: &[FieldSpec {
        name: "photoDataUri",
        description: PHOTO_TO_INSPIRE,
    }],
};

pub const COMPOSE_RESPONSE: Schema = Schema {
    name: "ComposeResponse",
    description: "A poem inspired by a photo.",
    fields: &[FieldSpec {
        name: "poem",
        description: "A poem inspired by the photo.",
    }],
};

/// Analysis stage input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub photo_data_uri: String,
}

impl AnalyzeRequest {
    pub fn new(photo: &ImageDatum) -> Self {
        Self {
            photo_data_uri: photo.to_data_uri(),
        }
    }

    pub fn photo(&self) -> Result<ImageDatum> {
        parse_photo(ANALYZE_REQUEST.name, &self.photo_data_uri)
    }
}

impl Contract for AnalyzeRequest {
    const SCHEMA: &'static Schema = &ANALYZE_REQUEST;

    fn check_semantics(&self) -> Result<()> {
        self.photo().map(|_| ())
    }
}

/// Composition stage input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeRequest {
    pub photo_data_uri: String,
}

impl ComposeRequest {
    pub fn new(photo: &ImageDatum) -> Self {
        Self {
            photo_data_uri: photo.to_data_uri(),
        }
    }

    pub fn photo(&self) -> Result<ImageDatum> {
        parse_photo(COMPOSE_REQUEST.name, &self.photo_data_uri)
    }
}

impl Contract for ComposeRequest {
    const SCHEMA: &'static Schema = &COMPOSE_REQUEST;

    fn check_semantics(&self) -> Result<()> {
        self.photo().map(|_| ())
    }
}

/// Analysis stage output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub elements: String,
    pub emotions: String,
    pub themes: String,
}

pub type AnalyzeResponse = AnalysisResult;

impl Contract for AnalysisResult {
    const SCHEMA: &'static Schema = &ANALYZE_RESPONSE;
}

/// Composition stage output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoemResult {
    pub poem: String,
}

pub type ComposeResponse = PoemResult;

impl PoemResult {
    pub fn line_count(&self) -> usize {
        self.poem.lines().filter(|l| !l.trim().is_empty()).count()
    }
}

impl Contract for PoemResult {
    const SCHEMA: &'static Schema = &COMPOSE_RESPONSE;
}

fn parse_photo(contract: &'static str, uri: &str) -> Result<ImageDatum> {
    ImageDatum::parse(uri).map_err(|e| Error::schema(contract, format!("photoDataUri: {}", e)))
}
