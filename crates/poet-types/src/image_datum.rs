//! Embedded image carried as a `data:<mime>;base64,<payload>` URI

use crate::error::ValidationError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validated inline image.
///
/// Always holds an `image/*` MIME type and a non-empty, decodable
/// base64 payload. Serializes as its data URI string.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageDatum {
    mime_type: String,
    payload: String,
}

impl ImageDatum {
    /// Parse and validate a data URI
    pub fn parse(uri: &str) -> Result<Self, ValidationError> {
        let rest = uri
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| malformed("missing `data:` prefix"))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| malformed("missing `,` separator"))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| malformed("payload is not base64 encoded"))?;

        Self::new(mime_type, payload)
    }

    /// Encode raw image bytes
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Result<Self, ValidationError> {
        if bytes.is_empty() {
            return Err(malformed("image is empty"));
        }
        Self::new(mime_type, &BASE64.encode(bytes))
    }

    fn new(mime_type: &str, payload: &str) -> Result<Self, ValidationError> {
        let mime_type = mime_type.trim().to_ascii_lowercase();
        if !is_image_mime(&mime_type) {
            return Err(ValidationError::InvalidFileType(mime_type));
        }
        if payload.is_empty() {
            return Err(malformed("payload is empty"));
        }
        BASE64
            .decode(payload.as_bytes())
            .map_err(|e| malformed(&format!("invalid base64 payload: {}", e)))?;

        Ok(Self {
            mime_type,
            payload: payload.to_string(),
        })
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Base64 payload without the data URI header
    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.payload)
    }

    /// Decoded image bytes
    pub fn decode(&self) -> Vec<u8> {
        // Payload was validated on construction
        BASE64.decode(self.payload.as_bytes()).unwrap_or_default()
    }

    /// Approximate decoded size in bytes
    pub fn byte_len(&self) -> usize {
        self.payload.len() / 4 * 3
    }
}

/// Whether a MIME type names an image.
///
/// The subtype must be a bare token: parameters such as `;charset=x`
/// and embedded whitespace are rejected.
pub fn is_image_mime(mime_type: &str) -> bool {
    mime_type
        .strip_prefix("image/")
        .map(|subtype| !subtype.is_empty() && subtype.chars().all(is_subtype_char))
        .unwrap_or(false)
}

fn is_subtype_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$&^_.+-".contains(c)
}

fn malformed(reason: &str) -> ValidationError {
    ValidationError::MalformedDataUri(reason.to_string())
}

impl FromStr for ImageDatum {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ImageDatum {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ImageDatum> for String {
    fn from(value: ImageDatum) -> Self {
        value.to_data_uri()
    }
}

impl fmt::Display for ImageDatum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_data_uri())
    }
}

// Payloads run to megabytes; keep logs readable.
impl fmt::Debug for ImageDatum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageDatum")
            .field("mime_type", &self.mime_type)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}
