//! Offline backend producing deterministic, schema-conforming output

use crate::ai::backend::{GenerationRequest, GenerativeBackend};
use crate::tools::{ToolReply, ATTACHED_PHOTO};
use async_trait::async_trait;
use poet_types::Result;
use serde_json::{json, Map, Value};
use tracing::debug;

/// Calls every offered tool once, then fills each schema field from the
/// photo metadata and whatever the tools returned.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryrunBackend;

#[async_trait]
impl GenerativeBackend for DryrunBackend {
    fn name(&self) -> &str {
        "dryrun"
    }

    async fn generate(&self, request: GenerationRequest<'_>) -> Result<Value> {
        let mut analysis = Map::new();
        if let Some(session) = request.tools {
            for decl in session.declarations() {
                let args = json!({ "photoDataUri": ATTACHED_PHOTO });
                match session.invoke(&decl.name, args).await? {
                    ToolReply::Output(Value::Object(map)) => analysis.extend(map),
                    ToolReply::Output(_) => {}
                    ToolReply::Refused(reason) => debug!(tool = %decl.name, %reason, "dryrun tool refused"),
                }
            }
        }

        let mut output = Map::new();
        for field in request.output_schema.fields {
            let text = match field.name {
                "elements" => format!(
                    "a single {} image of about {} bytes",
                    request.image.mime_type().trim_start_matches("image/"),
                    request.image.byte_len()
                ),
                "emotions" => "quiet curiosity".to_string(),
                "themes" => "attention and stillness".to_string(),
                "poem" => dryrun_poem(&analysis),
                other => format!("dryrun {}", other),
            };
            output.insert(field.name.to_string(), Value::String(text));
        }
        Ok(Value::Object(output))
    }
}

fn dryrun_poem(analysis: &Map<String, Value>) -> String {
    let field = |key: &str, fallback: &str| {
        analysis
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(fallback)
            .to_string()
    };
    format!(
        "Within the frame: {},\na held breath of {},\nspeaking softly of {}.",
        field("elements", "light on an unseen scene"),
        field("emotions", "wonder"),
        field("themes", "what the eye keeps"),
    )
}
