//! Prompt templates for photo analysis and poem composition

use poet_types::Schema;

/// Soft upper bound on poem length, stated to the model but not enforced
pub const MAX_POEM_LINES: usize = 10;

/// Build the analysis prompt.
///
/// The photo travels as an inline image part next to this text.
pub fn build_analysis_prompt() -> String {
    r#"You are an AI expert in analyzing photos. Please analyze the photo provided to identify the key elements, emotions, and themes present in the photo.

Photo: (attached image)

Elements: What are the key objects, people, or scenes in the photo?
Emotions: What emotions does the photo evoke?
Themes: What are the overall themes or messages conveyed by the photo?

Please provide a detailed analysis of the photo, including the elements, emotions, and themes. Focus only on the photo itself, do not attempt to access any external websites or data."#
        .to_string()
}

/// Build the composition prompt.
///
/// `tool_name` is the analysis tool offered to the model, if any. When
/// absent the model is asked to work from the photo alone.
pub fn build_compose_prompt(tool_name: Option<&str>, attached_ref: &str) -> String {
    let mut prompt = String::from(
        "You are a poet laureate, skilled in crafting evocative poems.\n\n",
    );

    match tool_name {
        Some(name) => {
            prompt.push_str(&format!(
                "First, use the {name} tool to analyze the photo. Pass \"{attached_ref}\" as photoDataUri to refer to the attached photo. \
The tool will return an object containing 'elements', 'emotions', and 'themes' from the photo.\n\n\
Then, compose a poem inspired by the analysis of the photo. The poem should capture the key elements, emotions, and themes identified in the analysis."
            ));
        }
        None => {
            prompt.push_str(
                "Look closely at the photo and note its key elements, the emotions it evokes, and its themes.\n\n\
Then, compose a poem inspired by what you found. The poem should capture those elements, emotions, and themes.",
            );
        }
    }

    prompt.push_str(&format!(
        " The poem should be no more than {} lines.\n\nPhoto: (attached image)",
        MAX_POEM_LINES
    ));
    prompt
}

/// Output instructions for backends that cannot combine tools with a
/// native response schema
pub fn build_schema_instructions(schema: &Schema) -> String {
    let mut text = String::from(
        "\n\nWhen you are finished, respond with only a JSON object (no markdown) with these string fields:\n",
    );
    for field in schema.fields {
        text.push_str(&format!("- \"{}\": {}\n", field.name, field.description));
    }
    text
}
