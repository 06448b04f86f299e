//! Output formatting module

use poet_types::{AnalysisResult, OutputFormat, Result};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ComposeOutput<'a> {
    file_name: &'a str,
    poem: &'a str,
}

pub fn output_poem(output_format: OutputFormat, file_name: &str, poem: &str) -> Result<()> {
    match output_format {
        OutputFormat::Json => {
            let content = serde_json::to_string_pretty(&ComposeOutput { file_name, poem })?;
            println!("{}", content);
        }
        OutputFormat::Text => {
            println!("{}", poem);
        }
    }
    Ok(())
}

pub fn output_analysis(output_format: OutputFormat, result: &AnalysisResult) -> Result<()> {
    if output_format == OutputFormat::Json {
        let content = serde_json::to_string_pretty(result)?;
        println!("{}", content);
        return Ok(());
    }

    println!("\nPhoto Analysis");
    println!("==============");
    println!("\nElements:");
    println!("{}", result.elements);
    println!("\nEmotions:");
    println!("{}", result.emotions);
    println!("\nThemes:");
    println!("{}", result.themes);
    Ok(())
}
