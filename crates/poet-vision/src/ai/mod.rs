//! Generative backends and the prompts sent to them

pub mod backend;
pub mod dryrun;
pub mod gemini;
pub mod prompts;
