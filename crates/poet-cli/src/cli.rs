//! CLI definition using clap

use clap::{Parser, Subcommand};
use poet_types::OutputFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "photo-poet")]
#[command(author = "yuuji")]
#[command(version)]
#[command(about = "Compose a short poem from a photograph")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Generative backend to use (gemini, dryrun)
    #[arg(long, global = true)]
    pub backend: Option<String>,

    /// Model name override
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Output format (text, json). Uses config value if not specified.
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compose a poem from a photo
    Compose {
        /// Path to image file
        image: PathBuf,

        /// Print the clipboard text instead of the bare poem
        #[arg(long)]
        copy_text: bool,

        /// Save the photo into this directory after a successful poem
        #[arg(long)]
        download: Option<PathBuf>,
    },

    /// Describe a photo's elements, emotions and themes
    Analyze {
        /// Path to image file
        image: PathBuf,
    },

    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Set backend (gemini, dryrun)
        #[arg(long)]
        set_backend: Option<String>,

        /// Set model name
        #[arg(long)]
        set_model: Option<String>,

        /// Set analysis tool calls allowed per poem
        #[arg(long)]
        set_tool_calls: Option<usize>,

        /// Set default output format
        #[arg(long)]
        set_output: Option<OutputFormat>,

        /// Reset configuration to defaults
        #[arg(long)]
        reset: bool,
    },
}
