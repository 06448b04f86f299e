//! Command handlers

use crate::cli::{Cli, Commands};
use crate::output::{output_analysis, output_poem};
use poet_app::app::PoemService;
use poet_app::config::Config;
use poet_app::intake::{IntakeController, Notice, Phase};
use poet_app::scanner::{check_file, read_selection, FileSelection};
use poet_app::share::ShareBundle;
use poet_types::{Error, OutputFormat, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

pub async fn execute(cli: Cli) -> Result<()> {
    let config = Config::load()?
        .with_backend(cli.backend.clone())
        .with_model(cli.model.clone());
    let output_format = cli.format.unwrap_or(config.output_format);

    match cli.command {
        Commands::Compose {
            image,
            copy_text,
            download,
        } => cmd_compose(&config, output_format, &image, copy_text, download).await,
        Commands::Analyze { image } => cmd_analyze(&config, output_format, &image).await,
        Commands::Config {
            show,
            set_backend,
            set_model,
            set_tool_calls,
            set_output,
            reset,
        } => cmd_config(show, set_backend, set_model, set_tool_calls, set_output, reset),
    }
}

fn log_notice(notice: &Notice) {
    if notice.is_error() {
        warn!(title = %notice.title, "{}", notice.description);
    } else {
        info!(title = %notice.title, "{}", notice.description);
    }
}

async fn cmd_compose(
    config: &Config,
    output_format: OutputFormat,
    image: &Path,
    copy_text: bool,
    download: Option<PathBuf>,
) -> Result<()> {
    let start = Instant::now();
    let service = PoemService::from_config(config)?;
    let mut intake = IntakeController::new(service.composer(), config.max_upload_bytes)
        .with_notice_callback(Box::new(log_notice));

    intake.select_file(FileSelection::from_path(image)?)?;
    intake.settle().await;
    if intake.phase() != Phase::Ready {
        let reason = intake.upload_error().unwrap_or("Failed to read file.");
        return Err(Error::generation(reason.to_string()));
    }

    intake.trigger_generation()?;
    intake.settle().await;
    if let Some(message) = intake.state().error.clone() {
        return Err(Error::generation(message));
    }

    let bundle = ShareBundle::from_state(intake.state())
        .ok_or_else(|| Error::generation("no poem was produced"))?;
    info!(elapsed_ms = start.elapsed().as_millis() as u64, "compose finished");

    if copy_text {
        println!("{}", bundle.clipboard_text());
    } else {
        output_poem(output_format, &bundle.file_name, &bundle.poem)?;
    }

    if let Some(dir) = download {
        let path = bundle.save_photo(&dir)?;
        eprintln!("Saved photo to {}", path.display());
    }

    Ok(())
}

async fn cmd_analyze(config: &Config, output_format: OutputFormat, image: &Path) -> Result<()> {
    let file = FileSelection::from_path(image)?;
    check_file(&file, config.max_upload_bytes)?;
    let photo = read_selection(&file, config.max_upload_bytes).await?;

    let service = PoemService::from_config(config)?;
    let result = service.analyze(&photo).await?;
    output_analysis(output_format, &result)
}

fn cmd_config(
    show: bool,
    set_backend: Option<String>,
    set_model: Option<String>,
    set_tool_calls: Option<usize>,
    set_output: Option<OutputFormat>,
    reset: bool,
) -> Result<()> {
    if reset {
        let config = Config::default();
        config.save()?;
        println!("Configuration reset to defaults");
        println!("\n{}", config);
        return Ok(());
    }

    let mut config = Config::load()?;
    let mut modified = false;

    if set_backend.is_some() {
        config = config.with_backend(set_backend);
        modified = true;
    }

    if set_model.is_some() {
        config = config.with_model(set_model);
        modified = true;
    }

    if let Some(limit) = set_tool_calls {
        config.tool_call_limit = limit;
        modified = true;
    }

    if let Some(output_format) = set_output {
        config.output_format = output_format;
        modified = true;
    }

    if modified {
        config.save()?;
        println!("Configuration saved");
    }

    if show || !modified {
        println!("{}", config);
    }

    Ok(())
}
