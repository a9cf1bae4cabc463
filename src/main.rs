use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use serde::Serialize;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use indigo_upload::cli::{Args, Commands};
use indigo_upload::config::{load_or_create_config, SftpConfig};
use indigo_upload::pipeline::{DeleteOutcome, Uploader};
use indigo_upload::response::ApiResponse;
use indigo_upload::UploadError;

fn main() -> Result<()> {
    // Parse arguments
    let args = Args::parse();

    // Initialize logging
    initialize_logging(args.verbose)?;

    if let Commands::InitConfig { path } = &args.command {
        info!("Creating configuration file at {}", path.display());
        SftpConfig::create_default_config_file(path)?;
        info!("Configuration created successfully");
        return Ok(());
    }

    let config = load_or_create_config(args.config.as_deref())?;
    let uploader = Uploader::from_config(&config).context("Invalid configuration")?;

    match &args.command {
        Commands::Store { file, path, name } => handle_store(&uploader, file, path, name.as_deref(), args.json),
        Commands::Fetch { relative_path, output } => {
            handle_fetch(&uploader, relative_path, output.as_deref(), args.json)
        }
        Commands::Delete { relative_path } => handle_delete(&uploader, relative_path, args.json),
        Commands::InitConfig { .. } => Ok(()),
    }
}

/// Initialize logging with the specified verbosity level
fn initialize_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .context("Failed to initialize logger")?;
    Ok(())
}

/// Print a JSON envelope, then turn a failed result into a process error
fn report<T: Serialize>(result: std::result::Result<T, UploadError>) -> Result<()> {
    let failure = result.as_ref().err().map(|e| e.to_string());
    let response = ApiResponse::from(result);
    println!(
        "{}",
        serde_json::to_string_pretty(&response).context("Failed to serialize response")?
    );
    match failure {
        Some(message) => Err(anyhow!(message)),
        None => Ok(()),
    }
}

fn handle_store(
    uploader: &Uploader,
    file: &Path,
    logical_path: &str,
    name: Option<&str>,
    json: bool,
) -> Result<()> {
    let result = match name {
        Some(name) => fs::File::open(file)
            .map_err(UploadError::from)
            .and_then(|content| uploader.store(content, logical_path, name)),
        None => uploader.store_file(file, logical_path),
    };

    if json {
        return report(result);
    }

    let stored = result.context(format!("Failed to store {}", file.display()))?;
    println!("{}", stored.relative_path);
    Ok(())
}

fn handle_fetch(uploader: &Uploader, relative_path: &str, output: Option<&Path>, json: bool) -> Result<()> {
    let result = uploader.fetch(relative_path);

    if json {
        return report(result.map(|bytes| bytes.map(|b| b.len())));
    }

    let bytes = result
        .context(format!("Failed to fetch {}", relative_path))?
        .ok_or_else(|| anyhow!("{} does not exist", relative_path))?;

    match output {
        Some(path) => {
            fs::write(path, &bytes).context(format!("Failed to write {}", path.display()))?;
            info!("Wrote {} bytes to {}", bytes.len(), path.display());
        }
        None => {
            std::io::stdout()
                .write_all(&bytes)
                .context("Failed to write to stdout")?;
        }
    }
    Ok(())
}

fn handle_delete(uploader: &Uploader, relative_path: &str, json: bool) -> Result<()> {
    let result = uploader.delete(relative_path);

    if json {
        return report(result);
    }

    match result.context(format!("Failed to delete {}", relative_path))? {
        DeleteOutcome::Deleted => {
            println!("deleted {}", relative_path);
            Ok(())
        }
        DeleteOutcome::NotFound => Err(anyhow!("{} does not exist", relative_path)),
    }
}
