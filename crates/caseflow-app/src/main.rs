mod cli;
mod commands;

use std::path::Path;

use anyhow::{Context, Result};
use cli::Command;
use commands::Services;

#[tokio::main]
async fn main() -> Result<()> {
    let command = match cli::parse_args(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(error) => {
            eprintln!("{error}");
            std::process::exit(2);
        }
    };
    if command == Command::Help {
        cli::print_usage();
        return Ok(());
    }

    let config = caseflow_config::load_from_env()?;
    init_logging(config.log_file().as_deref())?;
    let services = Services::from_config(&config)?;
    commands::run(&services, command).await
}

fn env_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let Some(log_path) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_writer(std::io::stderr)
            .init();
        return Ok(());
    };

    if let Some(parent) = log_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!(
                    "failed to create caseflow log directory '{}'",
                    parent.display()
                )
            })?;
        }
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("failed to open caseflow log file '{}'", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .init();
    Ok(())
}
