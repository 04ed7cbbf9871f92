//! Voice Tasks - record voice notes and manage the tasks extracted from them

mod app;
mod config;
mod editor;
mod recorder;
mod tasks;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "voice-tasks")]
#[command(about = "Record voice notes and manage the tasks extracted from them")]
#[command(version)]
struct Args {
    /// Backend base URL (overrides the config file)
    #[arg(short, long)]
    server: Option<String>,

    /// Path to the config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input device name
    #[arg(short, long)]
    device: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let log_file = args
        .log_file
        .as_ref()
        .map(|path| {
            File::create(path).with_context(|| format!("Cannot open log file {}", path.display()))
        })
        .transpose()?;
    let to_stderr = log_file.is_none();

    tracing_subscriber::registry()
        .with(log_file.map(|file| fmt::layer().with_writer(Mutex::new(file)).with_ansi(false)))
        .with(to_stderr.then(|| fmt::layer().with_writer(std::io::stderr)))
        .with(filter)
        .init();

    // Load configuration, writing defaults on first run
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(&config_path);
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            tracing::warn!("Could not write default config: {}", e);
        }
    }

    // Command line wins over the file
    if let Some(server) = args.server {
        config.server_url = server;
    }
    if let Some(device) = args.device {
        config.input_device = Some(device);
    }

    // Run the app
    let mut app = app::App::new(config)?;
    app.run().await
}
