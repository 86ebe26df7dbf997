//! compose-tabs: docker compose logs, one tab per service

use clap::Parser;
use color_eyre::Result;
use compose_tabs_core::Config;
use compose_tabs_tui::App;
use std::fs::File;
use tracing::Level;
use tracing_subscriber::{EnvFilter, prelude::*};

/// compose-tabs: follow docker compose logs with a tab per service
#[derive(Parser, Debug)]
#[command(name = "compose-tabs")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Compose project name (passed to `docker compose -p`)
    #[arg(short = 'p', long)]
    project_name: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize error handling
    color_eyre::install()?;

    let config = Config::from_env(cli.project_name)?;

    // Initialize logging to file (not stdout, which would corrupt TUI)
    let log_file = File::create(&config.log_file)?;
    let filter = EnvFilter::from_default_env().add_directive(Level::INFO.into());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(log_file)
                .with_ansi(false)
                .with_target(false),
        )
        .with(filter)
        .init();

    tracing::info!("Starting compose-tabs");
    if let Some(project) = &config.project {
        tracing::info!("Using project: {}", project);
    }

    // Run the TUI
    let mut app = App::new(config);
    app.run().await?;

    tracing::info!("Goodbye!");
    Ok(())
}
