//! Bharat AI - chat assistant server and client
//!
#![doc = "Main entry point for the Bharat AI application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bharat_ai::cli::{Cli, Commands};
use bharat_ai::commands;
use bharat_ai::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose, cli.json_logs);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Serve { bind } => {
            tracing::info!("Starting chat API server");
            commands::serve::run_serve(config, bind).await
        }
        Commands::Chat { resume, message } => {
            if let Some(r) = &resume {
                tracing::debug!("Resuming conversation: {}", r);
            }
            commands::chat::run_chat(config, resume, message).await
        }
        Commands::History { command } => commands::history::handle_history(&config, command),
        Commands::Title { message } => commands::provider::run_title(&config, &message).await,
        Commands::Analyze { image, prompt } => {
            tracing::debug!("Analyzing image: {}", image.display());
            commands::provider::run_analyze(&config, &image, prompt.as_deref()).await
        }
        Commands::WatchUpdates {
            script_url,
            interval,
        } => commands::updates::run_watch_updates(&config, script_url, interval).await,
        Commands::PushPreview { payload } => commands::updates::run_push_preview(payload).await,
    }
}

/// Logs go to stderr so command output on stdout stays machine-readable
fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose {
        "bharat_ai=debug,bharat=debug"
    } else {
        "bharat_ai=info,bharat=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
