use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use ho_domain::config::LoggingConfig;
use ho_gateway::cli::{Cli, Command, ConfigCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to the console when no subcommand is given.
        None => {
            let (config, _) = ho_gateway::cli::load_config()?;
            init_tracing(&config.logging);
            ho_gateway::cli::chat::chat(Arc::new(config), None).await
        }
        Some(Command::Chat { user }) => {
            let (config, _) = ho_gateway::cli::load_config()?;
            init_tracing(&config.logging);
            ho_gateway::cli::chat::chat(Arc::new(config), user).await
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = ho_gateway::cli::load_config()?;
            let valid = ho_gateway::cli::config::validate(&config, &config_path);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _) = ho_gateway::cli::load_config()?;
            ho_gateway::cli::config::show(&config)
        }
        Some(Command::Version) => {
            println!("homeops {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Logs go to stderr so the console output on stdout stays readable.
/// `RUST_LOG` overrides the configured filter.
fn init_tracing(logging: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));

    let registry = tracing_subscriber::registry().with(env_filter);
    if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
