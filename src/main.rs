//! track-atlas - Main Entry Point

use clap::Parser;
use track_atlas::cli::{cmd_build, cmd_inspect, BuildArgs, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "track_atlas=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Build(args)) => {
            cmd_build(&args)?;
        }
        Some(Commands::Inspect { input, config }) => {
            cmd_inspect(input.as_deref(), config.as_deref())?;
        }
        None => {
            cmd_build(&BuildArgs::default())?;
        }
    }

    Ok(())
}
