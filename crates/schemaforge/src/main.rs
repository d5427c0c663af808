use anyhow::Result;
use clap::Parser;

use schemaforge::cli::{Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "schemaforge=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    dispatch(cli.command)
}

fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Classify { paths } => schemaforge::cli::classify::run(&paths),
        Commands::Merge { paths, output } => schemaforge::cli::merge::run(&paths, output.as_deref()),
        Commands::Import {
            paths,
            output,
            config,
        } => schemaforge::cli::import::run(&paths, output.as_deref(), config.as_deref()),
        Commands::Id => schemaforge::cli::id::run(),
    }
}
