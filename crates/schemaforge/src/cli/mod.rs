pub mod classify;
pub mod id;
pub mod import;
pub mod merge;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "sforge",
    about = "Build connector schemas from SCIM, SOAP, and arbitrary documents",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print which processing path a batch of files would take
    Classify {
        /// Files in the batch
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Merge canonical schema documents into one
    Merge {
        /// Schema documents, each an object or an array of objects
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Write the merged schema here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Classify, convert or extract, and merge a batch of files
    Import {
        /// Files in the batch
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Write the schema here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Config file (defaults to the user config directory)
        #[arg(long, env = "SCHEMAFORGE_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Print a fresh correlation ID
    Id,
}

/// Writes `text` to `output`, or stdout when none is given.
pub fn emit(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, format!("{text}\n"))
                .with_context(|| format!("cannot write {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}
