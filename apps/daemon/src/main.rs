//! chordsync daemon — scheduled song-record ingestion pipeline.
//!
//! Acquires records from a chords site, deduplicates their assets by content
//! hash into object storage, and streams normalized records to a downstream
//! consumer.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
