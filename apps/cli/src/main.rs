//! Grimoire CLI: product catalog enrichment.
//!
//! Reads a product table, finds a sales page, an image and marketing copy
//! for every row, and writes the enriched catalog.

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
