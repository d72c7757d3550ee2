//! articlegen CLI: topic in, grounded Markdown article out.
//!
//! Researches the topic on Wikipedia, writes the article with the first
//! configured generative provider that answers, and checks its shape and
//! length before printing it.

mod commands;
mod progress;

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
