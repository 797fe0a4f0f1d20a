mod commands;
mod prompt;
mod session;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::chat::ChatArgs;
use commands::ingest::IngestArgs;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start an interactive chat with the store assistant
    #[command(about = "Start an interactive chat with the store assistant")]
    Chat(ChatArgs),

    /// Load question/answer pairs into the retrieval index
    #[command(about = "Load question/answer pairs into the retrieval index")]
    Ingest(IngestArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // logs go to stderr so they do not interleave with the chat
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Chat(args) => commands::chat::execute(args).await,
        Command::Ingest(args) => commands::ingest::execute(args).await,
    }
}
