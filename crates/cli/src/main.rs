use clap::Parser;
use preface_cli::commands::{Cmd, Command};

/// Preface CLI
///
/// Preface splices a prelude in front of a compiled contract's runtime code and repairs every
/// jump target and CODECOPY offset the splice shifts.
#[derive(Parser)]
#[command(name = "preface")]
#[command(about = "Preface: EVM runtime prelude injector")]
struct Cli {
    /// Log per-step and per-patch detail.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Cmd,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_ansi(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    cli.command.execute().await
}
