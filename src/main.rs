//! deepwiki2md CLI
//!
//! Scrapes DeepWiki libraries into Markdown files with headless Chrome.

use anyhow::Result;
use clap::{Parser, Subcommand};
use deepwiki2md::convert::{run_convert, ConvertArgs};
use deepwiki2md::scrape::{run_scrape, ScrapeArgs};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "deepwiki2md")]
#[command(version)]
#[command(about = "Scrape DeepWiki libraries into Markdown files")]
#[command(long_about = "Renders DeepWiki pages with headless Chrome (plain HTTP when no browser is found),\nfollows the navigation sidebar to every page of a library, and writes clean Markdown.\n\nCommands:\n  scrape    Scrape libraries into <output>/<library>/<title>.md\n  convert   Convert a saved HTML page to Markdown")]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape one or more DeepWiki libraries into Markdown files
    Scrape(ScrapeArgs),
    /// Convert a local HTML file to Markdown on stdout
    Convert(ConvertArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Scrape(args) => run_scrape(args).await,
        Commands::Convert(args) => run_convert(args).await,
    }
}

/// RUST_LOG, when set, wins over the flags. Logs go to stderr.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if quiet {
            EnvFilter::new("error")
        } else {
            match verbose {
                0 => EnvFilter::new("deepwiki2md=info,warn"),
                1 => EnvFilter::new("deepwiki2md=debug,info"),
                _ => EnvFilter::new("deepwiki2md=trace,debug"),
            }
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
