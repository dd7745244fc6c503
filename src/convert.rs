//! convert command: turn a saved HTML page into Markdown

use crate::config::HeadingStyle;
use crate::markdown::MarkdownConverter;
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio::fs;

#[derive(Args)]
pub struct ConvertArgs {
    /// HTML file to convert
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Page URL, used for the title when the page has none
    #[arg(long)]
    url: Option<String>,

    /// Heading style of the generated Markdown
    #[arg(long, value_enum)]
    heading_style: Option<HeadingStyle>,

    /// Keep navigation, header, and footer regions in the output
    #[arg(long)]
    keep_navigation: bool,

    /// Rewrite links to their plain text
    #[arg(long)]
    strip_links: bool,
}

/// Run the convert command
pub async fn run_convert(args: ConvertArgs) -> Result<()> {
    let html = fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read file: {}", args.file.display()))?;

    let converter = MarkdownConverter::new(args.heading_style.unwrap_or_default(), !args.keep_navigation)
        .with_link_stripping(args.strip_links);
    let conversion = converter.convert_page(&html, args.url.as_deref());

    if !conversion.success {
        eprintln!(
            "Conversion failed: {}",
            conversion.reason.as_deref().unwrap_or("unknown error")
        );
        std::process::exit(1);
    }

    if !conversion.title.is_empty() {
        eprintln!("Title: {}", conversion.title);
    }
    println!("{}", conversion.content.trim_end());
    Ok(())
}
