//! `confluence-cleaner`: convert a Confluence page's HTML to Markdown.
//!
//! Reads HTML from a file (or stdin), writes Markdown to a file (or stdout).
//! Logs go to stderr so they never mix with piped output.

use anyhow::{Context, Result};
use clap::Parser;
use confluence_cleaner::{
    CleanerOptions, calculate_token_reduction, clean_confluence_html_async,
    format_token_reduction,
};
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input HTML file (reads stdin when omitted or `-`)
    input: Option<PathBuf>,

    /// Output Markdown file (writes stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Keep class, style and data-* attributes
    #[arg(long)]
    keep_metadata: bool,

    /// Leave Confluence macros and layout markup unexpanded
    #[arg(long)]
    no_macros: bool,

    /// Keep tables as HTML instead of converting them to Markdown
    #[arg(long)]
    no_tables: bool,

    /// Print the estimated token reduction to stderr
    #[arg(long)]
    stats: bool,

    /// Log level (off, error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Args {
    fn options(&self) -> CleanerOptions {
        CleanerOptions::new()
            .with_remove_metadata(!self.keep_metadata)
            .with_expand_macros(!self.no_macros)
            .with_convert_tables(!self.no_tables)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&args.log_level))
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    tracing::debug!(?args, "Parsed arguments");

    let html = read_input(args.input.as_ref()).await?;
    let markdown = clean_confluence_html_async(html.clone(), args.options()).await;
    write_output(args.output.as_ref(), &markdown).await?;

    if args.stats {
        eprintln!(
            "{}",
            format_token_reduction(calculate_token_reduction(&html, &markdown))
        );
    }

    Ok(())
}

async fn read_input(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) if path.as_os_str() != "-" => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display())),
        _ => {
            let mut html = String::new();
            tokio::io::stdin()
                .read_to_string(&mut html)
                .await
                .context("Failed to read HTML from stdin")?;
            Ok(html)
        }
    }
}

async fn write_output(path: Option<&PathBuf>, markdown: &str) -> Result<()> {
    match path {
        Some(path) => tokio::fs::write(path, markdown)
            .await
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(markdown.as_bytes()).await?;
            if !markdown.ends_with('\n') {
                stdout.write_all(b"\n").await?;
            }
            stdout.flush().await.context("Failed to write Markdown to stdout")
        }
    }
}
