use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tracing::info;
use tradesign_client::Client;

/// Print the next nonce the venue expects for an account's API key.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Venue base URL.
    #[arg(long)]
    url: String,

    #[arg(long)]
    account_index: i64,

    #[arg(long)]
    api_key_index: u8,

    /// Request timeout in milliseconds.
    #[arg(long, default_value_t = 10_000)]
    timeout_ms: u64,

    /// Log level for tracing.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = args
        .log_level
        .parse::<tracing::Level>()
        .with_context(|| format!("invalid log level: {}", args.log_level))?;
    tracing_subscriber::fmt().with_max_level(log_level).init();

    let client = Client::new(&args.url, Duration::from_millis(args.timeout_ms))
        .context("failed to create client")?;
    info!(url = %client.base_url(), account_index = args.account_index, "fetching next nonce");
    let nonce = client
        .next_nonce(args.account_index, args.api_key_index)
        .context("failed to fetch next nonce")?;
    println!("{nonce}");
    Ok(())
}
