//! Trackroom CLI: trigger preview jobs and re-run processing for songs missing media.
//!
//! Set TRACKROOM_API_URL and SERVICE_SECRET.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use trackroom_cli::{init_tracing, ApiClient};

#[derive(Parser)]
#[command(name = "trackroom", about = "Trackroom preview service CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the preview job for an object already in storage
    Trigger {
        /// Object name, `<song_id>/<file>`
        #[arg(long)]
        name: String,
        /// Bucket holding the object
        #[arg(long, default_value = "audio-originals")]
        bucket: String,
    },
    /// Re-trigger every song missing a preview or waveform
    Retrofix,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let client = ApiClient::from_env().context("Failed to create API client")?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Trigger { name, bucket } => {
            let response = client.trigger(&bucket, &name).await?;
            print_json(&response)?;
        }
        Commands::Retrofix => {
            let response = client.retrofix().await?;
            print_json(&response)?;
        }
    }

    Ok(())
}
