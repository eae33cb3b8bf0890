//! turnscribe CLI - offline conversation export
//!
//! Takes a captured backend conversation record plus a rendered-view
//! snapshot and writes the Markdown document and both structured
//! transcripts to an output directory.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing::info;
use tracing_subscriber::EnvFilter;

use turnscribe_core::{ExportOptions, Exporter, StaticSnapshot, StaticToken};

mod local;

use local::{LocalFetcher, MapImageResolver};

#[derive(Parser, Debug)]
#[command(name = "turnscribe", about = "Export a captured conversation to Markdown and transcripts")]
struct Cli {
    /// Captured backend conversation JSON
    #[arg(long)]
    conversation: PathBuf,

    /// Rendered-view snapshot JSON (turn/message/image markers)
    #[arg(long)]
    view: PathBuf,

    /// Optional file-id to URL map for image resolution
    #[arg(long)]
    image_map: Option<PathBuf>,

    /// Output directory (default: ~/.turnscribe/exports)
    #[arg(long)]
    out: Option<PathBuf>,

    /// IANA timezone for display timestamps (default: system local)
    #[arg(long)]
    timezone: Option<String>,

    /// Enable debug logging
    #[arg(long, action = ArgAction::SetTrue)]
    debug: bool,
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(debug)
        .compact()
        .try_init();
}

fn default_output_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".turnscribe").join("exports"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let snapshot_data = fs::read_to_string(&cli.view)
        .with_context(|| format!("failed to read view snapshot {}", cli.view.display()))?;
    let snapshot: StaticSnapshot = serde_json::from_str(&snapshot_data)
        .with_context(|| format!("failed to parse view snapshot {}", cli.view.display()))?;

    let fetcher = LocalFetcher::from_path(&cli.conversation)?;
    let images = match cli.image_map.as_deref() {
        Some(path) => MapImageResolver::from_path(path)?,
        None => MapImageResolver::default(),
    };

    let exporter = Exporter::new(
        std::sync::Arc::new(StaticToken(Some("offline".to_string()))),
        std::sync::Arc::new(fetcher),
        std::sync::Arc::new(images),
        snapshot,
        ExportOptions {
            timezone: cli.timezone.clone(),
            ..Default::default()
        },
    )?;

    let result = exporter.export(None, false, false).await?;

    let out_dir = match cli.out {
        Some(dir) => dir,
        None => default_output_dir()?,
    };
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let stem = result
        .meta_data
        .permalink
        .rsplit('/')
        .next()
        .unwrap_or("conversation")
        .to_string();

    let md_path = out_dir.join(format!("{stem}.md"));
    fs::write(&md_path, &result.markdown)?;

    let full_path = out_dir.join(format!("{stem}.full.json"));
    fs::write(&full_path, serde_json::to_string_pretty(&result.full_transcript)?)?;

    let copy_path = out_dir.join(format!("{stem}.copy.json"));
    fs::write(&copy_path, serde_json::to_string_pretty(&result.copy_transcript)?)?;

    info!(
        turns = result.copy_transcript.len(),
        "export written to {}",
        out_dir.display()
    );
    println!(
        "Exported \"{}\" ({} turns) to {}",
        result.meta_data.title,
        result.copy_transcript.len(),
        out_dir.display()
    );

    Ok(())
}
