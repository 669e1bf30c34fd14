//! Campaign Studio — generate ad creative variants from a product image.
//!
//! Runs one upload → generate → review pass and prints the resulting gallery
//! as JSON. Selected variants are saved to the download directory.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use campaign_core::config::AppConfig;
use campaign_core::event_bus::tracing_sink;
use campaign_core::{CampaignGoal, RegenerationPolicy};
use campaign_creative::gallery::recommendations;
use campaign_creative::{
    CreativeSession, DryRunClient, HttpGenerationClient, ImageGenerationClient, ImageSource,
    SessionSettings, SubmitOutcome,
};
use clap::Parser;
use serde_json::json;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "campaign-studio")]
#[command(about = "AI creative asset generation for ad campaigns")]
#[command(version)]
struct Cli {
    /// Product image to generate variants from
    #[arg(long)]
    image: PathBuf,

    /// Campaign goal: awareness, engagement, conversion, retention, lead
    #[arg(long)]
    goal: Option<String>,

    /// Generate placeholder variants locally instead of calling the service
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Generation service base URL (overrides config)
    #[arg(long, env = "CAMPAIGN_STUDIO__GENERATION__BASE_URL")]
    base_url: Option<String>,

    /// Variants per batch (overrides config)
    #[arg(long, env = "CAMPAIGN_STUDIO__CREATIVE__VARIANT_COUNT")]
    variants: Option<u32>,

    /// Transformation strength in [0, 1] (overrides config)
    #[arg(long, env = "CAMPAIGN_STUDIO__CREATIVE__STRENGTH")]
    strength: Option<f32>,

    /// Number of extra regeneration rounds after the first batch
    #[arg(long, default_value_t = 0)]
    regenerate: u32,

    /// Keep earlier batches when regenerating
    #[arg(long, default_value_t = false)]
    append: bool,

    /// 1-based gallery positions to select and download
    #[arg(long, value_delimiter = ',')]
    select: Vec<usize>,

    /// Directory for downloaded variants (overrides config)
    #[arg(long, env = "CAMPAIGN_STUDIO__CREATIVE__DOWNLOAD_DIR")]
    download_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campaign_studio=info,campaign_creative=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if let Some(base_url) = cli.base_url {
        config.generation.base_url = base_url;
    }
    if let Some(count) = cli.variants {
        config.creative.variant_count = count;
    }
    if let Some(strength) = cli.strength {
        config.creative.strength = strength;
    }
    if cli.append {
        config.creative.regeneration = RegenerationPolicy::Append;
    }
    config.validate()?;
    let download_dir = cli
        .download_dir
        .unwrap_or_else(|| PathBuf::from(&config.creative.download_dir));

    if let Some(goal) = cli.goal.as_deref() {
        if CampaignGoal::parse(goal).is_none() && !goal.trim().is_empty() {
            warn!(goal, "Unknown campaign goal, using the generic prompt");
        }
    }

    info!(
        studio_id = %config.studio_id,
        base_url = %config.generation.base_url,
        variants = config.creative.variant_count,
        strength = config.creative.strength,
        dry_run = cli.dry_run,
        "Configuration loaded"
    );

    let client: Arc<dyn ImageGenerationClient> = if cli.dry_run {
        Arc::new(DryRunClient::new(Duration::from_millis(250)))
    } else {
        Arc::new(HttpGenerationClient::new(&config.generation)?)
    };

    let session = CreativeSession::new(
        client,
        tracing_sink(),
        SessionSettings::from(&config.creative),
    );

    let source = ImageSource::from_path(&cli.image)
        .await
        .with_context(|| format!("reading {}", cli.image.display()))?;
    session.set_image(source)?;

    let goal = cli.goal.as_deref();
    let mut outcome = session.submit(goal).await?;
    for _ in 0..cli.regenerate {
        if let SubmitOutcome::Failed { .. } = outcome {
            break;
        }
        outcome = session.regenerate(goal).await?;
    }

    if let SubmitOutcome::Failed { detail, .. } = &outcome {
        anyhow::bail!("generation failed: {detail}");
    }

    let gallery = session.variants();
    let (indices, missing) = selection_indices(&cli.select, gallery.len());
    for position in missing {
        warn!(position, "No variant at that position");
    }
    for idx in indices {
        session.toggle_select(&gallery[idx].id)?;
    }

    let mut downloads = Vec::new();
    for id in session.selected() {
        let path = session.download(&id, &download_dir).await?;
        downloads.push(path.display().to_string());
    }

    let selected = session.selected();
    let variants: Vec<_> = gallery
        .iter()
        .map(|v| {
            json!({
                "id": v.id.to_string(),
                "title": v.title(),
                "kind": v.kind,
                "score": v.score,
                "selected": selected.contains(&v.id),
            })
        })
        .collect();

    let report = json!({
        "job": session.snapshot(),
        "variants": variants,
        "downloads": downloads,
        "recommendations": recommendations(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

/// Zero-based gallery indices for the 1-based `positions`, each at most once
/// and in first-seen order. Positions outside the gallery are returned
/// separately.
fn selection_indices(positions: &[usize], len: usize) -> (Vec<usize>, Vec<usize>) {
    let mut indices = Vec::new();
    let mut missing = Vec::new();
    for &position in positions {
        match position.checked_sub(1).filter(|idx| *idx < len) {
            Some(idx) if !indices.contains(&idx) => indices.push(idx),
            Some(_) => {}
            None => missing.push(position),
        }
    }
    (indices, missing)
}
