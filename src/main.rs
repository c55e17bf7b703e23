//! lumiscan - batch nameplate recognition
//!
//! Reads photos (or folders of photos, one folder per fixture), analyses the
//! best photo of each group and prints one JSON line per group.

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::RwLock;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use lumiscan::advisor::OllamaAdvisor;
use lumiscan::batch::AnalysisRunner;
use lumiscan::capture::group_paths;
use lumiscan::config::{self, AppConfig};
use lumiscan::ocr::TesseractFactory;
use lumiscan::{
    ConsensusEngine, FeatureExtractor, JobScheduler, KnowledgeBase, OcrPool, ProcessingJob, RawImage,
    ReviewStatus, TrainingExample,
};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp", "tif", "tiff"];

/// lumiscan - luminaire nameplate recognition
#[derive(Parser, Debug)]
#[command(name = "lumiscan")]
#[command(about = "Identify luminaire model and rated power from field photos")]
struct Args {
    /// Photos, or folders containing the photos of one fixture each
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// JSON file with confirmed training examples
    #[arg(short, long)]
    training: Option<PathBuf>,

    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Consult the vision-model advisor even if disabled in the config
    #[arg(long)]
    advisor: bool,

    /// Maximum number of groups analysed at once
    #[arg(long)]
    max_jobs: Option<usize>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays machine-readable
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = config::load_or_create_config(args.config.as_deref())?;
    if args.advisor {
        config.advisor.enabled = true;
    }
    if let Some(max_jobs) = args.max_jobs {
        config.scheduler.max_concurrent_jobs = max_jobs;
    }
    config.validate()?;

    let examples = match &args.training {
        Some(path) => load_training_examples(path)?,
        None => Vec::new(),
    };
    info!("{} training examples loaded", examples.len());

    let jobs = collect_jobs(&args.paths).await?;
    if jobs.is_empty() {
        warn!("No photos found");
        return Ok(());
    }

    let engine = Arc::new(build_engine(&config)?);
    let examples = Arc::new(RwLock::new(examples));
    let (scheduler, mut outcomes) = JobScheduler::new(
        config.scheduler.max_concurrent_jobs,
        AnalysisRunner::new(engine, examples),
    );

    let total = jobs.len();
    info!("Analysing {} groups", total);
    scheduler.enqueue_all(jobs);

    let threshold = config.review.confidence_threshold;
    let mut pending = 0usize;

    for _ in 0..total {
        let Some(outcome) = outcomes.recv().await else {
            break;
        };

        let status = outcome.result.review_status(threshold);
        if status == ReviewStatus::PendingReview {
            pending += 1;
        }

        let line = json!({
            "group": outcome.group_id,
            "image": outcome.image_name,
            "status": status,
            "reasoning": outcome.result.reasoning_text(),
            "result": outcome.result,
        });
        println!("{}", line);
    }

    scheduler.wait_idle().await;
    info!(
        "Done: {} of {} groups processed, {} pending review",
        scheduler.processed(),
        total,
        pending
    );

    Ok(())
}

/// Wire the OCR pool, knowledge base and optional advisor together
fn build_engine(config: &AppConfig) -> Result<ConsensusEngine> {
    let pool = OcrPool::new(
        config.ocr.pool_size(),
        TesseractFactory::new(config.ocr.tesseract.clone()),
    )?;

    let engine = ConsensusEngine::new(
        FeatureExtractor::with_config(config.vision.clone()),
        Arc::new(pool),
        KnowledgeBase::new(),
    );

    if !config.advisor.enabled {
        return Ok(engine);
    }

    let advisor = OllamaAdvisor::new(&config.advisor).context("Failed to create advisor client")?;
    info!(
        "Advisor enabled: {} at {}",
        config.advisor.model, config.advisor.host
    );
    Ok(engine.with_advisor(
        Arc::new(advisor),
        Duration::from_secs(config.advisor.timeout_secs),
    ))
}

fn load_training_examples(path: &Path) -> Result<Vec<TrainingExample>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read training file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse training file {}", path.display()))
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Expand folders, group photos per fixture and read them
async fn collect_jobs(paths: &[PathBuf]) -> Result<Vec<ProcessingJob>> {
    let mut entries = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut files = Vec::new();
            let mut dir = tokio::fs::read_dir(path)
                .await
                .with_context(|| format!("Failed to list {}", path.display()))?;
            while let Some(entry) = dir.next_entry().await? {
                let file = entry.path();
                if file.is_file() && is_image(&file) {
                    files.push(file);
                }
            }
            files.sort();
            entries.extend(files.into_iter().map(|file| (file, true)));
        } else if is_image(path) {
            entries.push((path.clone(), false));
        } else {
            warn!("Skipping {}: not an image", path.display());
        }
    }

    let mut jobs = Vec::new();
    for (group_id, files) in group_paths(&entries) {
        let mut images = Vec::with_capacity(files.len());
        for file in files {
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            images.push(RawImage::new(name, data));
        }
        jobs.push(ProcessingJob::new(group_id, images));
    }

    Ok(jobs)
}
