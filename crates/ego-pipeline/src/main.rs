//! egoworld pipeline binary.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ego_models::load_config;
use ego_operators::FallbackSceneDetector;
use ego_pipeline::{
    build_manifests, discover_videos, run_pipeline, write_manifest, FfprobeProber, PipelineResult,
};

#[derive(Parser)]
#[command(name = "egoworld", about = "Offline video-clip perception pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Probe videos and emit video/clip manifests
    MakeManifest {
        /// Pipeline config file (JSON/YAML/TOML)
        #[arg(long)]
        config: PathBuf,
        /// Directory scanned for videos
        #[arg(long)]
        input_dir: PathBuf,
        /// Glob pattern relative to the input directory
        #[arg(long, default_value = "**/*.mp4")]
        glob: String,
        /// Directory receiving the manifest files
        #[arg(long)]
        output_dir: PathBuf,
        /// Dataset split tag stamped on every video row
        #[arg(long, default_value = "train")]
        split: String,
    },
    /// Execute the pipeline over existing manifests
    Run {
        /// Pipeline config file (JSON/YAML/TOML)
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        video_manifest: PathBuf,
        #[arg(long)]
        clip_manifest: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("egoworld=info".parse().expect("static directive"))
                .add_directive("ego_pipeline=info".parse().expect("static directive")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::MakeManifest {
            config,
            input_dir,
            glob,
            output_dir,
            split,
        } => make_manifest(config, input_dir, glob, output_dir, split).await,
        Command::Run {
            config,
            video_manifest,
            clip_manifest,
        } => run(config, video_manifest, clip_manifest).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn make_manifest(
    config: PathBuf,
    input_dir: PathBuf,
    glob: String,
    output_dir: PathBuf,
    split: String,
) -> PipelineResult<()> {
    let config = load_config(&config)?;
    let videos = discover_videos(&input_dir, &glob)?;
    info!(count = videos.len(), "discovered videos");

    let detector = FallbackSceneDetector::new(config.scenedetect.clone());
    let (video_rows, clip_rows) = build_manifests(
        &videos,
        &split,
        &config.scenedetect,
        &FfprobeProber,
        &detector,
    )
    .await?;

    std::fs::create_dir_all(&output_dir)?;
    write_manifest(&output_dir.join("video_manifest.jsonl"), &video_rows)?;
    write_manifest(&output_dir.join("clip_manifest.jsonl"), &clip_rows)?;
    info!(
        videos = video_rows.len(),
        clips = clip_rows.len(),
        output_dir = %output_dir.display(),
        "manifests written"
    );
    Ok(())
}

async fn run(
    config: PathBuf,
    video_manifest: PathBuf,
    clip_manifest: PathBuf,
) -> PipelineResult<()> {
    let config = load_config(&config)?;
    let summary = run_pipeline(config, &video_manifest, &clip_manifest).await?;
    // Individual clip failures are recorded in the state store and the
    // dead-letter log; they do not fail the process.
    info!(
        run_id = %summary.run_id,
        admitted = summary.admitted,
        skipped_done = summary.skipped_done,
        done = summary.done,
        failed = summary.failed,
        "run complete"
    );
    Ok(())
}
