use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use storyboard::api::gemini::{DEFAULT_IMAGE_MODEL, DEFAULT_TEXT_MODEL, GEMINI_API_BASE};
use storyboard::{
    export, AspectRatio, GeminiClient, GeminiConfig, Orchestrator, SceneStatus, Session, Style,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "storyboard")]
#[command(about = "Turn a script into an AI-illustrated storyboard", long_about = None)]
struct Args {
    /// Script text
    #[arg(short, long)]
    text: Option<String>,

    /// Script file path
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Visual style applied to every image
    #[arg(short, long, default_value = "Cinematic")]
    style: Style,

    /// Aspect ratio (16:9, 1:1, 9:16, 4:3, 3:4)
    #[arg(short, long, default_value = "16:9")]
    ratio: AspectRatio,

    /// Directory for storyboard.zip and single-scene images
    #[arg(short, long, default_value = "./output")]
    output_dir: PathBuf,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model used to split the script into scenes
    #[arg(long, default_value = DEFAULT_TEXT_MODEL)]
    text_model: String,

    /// Model used to render scene images
    #[arg(long, default_value = DEFAULT_IMAGE_MODEL)]
    image_model: String,

    /// Gemini API base URL
    #[arg(long, default_value = GEMINI_API_BASE)]
    api_base: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 300)]
    timeout_secs: u64,

    /// Regenerate scenes that failed, once
    #[arg(long)]
    retry_failed: bool,

    /// Also save each completed scene as scene_<n>.png
    #[arg(long)]
    save_scenes: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();

    // 加载环境变量
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // 获取 API key
    let api_key = args
        .api_key
        .clone()
        .or_else(|| std::env::var("API_KEY").ok())
        .context("GEMINI_API_KEY not found. Set it via --api-key or the GEMINI_API_KEY environment variable")?;

    // 获取输入文本
    let script = if let Some(text) = args.text.clone() {
        text
    } else if let Some(path) = &args.file {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read file: {}", path.display()))?
    } else {
        anyhow::bail!("Either --text or --file must be provided");
    };

    let config = GeminiConfig {
        api_key,
        api_base: args.api_base.clone(),
        text_model: args.text_model.clone(),
        image_model: args.image_model.clone(),
        timeout: Duration::from_secs(args.timeout_secs),
    };
    let client = Arc::new(GeminiClient::new(config)?);
    let orchestrator = Orchestrator::new(
        Session::new(args.style, args.ratio),
        client.clone(),
        client,
    );

    info!("Starting storyboard generation ({} characters)", script.len());
    if let Err(e) = run(&orchestrator, &script, &args).await {
        error!("Storyboard generation failed: {}", e);
        std::process::exit(1);
    }

    info!("Storyboard generation completed successfully!");
    Ok(())
}

async fn run(orchestrator: &Orchestrator, script: &str, args: &Args) -> anyhow::Result<()> {
    info!("Step 1/3: Analyzing script...");
    orchestrator
        .analyze_script(script)
        .await
        .context("Failed to analyze script. Please check your API key and try again")?;

    info!("Step 2/3: Generating images...");
    orchestrator.wait_idle().await;

    if args.retry_failed {
        let failed: Vec<_> = orchestrator
            .scenes()
            .iter()
            .filter(|scene| scene.status == SceneStatus::Error)
            .map(|scene| scene.id())
            .collect();
        if !failed.is_empty() {
            info!("Retrying {} failed scenes...", failed.len());
            for id in failed {
                orchestrator.trigger_generation(id);
            }
            orchestrator.wait_idle().await;
        }
    }

    let scenes = orchestrator.scenes();
    for (index, scene) in scenes.iter().enumerate() {
        match scene.status {
            SceneStatus::Completed => info!("Scene {}: {}", index + 1, scene.status.label()),
            _ => warn!(
                "Scene {}: {} {}",
                index + 1,
                scene.status.label(),
                scene.error.as_deref().unwrap_or_default()
            ),
        }
    }

    info!("Step 3/3: Exporting images...");
    if args.save_scenes {
        save_individual(&scenes, &args.output_dir).await?;
    }
    let archive = export::save_archive(&scenes, &args.output_dir).await?;
    info!("Storyboard written to {}", archive.display());
    Ok(())
}

async fn save_individual(scenes: &[storyboard::Scene], dir: &Path) -> anyhow::Result<()> {
    for (index, scene) in scenes.iter().enumerate().filter(|(_, s)| s.has_image()) {
        let path = export::save_scene_image(scene, index + 1, dir).await?;
        info!("Saved {}", path.display());
    }
    Ok(())
}
