//! Mission Forge Server
//!
//! Axum server exposing the mission pipeline over HTTP, plus one-shot CLI
//! modes for running a mission or parsing a saved final prompt.

mod api;
mod config;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use missionforge_core::state::ImageRef;
use missionforge_core::swarm::{Coordinator, PipelineRequest, RunOutcome};
use missionforge_core::tools::{audit_chunk_ids, parse_chunks, ParsedPromptChunk};
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::api::{build_router, AppState};
use crate::config::{load_env, PersistedConfig, CONFIG_DIR};

#[derive(Parser, Clone)]
#[command(author, version, about = "Mission Forge - repository + objective to coding-agent prompts")]
struct Args {
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Start the HTTP server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
    /// Run one mission and print the resulting prompts (no server)
    Run {
        /// GitHub URL or local directory
        repo: String,
        /// What the coding agent should accomplish
        objective: String,
        /// Errors from a previous attempt to feed back to the planners
        #[arg(long)]
        feedback: Option<String>,
        /// Screenshot or mockup to attach (repeatable)
        #[arg(long = "image", value_name = "PATH")]
        images: Vec<PathBuf>,
        /// Refinement feedback applied after the run, in order (repeatable)
        #[arg(long = "refine", value_name = "TEXT")]
        refinements: Vec<String>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Split a saved final prompt into chunks
    Parse {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

async fn load_image(path: &Path) -> anyhow::Result<ImageRef> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image {}", path.display()))?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    ImageRef::from_bytes(&bytes, mime.essence_str())
        .with_context(|| format!("Cannot attach {}", path.display()))
}

fn print_chunks(chunks: &[ParsedPromptChunk]) {
    for chunk in chunks {
        println!("━━━ PROMPT {}: {} ━━━", chunk.id, chunk.title);
        println!("{}", chunk.content);
        println!();
    }
    for issue in audit_chunk_ids(chunks) {
        tracing::warn!(?issue, "Chunk id anomaly");
    }
}

async fn run_mission(
    repo: String,
    objective: String,
    feedback: Option<String>,
    images: Vec<PathBuf>,
    refinements: Vec<String>,
    json: bool,
) -> anyhow::Result<()> {
    let config = PersistedConfig::load(Path::new(CONFIG_DIR)).await;
    let mut coordinator = Coordinator::new(config.to_coordinator_config());

    for path in &images {
        coordinator.attach_image(load_image(path).await?);
    }

    let mut request = PipelineRequest::new(repo, objective);
    request.error_feedback = feedback;

    match coordinator.execute_pipeline(request).await {
        RunOutcome::Completed => {}
        RunOutcome::Skipped => bail!("Both a repository and an objective are required"),
        RunOutcome::Failed => bail!(
            "{}",
            coordinator.state().error.clone().unwrap_or_default()
        ),
    }

    for feedback in refinements {
        if coordinator.execute_refinement(feedback).await == RunOutcome::Failed {
            bail!(
                "{}",
                coordinator.state().error.clone().unwrap_or_default()
            );
        }
    }

    let chunks = coordinator.state().chunks();
    if json {
        let output = serde_json::json!({
            "status": coordinator.status(),
            "final_prompt": coordinator.state().final_prompt,
            "chunks": chunks,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_chunks(&chunks);
    }
    Ok(())
}

async fn parse_file(file: PathBuf, json: bool) -> anyhow::Result<()> {
    let text = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let chunks = parse_chunks(&text);
    if json {
        println!("{}", serde_json::to_string_pretty(&chunks)?);
    } else {
        print_chunks(&chunks);
    }
    Ok(())
}

async fn run_server(port: u16) -> anyhow::Result<()> {
    let config_dir = PathBuf::from(CONFIG_DIR);
    let config = PersistedConfig::load(&config_dir).await;
    let state = AppState::new(Coordinator::new(config.to_coordinator_config()), config_dir);
    let app = build_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    println!("🚀 Mission Forge Server running at http://{}", addr);
    println!("   API v1 Routes:");
    println!("   Mission:   /api/v1/mission/status, /start, /refine, /chunks, /files, /events");
    println!("   Images:    /api/v1/images (GET, POST), /api/v1/images/:index (DELETE)");
    println!("   Config:    /api/v1/config (GET, PATCH)");
    println!("   Providers: /api/v1/providers (GET)");
    println!("   OpenAPI:   /api/v1/openapi.json");

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    load_env(Path::new(CONFIG_DIR));

    let args = Args::parse();
    match args.command {
        None => run_server(8080).await,
        Some(CliCommand::Serve { port }) => run_server(port).await,
        Some(CliCommand::Run {
            repo,
            objective,
            feedback,
            images,
            refinements,
            json,
        }) => run_mission(repo, objective, feedback, images, refinements, json).await,
        Some(CliCommand::Parse { file, json }) => parse_file(file, json).await,
    }
}
