//! # HTTP API
//!
//! Axum routes over a single shared [`Coordinator`]. A running mission holds
//! the coordinator lock; reads go through the published snapshot instead.

pub mod mission;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use missionforge_core::models::LlmProvider;
use missionforge_core::state::MissionSnapshot;
use missionforge_core::swarm::{Coordinator, SwarmEvent};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use utoipa::{OpenApi, ToSchema};

use crate::config::PersistedConfig;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Mutex<Coordinator>>,
    pub snapshots: watch::Receiver<MissionSnapshot>,
    pub events: broadcast::Sender<SwarmEvent>,
    /// Directory holding `config.json`
    pub config_dir: PathBuf,
}

impl AppState {
    /// Wire the coordinator's event and snapshot channels into shared state.
    ///
    /// Must be called inside a Tokio runtime: it spawns the event forwarder.
    pub fn new(coordinator: Coordinator, config_dir: PathBuf) -> Self {
        let (snapshot_tx, snapshots) = watch::channel(coordinator.snapshot());
        let (event_tx, mut event_rx) = mpsc::channel::<SwarmEvent>(256);
        let (events, _) = broadcast::channel(256);

        let forward = events.clone();
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                // no subscribers is fine
                let _ = forward.send(event);
            }
        });

        let coordinator = coordinator
            .with_event_channel(event_tx)
            .with_snapshot_channel(snapshot_tx);

        Self {
            coordinator: Arc::new(Mutex::new(coordinator)),
            snapshots,
            events,
            config_dir,
        }
    }
}

// === API Types ===

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

pub(crate) fn busy() -> (StatusCode, Json<ApiResponse>) {
    (
        StatusCode::CONFLICT,
        Json(ApiResponse::rejected("A mission is already running")),
    )
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfigResponse {
    pub config: PersistedConfig,
    pub defaults: ConfigDefaults,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfigDefaults {
    pub global_provider: &'static str,
    pub max_files: usize,
    pub max_file_bytes: u64,
    pub fetch_concurrency: usize,
}

impl Default for ConfigDefaults {
    fn default() -> Self {
        let fetch = missionforge_core::tools::FetchLimits::default();
        Self {
            global_provider: "gemini",
            max_files: fetch.max_files,
            max_file_bytes: fetch.max_file_bytes,
            fetch_concurrency: fetch.fetch_concurrency,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    pub default_model: String,
    pub supports_base_url: bool,
    pub env_var: String,
    /// Whether a key for this provider is present in the environment
    pub configured: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProvidersResponse {
    pub providers: Vec<ProviderInfo>,
}

fn provider_slug(provider: &LlmProvider) -> String {
    serde_json::to_value(provider)
        .ok()
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_else(|| provider.display_name().to_lowercase())
}

fn get_provider_info() -> Vec<ProviderInfo> {
    LlmProvider::all()
        .into_iter()
        .map(|provider| ProviderInfo {
            id: provider_slug(&provider),
            name: provider.display_name().to_string(),
            default_model: provider.default_model().to_string(),
            supports_base_url: provider.supports_base_url(),
            env_var: provider.api_key_vars().join(" | "),
            configured: provider
                .api_key_vars()
                .iter()
                .any(|var| std::env::var(var).is_ok_and(|v| !v.trim().is_empty())),
        })
        .collect()
}

// === OpenAPI Definition ===

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Mission Forge API",
        version = "1.0.0",
        description = "Turns a repository and an objective into step-by-step prompts for a coding agent"
    ),
    paths(
        mission::get_status,
        mission::start_mission,
        mission::refine_mission,
        mission::get_chunks,
        mission::get_files,
        mission::list_images,
        mission::attach_image,
        mission::remove_image,
        get_config,
        update_config,
        get_providers
    ),
    components(schemas(
        ApiResponse,
        ConfigResponse,
        ConfigDefaults,
        PersistedConfig,
        ProvidersResponse,
        ProviderInfo,
        mission::MissionStatusResponse,
        mission::StartMissionRequest,
        mission::RefineRequest,
        mission::ChunksResponse,
        mission::ChunkItem,
        mission::FilesResponse,
        mission::FileItem,
        mission::ImagesResponse,
        mission::ImageItem,
        mission::AttachImageRequest,
        mission::AttachImageResponse
    )),
    tags(
        (name = "mission", description = "Pipeline runs, refinement and results"),
        (name = "images", description = "Images attached to the next run"),
        (name = "config", description = "Configuration management"),
        (name = "providers", description = "LLM provider discovery")
    )
)]
pub struct ApiDoc;

// === Handlers ===

/// Get current configuration
#[utoipa::path(
    get,
    path = "/api/v1/config",
    tag = "config",
    responses(
        (status = 200, description = "Current configuration", body = ConfigResponse)
    )
)]
async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    let config = PersistedConfig::load(&state.config_dir).await;
    Json(ConfigResponse {
        config,
        defaults: ConfigDefaults::default(),
    })
}

/// Update configuration (partial merge)
///
/// Applies to the coordinator immediately, so it is refused while a mission runs.
#[utoipa::path(
    patch,
    path = "/api/v1/config",
    tag = "config",
    request_body = PersistedConfig,
    responses(
        (status = 200, description = "Updated configuration", body = ConfigResponse),
        (status = 400, description = "Unknown provider", body = ApiResponse),
        (status = 409, description = "Mission running", body = ApiResponse)
    )
)]
async fn update_config(
    State(state): State<AppState>,
    Json(updates): Json<PersistedConfig>,
) -> Result<Json<ConfigResponse>, (StatusCode, Json<ApiResponse>)> {
    let unknown = updates.unknown_providers();
    if !unknown.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::rejected(format!(
                "Unknown provider(s): {}",
                unknown.join(", ")
            ))),
        ));
    }
    let Ok(mut coordinator) = state.coordinator.try_lock() else {
        return Err(busy());
    };

    let mut config = PersistedConfig::load(&state.config_dir).await;
    config.merge(updates);
    if let Err(e) = config.save(&state.config_dir).await {
        tracing::warn!(error = %e, "Failed to save config");
    }
    coordinator.reconfigure(config.to_coordinator_config());
    tracing::info!("Configuration updated");

    Ok(Json(ConfigResponse {
        config,
        defaults: ConfigDefaults::default(),
    }))
}

/// Get available LLM providers
#[utoipa::path(
    get,
    path = "/api/v1/providers",
    tag = "providers",
    responses(
        (status = 200, description = "List of supported LLM providers", body = ProvidersResponse)
    )
)]
async fn get_providers() -> Json<ProvidersResponse> {
    Json(ProvidersResponse {
        providers: get_provider_info(),
    })
}

async fn serve_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn build_router(state: AppState) -> Router {
    let mission_routes = Router::new()
        .route("/status", get(mission::get_status))
        .route("/start", post(mission::start_mission))
        .route("/refine", post(mission::refine_mission))
        .route("/chunks", get(mission::get_chunks))
        .route("/files", get(mission::get_files))
        .route("/events", get(mission::events));

    let image_routes = Router::new()
        .route("/", get(mission::list_images).post(mission::attach_image))
        .route("/:index", delete(mission::remove_image));

    Router::new()
        .nest("/api/v1/mission", mission_routes)
        .nest("/api/v1/images", image_routes)
        .route("/api/v1/config", get(get_config).patch(update_config))
        .route("/api/v1/providers", get(get_providers))
        .route("/api/v1/openapi.json", get(serve_openapi))
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use missionforge_core::llm::{ModelClient, ModelRequest};
    use missionforge_core::swarm::{CoordinatorConfig, StageClients};
    use missionforge_core::tools::{FetchError, RepoFetcher, RepoFile};
    use tower::util::ServiceExt;

    /// Answers every stage with the same text
    pub struct Canned(pub &'static str);

    #[async_trait]
    impl ModelClient for Canned {
        fn label(&self) -> String {
            "canned".to_string()
        }

        async fn generate(&self, _request: ModelRequest) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    pub struct FixedFetcher;

    #[async_trait]
    impl RepoFetcher for FixedFetcher {
        async fn fetch(&self, locator: &str) -> Result<Vec<RepoFile>, FetchError> {
            if !locator.contains("github.com") {
                return Err(FetchError::InvalidUrl(locator.to_string()));
            }
            Ok(vec![
                RepoFile::new("Cargo.toml", "[package]\nname = \"demo\"\n"),
                RepoFile::new("src/main.rs", "fn main() {}\n"),
            ])
        }
    }

    pub const TWO_PROMPTS: &str = "=== PROMPT 1: Setup ===\nDo X\n=== PROMPT 2: Build ===\nDo Y\n";

    pub fn test_state(config_dir: PathBuf) -> AppState {
        let coordinator = Coordinator::with_parts(
            CoordinatorConfig::default(),
            Arc::new(FixedFetcher),
            StageClients::uniform(Arc::new(Canned(TWO_PROMPTS))),
        );
        AppState::new(coordinator, config_dir)
    }

    pub async fn json_request(
        app: Router,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let body = match body {
            Some(json) => Body::from(serde_json::to_string(&json).unwrap()),
            None => Body::empty(),
        };
        let req = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body_bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&body_bytes).unwrap_or(serde_json::json!({}));
        (status, json)
    }
}
