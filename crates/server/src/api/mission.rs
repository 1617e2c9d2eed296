//! Mission endpoints: start, refine, results, attached images and the live event stream.

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::stream::{self, Stream};
use missionforge_core::state::{ImageError, ImageRef};
use missionforge_core::swarm::PipelineRequest;
use missionforge_core::tools::{audit_chunk_ids, parse_chunks, ChunkIdIssue};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use utoipa::ToSchema;

use super::{busy, ApiResponse, AppState};

// === API Types ===

#[derive(Debug, Serialize, ToSchema)]
pub struct MissionStatusResponse {
    /// idle | fetching | scout-working | architect-working | taskmaster-working | refining | completed | error
    pub status: String,
    pub is_working: bool,
    pub mission_log: String,
    pub final_prompt: Option<String>,
    pub error: Option<String>,
    pub file_count: usize,
    pub image_count: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StartMissionRequest {
    pub repo_url: String,
    pub objective: String,
    /// Compiler or runtime errors from a previous attempt
    #[serde(default)]
    pub error_feedback: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefineRequest {
    pub feedback: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChunkItem {
    pub id: String,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChunksResponse {
    pub chunks: Vec<ChunkItem>,
    /// Duplicate or out-of-sequence chunk ids, if any
    pub id_warnings: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FileItem {
    pub path: String,
    pub size: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FilesResponse {
    pub files: Vec<FileItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ImageItem {
    pub index: usize,
    pub mime_type: String,
    pub bytes: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ImagesResponse {
    pub images: Vec<ImageItem>,
}

/// Either a `data:` URL or raw base64 plus MIME type
#[derive(Debug, Deserialize, ToSchema)]
pub struct AttachImageRequest {
    #[serde(default)]
    pub data_url: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AttachImageResponse {
    pub success: bool,
    pub index: usize,
}

fn describe_issue(issue: &ChunkIdIssue) -> String {
    match issue {
        ChunkIdIssue::Duplicate { id } => format!("Chunk id {} appears more than once", id),
        ChunkIdIssue::OutOfSequence {
            id,
            position,
            expected,
        } => format!(
            "Chunk {} has id {}, expected {}",
            position + 1,
            id,
            expected
        ),
    }
}

type Rejection = (StatusCode, Json<ApiResponse>);

fn bad_request(message: impl Into<String>) -> Rejection {
    (StatusCode::BAD_REQUEST, Json(ApiResponse::rejected(message)))
}

// === Handlers ===

/// Get mission status
#[utoipa::path(
    get,
    path = "/api/v1/mission/status",
    tag = "mission",
    responses(
        (status = 200, description = "Current mission status", body = MissionStatusResponse)
    )
)]
pub async fn get_status(State(state): State<AppState>) -> Json<MissionStatusResponse> {
    let snap = state.snapshots.borrow().clone();
    Json(MissionStatusResponse {
        status: snap.status.label().to_string(),
        is_working: snap.status.is_working(),
        mission_log: snap.mission_log,
        final_prompt: snap.final_prompt,
        error: snap.error,
        file_count: snap.file_count,
        image_count: snap.image_count,
    })
}

/// Start a mission in the background
///
/// Blank inputs are accepted and ignored (`success: false`, no state change).
#[utoipa::path(
    post,
    path = "/api/v1/mission/start",
    tag = "mission",
    request_body = StartMissionRequest,
    responses(
        (status = 200, description = "Mission started, or ignored for blank input", body = ApiResponse),
        (status = 409, description = "A mission is already running", body = ApiResponse)
    )
)]
pub async fn start_mission(
    State(state): State<AppState>,
    Json(req): Json<StartMissionRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    if req.repo_url.trim().is_empty() || req.objective.trim().is_empty() {
        return (
            StatusCode::OK,
            Json(ApiResponse::rejected("repo_url and objective are required")),
        );
    }
    let Ok(mut coordinator) = state.coordinator.clone().try_lock_owned() else {
        return busy();
    };

    let mut request = PipelineRequest::new(req.repo_url, req.objective);
    request.error_feedback = req.error_feedback;
    tracing::info!(repo = %request.repo_locator, "Starting mission");

    tokio::spawn(async move {
        let outcome = coordinator.execute_pipeline(request).await;
        tracing::info!(?outcome, "Mission finished");
    });

    (StatusCode::OK, Json(ApiResponse::ok("Mission started")))
}

/// Refine the final prompt with feedback
#[utoipa::path(
    post,
    path = "/api/v1/mission/refine",
    tag = "mission",
    request_body = RefineRequest,
    responses(
        (status = 200, description = "Refinement started, or ignored", body = ApiResponse),
        (status = 409, description = "A mission is already running", body = ApiResponse)
    )
)]
pub async fn refine_mission(
    State(state): State<AppState>,
    Json(req): Json<RefineRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    if req.feedback.trim().is_empty() {
        return (
            StatusCode::OK,
            Json(ApiResponse::rejected("feedback is required")),
        );
    }
    let Ok(mut coordinator) = state.coordinator.clone().try_lock_owned() else {
        return busy();
    };
    if coordinator.state().final_prompt.is_none() {
        return (
            StatusCode::OK,
            Json(ApiResponse::rejected("No final prompt to refine yet")),
        );
    }

    tokio::spawn(async move {
        let outcome = coordinator.execute_refinement(req.feedback).await;
        tracing::info!(?outcome, "Refinement finished");
    });

    (StatusCode::OK, Json(ApiResponse::ok("Refinement started")))
}

/// Get the final prompt split into chunks
#[utoipa::path(
    get,
    path = "/api/v1/mission/chunks",
    tag = "mission",
    responses(
        (status = 200, description = "Parsed chunks; empty before the first completed run", body = ChunksResponse)
    )
)]
pub async fn get_chunks(State(state): State<AppState>) -> Json<ChunksResponse> {
    let final_prompt = state.snapshots.borrow().final_prompt.clone();
    let chunks = final_prompt.as_deref().map(parse_chunks).unwrap_or_default();
    let id_warnings = audit_chunk_ids(&chunks).iter().map(describe_issue).collect();

    Json(ChunksResponse {
        chunks: chunks
            .into_iter()
            .map(|c| ChunkItem {
                id: c.id,
                title: c.title,
                content: c.content,
            })
            .collect(),
        id_warnings,
    })
}

/// List the files fetched for the current mission
#[utoipa::path(
    get,
    path = "/api/v1/mission/files",
    tag = "mission",
    responses(
        (status = 200, description = "Fetched files in context order", body = FilesResponse)
    )
)]
pub async fn get_files(State(state): State<AppState>) -> Json<FilesResponse> {
    let files = state
        .snapshots
        .borrow()
        .files
        .iter()
        .map(|f| FileItem {
            path: f.path.clone(),
            size: f.size,
        })
        .collect();
    Json(FilesResponse { files })
}

/// List attached images
#[utoipa::path(
    get,
    path = "/api/v1/images",
    tag = "images",
    responses(
        (status = 200, description = "Attached images", body = ImagesResponse)
    )
)]
pub async fn list_images(State(state): State<AppState>) -> Json<ImagesResponse> {
    let images = state
        .snapshots
        .borrow()
        .images
        .iter()
        .enumerate()
        .map(|(index, image)| ImageItem {
            index,
            mime_type: image.mime_type.clone(),
            bytes: image.bytes,
        })
        .collect();
    Json(ImagesResponse { images })
}

/// Attach an image to the next run
#[utoipa::path(
    post,
    path = "/api/v1/images",
    tag = "images",
    request_body = AttachImageRequest,
    responses(
        (status = 200, description = "Image attached", body = AttachImageResponse),
        (status = 400, description = "Not a valid image payload", body = ApiResponse),
        (status = 409, description = "A mission is running", body = ApiResponse)
    )
)]
pub async fn attach_image(
    State(state): State<AppState>,
    Json(req): Json<AttachImageRequest>,
) -> Result<Json<AttachImageResponse>, Rejection> {
    let image = match (req.data_url, req.data, req.mime_type) {
        (Some(url), _, _) => ImageRef::from_data_url(&url),
        (None, Some(data), Some(mime)) => ImageRef::from_base64(&data, &mime),
        _ => return Err(bad_request("Provide data_url, or data and mime_type")),
    }
    .map_err(|e| bad_request(e.to_string()))?;

    let mut coordinator = state.coordinator.try_lock().map_err(|_| busy())?;
    let index = coordinator.attach_image(image);
    Ok(Json(AttachImageResponse {
        success: true,
        index,
    }))
}

/// Remove an attached image
#[utoipa::path(
    delete,
    path = "/api/v1/images/{index}",
    tag = "images",
    params(("index" = usize, Path, description = "Position in the image list")),
    responses(
        (status = 200, description = "Image removed", body = ApiResponse),
        (status = 404, description = "No image at that index", body = ApiResponse),
        (status = 409, description = "A mission is running", body = ApiResponse)
    )
)]
pub async fn remove_image(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<Json<ApiResponse>, Rejection> {
    let mut coordinator = state.coordinator.try_lock().map_err(|_| busy())?;
    match coordinator.remove_image(index) {
        Ok(_) => Ok(Json(ApiResponse::ok(format!("Removed image {}", index)))),
        Err(e @ ImageError::NoSuchImage(_)) => Err((
            StatusCode::NOT_FOUND,
            Json(ApiResponse::rejected(e.to_string())),
        )),
        Err(e) => Err(bad_request(e.to_string())),
    }
}

/// SSE endpoint for real-time events with heartbeat
pub async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe();

    let stream = stream::unfold(rx, |mut rx| async move {
        let timeout = tokio::time::timeout(std::time::Duration::from_secs(15), rx.recv()).await;

        match timeout {
            Ok(Ok(event)) => {
                let json = serde_json::to_string(&event).unwrap_or_default();
                Some((Ok(Event::default().data(json)), rx))
            }
            Ok(Err(RecvError::Lagged(skipped))) => Some((
                Ok(Event::default().comment(format!("lagged {}", skipped))),
                rx,
            )),
            Ok(Err(RecvError::Closed)) => None,
            // Timeout - send heartbeat comment
            Err(_) => Some((Ok(Event::default().comment("heartbeat")), rx)),
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::super::build_router;
    use super::super::test_support::*;
    use super::*;
    use axum::http::Method;
    use missionforge_core::swarm::PipelineStatus;
    use std::time::Duration;

    async fn wait_for_status(state: &AppState, status: PipelineStatus) {
        let mut rx = state.snapshots.clone();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.status == status))
            .await
            .expect("timed out waiting for status")
            .unwrap();
    }

    #[tokio::test]
    async fn test_status_starts_idle() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(dir.path().to_path_buf()));
        let (status, json) = json_request(app, Method::GET, "/api/v1/mission/status", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "idle");
        assert_eq!(json["is_working"], false);
        assert!(json["mission_log"].as_str().unwrap().contains("MANIFESTO"));
    }

    #[tokio::test]
    async fn test_start_with_blank_objective_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path().to_path_buf());
        let app = build_router(state.clone());

        let (status, json) = json_request(
            app,
            Method::POST,
            "/api/v1/mission/start",
            Some(serde_json::json!({"repo_url": "https://github.com/a/b", "objective": " "})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], false);
        assert_eq!(state.snapshots.borrow().status, PipelineStatus::Idle);
    }

    #[tokio::test]
    async fn test_full_mission_then_chunks_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path().to_path_buf());
        let app = build_router(state.clone());

        let (status, json) = json_request(
            app.clone(),
            Method::POST,
            "/api/v1/mission/start",
            Some(serde_json::json!({
                "repo_url": "https://github.com/acme/demo",
                "objective": "Add a --verbose flag"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        wait_for_status(&state, PipelineStatus::Completed).await;

        let (_, json) = json_request(app.clone(), Method::GET, "/api/v1/mission/chunks", None).await;
        let chunks = json["chunks"].as_array().unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1]["title"], "Build");
        assert_eq!(chunks[1]["content"], "Do Y");
        assert!(json["id_warnings"].as_array().unwrap().is_empty());

        let (_, json) = json_request(app, Method::GET, "/api/v1/mission/files", None).await;
        assert_eq!(json["files"][0]["path"], "Cargo.toml");
        assert_eq!(json["files"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_surfaces_as_error_status() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path().to_path_buf());
        let app = build_router(state.clone());

        json_request(
            app.clone(),
            Method::POST,
            "/api/v1/mission/start",
            Some(serde_json::json!({"repo_url": "acme/demo", "objective": "x"})),
        )
        .await;
        wait_for_status(&state, PipelineStatus::Error).await;

        let (_, json) = json_request(app, Method::GET, "/api/v1/mission/status", None).await;
        assert!(json["error"]
            .as_str()
            .unwrap()
            .starts_with("Failed to fetch repository"));
    }

    #[tokio::test]
    async fn test_busy_coordinator_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path().to_path_buf());
        let app = build_router(state.clone());
        let (status, _) = json_request(
            app.clone(),
            Method::POST,
            "/api/v1/images",
            Some(serde_json::json!({"data_url": "data:image/png;base64,aGVsbG8="})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let _running = state.coordinator.lock().await;

        let (status, _) = json_request(
            app.clone(),
            Method::POST,
            "/api/v1/mission/start",
            Some(serde_json::json!({"repo_url": "https://github.com/a/b", "objective": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = json_request(app.clone(), Method::DELETE, "/api/v1/images/0", None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, json) = json_request(app, Method::GET, "/api/v1/images", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["images"][0]["mime_type"], "image/png");
    }

    #[tokio::test]
    async fn test_refine_before_any_run_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(dir.path().to_path_buf()));
        let (status, json) = json_request(
            app,
            Method::POST,
            "/api/v1/mission/refine",
            Some(serde_json::json!({"feedback": "shorter please"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_image_attach_list_remove() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(dir.path().to_path_buf()));

        let (status, json) = json_request(
            app.clone(),
            Method::POST,
            "/api/v1/images",
            Some(serde_json::json!({"data_url": "data:image/png;base64,aGVsbG8="})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["index"], 0);

        let (status, _) = json_request(
            app.clone(),
            Method::POST,
            "/api/v1/images",
            Some(serde_json::json!({"data": "aGVsbG8=", "mime_type": "text/plain"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, json) = json_request(app.clone(), Method::GET, "/api/v1/images", None).await;
        assert_eq!(json["images"][0]["mime_type"], "image/png");
        assert_eq!(json["images"][0]["bytes"], 5);

        let (status, _) = json_request(app.clone(), Method::DELETE, "/api/v1/images/3", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = json_request(app, Method::DELETE, "/api/v1/images/0", None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
