//! HTTP route handlers.
//!
//! All handlers are thin - they delegate to the mixer service and catalog.

use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::response::{api_error, api_success};
use crate::api::ws::ws_handler;
use crate::api::AppState;
use crate::catalog::{CatalogEntry, CatalogService, TrackDescriptor};
use crate::error::SoundscapeResult;
use crate::protocol_constants::SERVICE_ID;
use crate::utils::{validate_track_request, TrackValidationError};

// ─────────────────────────────────────────────────────────────────────────────
// Request / Response Types
// ─────────────────────────────────────────────────────────────────────────────

/// Body of a toggle request. Without `audioUrl` the id is looked up in the
/// catalog.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ToggleRequest {
    pub id: String,
    #[serde(default)]
    pub audio_url: Option<String>,
}

/// Catalog entry annotated with playback state.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SoundView<'a> {
    id: &'a str,
    name: &'a str,
    category: &'a str,
    icon_url: &'a str,
    audio_url: &'a str,
    is_premium: bool,
    is_playing: bool,
}

impl<'a> SoundView<'a> {
    fn new(entry: &'a CatalogEntry, is_playing: bool) -> Self {
        Self {
            id: &entry.id,
            name: &entry.name,
            category: &entry.category,
            icon_url: &entry.icon_url,
            audio_url: &entry.audio_url,
            is_premium: entry.is_premium,
            is_playing,
        }
    }
}

/// Turns a toggle request into a playable descriptor.
pub(crate) async fn resolve_track(
    catalog: &CatalogService,
    request: ToggleRequest,
) -> SoundscapeResult<TrackDescriptor> {
    match request.audio_url {
        Some(url) => {
            validate_track_request(&request.id, &url)?;
            Ok(TrackDescriptor::new(request.id, url))
        }
        None => {
            if request.id.trim().is_empty() {
                return Err(TrackValidationError::EmptyId.into());
            }
            Ok(catalog.resolve(&request.id).await?)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Creates the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/mixer", get(get_mixer_state))
        .route("/api/mixer/toggle", post(handle_toggle))
        .route("/api/mixer/pause", post(handle_pause))
        .route("/api/mixer/resume", post(handle_resume))
        .route("/api/mixer/stop", post(handle_stop))
        .route("/api/sounds", get(list_sounds))
        .route("/api/sounds/refresh", post(refresh_sounds))
        .route("/ws", get(ws_handler))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Liveness probe.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    api_success(json!({
        "status": "ok",
        "service": SERVICE_ID,
        "version": env!("CARGO_PKG_VERSION"),
        "connections": state.ws_manager.connection_count(),
    }))
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    api_error(StatusCode::NOT_FOUND, "not_found", format!("No route for {}", uri.path()))
}

/// Returns the latest published mixer snapshot.
async fn get_mixer_state(State(state): State<AppState>) -> impl IntoResponse {
    api_success(state.broadcaster.current())
}

async fn handle_toggle(
    State(state): State<AppState>,
    Json(payload): Json<ToggleRequest>,
) -> SoundscapeResult<impl IntoResponse> {
    let track = resolve_track(&state.catalog, payload).await?;
    let id = track.id.clone();
    let outcome = state.mixer_service.handle().await.toggle(track).await?;
    Ok(api_success(json!({ "id": id, "outcome": outcome })))
}

async fn handle_pause(State(state): State<AppState>) -> SoundscapeResult<impl IntoResponse> {
    let changed = state.mixer_service.handle().await.pause_all().await?;
    Ok(api_success(json!({ "changed": changed })))
}

async fn handle_resume(State(state): State<AppState>) -> SoundscapeResult<impl IntoResponse> {
    let changed = state.mixer_service.handle().await.resume_all().await?;
    Ok(api_success(json!({ "changed": changed })))
}

async fn handle_stop(State(state): State<AppState>) -> SoundscapeResult<impl IntoResponse> {
    let stopped = state.mixer_service.handle().await.stop_all().await?;
    Ok(api_success(json!({ "stopped": stopped })))
}

/// Lists the catalog with an `isPlaying` flag per entry.
async fn list_sounds(State(state): State<AppState>) -> SoundscapeResult<impl IntoResponse> {
    let entries = state.catalog.list().await?;
    let snapshot = state.broadcaster.current();
    let sounds: Vec<SoundView<'_>> = entries
        .iter()
        .map(|entry| SoundView::new(entry, snapshot.contains(&entry.id)))
        .collect();
    Ok(api_success(json!({ "sounds": sounds })))
}

/// Fetches the catalog again from the content backend.
async fn refresh_sounds(State(state): State<AppState>) -> SoundscapeResult<impl IntoResponse> {
    let entries = state.catalog.refresh().await?;
    Ok(api_success(json!({ "count": entries.len() })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::RwLock;
    use reqwest::StatusCode;
    use serde_json::Value;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::api::serve;
    use crate::bootstrap::{bootstrap_services, BootstrappedServices};
    use crate::notification::NoopNotificationSurface;
    use crate::player::HeadlessBackend;
    use crate::state::Config;
    use crate::test_fixtures::wav_bytes;

    struct TestApp {
        base: String,
        services: BootstrappedServices,
        backend: MockServer,
        client: reqwest::Client,
        _dir: tempfile::TempDir,
    }

    impl TestApp {
        async fn start() -> Self {
            let backend = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/relax/sounds"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                    {
                        "_id": "rain",
                        "name": "Rain",
                        "category": "nature",
                        "icon_url": "",
                        "audio_url": format!("{}/audio/rain.wav", backend.uri()),
                    },
                    {
                        "_id": "wind",
                        "name": "Wind",
                        "audio_url": format!("{}/audio/wind.wav", backend.uri()),
                    }
                ])))
                .mount(&backend)
                .await;
            Mock::given(method("GET"))
                .and(path("/audio/rain.wav"))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(wav_bytes()))
                .mount(&backend)
                .await;

            let dir = tempfile::tempdir().unwrap();
            let config = Config {
                cache_dir: dir.path().to_path_buf(),
                catalog_base_url: Some(backend.uri()),
                ..Default::default()
            };
            let services = bootstrap_services(
                &config,
                Arc::new(HeadlessBackend),
                Arc::new(NoopNotificationSurface),
            )
            .unwrap();

            let state = AppState::new(&services, Arc::new(RwLock::new(config)));
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base = format!("http://{}", listener.local_addr().unwrap());
            let shutdown = services.cancel_token.child_token();
            tokio::spawn(serve(state, listener, shutdown));

            Self {
                base,
                services,
                backend,
                client: reqwest::Client::new(),
                _dir: dir,
            }
        }

        async fn get(&self, route: &str) -> (StatusCode, Value) {
            let response = self
                .client
                .get(format!("{}{}", self.base, route))
                .send()
                .await
                .unwrap();
            (response.status(), response.json().await.unwrap())
        }

        async fn post(&self, route: &str, body: Value) -> (StatusCode, Value) {
            let response = self
                .client
                .post(format!("{}{}", self.base, route))
                .json(&body)
                .send()
                .await
                .unwrap();
            (response.status(), response.json().await.unwrap())
        }

        async fn wait_until_playing(&self, id: &str) -> Value {
            for _ in 0..200 {
                let (_, state) = self.get("/api/mixer").await;
                if state["playing"]
                    .as_array()
                    .is_some_and(|p| p.iter().any(|v| v == id))
                {
                    return state;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            panic!("{} never started", id);
        }
    }

    #[tokio::test]
    async fn health_reports_service() {
        let app = TestApp::start().await;
        let (status, body) = app.get("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "soundscape");
        assert_eq!(body["connections"], 0);
        app.services.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_route_returns_json_404() {
        let app = TestApp::start().await;
        let (status, body) = app.get("/api/playlists").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
        assert_eq!(body["message"], "No route for /api/playlists");
        app.services.shutdown().await;
    }

    #[tokio::test]
    async fn toggle_by_catalog_id_plays_and_lists_as_playing() {
        let app = TestApp::start().await;

        let (status, body) = app.post("/api/mixer/toggle", json!({ "id": "rain" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "loading");

        let state = app.wait_until_playing("rain").await;
        assert_eq!(state["isActive"], true);
        assert_eq!(state["isPaused"], false);

        let (_, body) = app.get("/api/sounds").await;
        let sounds = body["sounds"].as_array().unwrap();
        assert_eq!(sounds.len(), 2);
        assert_eq!(sounds[0]["id"], "rain");
        assert_eq!(sounds[0]["isPlaying"], true);
        assert_eq!(sounds[1]["isPlaying"], false);

        let (_, body) = app.post("/api/mixer/pause", json!({})).await;
        assert_eq!(body["changed"], true);
        let (_, body) = app.post("/api/mixer/resume", json!({})).await;
        assert_eq!(body["changed"], true);
        let (_, body) = app.post("/api/mixer/stop", json!({})).await;
        assert_eq!(body["stopped"], 1);

        let (_, state) = app.get("/api/mixer").await;
        assert_eq!(state["isActive"], false);
        app.services.shutdown().await;
    }

    #[tokio::test]
    async fn toggle_with_explicit_url_skips_catalog() {
        let app = TestApp::start().await;
        let url = format!("{}/audio/rain.wav", app.backend.uri());

        let (status, body) = app
            .post("/api/mixer/toggle", json!({ "id": "custom", "audioUrl": url }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "custom");
        app.wait_until_playing("custom").await;
        app.services.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_sound_is_404() {
        let app = TestApp::start().await;
        let (status, body) = app.post("/api/mixer/toggle", json!({ "id": "fire" })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "sound_not_found");
        assert_eq!(body["status"], 404);
        app.services.shutdown().await;
    }

    #[tokio::test]
    async fn invalid_audio_url_is_400() {
        let app = TestApp::start().await;
        let (status, body) = app
            .post(
                "/api/mixer/toggle",
                json!({ "id": "rain", "audioUrl": "file:///etc/passwd" }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_request");
        app.services.shutdown().await;
    }

    #[tokio::test]
    async fn pause_on_idle_mixer_reports_no_change() {
        let app = TestApp::start().await;
        let (status, body) = app.post("/api/mixer/pause", json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["changed"], false);
        app.services.shutdown().await;
    }

    #[tokio::test]
    async fn refresh_reports_catalog_size() {
        let app = TestApp::start().await;
        let (status, body) = app.post("/api/sounds/refresh", json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        app.services.shutdown().await;
    }

    #[tokio::test]
    async fn resolve_rejects_empty_id_without_catalog_lookup() {
        let catalog = CatalogService::new(None, Arc::new(crate::events::NoopEventEmitter));
        let err = resolve_track(
            &catalog,
            ToggleRequest {
                id: "  ".into(),
                audio_url: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "invalid_request");
    }
}
