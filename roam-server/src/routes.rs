//! HTTP API routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use roam_core::{ChatRequest, Pipeline};
use serde::Deserialize;
use std::sync::Arc;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Error wrapper mapping pipeline errors onto HTTP responses.
struct ApiError(roam_common::Error);

impl From<roam_common::Error> for ApiError {
    fn from(err: roam_common::Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(serde_json::json!({
            "success": false,
            "error": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}

/// Coordinates for the standalone data endpoints.
#[derive(Debug, Deserialize)]
struct CoordsRequest {
    lat: f64,
    lon: f64,
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/chat", post(chat))
        .route("/weather", post(weather))
        .route("/places", post(places))
        .route("/sessions/:id/reset", post(reset_session))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let storage = if state.pipeline.health_check().await {
        "healthy"
    } else {
        "unhealthy"
    };
    Json(serde_json::json!({
        "status": "healthy",
        "service": "roam-server",
        "version": env!("CARGO_PKG_VERSION"),
        "storage": storage,
    }))
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.pipeline.run_turn(request).await?;
    Ok(Json(response))
}

/// Raw weather for a coordinate pair, bypassing the conversation pipeline.
async fn weather(
    State(state): State<AppState>,
    Json(request): Json<CoordsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state
        .pipeline
        .weather()
        .get(request.lat, request.lon)
        .await?;
    Ok(Json(report))
}

/// Raw attractions for a coordinate pair. Without a location name there
/// are no LLM supplements, matching a lookup that never saw a message.
async fn places(
    State(state): State<AppState>,
    Json(request): Json<CoordsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let places = state
        .pipeline
        .places()
        .get(request.lat, request.lon, None)
        .await?;
    let count = places.len();
    Ok(Json(serde_json::json!({
        "places": places,
        "count": count,
    })))
}

async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let cleared = state.pipeline.reset_session(&id).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "session_id": id,
        "cleared": cleared,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use roam_common::config::{Config, StorageMode};
    use tower::ServiceExt;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn llm_reply(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        })
    }

    /// One mock server standing in for every external collaborator.
    async fn mock_world() -> MockServer {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_string_contains("location extraction"))
            .respond_with(ResponseTemplate::new(200).set_body_json(llm_reply("Rome")))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_string_contains("router"))
            .respond_with(ResponseTemplate::new(200).set_body_json(llm_reply("WEATHER")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "lat": "41.8933", "lon": "12.4829", "name": "Rome", "display_name": "Rome, Italy" }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "current": { "temperature_2m": 28.0, "weather_code": 0 }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/interpreter"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "elements": [
                    { "lat": 41.89, "lon": 12.49, "tags": { "name": "Colosseum", "historic": "monument" } }
                ]
            })))
            .mount(&server)
            .await;

        server
    }

    fn test_config(server: &MockServer, data_dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.storage.mode = StorageMode::Local;
        config.storage.data_dir = Some(data_dir.to_path_buf());
        config.llm.provider = "mistral".to_string();
        config.llm.keys.mistral = Some("test-key".to_string());
        config.endpoints.nominatim = server.uri();
        config.endpoints.open_meteo = server.uri();
        config.endpoints.overpass = server.uri();
        config.endpoints.llm_base_url = Some(server.uri());
        config
    }

    async fn test_app() -> (tempfile::TempDir, MockServer, Router) {
        let server = mock_world().await;
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&server, dir.path());
        let pipeline = Pipeline::from_config(&config).unwrap();
        let app = build_router(AppState::new(pipeline));
        (dir, server, app)
    }

    #[tokio::test]
    async fn test_health_check() {
        let (_dir, _server, app) = test_app().await;

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_chat_turn() {
        let (_dir, _server, app) = test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"session_id": "s1", "message": "How's the weather in Rome?"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["intent"], "WEATHER");
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("In Rome it's currently 28°C"));
    }

    #[tokio::test]
    async fn test_weather_endpoint() {
        let (_dir, _server, app) = test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/weather")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"lat": 41.89, "lon": 12.48}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["temperature"], 28.0);
        assert_eq!(body["condition"], "Clear sky");
    }

    #[tokio::test]
    async fn test_places_endpoint() {
        let (_dir, _server, app) = test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/places")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"lat": 41.89, "lon": 12.48}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["count"], 1);
        assert_eq!(body["places"][0]["name"], "Colosseum");
        assert_eq!(body["places"][0]["category"], "historic");
    }

    #[tokio::test]
    async fn test_chat_rejects_empty_message() {
        let (_dir, _server, app) = test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"session_id": "s1", "message": "  "}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reset_session() {
        let (_dir, _server, app) = test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/sessions/s1/reset")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
