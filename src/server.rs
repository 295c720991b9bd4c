//! HTTPサーバ
//!
//! `POST /process/` に画像1枚と質問文を multipart で受け取り、モデルの回答を返す。
//! 画像でないアップロードは 400、推論の失敗は 200 + `{"status": "error"}`。

use crate::config::{Config, ServerConfig};
use crate::error::Result;
use crate::vision::preprocess::validate_image;
use crate::vision::SharedVisionService;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tower_http::cors::{Any, CorsLayer};

pub struct AppState {
    service: SharedVisionService,
    /// モデル資源あたりの同時推論数
    permits: Semaphore,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(service: SharedVisionService, max_concurrent_requests: usize) -> Self {
        Self {
            service,
            permits: Semaphore::new(max_concurrent_requests.max(1)),
        }
    }
}

pub fn router(service: SharedVisionService, config: &ServerConfig) -> Router {
    let state: SharedState = Arc::new(AppState::new(service, config.max_concurrent_requests));

    let cors_layer = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/process/", post(process_image))
        .route("/process", post(process_image))
        .route("/health", get(health))
        .layer(cors_layer)
        .layer(DefaultBodyLimit::max(config.body_limit_bytes))
        .with_state(state)
}

/// 起動して Ctrl-C まで待ち受ける
pub async fn serve(config: &Config, service: SharedVisionService) -> Result<()> {
    let app = router(service, &config.server);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    let info = state.service.info();
    Json(json!({
        "status": "ok",
        "backend": info.backend,
        "model": info.model,
    }))
}

fn bad_request(detail: impl Into<String>) -> Response {
    let detail = detail.into();
    tracing::warn!("rejected upload: {}", detail);
    (StatusCode::BAD_REQUEST, Json(json!({ "detail": detail }))).into_response()
}

struct Upload {
    content_type: Option<String>,
    bytes: Vec<u8>,
}

async fn process_image(State(state): State<SharedState>, mut multipart: Multipart) -> Response {
    let mut image: Option<Upload> = None;
    let mut query: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return bad_request(format!("Invalid multipart body: {}", e)),
        };

        match field.name() {
            Some("image") => {
                let content_type = field.content_type().map(|s| s.to_string());
                match field.bytes().await {
                    Ok(bytes) => {
                        image = Some(Upload {
                            content_type,
                            bytes: bytes.to_vec(),
                        })
                    }
                    Err(e) => return bad_request(format!("Failed to read upload: {}", e)),
                }
            }
            Some("query") => match field.text().await {
                Ok(text) => query = Some(text),
                Err(e) => return bad_request(format!("Failed to read query: {}", e)),
            },
            _ => {}
        }
    }

    let Some(image) = image else {
        return bad_request("Missing form field: image");
    };
    let Some(query) = query else {
        return bad_request("Missing form field: query");
    };

    let is_image = image
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with("image/"));
    if !is_image {
        return bad_request("File provided is not an image");
    }

    if let Err(e) = validate_image(&image.bytes) {
        tracing::debug!("{}", e);
        return bad_request("Invalid image file");
    }

    let _permit = match state.permits.acquire().await {
        Ok(permit) => permit,
        Err(e) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "error", "message": e.to_string() })),
            )
                .into_response()
        }
    };

    match state.service.ask(&image.bytes, &query).await {
        Ok(response) => Json(json!({ "status": "success", "response": response })).into_response(),
        Err(e) => {
            tracing::error!("Inference error: {}", e);
            Json(json!({ "status": "error", "message": e.to_string() })).into_response()
        }
    }
}
