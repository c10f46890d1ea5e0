use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{
        header::{ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN},
        HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

mod caption;
mod config;
mod giphy;
mod meme;
mod models;

use config::Config;
use meme::MemeError;
use models::{ErrorBody, MemeRequest};

const USER_AGENT: &str = "meme-caption-api/1.0";

const MISSING_INPUT: &str = "Missing \"userInput\" in request body";
const METHOD_NOT_ALLOWED: &str = "Method not allowed, use POST";
const CAPTION_FAILED: &str = "Failed to generate meme captions.";
const GENERATION_FAILED: &str = "An error occurred while generating the meme.";

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    http: reqwest::Client,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env().map_err(|e| {
        tracing::error!(error = %e, "invalid configuration");
        e
    })?;
    tracing::info!(
        model = %config.openai_model,
        mode = ?config.caption_mode,
        giphy_limit = config.giphy_limit,
        giphy_rating = %config.giphy_rating,
        "configuration loaded"
    );

    let state = AppState {
        http: build_http_client()?,
        config: Arc::new(config),
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn build_http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::ClientBuilder::new()
        .user_agent(USER_AGENT)
        .build()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

// ── Router ───────────────────────────────────────────────────────────────────

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/generateMeme",
            post(generate_meme_endpoint)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed() -> Response {
    error_response(StatusCode::METHOD_NOT_ALLOWED, METHOD_NOT_ALLOWED)
}

async fn generate_meme_endpoint(
    State(state): State<AppState>,
    payload: Result<Json<MemeRequest>, JsonRejection>,
) -> Response {
    let topic = match &payload {
        Ok(Json(req)) => req.topic(),
        Err(rejection) => {
            tracing::warn!(error = %rejection, "rejected request body");
            None
        }
    };
    let Some(topic) = topic else {
        return error_response(StatusCode::BAD_REQUEST, MISSING_INPUT);
    };

    match meme::generate_meme(&state.http, &state.config, topic).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            tracing::error!(topic, error = %e, "meme generation failed");
            let message = match &e {
                MemeError::MalformedCaption(_) => CAPTION_FAILED,
                MemeError::CaptionRequest(_)
                | MemeError::CaptionUpstream { .. }
                | MemeError::ImageSearchRequest(_)
                | MemeError::ImageSearchUpstream { .. }
                | MemeError::ImageSearchDecode(_) => GENERATION_FAILED,
            };
            error_response(StatusCode::INTERNAL_SERVER_ERROR, message)
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(ErrorBody::new(message))).into_response()
}
