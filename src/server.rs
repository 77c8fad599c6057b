//! HTTP server - axum router and request handlers.
//!
//! Routes (all under `/v1`):
//!   - `POST /v1/plan` - standalone query planning
//!   - `POST /v1/search` - complete JSON response, or SSE stream when
//!     `options.stream=true`
//!   - `POST /v1/search/batch` - up to 20 queries in one call
//!   - `GET  /v1/health` - system health + active adapters
//!   - `GET  /v1/health/adapters` - per-adapter health map
//!
//! The engine handle is passed to the router at bind time; there is no
//! process-global state.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::adapters::{build_adapter, AdapterHealth};
use crate::config::Settings;
use crate::engine::SiftEngine;
use crate::models::{BatchSearchRequest, SearchRequest};
use crate::sse;

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SiftEngine>,
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    let cors = cors_layer(state.engine.settings());
    Router::new()
        .route("/v1/plan", post(plan_handler))
        .route("/v1/search", post(search_handler))
        .route("/v1/search/batch", post(batch_handler))
        .route("/v1/health", get(health_handler))
        .route("/v1/health/adapters", get(adapter_health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(settings: &Settings) -> CorsLayer {
    let origins = &settings.server.cors_origins;
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(parsed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Register every enabled adapter from configuration.
///
/// Unknown names and per-adapter initialization failures are logged and
/// skipped so one broken backend never takes the server down. When no
/// adapters are configured at all, the default adapter is registered with
/// its built-in defaults.
pub async fn register_configured_adapters(engine: &SiftEngine, settings: &Settings) {
    let mut configured = settings.search.adapters.clone();
    if configured.is_empty() {
        info!(
            adapter = %settings.search.default_adapter,
            "No adapters configured, registering the default adapter"
        );
        configured.insert(settings.search.default_adapter.clone(), Default::default());
    }

    for (name, config) in &configured {
        if !config.enabled {
            info!(adapter = %name, "Adapter disabled, skipping");
            continue;
        }
        let Some(built) = build_adapter(name, config) else {
            continue;
        };
        let adapter = match built {
            Ok(adapter) => adapter,
            Err(e) => {
                warn!(adapter = %name, error = %e, "Failed to construct adapter");
                continue;
            }
        };
        if let Err(e) = engine.register_adapter(adapter).await {
            warn!(adapter = %name, error = %e, "Failed to initialize adapter");
        }
    }
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn detail(status: StatusCode, message: String) -> ApiError {
    (status, Json(serde_json::json!({ "detail": message })))
}

/// POST /v1/plan
async fn plan_handler(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_query(&request.query)?;
    Ok(Json(state.engine.plan(&request).await))
}

/// POST /v1/search - complete mode or SSE streaming mode.
async fn search_handler(
    State(state): State<AppState>,
    Json(mut request): Json<SearchRequest>,
) -> Result<Response, ApiError> {
    validate_query(&request.query)?;
    request.options = request.options.normalized();

    if request.options.stream {
        return Ok(sse_response(&state.engine, request));
    }

    match state.engine.search(&request).await {
        Ok(response) => Ok(Json(response).into_response()),
        Err(e) => {
            error!(error = %e, "Search failed");
            Err(detail(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Search processing failed: {e}"),
            ))
        }
    }
}

/// Build the SSE streaming response for a search request.
fn sse_response(engine: &Arc<SiftEngine>, request: SearchRequest) -> Response {
    let stream = Arc::clone(engine)
        .search_stream(request)
        .map(|event| Ok::<_, std::convert::Infallible>(Bytes::from(sse::format_event(&event))));

    let mut response = Response::new(Body::from_stream(stream));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(sse::CONTENT_TYPE));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

/// POST /v1/search/batch
async fn batch_handler(
    State(state): State<AppState>,
    Json(mut request): Json<BatchSearchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.queries.is_empty() {
        return Err(detail(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Batch must contain at least one query".to_string(),
        ));
    }
    if request.queries.len() > 20 {
        return Err(detail(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("Batch is limited to 20 queries, got {}", request.queries.len()),
        ));
    }
    for query in &request.queries {
        validate_query(query)?;
    }
    request.options = request.options.normalized();

    Ok(Json(state.engine.batch_search(&request).await))
}

/// GET /v1/health
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let settings = state.engine.settings();
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "opensift",
        "default_adapter": settings.search.default_adapter,
        "active_adapters": state.engine.active_adapters().await,
    }))
}

/// GET /v1/health/adapters
async fn adapter_health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let health: BTreeMap<String, AdapterHealth> =
        state.engine.adapter_health().await.into_iter().collect();
    Json(serde_json::json!({ "adapters": health }))
}

fn validate_query(query: &str) -> Result<(), ApiError> {
    if query.trim().is_empty() {
        return Err(detail(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Query must not be empty".to_string(),
        ));
    }
    if query.len() > 2000 {
        return Err(detail(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Query must be at most 2000 characters".to_string(),
        ));
    }
    Ok(())
}
