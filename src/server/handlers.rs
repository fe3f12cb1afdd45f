//! Route handlers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{error, warn};

use super::AppState;
use crate::gateway::{GatewayStatus, ImageResponse};
use crate::types::{ImageRequest, OutcomeKind};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Body of `POST /cache/delete`.
#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub description: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub seed: Option<i64>,
}

impl From<DeleteRequest> for ImageRequest {
    fn from(body: DeleteRequest) -> Self {
        let mut request = ImageRequest::new(body.description);
        request.width = body.width;
        request.height = body.height;
        if let Some(model) = body.model {
            request = request.model(model);
        }
        if let Some(seed) = body.seed {
            request = request.seed(seed);
        }
        request
    }
}

fn text(status: StatusCode, body: impl Into<String>) -> Response {
    (status, body.into()).into_response()
}

/// Parse an optional numeric query parameter. Empty counts as absent.
fn parse_param<T: std::str::FromStr>(
    params: &HashMap<String, String>,
    name: &str,
) -> Result<Option<T>, Response> {
    match params.get(name).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|_| {
            text(
                StatusCode::BAD_REQUEST,
                format!("Bad Request: invalid {name} '{raw}'"),
            )
        }),
    }
}

fn build_request(
    description: String,
    params: &HashMap<String, String>,
) -> Result<ImageRequest, Response> {
    let mut request = ImageRequest::new(description);
    request.width = parse_param(params, "width")?;
    request.height = parse_param(params, "height")?;
    if let Some(model) = params.get("model") {
        request = request.model(model.clone());
    }
    if let Some(seed) = parse_param(params, "seed")? {
        request = request.seed(seed);
    }
    Ok(request)
}

/// `GET /prompt/{*description}`
pub async fn generate_image(
    State(state): State<Arc<AppState>>,
    Path(description): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if params.get("key") != Some(&state.proxy_key) {
        warn!("rejected image request with bad proxy key");
        return text(StatusCode::UNAUTHORIZED, "Unauthorized");
    }

    let request = match build_request(description, &params) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match state.gateway.handle(request).await {
        ImageResponse::Image {
            bytes,
            content_type,
        } => ([(header::CONTENT_TYPE, content_type)], bytes).into_response(),
        ImageResponse::Redirect { url } => {
            (StatusCode::FOUND, [(header::LOCATION, url)]).into_response()
        }
        ImageResponse::Failure { kind, message } => {
            let status = match kind {
                OutcomeKind::Blocked => StatusCode::BAD_GATEWAY,
                _ => StatusCode::SERVICE_UNAVAILABLE,
            };
            text(status, message)
        }
    }
}

/// `POST /cache/delete`
pub async fn delete_cache(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let presented = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());
    match (&state.admin_token, presented) {
        (Some(expected), Some(given)) if expected == given => {}
        _ => {
            warn!("rejected cache delete with bad admin token");
            return text(StatusCode::UNAUTHORIZED, "Unauthorized");
        }
    }

    let body: DeleteRequest = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(e) => return text(StatusCode::BAD_REQUEST, format!("Bad Request: {e}")),
    };

    match state.gateway.delete_cached(&body.into()).await {
        Ok((key, true)) => text(StatusCode::OK, format!("Deleted: {key}")),
        Ok((key, false)) => text(StatusCode::NOT_FOUND, format!("Not Found: {key}")),
        Err(e) => {
            error!(error = %e, "cache delete failed");
            text(StatusCode::INTERNAL_SERVER_ERROR, format!("Cache error: {e}"))
        }
    }
}

/// `GET /status`
pub async fn status(State(state): State<Arc<AppState>>) -> Json<GatewayStatus> {
    Json(state.gateway.status())
}
