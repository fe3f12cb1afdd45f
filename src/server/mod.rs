//! HTTP surface for the gateway.
//!
//! Routes:
//! - `GET /prompt/{*description}?key=&width=&height=&model=&seed=`
//! - `POST /cache/delete` (admin, `X-Admin-Token`)
//! - `GET /status`

mod bootstrap;
pub mod config;
mod handlers;

pub use bootstrap::build_gateway;
pub use config::{Config, Secrets};

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use crate::gateway::ImageGateway;

/// Shared state for request handlers.
pub struct AppState {
    pub gateway: ImageGateway,
    /// Required `key` query parameter for image requests.
    pub proxy_key: String,
    /// `X-Admin-Token` for cache deletion. `None` disables the endpoint.
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn new(gateway: ImageGateway, proxy_key: impl Into<String>) -> Self {
        Self {
            gateway,
            proxy_key: proxy_key.into(),
            admin_token: None,
        }
    }

    pub fn admin_token(mut self, token: Option<String>) -> Self {
        self.admin_token = token.filter(|t| !t.is_empty());
        self
    }
}

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/prompt/{*description}", get(handlers::generate_image))
        .route("/cache/delete", post(handlers::delete_cache))
        .route("/status", get(handlers::status))
        .with_state(state)
}
