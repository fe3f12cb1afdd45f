//! Huginn - caching image-generation proxy
//!
//! Accepts an image prompt, routes it to one of several interchangeable
//! OpenAI-compatible generation backends, recovers from content-policy
//! rejections and backend failures, and memoizes results in a
//! content-addressed cache.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use huginn::cache::LocalStore;
//! use huginn::providers::BackendPool;
//! use huginn::{ImageGateway, ImageRequest, ImageResponse};
//!
//! #[tokio::main]
//! async fn main() -> huginn::Result<()> {
//!     let gateway = ImageGateway::builder()
//!         .store(Arc::new(LocalStore::open("./image_file_cache").await?))
//!         .pool(BackendPool::new(["http://gpu-1:8000", "http://gpu-2:8000"])?)
//!         .build()?;
//!
//!     let request = ImageRequest::new("a lighthouse at dusk").width(1024).height(768);
//!     match gateway.handle(request).await {
//!         ImageResponse::Image { bytes, content_type } => {
//!             println!("{} bytes of {content_type}", bytes.len());
//!         }
//!         ImageResponse::Redirect { url } => println!("hosted at {url}"),
//!         ImageResponse::Failure { message, .. } => eprintln!("{message}"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod error;
pub mod gateway;
pub mod prompt;
pub mod providers;
#[cfg(feature = "server")]
pub mod server;
pub mod telemetry;
pub mod types;

/// Crate version, as reported by the status endpoint.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export main types at crate root
pub use cache::{CacheKey, CacheMode, CacheRecord, CacheStore};
pub use error::{HuginnError, Result};
pub use gateway::{GatewayBuilder, GatewayStatus, ImageGateway, ImageResponse};
pub use types::{
    AttemptSummary, DEFAULT_SEED, GeneratedImage, GenerationOutcome, ImageRequest, OutcomeKind,
};
