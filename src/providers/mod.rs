//! Upstream capabilities and the generation attempt loop.
//!
//! The traits in [`traits`] are the seams; the remaining modules hold the
//! HTTP clients that implement them and the orchestration built on top.

pub mod backend;
pub mod completion;
pub mod fallback;
pub mod hosting;
pub mod orchestrator;
pub mod pool;
pub mod traits;

pub use backend::OpenAiImageBackend;
pub use completion::{ChatCompletionClient, DEFAULT_COMPLETION_MODEL};
pub use fallback::PollinationsClient;
pub use hosting::{
    CloudflareImgbedUploader, HostingProvider, HostingSettings, PicGoUploader, SmMsUploader,
};
pub use orchestrator::{BackendSettings, DEFAULT_BLOCKED_RETRY_ATTEMPTS, GenerationOrchestrator};
pub use pool::BackendPool;
pub use traits::{BackendCall, CompletionProvider, FallbackProvider, ImageBackend, ImageUploader};
