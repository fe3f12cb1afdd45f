//! Public types for the Huginn API.

mod image;
mod outcome;
mod request;

pub use image::{GeneratedImage, decode_base64_image, detect_content_type_from_base64};
pub use outcome::{AttemptSummary, GenerationOutcome, OutcomeKind};
pub use request::{DEFAULT_SEED, ImageRequest};
