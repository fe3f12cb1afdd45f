//! Prompt transforms: LLM optimization and safety rewrite.

pub mod extract;
pub mod templates;
mod transformer;

pub use extract::extract_prompt;
pub use templates::{DEFAULT_OPTIMIZE_TEMPLATE, DEFAULT_SAFETY_TEMPLATE, resolve_template};
pub use transformer::{PromptTransformer, TransformOperation, finalize_length};
