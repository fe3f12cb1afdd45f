//! Prompt templates for the two LLM transforms.

use std::path::Path;

use crate::{HuginnError, Result};

/// Placeholder replaced with the input prompt.
pub const PLACEHOLDER: &str = "{ORIGINAL_PROMPT}";

/// Default template for prompt optimization.
pub const DEFAULT_OPTIMIZE_TEMPLATE: &str = "You are an expert AI art prompt engineer. Your task is to transform the user's input into a detailed, high-quality prompt for image generation.

Guidelines:
- Enhance artistic details, lighting, composition, and style
- Add specific technical photography/art terms when appropriate
- Maintain the core concept and intent of the original prompt
- Keep the result under 200 words
- Be creative but stay focused on the original idea

Original prompt: {ORIGINAL_PROMPT}

Enhanced prompt:";

/// Default template for the safety rewrite.
pub const DEFAULT_SAFETY_TEMPLATE: &str = "You are an AI content safety specialist. Your task is to rewrite an image generation prompt to remove any potentially unsafe, inappropriate, or NSFW (Not Safe For Work) content while preserving the core artistic intent.

Guidelines:
- Remove or replace any explicit, sexual, violent, or inappropriate content
- Keep the artistic style, composition, and technical details
- Maintain the overall creative vision but make it family-friendly
- Use tasteful, appropriate alternatives for problematic terms
- Keep the result under 200 words
- Focus on the artistic and aesthetic aspects

Original prompt: {ORIGINAL_PROMPT}

Safe rewritten prompt:";

/// Substitute the first placeholder occurrence with `text`.
pub fn render(template: &str, text: &str) -> String {
    template.replacen(PLACEHOLDER, text, 1)
}

/// Resolve a template: file first, then inline text (with literal `\n`
/// sequences expanded), then the default.
pub fn resolve_template(file: Option<&Path>, inline: Option<&str>, default: &str) -> Result<String> {
    if let Some(path) = file {
        return std::fs::read_to_string(path).map_err(|e| {
            HuginnError::Configuration(format!("failed to read template file {path:?}: {e}"))
        });
    }
    match inline.filter(|s| !s.is_empty()) {
        Some(inline) => Ok(inline.replace("\\n", "\n")),
        None => Ok(default.to_string()),
    }
}
