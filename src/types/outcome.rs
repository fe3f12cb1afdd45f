//! Generation outcomes reported by the orchestrator

use super::GeneratedImage;

/// Result of one generation attempt, or of a whole attempt loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// An image was produced.
    Success(GeneratedImage),
    /// Content-policy rejection. Recoverable via another backend, a safety
    /// rewrite, or the fallback provider.
    Blocked { reason: String },
    /// Technical failure (network, non-2xx, unfetchable image URL).
    Error { reason: String },
}

/// Coarse outcome category, used for metrics labels and failure responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    Success,
    Blocked,
    Error,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::Blocked => "blocked",
            OutcomeKind::Error => "error",
        }
    }
}

impl GenerationOutcome {
    pub fn blocked(reason: impl Into<String>) -> Self {
        GenerationOutcome::Blocked {
            reason: reason.into(),
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        GenerationOutcome::Error {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            GenerationOutcome::Success(_) => OutcomeKind::Success,
            GenerationOutcome::Blocked { .. } => OutcomeKind::Blocked,
            GenerationOutcome::Error { .. } => OutcomeKind::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, GenerationOutcome::Success(_))
    }

    /// Failure reason, or `None` on success.
    pub fn reason(&self) -> Option<&str> {
        match self {
            GenerationOutcome::Success(_) => None,
            GenerationOutcome::Blocked { reason } | GenerationOutcome::Error { reason } => {
                Some(reason)
            }
        }
    }
}

/// Final outcome of an attempt loop plus whether any attempt along the
/// way was blocked. The flag drives safety escalation, even when the
/// final outcome is an `Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptSummary {
    pub outcome: GenerationOutcome,
    pub was_blocked: bool,
}
