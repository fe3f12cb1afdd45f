//! Extraction of the usable prompt from free-form LLM output.
//!
//! Strategies run in order; the first one yielding non-empty text wins.

use std::sync::LazyLock;

use regex::Regex;

/// One extraction strategy.
pub type Extractor = fn(&str) -> Option<String>;

/// Ordered extraction strategies.
pub const EXTRACTORS: &[Extractor] = &[closed_tag, open_tag, labeled, cleaned_response];

/// Responses shorter than this (after cleanup) are not accepted as a prompt
/// by the last-resort strategy.
const MIN_CLEANED_LEN: usize = 10;

static CLOSED_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<prompt\s*>([\s\S]*?)</prompt\s*>").expect("valid regex"));

static OPEN_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<prompt\s*>\s*([\s\S]*)").expect("valid regex"));

static CLOSING_TAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</prompt\s*>[\s\S]*$").expect("valid regex"));

static LABELS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"enhanced\s*prompt",
        r"optimized\s*prompt",
        r"improved\s*prompt",
        r"final\s*prompt",
        r"result",
        r"here['’]?s\s+the\s+enhanced\s+prompt",
        r"the\s+enhanced\s+prompt\s+is",
        r"safe\s+rewritten\s+prompt",
        r"rewritten\s+prompt",
    ]
    .iter()
    .map(|label| Regex::new(&format!(r"(?i){label}\s*:?\s*\n?([\s\S]*)")).expect("valid regex"))
    .collect()
});

static FENCE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```[a-z]*\n?").expect("valid regex"));
static FENCE_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n?```$").expect("valid regex"));
static EDGE_QUOTES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^['"]|['"]$"#).expect("valid regex"));
static EDGE_BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\*\*|\*\*$").expect("valid regex"));
static LEAD_IN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^here'?s?\s+(the\s+)?(enhanced|optimized|improved|safe\s+rewritten|rewritten)\s+prompt:?\s*",
    )
    .expect("valid regex")
});
static LEAD_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(enhanced|optimized|improved|safe\s+rewritten|rewritten)\s+prompt:?\s*")
        .expect("valid regex")
});

/// Run every strategy in order and return the first hit.
pub fn extract_prompt(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        return None;
    }
    EXTRACTORS.iter().find_map(|extract| extract(raw))
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Strip code fences, wrapping quotes and bold markers.
fn strip_decorations(text: &str) -> String {
    let text = FENCE_OPEN.replace(text, "");
    let text = FENCE_CLOSE.replace(&text, "");
    let text = EDGE_QUOTES.replace_all(&text, "");
    let text = EDGE_BOLD.replace_all(&text, "");
    text.into_owned()
}

/// `<prompt>...</prompt>`
fn closed_tag(raw: &str) -> Option<String> {
    CLOSED_TAG
        .captures(raw)
        .and_then(|c| c.get(1))
        .and_then(|m| non_empty(m.as_str()))
}

/// `<prompt>` with no matching close; takes everything after it.
fn open_tag(raw: &str) -> Option<String> {
    let body = OPEN_TAG.captures(raw)?.get(1)?.as_str().trim();
    non_empty(&CLOSING_TAIL.replace(body, ""))
}

/// `Enhanced prompt: ...` and similar labels.
fn labeled(raw: &str) -> Option<String> {
    LABELS.iter().find_map(|label| {
        let body = label.captures(raw)?.get(1)?.as_str().trim();
        if body.is_empty() {
            return None;
        }
        non_empty(&strip_decorations(body))
    })
}

/// Whole response minus decorations and lead-ins.
fn cleaned_response(raw: &str) -> Option<String> {
    let text = strip_decorations(raw);
    let text = LEAD_IN.replace(&text, "");
    let text = LEAD_LABEL.replace(&text, "");
    let text = text.trim();
    (text.chars().count() > MIN_CLEANED_LEN).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_tag_wins() {
        let raw = "Sure!\n<prompt>\n  a misty forest at dawn\n</prompt>\nEnhanced prompt: other";
        assert_eq!(extract_prompt(raw).as_deref(), Some("a misty forest at dawn"));
    }

    #[test]
    fn tags_are_case_insensitive() {
        assert_eq!(
            extract_prompt("<PROMPT >glowing jellyfish</Prompt>").as_deref(),
            Some("glowing jellyfish")
        );
    }

    #[test]
    fn empty_closed_tag_is_skipped() {
        let raw = "<prompt>  </prompt> a lighthouse in heavy rain";
        assert_eq!(extract_prompt(raw).as_deref(), Some(raw));
    }

    #[test]
    fn unterminated_tag_takes_rest() {
        assert_eq!(
            extract_prompt("Here you go: <prompt> a brass robot reading").as_deref(),
            Some("a brass robot reading")
        );
    }

    #[test]
    fn label_with_decorations() {
        let raw = "Enhanced prompt:\n\"**a koi pond under lanterns**\"";
        assert_eq!(
            extract_prompt(raw).as_deref(),
            Some("a koi pond under lanterns")
        );
    }

    #[test]
    fn safe_rewrite_label() {
        let raw = "Safe rewritten prompt: two knights sparring in a courtyard";
        assert_eq!(
            extract_prompt(raw).as_deref(),
            Some("two knights sparring in a courtyard")
        );
    }

    #[test]
    fn plain_response_used_when_long_enough() {
        assert_eq!(
            extract_prompt("a watercolor harbor at sunset").as_deref(),
            Some("a watercolor harbor at sunset")
        );
    }

    #[test]
    fn short_plain_response_rejected() {
        assert!(extract_prompt("cat").is_none());
        assert!(extract_prompt("   ").is_none());
    }
}
