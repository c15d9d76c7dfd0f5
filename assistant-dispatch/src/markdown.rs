use regex::Regex;
use std::sync::LazyLock;

static REPLACEMENTS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"\*\*(.*?)\*\*", "${1}"),
        (r"\*(.*?)\*", "${1}"),
        (r"__(.*?)__", "${1}"),
        (r"_(.*?)_", "${1}"),
        (r"`([^`]+)`", "${1}"),
        (r"#{1,6}\s?", ""),
        (r"\n{3,}", "\n\n"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| {
        (
            Regex::new(pattern).expect("Invalid markdown pattern"),
            replacement,
        )
    })
    .collect()
});

/// Removes inline emphasis, code spans and heading markers from a model reply.
pub fn strip_markdown(text: &str) -> String {
    let stripped = REPLACEMENTS
        .iter()
        .fold(text.to_string(), |acc, (regex, replacement)| {
            regex.replace_all(&acc, *replacement).into_owned()
        });
    stripped.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_emphasis_and_code() {
        assert_eq!(
            strip_markdown("**Rest** well and _hydrate_, take `ibuprofen`"),
            "Rest well and hydrate, take ibuprofen"
        );
    }

    #[test]
    fn test_strips_headings_and_extra_newlines() {
        assert_eq!(
            strip_markdown("## Advice\n\n\n\nSleep *more*\n"),
            "Advice\n\nSleep more"
        );
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(strip_markdown("  Hello, I am your Health Assistant.  "), "Hello, I am your Health Assistant.");
    }
}
