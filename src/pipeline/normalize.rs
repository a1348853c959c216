use std::sync::OnceLock;

use regex::Regex;

/// Placeholder substituted for URLs when masking is enabled.
pub const LINK_PLACEHOLDER: &str = "[link]";

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)[a-z][a-z0-9+.\-]*://\S+").expect("valid URL regex"))
}

/// Collapse whitespace runs to a single space, trim, and optionally mask URLs.
pub fn normalize(raw: &str, strip_urls: bool) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if strip_urls {
        url_pattern()
            .replace_all(&collapsed, LINK_PLACEHOLDER)
            .into_owned()
    } else {
        collapsed
    }
}

/// Length in characters, not bytes.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(normalize("  hello \t\n  world  ", false), "hello world");
        assert_eq!(normalize("   ", false), "");
    }

    #[test]
    fn test_masks_urls_case_insensitively() {
        assert_eq!(
            normalize("see HTTPS://Example.com/a?b=1 now", true),
            "see [link] now"
        );
        assert_eq!(normalize("ftp://files.host x", true), "[link] x");
        assert_eq!(
            normalize("see https://example.com", false),
            "see https://example.com"
        );
    }

    #[test]
    fn test_no_double_whitespace_and_idempotent() {
        let inputs = [
            "a  b",
            "\u{3000}안녕\u{3000}\u{3000}하세요 ",
            "x\r\n\r\ny",
            "http://a.b  http://c.d",
            "",
            "  AI   안녕  ",
        ];
        for input in inputs {
            for strip in [true, false] {
                let once = normalize(input, strip);
                assert!(
                    !once
                        .chars()
                        .zip(once.chars().skip(1))
                        .any(|(a, b)| a.is_whitespace() && b.is_whitespace()),
                    "double whitespace in {:?}",
                    once
                );
                assert_eq!(normalize(&once, strip), once);
            }
        }
    }

    #[test]
    fn test_char_len_counts_characters() {
        assert_eq!(char_len("안녕"), 2);
        assert_eq!(char_len("hi"), 2);
    }
}
