use crate::config::FilterConfig;

use super::normalize::char_len;

/// Why a message was dropped by the filter chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    TooShort(usize),
    TooLong(usize),
    IgnoredPrefix(String),
    IgnoredWord(String),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::TooShort(len) => write!(f, "too short ({} chars)", len),
            Rejection::TooLong(len) => write!(f, "too long ({} chars)", len),
            Rejection::IgnoredPrefix(p) => write!(f, "ignored prefix {:?}", p),
            Rejection::IgnoredWord(w) => write!(f, "ignored word {:?}", w),
        }
    }
}

/// A single admission predicate over normalized text
#[derive(Debug, Clone)]
enum Predicate {
    Length { min: usize, max: usize },
    Prefix(Vec<String>),
    Word(Vec<String>),
}

impl Predicate {
    fn check(&self, normalized: &str) -> Result<(), Rejection> {
        match self {
            Predicate::Length { min, max } => {
                let len = char_len(normalized);
                if len < *min {
                    Err(Rejection::TooShort(len))
                } else if len > *max {
                    Err(Rejection::TooLong(len))
                } else {
                    Ok(())
                }
            }
            Predicate::Prefix(prefixes) => {
                match prefixes.iter().find(|p| normalized.starts_with(p.as_str())) {
                    Some(p) => Err(Rejection::IgnoredPrefix(p.clone())),
                    None => Ok(()),
                }
            }
            Predicate::Word(words) => {
                let lower = normalized.to_lowercase();
                match words.iter().find(|w| lower.contains(w.as_str())) {
                    Some(w) => Err(Rejection::IgnoredWord(w.clone())),
                    None => Ok(()),
                }
            }
        }
    }
}

/// Ordered predicates; the first failure wins.
#[derive(Debug, Clone)]
pub struct FilterChain {
    predicates: Vec<Predicate>,
}

impl FilterChain {
    pub fn from_config(config: &FilterConfig) -> Self {
        let prefixes: Vec<String> = config
            .ignored_prefixes
            .iter()
            .filter(|p| !p.is_empty())
            .cloned()
            .collect();
        let words: Vec<String> = config
            .ignored_words
            .iter()
            .map(|w| w.to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();

        let mut predicates = vec![Predicate::Length {
            min: config.min_message_len,
            max: config.max_message_len,
        }];
        if !prefixes.is_empty() {
            predicates.push(Predicate::Prefix(prefixes));
        }
        if !words.is_empty() {
            predicates.push(Predicate::Word(words));
        }

        Self { predicates }
    }

    pub fn check(&self, normalized: &str) -> Result<(), Rejection> {
        self.predicates.iter().try_for_each(|p| p.check(normalized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(min: usize, max: usize, prefixes: &[&str], words: &[&str]) -> FilterConfig {
        FilterConfig {
            min_message_len: min,
            max_message_len: max,
            ignored_prefixes: prefixes.iter().map(|s| s.to_string()).collect(),
            ignored_words: words.iter().map(|s| s.to_string()).collect(),
            strip_urls: true,
        }
    }

    #[test]
    fn test_length_bounds_are_inclusive() {
        let chain = FilterChain::from_config(&config(3, 5, &[], &[]));
        assert_eq!(chain.check("ab"), Err(Rejection::TooShort(2)));
        assert_eq!(chain.check("abc"), Ok(()));
        assert_eq!(chain.check("abcde"), Ok(()));
        assert_eq!(chain.check("abcdef"), Err(Rejection::TooLong(6)));
    }

    #[test]
    fn test_length_counts_characters() {
        let chain = FilterChain::from_config(&config(2, 3, &[], &[]));
        assert_eq!(chain.check("안녕"), Ok(()));
        assert_eq!(chain.check("안녕하세"), Err(Rejection::TooLong(4)));
    }

    #[test]
    fn test_ignored_prefix() {
        let chain = FilterChain::from_config(&config(1, 100, &["!", "/"], &[]));
        assert_eq!(
            chain.check("!skip this"),
            Err(Rejection::IgnoredPrefix("!".to_string()))
        );
        assert_eq!(
            chain.check("/cmd"),
            Err(Rejection::IgnoredPrefix("/".to_string()))
        );
        assert_eq!(chain.check("hi ! there"), Ok(()));
    }

    #[test]
    fn test_ignored_word_is_case_insensitive_substring() {
        let chain = FilterChain::from_config(&config(1, 100, &[], &["Spam"]));
        assert_eq!(
            chain.check("buy SPAMMY stuff"),
            Err(Rejection::IgnoredWord("spam".to_string()))
        );
        assert_eq!(chain.check("hello"), Ok(()));
    }

    #[test]
    fn test_short_circuits_on_first_failure() {
        let chain = FilterChain::from_config(&config(5, 100, &["!"], &["x"]));
        assert_eq!(chain.check("!x"), Err(Rejection::TooShort(2)));
    }

    #[test]
    fn test_empty_lists_always_pass() {
        let chain = FilterChain::from_config(&config(0, 100, &[], &[]));
        assert_eq!(chain.check("!anything goes /"), Ok(()));
    }
}
