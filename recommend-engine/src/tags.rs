//! Tag extractor (C1): turns a video's metadata into a normalized tag set.

use once_cell::sync::Lazy;
use std::collections::HashSet;

use crate::models::TagSet;

/// Fixed punctuation class replaced with whitespace before tokenizing.
const PUNCTUATION: &[char] = &[
    ',', '|', '#', '@', '~', '\'', '"', '\\', '/', '_', '-', '[', ']', '+', '*', '{', '}', ';',
    ':', '`', '=', '【', '】', '(', ')', '.', '’', '?',
];

/// Emoji ranges stripped before tokenizing (spec.md §4.1).
const EMOJI_RANGES: &[(u32, u32)] = &[
    (0x1F300, 0x1F64F),
    (0x1F680, 0x1F6FF),
    (0x2600, 0x2B55),
];

/// Representative fixed stop-word set. The original implementation's
/// `stop_words_set` is not part of the retrieved source; this list covers
/// the common English function words it would have filtered.
static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "and", "for", "are", "but", "not", "you", "all", "can", "her", "was", "one",
        "our", "out", "day", "get", "has", "him", "his", "how", "man", "new", "now", "old",
        "see", "two", "way", "who", "boy", "did", "its", "let", "put", "say", "she", "too",
        "use", "with", "that", "this", "from", "they", "have", "will", "would", "there",
        "their", "what", "about", "when", "which", "your", "been", "were", "said", "each",
        "into", "than", "them", "then", "some", "such", "only", "over", "also", "just",
        "more", "most", "other", "very", "after", "before", "being", "between", "both",
        "during", "under", "while", "should", "could", "does", "did", "doing", "itself",
    ]
    .into_iter()
    .collect()
});

fn strip_emoji(input: &str) -> String {
    input
        .chars()
        .filter(|c| {
            let cp = *c as u32;
            !EMOJI_RANGES.iter().any(|(lo, hi)| cp >= *lo && cp <= *hi)
        })
        .collect()
}

fn strip_punctuation(input: &str) -> String {
    input
        .chars()
        .map(|c| if PUNCTUATION.contains(&c) { ' ' } else { c })
        .collect()
}

/// Extracts and normalizes the tag set from a video's `title` and `tag` list.
///
/// Deterministic function of the input metadata, as required by spec.md §3
/// and exercised by the idempotency property in spec.md §8.
pub fn extract_tags(title: &str, tags: &[String]) -> TagSet {
    let mut sentence = tags.join(" ");
    if !title.is_empty() {
        sentence.push(' ');
        sentence.push_str(title);
    }

    let sentence = sentence.to_lowercase();
    let sentence = strip_emoji(&sentence);
    let sentence = strip_punctuation(&sentence);

    sentence
        .split_whitespace()
        .filter(|word| word.len() > 1 && word.len() <= 30)
        .filter(|word| word.chars().all(|c| c.is_ascii_alphabetic()))
        .filter(|word| !STOP_WORDS.contains(word))
        .map(|word| word.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_punctuation_and_lowercases() {
        let tags = vec!["Bollywood_Dance".to_string(), "Top-10".to_string()];
        let result = extract_tags("A Great #Performance", &tags);
        assert!(result.contains("bollywood"));
        assert!(result.contains("dance"));
        assert!(result.contains("performance"));
        assert!(!result.contains("top"));
        assert!(!result.contains("10"));
    }

    #[test]
    fn drops_short_and_long_and_stopword_tokens() {
        let tags = vec!["a".to_string(), "ok".to_string(), "and".to_string()];
        let long_token = "x".repeat(31);
        let result = extract_tags(&long_token, &tags);
        assert!(!result.contains("a"));
        assert!(result.contains("ok"));
        assert!(!result.contains("and"));
        assert!(!result.contains(&long_token));
    }

    #[test]
    fn strips_emoji_ranges() {
        let tags = vec!["dance\u{1F600}party".to_string()];
        let result = extract_tags("", &tags);
        assert!(result.iter().all(|t| t.chars().all(|c| c.is_ascii_alphabetic())));
    }

    #[test]
    fn empty_input_yields_empty_set() {
        let result = extract_tags("", &[]);
        assert!(result.is_empty());
    }

    #[test]
    fn idempotent_under_restringification() {
        let tags = vec!["Bollywood".to_string(), "Series".to_string()];
        let first = extract_tags("Great Show", &tags);
        let mut reinput: Vec<String> = first.iter().cloned().collect();
        reinput.sort();
        let second = extract_tags("", &reinput);
        assert_eq!(first, second);
    }
}
