//! Small text utilities shared by the retrieval filter and the model-output
//! parsers: query keyword extraction and tolerant JSON coercion.

use serde_json::Value;

const STOP_WORDS: &[&str] = &[
    "i", "need", "a", "an", "the", "for", "with", "and", "or", "of", "to", "me", "my", "is",
    "there", "something", "better", "about", "on", "in", "it", "this", "that", "looking", "want",
    "would", "like",
];

const MAX_KEYWORDS: usize = 8;

/// Extracts up to eight lower-cased content keywords from a user query.
/// Non-alphanumeric characters become separators; stop-words and tokens of
/// length <= 2 are dropped.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut sanitized = String::with_capacity(text.len());
    for character in text.chars() {
        if character.is_ascii_alphanumeric() {
            sanitized.push(character.to_ascii_lowercase());
        } else {
            sanitized.push(' ');
        }
    }

    sanitized
        .split_whitespace()
        .filter(|token| token.len() > 2 && !STOP_WORDS.contains(token))
        .take(MAX_KEYWORDS)
        .map(str::to_owned)
        .collect()
}

/// Extracts the JSON object embedded in free-form model text by taking the
/// span from the first `{` to the last `}`, tolerating surrounding prose.
/// Returns `None` when no parseable object is present; call sites supply
/// their own fallback instead of propagating an implicit null.
pub fn extract_json(text: &str) -> Option<Value> {
    let start = text.find('{');
    let end = text.rfind('}');
    let span = match (start, end) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text,
    };
    serde_json::from_str(span).ok()
}

#[cfg(test)]
mod tests {
    use super::{extract_json, extract_keywords};

    #[test]
    fn keywords_drop_stop_words_and_short_tokens() {
        let keywords = extract_keywords("I need a massager for my neck and shoulders");
        assert_eq!(keywords, vec!["massager", "neck", "shoulders"]);
    }

    #[test]
    fn keywords_are_capped_at_eight() {
        let keywords = extract_keywords(
            "wireless ergonomic portable rechargeable waterproof foldable adjustable compact \
             lightweight durable",
        );
        assert_eq!(keywords.len(), 8);
    }

    #[test]
    fn keywords_strip_punctuation() {
        let keywords = extract_keywords("what's the price of the ECG-device?");
        assert!(keywords.contains(&"price".to_owned()));
        assert!(keywords.contains(&"ecg".to_owned()));
        assert!(keywords.contains(&"device".to_owned()));
    }

    #[test]
    fn empty_query_yields_no_keywords() {
        assert!(extract_keywords("is it for me?").is_empty());
    }

    #[test]
    fn json_is_extracted_from_surrounding_prose() {
        let value = extract_json(
            r#"I think {"not_available":true,"reason":"no neck massagers"} is best"#,
        )
        .expect("prose-wrapped object should parse");
        assert_eq!(value["not_available"], true);
        assert_eq!(value["reason"], "no neck massagers");
    }

    #[test]
    fn bare_json_parses_without_braces_elsewhere() {
        let value = extract_json(r#"{"mode":"NEW_PRODUCT","reason":"new request"}"#)
            .expect("bare object should parse");
        assert_eq!(value["mode"], "NEW_PRODUCT");
    }

    #[test]
    fn garbage_yields_none_rather_than_panic() {
        assert!(extract_json("no json here").is_none());
        assert!(extract_json("{broken").is_none());
        assert!(extract_json("}{").is_none());
    }
}
