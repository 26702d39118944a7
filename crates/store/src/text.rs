//! `$text` search over fields covered by a text index.

use labcheck_core::{lookup_path, Document, Error, Result, Value};

/// Parsed `$text` operand.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TextSearch {
    terms: Vec<String>,
    negated: Vec<String>,
    phrases: Vec<String>,
    case_sensitive: bool,
}

impl TextSearch {
    /// Parse `{ $search: "...", $caseSensitive: bool }`.
    pub(crate) fn parse(spec: &Value) -> Result<Self> {
        let map = spec
            .as_object()
            .ok_or_else(|| Error::InvalidQuery("$text expects an object".to_string()))?;
        let search = map
            .get("$search")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidQuery("$search needs a String".to_string()))?;
        let case_sensitive = map
            .get("$caseSensitive")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        for key in map.keys() {
            if !matches!(key.as_str(), "$search" | "$caseSensitive" | "$language" | "$diacriticSensitive") {
                return Err(Error::InvalidQuery(format!(
                    "extra fields in $text: {}",
                    key
                )));
            }
        }

        let fold = |s: &str| if case_sensitive { s.to_string() } else { s.to_lowercase() };

        let mut phrases = Vec::new();
        let mut rest = String::new();
        for (i, chunk) in search.split('"').enumerate() {
            // Odd chunks sit between quotes
            if i % 2 == 1 {
                if !chunk.trim().is_empty() {
                    phrases.push(fold(chunk.trim()));
                }
            } else {
                rest.push(' ');
                rest.push_str(chunk);
            }
        }

        let mut terms = Vec::new();
        let mut negated = Vec::new();
        for word in rest.split_whitespace() {
            if let Some(neg) = word.strip_prefix('-') {
                negated.extend(tokenize(neg, case_sensitive));
            } else {
                terms.extend(tokenize(word, case_sensitive));
            }
        }

        Ok(TextSearch {
            terms,
            negated,
            phrases,
            case_sensitive,
        })
    }

    /// Whether the document's indexed text satisfies the search.
    ///
    /// Any positive term (or every phrase) must be present and no negated
    /// term may be.
    pub(crate) fn matches(&self, doc: &Document, fields: &[String]) -> bool {
        let text = indexed_text(doc, fields);
        let haystack = if self.case_sensitive {
            text.clone()
        } else {
            text.to_lowercase()
        };
        let tokens = tokenize(&text, self.case_sensitive);

        if self.negated.iter().any(|n| contains_token(&tokens, n)) {
            return false;
        }
        if !self.phrases.is_empty() {
            return self.phrases.iter().all(|p| haystack.contains(p.as_str()));
        }
        self.terms.iter().any(|t| contains_token(&tokens, t))
    }

    /// Number of positive terms found, used as a relevance score.
    pub(crate) fn score(&self, doc: &Document, fields: &[String]) -> f64 {
        let tokens = tokenize(&indexed_text(doc, fields), self.case_sensitive);
        self.terms
            .iter()
            .map(|t| tokens.iter().filter(|tok| stem(tok) == stem(t)).count())
            .sum::<usize>() as f64
    }
}

fn indexed_text(doc: &Document, fields: &[String]) -> String {
    let mut parts = Vec::new();
    for field in fields {
        for value in lookup_path(doc, field) {
            push_strings(value, &mut parts);
        }
    }
    parts.join(" ")
}

fn push_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) => out.push(s),
        Value::Array(items) => items.iter().for_each(|v| push_strings(v, out)),
        _ => {}
    }
}

fn tokenize(text: &str, case_sensitive: bool) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| if case_sensitive { w.to_string() } else { w.to_lowercase() })
        .collect()
}

fn contains_token(tokens: &[String], term: &str) -> bool {
    let term = stem(term);
    tokens.iter().any(|t| stem(t) == term)
}

/// Minimal plural folding so "lattes" finds "latte".
fn stem(word: &str) -> &str {
    if word.len() > 3 {
        word.strip_suffix("es")
            .filter(|w| w.ends_with(['s', 'x', 'z']) || w.ends_with("ch") || w.ends_with("sh"))
            .or_else(|| word.strip_suffix('s').filter(|w| !w.ends_with('s')))
            .unwrap_or(word)
    } else {
        word
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labcheck_core::into_document;
    use serde_json::json;

    fn fields() -> Vec<String> {
        vec!["name".to_string(), "tags".to_string()]
    }

    #[test]
    fn test_term_match_is_case_insensitive() {
        let doc = into_document(json!({"name": "Dark Roast Coffee", "tags": ["beans"]})).unwrap();
        let search = TextSearch::parse(&json!({"$search": "COFFEE tea"})).unwrap();
        assert!(search.matches(&doc, &fields()));
    }

    #[test]
    fn test_plural_folding() {
        let doc = into_document(json!({"name": "Vanilla Lattes"})).unwrap();
        let search = TextSearch::parse(&json!({"$search": "latte"})).unwrap();
        assert!(search.matches(&doc, &fields()));
    }

    #[test]
    fn test_negation_excludes() {
        let doc = into_document(json!({"name": "Decaf Coffee"})).unwrap();
        let search = TextSearch::parse(&json!({"$search": "coffee -decaf"})).unwrap();
        assert!(!search.matches(&doc, &fields()));
    }

    #[test]
    fn test_phrase_requires_exact_sequence() {
        let doc = into_document(json!({"name": "cold brew coffee"})).unwrap();
        let hit = TextSearch::parse(&json!({"$search": "\"cold brew\""})).unwrap();
        let miss = TextSearch::parse(&json!({"$search": "\"brew cold\""})).unwrap();
        assert!(hit.matches(&doc, &fields()));
        assert!(!miss.matches(&doc, &fields()));
    }

    #[test]
    fn test_search_must_be_string() {
        assert!(TextSearch::parse(&json!({"$search": 5})).is_err());
        assert!(TextSearch::parse(&json!({"$search": "x", "$bogus": 1})).is_err());
    }

    #[test]
    fn test_score_counts_hits() {
        let doc = into_document(json!({"name": "coffee coffee tea"})).unwrap();
        let search = TextSearch::parse(&json!({"$search": "coffee"})).unwrap();
        assert_eq!(search.score(&doc, &fields()), 2.0);
    }
}
