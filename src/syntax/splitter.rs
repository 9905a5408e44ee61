//! Splits cleaned text into keyword-delimited components.
//!
//! A component runs from a top-level keyword (or the qualifier in front of
//! it) to the next one, whatever its internal line layout.

use crate::syntax::keywords::{Keyword, Qualifier};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub keyword: Keyword,
    pub qualifier: Option<Qualifier>,
    pub text: String,
    /// Byte offset of the component in the cleaned text.
    pub offset: usize,
    /// One-based line of the component in the cleaned text.
    pub line: usize,
}

/// Text that precedes the first keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stray {
    pub text: String,
    pub offset: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Split {
    pub leading: Option<Stray>,
    pub components: Vec<Component>,
}

struct Start {
    offset: usize,
    keyword: Keyword,
    qualifier: Option<Qualifier>,
}

pub fn split(text: &str) -> Split {
    let starts = keyword_starts(text);

    let leading_end = starts.first().map_or(text.len(), |s| s.offset);
    let leading_text = &text[..leading_end];
    let leading = match leading_text.trim() {
        "" => None,
        trimmed => Some(Stray {
            text: trimmed.to_string(),
            offset: leading_text.len() - leading_text.trim_start().len(),
        }),
    };

    let components = starts
        .iter()
        .enumerate()
        .map(|(i, start)| {
            let end = starts.get(i + 1).map_or(text.len(), |next| next.offset);
            Component {
                keyword: start.keyword,
                qualifier: start.qualifier,
                text: text[start.offset..end].trim_end().to_string(),
                offset: start.offset,
                line: line_of(text, start.offset),
            }
        })
        .collect();

    Split {
        leading,
        components,
    }
}

pub fn line_of(text: &str, offset: usize) -> usize {
    text.as_bytes()[..offset.min(text.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

// ============================================================================
// SCANNING
// ============================================================================

fn keyword_starts(text: &str) -> Vec<Start> {
    let bytes = text.as_bytes();
    let mut starts = Vec::new();
    let mut in_string = false;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'"' {
            in_string = !in_string;
            i += 1;
            continue;
        }
        if in_string || !starts_word(bytes, i) {
            i += 1;
            continue;
        }
        if let Some((qualifier, len)) = match_qualifier(text, i) {
            let after = skip_whitespace(bytes, i + len);
            if let Some((keyword, klen)) = match_keyword(text, after) {
                if keyword.accepts(qualifier) {
                    starts.push(Start {
                        offset: i,
                        keyword,
                        qualifier: Some(qualifier),
                    });
                    i = after + klen;
                    continue;
                }
            }
        }
        if let Some((keyword, len)) = match_keyword(text, i) {
            starts.push(Start {
                offset: i,
                keyword,
                qualifier: None,
            });
            i += len;
            continue;
        }
        i += 1;
    }
    starts
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'\''
}

fn starts_word(bytes: &[u8], i: usize) -> bool {
    i == 0 || !is_word_byte(bytes[i - 1])
}

/// Mirrors the identifier continuation of the grammar: a `-` only continues
/// a word when it is not the start of `--` or `->`.
fn ends_word(bytes: &[u8], i: usize) -> bool {
    match bytes.get(i) {
        None => true,
        Some(b'-') => matches!(bytes.get(i + 1), Some(b'-') | Some(b'>')),
        Some(&b) => !is_word_byte(b),
    }
}

/// The word starting at `at`, empty when none does.
fn word_at(text: &str, at: usize) -> &str {
    let bytes = text.as_bytes();
    let mut end = at;
    while end < bytes.len() && !ends_word(bytes, end) {
        end += 1;
    }
    text.get(at..end).unwrap_or("")
}

fn match_keyword(text: &str, at: usize) -> Option<(Keyword, usize)> {
    Keyword::from_word(word_at(text, at)).map(|k| (k, k.as_str().len()))
}

fn match_qualifier(text: &str, at: usize) -> Option<(Qualifier, usize)> {
    Qualifier::from_word(word_at(text, at)).map(|q| (q, q.as_str().len()))
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while bytes.get(i).is_some_and(|b| b.is_ascii_whitespace()) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_every_top_level_keyword() {
        let text = "Funcon not(_:booleans) : booleans\nRule not(false) ~> true\nRule not(true)\n  ~> false";
        let split = split(text);
        let keywords: Vec<_> = split.components.iter().map(|c| c.keyword).collect();
        assert_eq!(keywords, vec![Keyword::Funcon, Keyword::Rule, Keyword::Rule]);
        assert_eq!(split.components[2].text, "Rule not(true)\n  ~> false");
        assert_eq!(split.components[2].line, 3);
        assert!(split.leading.is_none());
    }

    #[test]
    fn qualifier_starts_the_component() {
        let split = split("Built-in Funcon print(_:values*) : =>null-type\nAuxiliary Funcon aux : values");
        assert_eq!(split.components.len(), 2);
        assert_eq!(split.components[0].qualifier, Some(Qualifier::BuiltIn));
        assert!(split.components[0].text.starts_with("Built-in Funcon"));
        assert_eq!(split.components[1].qualifier, Some(Qualifier::Auxiliary));
        assert_eq!(split.components[1].offset, 47);
    }

    #[test]
    fn keywords_inside_words_do_not_split() {
        let split = split("Type types-of-Rule\nFuncon Rules : Types");
        assert_eq!(split.components.len(), 2);
    }

    #[test]
    fn keyword_followed_by_arrow_still_splits() {
        let split = split("Rule X ~> Y\nRule--->");
        assert_eq!(split.components.len(), 2);
    }

    #[test]
    fn leading_text_is_reported() {
        let split = split("  stray words\nType t");
        let stray = split.leading.unwrap();
        assert_eq!(stray.text, "stray words");
        assert_eq!(stray.offset, 2);
        assert_eq!(split.components.len(), 1);
    }

    #[test]
    fn keywords_in_strings_are_ignored() {
        let split = split("Assert f(\"Rule\") == g");
        assert_eq!(split.components.len(), 1);
    }
}
