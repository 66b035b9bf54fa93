//! Search-term derivation.
//!
//! A frequency heuristic over a small slice of the document: for HTML the
//! `<title>`, every `<h1>` and the first `<p>`; for components the first 1000
//! characters left after stripping tags and `{…}` expressions. The most
//! frequent alphabetic word of three or more letters wins, ignoring English
//! stopwords and words that are noise in source files (`const`, `export`…).
//! Ties go to the word seen first. When nothing qualifies the term is
//! [`FALLBACK_KEYWORD`].

use crate::document::{all_element_texts, first_element_text, text_content};
use crate::scan::DocumentKind;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

pub const FALLBACK_KEYWORD: &str = "nature";

const COMPONENT_TEXT_LIMIT: usize = 1000;
const MIN_WORD_CHARS: usize = 3;

const CODING_TERMS: &[&str] = &[
    "component", "page", "layout", "return", "import", "export", "const", "function",
];

const STOPWORDS: &[&str] = &[
    "about", "above", "after", "again", "all", "also", "and", "any", "are", "because", "been",
    "before", "being", "below", "between", "both", "but", "can", "could", "did", "does", "doing",
    "down", "during", "each", "every", "few", "for", "from", "further", "had", "has", "have",
    "having", "her", "here", "hers", "herself", "him", "himself", "his", "how", "into", "its",
    "itself", "just", "more", "most", "much", "must", "myself", "nor", "not", "now", "off", "once",
    "only", "other", "our", "ours", "out", "over", "own", "same", "she", "should", "some", "such",
    "than", "that", "the", "their", "theirs", "them", "then", "there", "these", "they", "this",
    "those", "through", "too", "under", "until", "very", "was", "way", "were", "what", "when",
    "where", "which", "while", "who", "whom", "why", "will", "with", "would", "you", "your",
    "yours", "yourself",
];

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag pattern"));
static EXPRESSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^}]+\}").expect("expression pattern"));

/// Search term for a whole document.
pub fn best_keyword(content: &str, kind: DocumentKind) -> String {
    let text = match kind {
        DocumentKind::Html => html_text(content),
        DocumentKind::Component => component_text(content),
    };
    keyword_from_text(&text)
}

/// Search term for already-extracted plain text, e.g. an article section.
pub fn keyword_from_text(text: &str) -> String {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let words = text
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| w.chars().count() >= MIN_WORD_CHARS)
        .map(str::to_lowercase)
        .filter(|w| !is_ignored(w));

    for (order, word) in words.enumerate() {
        counts.entry(word).or_insert((0, order)).0 += 1;
    }

    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(word, _)| word)
        .unwrap_or_else(|| FALLBACK_KEYWORD.to_string())
}

fn is_ignored(word: &str) -> bool {
    STOPWORDS.contains(&word) || CODING_TERMS.contains(&word)
}

fn html_text(html: &str) -> String {
    first_element_text(html, "title")
        .into_iter()
        .chain(all_element_texts(html, "h1"))
        .chain(first_element_text(html, "p"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn component_text(source: &str) -> String {
    let without_tags = TAG_RE.replace_all(source, " ");
    let text = EXPRESSION_RE.replace_all(&without_tags, " ");
    text_content(&text.chars().take(COMPONENT_TEXT_LIMIT).collect::<String>())
}
