//! Lightweight markup handling: articles, sections, placeholders, rewrites.
//!
//! This is deliberately not an HTML parser. It understands just enough
//! structure to find the elements the tool cares about and never
//! re-serializes the document: every change is expressed as an [`Edit`]
//! (a byte range plus replacement text) against the original string, so
//! everything outside the edited ranges is preserved byte for byte.
//!
//! # Articles
//!
//! An element carrying `data-unsplash-article` is split into sections and
//! gets photos inserted between them. The attribute value picks the mode:
//!
//! ```text
//! data-unsplash-article               → sections
//! data-unsplash-article="headings"    → sections   (also: section, heading)
//! data-unsplash-article="paragraphs"  → paragraphs (also: paragraph, paras)
//! data-unsplash-article="auto"        → sections if a direct h1-h6 child exists, else paragraphs
//! ```
//!
//! # Placeholders
//!
//! ```html
//! <img data-unsplash-auto>                     <!-- keyword from the page -->
//! <img data-unsplash-search="misty forest">    <!-- explicit query -->
//! ```
//!
//! Once filled, a tag gets `data-unsplash-processed="true"` and is left
//! alone on later runs.

use crate::sampler::Section;
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

const HEADINGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];
const PROCESSED_MARKER: &str = "data-unsplash-processed";

static ARTICLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)<([a-z][a-z0-9-]*)\b[^>]*\bdata-unsplash-article(?:\s*=\s*["']([^"']*)["'])?[^>]*>"#,
    )
    .expect("article pattern")
});

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img\s+[^>]*data-unsplash-(auto|search)(?:=["']([^"']*)["'])?[^>]*>"#)
        .expect("placeholder pattern")
});

static SRC_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\s)src=["'][^"']*["']"#).expect("src pattern"));

// ============================================================================
// Edits
// ============================================================================

/// Replace `range` of the original text with `text`. An empty range inserts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub range: Range<usize>,
    pub text: String,
}

impl Edit {
    pub fn insert(at: usize, text: String) -> Self {
        Self {
            range: at..at,
            text,
        }
    }
}

/// Apply non-overlapping edits, back to front so earlier offsets stay valid.
pub fn apply_edits(content: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by(|a, b| b.range.start.cmp(&a.range.start));
    let mut result = content.to_string();
    for edit in edits {
        result.replace_range(edit.range, &edit.text);
    }
    result
}

// ============================================================================
// Tokenizing
// ============================================================================

enum Token<'a> {
    Open {
        name: &'a str,
        len: usize,
        self_closing: bool,
    },
    Close {
        name: &'a str,
        len: usize,
    },
    /// Comment, doctype or processing instruction.
    Other { len: usize },
}

/// Read one tag at the start of `s` (which begins with `<`).
/// `None` means the `<` is literal text.
fn next_token(s: &str) -> Option<Token<'_>> {
    if let Some(rest) = s.strip_prefix("<!--") {
        let len = rest.find("-->").map(|i| 4 + i + 3).unwrap_or(s.len());
        return Some(Token::Other { len });
    }
    let after = &s[1..];
    if after.starts_with('!') || after.starts_with('?') {
        let len = s.find('>').map(|i| i + 1).unwrap_or(s.len());
        return Some(Token::Other { len });
    }

    let (closing, name_start) = if after.starts_with('/') { (true, 2) } else { (false, 1) };
    let tail = &s[name_start..];
    if !tail.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }
    let name_len = tail
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .unwrap_or(tail.len());
    let name = &tail[..name_len];
    let len = s.find('>')? + 1;

    if closing {
        Some(Token::Close { name, len })
    } else {
        let self_closing = s[..len].ends_with("/>")
            || VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(name));
        Some(Token::Open {
            name,
            len,
            self_closing,
        })
    }
}

/// An element located in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Element {
    /// Lowercase tag name.
    name: String,
    open_end: usize,
    inner_end: usize,
    end: usize,
}

impl Element {
    fn is_heading(&self) -> bool {
        HEADINGS.contains(&self.name.as_str())
    }

    fn text(&self, html: &str) -> String {
        text_content(&html[self.open_end..self.inner_end])
    }
}

/// Find the matching close tag for an element named `name` whose open tag
/// ends at `open_end`. Returns `(inner_end, end)`.
fn find_element_end(html: &str, name: &str, open_end: usize, limit: usize) -> Option<(usize, usize)> {
    let mut depth = 1usize;
    let mut pos = open_end;
    while pos < limit {
        let at = pos + html[pos..limit].find('<')?;
        match next_token(&html[at..limit]) {
            None => pos = at + 1,
            Some(Token::Other { len }) => pos = at + len,
            Some(Token::Open {
                name: open,
                len,
                self_closing,
            }) => {
                if !self_closing && open.eq_ignore_ascii_case(name) {
                    depth += 1;
                }
                pos = at + len;
            }
            Some(Token::Close { name: close, len }) => {
                if close.eq_ignore_ascii_case(name) {
                    depth -= 1;
                    if depth == 0 {
                        return Some((at, at + len));
                    }
                }
                pos = at + len;
            }
        }
    }
    None
}

/// Direct child elements within `range`. Bare text between them is ignored.
fn child_elements(html: &str, range: Range<usize>) -> Vec<Element> {
    let mut children = Vec::new();
    let mut pos = range.start;
    while pos < range.end {
        let Some(rel) = html[pos..range.end].find('<') else {
            break;
        };
        let at = pos + rel;
        match next_token(&html[at..range.end]) {
            None => pos = at + 1,
            Some(Token::Other { len }) | Some(Token::Close { len, .. }) => pos = at + len,
            Some(Token::Open {
                name,
                len,
                self_closing,
            }) => {
                let open_end = at + len;
                let (inner_end, end) = if self_closing {
                    (open_end, open_end)
                } else {
                    find_element_end(html, name, open_end, range.end)
                        .unwrap_or((range.end, range.end))
                };
                children.push(Element {
                    name: name.to_ascii_lowercase(),
                    open_end,
                    inner_end,
                    end,
                });
                pos = end;
            }
        }
    }
    children
}

// ============================================================================
// Text
// ============================================================================

/// Remove tags, decode the common entities and collapse whitespace.
pub fn text_content(html: &str) -> String {
    let mut stripped = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                stripped.push(' ');
            }
            _ if !in_tag => stripped.push(c),
            _ => {}
        }
    }
    decode_entities(&stripped)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Text of the first element named `name` anywhere in `html`.
pub fn first_element_text(html: &str, name: &str) -> Option<String> {
    element_texts(html, name, Some(1)).into_iter().next()
}

/// Text of every element named `name` in document order.
pub fn all_element_texts(html: &str, name: &str) -> Vec<String> {
    element_texts(html, name, None)
}

fn element_texts(html: &str, name: &str, limit: Option<usize>) -> Vec<String> {
    let mut texts = Vec::new();
    let mut pos = 0;
    while pos < html.len() && limit.is_none_or(|limit| texts.len() < limit) {
        let Some(offset) = html[pos..].find('<') else {
            break;
        };
        let at = pos + offset;
        match next_token(&html[at..]) {
            Some(Token::Open {
                name: open,
                len,
                self_closing,
            }) if open.eq_ignore_ascii_case(name) => {
                let open_end = at + len;
                if self_closing {
                    texts.push(String::new());
                    pos = open_end;
                    continue;
                }
                let (inner_end, end) = find_element_end(html, open, open_end, html.len())
                    .unwrap_or((html.len(), html.len()));
                texts.push(text_content(&html[open_end..inner_end]));
                pos = end;
            }
            Some(Token::Open { len, .. })
            | Some(Token::Close { len, .. })
            | Some(Token::Other { len }) => pos = at + len,
            None => pos = at + 1,
        }
    }
    texts
}

/// Escape text for use inside a double-quoted attribute.
pub fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// ============================================================================
// Articles
// ============================================================================

/// How an article is split into sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleMode {
    /// One section per heading (plus an intro before the first heading).
    Sections,
    /// One section per non-empty direct `<p>` child.
    Paragraphs,
    /// Sections if the article has headings, paragraphs otherwise.
    Auto,
}

impl ArticleMode {
    /// Normalize the attribute value. Empty or unrecognized means sections.
    pub fn parse(raw: Option<&str>) -> Self {
        let value = raw.unwrap_or("").trim().to_ascii_lowercase();
        match value.as_str() {
            "paragraphs" | "paragraph" | "paras" => ArticleMode::Paragraphs,
            "auto" => ArticleMode::Auto,
            _ => ArticleMode::Sections,
        }
    }
}

/// An element marked with `data-unsplash-article`, already sectioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    /// Mode as written on the element.
    pub mode: ArticleMode,
    /// Mode actually used; never `Auto`.
    pub resolved: ArticleMode,
    /// Byte range of the article's content (between its tags).
    pub inner: Range<usize>,
    pub sections: Vec<Section>,
}

/// Find and section every article in `html`. Nested articles are ignored.
pub fn find_articles(html: &str) -> Vec<Article> {
    let mut articles = Vec::new();
    let mut covered_until = 0;

    for captures in ARTICLE_RE.captures_iter(html) {
        let open = captures.get(0).expect("whole match");
        if open.start() < covered_until {
            continue;
        }
        let name = &captures[1];
        let mode = ArticleMode::parse(captures.get(2).map(|m| m.as_str()));
        let open_end = open.end();
        let (inner_end, end) = if open.as_str().ends_with("/>") {
            (open_end, open_end)
        } else {
            find_element_end(html, name, open_end, html.len()).unwrap_or((html.len(), html.len()))
        };
        covered_until = end;

        let inner = open_end..inner_end;
        let children = child_elements(html, inner.clone());
        let resolved = match mode {
            ArticleMode::Auto if children.iter().any(Element::is_heading) => ArticleMode::Sections,
            ArticleMode::Auto => ArticleMode::Paragraphs,
            other => other,
        };
        let sections = match resolved {
            ArticleMode::Paragraphs => sections_by_paragraphs(html, &children),
            _ => sections_by_headings(html, &children, inner.start),
        };

        articles.push(Article {
            mode,
            resolved,
            inner,
            sections,
        });
    }
    articles
}

/// Each heading opens a section anchored after it; content before the
/// first heading becomes an intro anchored at the start of the article.
fn sections_by_headings(html: &str, children: &[Element], article_start: usize) -> Vec<Section> {
    struct Pending {
        header: Option<String>,
        body: String,
        anchor: usize,
    }

    fn flush(pending: Pending, sections: &mut Vec<Section>) {
        let has_header = pending.header.as_deref().is_some_and(|h| !h.is_empty());
        if has_header || !pending.body.is_empty() {
            sections.push(Section {
                position: sections.len(),
                header: pending.header,
                body: pending.body,
                anchor: pending.anchor,
            });
        }
    }

    let mut sections = Vec::new();
    let mut current = Pending {
        header: None,
        body: String::new(),
        anchor: article_start,
    };

    for child in children {
        if child.is_heading() {
            let next = Pending {
                header: Some(child.text(html)),
                body: String::new(),
                anchor: child.end,
            };
            flush(std::mem::replace(&mut current, next), &mut sections);
        } else {
            current.body.push_str(&child.text(html));
            current.body.push(' ');
        }
    }
    flush(current, &mut sections);
    sections
}

/// Each non-blank `<p>` is a section, headed by the nearest heading above it.
fn sections_by_paragraphs(html: &str, children: &[Element]) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut header: Option<String> = None;

    for child in children {
        if child.is_heading() {
            header = Some(child.text(html));
        } else if child.name == "p" {
            let body = child.text(html);
            if body.trim().is_empty() {
                continue;
            }
            sections.push(Section {
                position: sections.len(),
                header: header.clone(),
                body,
                anchor: child.end,
            });
        }
    }
    sections
}

/// Whether the next element after `anchor` is an image this tool already inserted.
pub fn followed_by_processed_image(html: &str, anchor: usize) -> bool {
    let rest = html[anchor..].trim_start();
    if !rest
        .get(..4)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("<img"))
    {
        return false;
    }
    let tag_end = rest.find('>').unwrap_or(rest.len());
    rest[..tag_end].contains(PROCESSED_MARKER)
}

/// The `<img>` inserted after an article section.
pub fn article_image_tag(photo_url: &str, alt: &str, photo_id: &str) -> String {
    format!(
        r#"<img src="{}" alt="{}" class="unsplash-article-image" data-unsplash-id="{}" {PROCESSED_MARKER}="true" loading="lazy" style="max-width: 100%; height: auto; margin: 1em 0;">"#,
        escape_attr(photo_url),
        escape_attr(alt),
        escape_attr(photo_id),
    )
}

// ============================================================================
// Placeholders
// ============================================================================

/// Where a placeholder's search term comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceholderQuery {
    /// Derive a keyword from the document.
    Auto,
    /// Use this term verbatim.
    Search(String),
}

/// An `<img data-unsplash-*>` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub range: Range<usize>,
    pub tag: String,
    pub query: PlaceholderQuery,
    /// Already filled on an earlier run.
    pub processed: bool,
}

/// Find every placeholder tag, processed or not, in document order.
pub fn find_placeholders(content: &str) -> Vec<Placeholder> {
    PLACEHOLDER_RE
        .captures_iter(content)
        .map(|captures| {
            let whole = captures.get(0).expect("whole match");
            let term = captures.get(2).map(|m| m.as_str()).unwrap_or("");
            let query = if captures[1].eq_ignore_ascii_case("search") && !term.is_empty() {
                PlaceholderQuery::Search(term.to_string())
            } else {
                PlaceholderQuery::Auto
            };
            Placeholder {
                range: whole.range(),
                tag: whole.as_str().to_string(),
                query,
                processed: whole.as_str().contains(PROCESSED_MARKER),
            }
        })
        .collect()
}

/// Point a placeholder tag at a photo and mark it processed.
///
/// An existing `src` is replaced, otherwise one is added; the photo id and
/// the processed marker are added when missing. Other attributes are kept.
pub fn rewrite_placeholder(tag: &str, photo_url: &str, photo_id: &str) -> String {
    let src = format!(r#"src="{}""#, escape_attr(photo_url));
    let mut rewritten = match SRC_ATTR_RE.captures(tag) {
        Some(captures) => {
            let whole = captures.get(0).expect("whole match");
            format!(
                "{}{}{}{}",
                &tag[..whole.start()],
                &captures[1],
                src,
                &tag[whole.end()..]
            )
        }
        None => insert_after_tag_name(tag, &src),
    };
    if !rewritten.contains("data-unsplash-id") {
        let id = format!(r#"data-unsplash-id="{}""#, escape_attr(photo_id));
        rewritten = insert_after_tag_name(&rewritten, &id);
    }
    if !rewritten.contains(PROCESSED_MARKER) {
        rewritten = insert_after_tag_name(&rewritten, &format!(r#"{PROCESSED_MARKER}="true""#));
    }
    rewritten
}

/// `<img ...` → `<img ATTR ...`
fn insert_after_tag_name(tag: &str, attribute: &str) -> String {
    let split = "<img".len().min(tag.len());
    format!("{} {}{}", &tag[..split], attribute, &tag[split..])
}
