//! Per-file and per-directory orchestration.
//!
//! For each scanned file:
//!
//! 1. **Articles** (HTML only): every `data-unsplash-article` element is
//!    sectioned, the sections to illustrate are chosen, and a photo is
//!    inserted after each one.
//! 2. **Placeholders**: every unprocessed `<img data-unsplash-*>` tag in the
//!    (possibly updated) content gets a photo URL.
//! 3. The file is written back once, only if something changed.
//!
//! A failed search costs one section or one placeholder, never the file; a
//! failed read or write costs one file, never the run. Both are recorded in
//! [`FillStats::errors`].
//!
//! In dry-run mode the queries that would be sent are logged and nothing
//! else happens: no search, no download tracking, no writes.

use crate::client::{ClientError, Clock, ResilientClient, Transport};
use crate::document::{
    apply_edits, article_image_tag, find_articles, find_placeholders, followed_by_processed_image,
    rewrite_placeholder, Article, ArticleMode, Edit, PlaceholderQuery,
};
use crate::keywords::{best_keyword, keyword_from_text};
use crate::sampler::{self, Section};
use crate::scan::{DocumentKind, ScannedFile};
use log::{error, info};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FillError {
    #[error("Read failed: {0}")]
    Read(#[source] std::io::Error),
    #[error("Write failed: {0}")]
    Write(#[source] std::io::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillOptions {
    pub dry_run: bool,
}

/// One recorded failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillFailure {
    /// Document key of the file.
    pub file: String,
    /// Header of the article section being illustrated, if any.
    pub section: Option<String>,
    pub message: String,
}

/// Totals for one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FillStats {
    pub files_scanned: usize,
    pub files_modified: usize,
    /// Placeholders left alone because an earlier run already filled them.
    pub already_processed: usize,
    pub files_failed: usize,
    pub images_hotlinked: usize,
    pub errors: Vec<FillFailure>,
}

impl FillStats {
    pub fn has_failures(&self) -> bool {
        self.files_failed > 0
    }
}

/// Result of filling one document in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFill {
    pub content: String,
    pub modified: bool,
    pub images_hotlinked: usize,
    pub already_processed: usize,
    /// `(section header, message)` for each failed search.
    pub failures: Vec<(Option<String>, String)>,
}

/// What a file would contribute to a fill run, gathered without network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub document_key: String,
    pub kind: DocumentKind,
    /// Placeholders still waiting for a photo.
    pub placeholders: usize,
    pub already_processed: usize,
    pub articles: Vec<ArticleReport>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleReport {
    pub mode: ArticleMode,
    pub resolved: ArticleMode,
    pub sections: usize,
    /// Sections a fill run would try to illustrate.
    pub planned: usize,
}

/// A photo chosen for hotlinking.
struct Hotlink {
    id: String,
    url: String,
}

/// Sections of `article` that should get a photo, in document order.
///
/// Only articles written as `auto` that resolved to paragraphs go through
/// the density sampler; other modes illustrate every eligible section.
pub fn sections_to_enrich<'a>(article: &'a Article, document_key: &str) -> Vec<&'a Section> {
    let candidates: Vec<&Section> =
        if article.mode == ArticleMode::Auto && article.resolved == ArticleMode::Paragraphs {
            sampler::select(&article.sections, document_key)
        } else {
            article.sections.iter().collect()
        };
    candidates.into_iter().filter(|s| s.is_eligible()).collect()
}

/// Fill every file in `files` (relative to `root`), sequentially.
pub fn fill_directory<T: Transport, C: Clock>(
    root: &Path,
    files: &[ScannedFile],
    client: &mut ResilientClient<T, C>,
    options: &FillOptions,
) -> FillStats {
    let mut stats = FillStats {
        files_scanned: files.len(),
        ..FillStats::default()
    };

    for file in files {
        let key = file.document_key();
        match fill_file(root, file, client, options) {
            Ok(fill) => {
                stats.images_hotlinked += fill.images_hotlinked;
                stats.already_processed += fill.already_processed;
                if fill.modified && !options.dry_run {
                    stats.files_modified += 1;
                }
                stats
                    .errors
                    .extend(fill.failures.into_iter().map(|(section, message)| FillFailure {
                        file: key.clone(),
                        section,
                        message,
                    }));
            }
            Err(e) => {
                error!("{key}: {e}");
                stats.files_failed += 1;
                stats.errors.push(FillFailure {
                    file: key,
                    section: None,
                    message: e.to_string(),
                });
            }
        }
    }
    stats
}

/// Inspect one file: count placeholders and plan article sections.
pub fn inspect_file(root: &Path, file: &ScannedFile) -> Result<FileReport, FillError> {
    let content = std::fs::read_to_string(root.join(&file.relative_path)).map_err(FillError::Read)?;
    let document_key = file.document_key();

    let (processed, pending): (Vec<_>, Vec<_>) =
        find_placeholders(&content).into_iter().partition(|p| p.processed);

    let articles = if file.kind == DocumentKind::Html {
        find_articles(&content)
            .iter()
            .map(|article| ArticleReport {
                mode: article.mode,
                resolved: article.resolved,
                sections: article.sections.len(),
                planned: sections_to_enrich(article, &document_key)
                    .into_iter()
                    .filter(|s| !followed_by_processed_image(&content, s.anchor))
                    .count(),
            })
            .collect()
    } else {
        Vec::new()
    };

    Ok(FileReport {
        document_key,
        kind: file.kind,
        placeholders: pending.len(),
        already_processed: processed.len(),
        articles,
    })
}

/// Read, fill and (unless dry-run) write back a single file.
pub fn fill_file<T: Transport, C: Clock>(
    root: &Path,
    file: &ScannedFile,
    client: &mut ResilientClient<T, C>,
    options: &FillOptions,
) -> Result<DocumentFill, FillError> {
    let path = root.join(&file.relative_path);
    let content = std::fs::read_to_string(&path).map_err(FillError::Read)?;
    let key = file.document_key();

    let fill = fill_document(&content, file.kind, &key, client, options);
    if fill.modified && !options.dry_run {
        std::fs::write(&path, &fill.content).map_err(FillError::Write)?;
        info!("Updated {key}");
    }
    Ok(fill)
}

/// Fill articles and placeholders in `content`.
pub fn fill_document<T: Transport, C: Clock>(
    content: &str,
    kind: DocumentKind,
    document_key: &str,
    client: &mut ResilientClient<T, C>,
    options: &FillOptions,
) -> DocumentFill {
    let mut fill = DocumentFill::default();

    let content = if kind == DocumentKind::Html && content.contains("data-unsplash-article") {
        let edits = enrich_articles(content, document_key, client, options, &mut fill);
        if edits.is_empty() {
            content.to_string()
        } else {
            fill.modified = true;
            apply_edits(content, edits)
        }
    } else {
        content.to_string()
    };

    let edits = fill_placeholders(&content, kind, document_key, client, options, &mut fill);
    fill.content = if edits.is_empty() {
        content
    } else {
        fill.modified = true;
        apply_edits(&content, edits)
    };
    fill
}

fn enrich_articles<T: Transport, C: Clock>(
    content: &str,
    document_key: &str,
    client: &mut ResilientClient<T, C>,
    options: &FillOptions,
    fill: &mut DocumentFill,
) -> Vec<Edit> {
    let articles = find_articles(content);
    if !articles.is_empty() {
        info!("Found {} article(s) in {document_key}", articles.len());
    }

    let mut edits = Vec::new();
    for article in &articles {
        for section in sections_to_enrich(article, document_key) {
            let label = section.header.as_deref().unwrap_or("Intro");
            if followed_by_processed_image(content, section.anchor) {
                continue;
            }
            let query = keyword_from_text(&section.analysis_text());
            info!("Processing section \"{label}\". Query: \"{query}\"");
            if options.dry_run {
                info!("[dry-run] Would search for \"{query}\" and insert an image after the section");
                continue;
            }

            match hotlink(client, &query) {
                Ok(Some(photo)) => {
                    edits.push(Edit::insert(
                        section.anchor,
                        article_image_tag(&photo.url, &query, &photo.id),
                    ));
                    fill.images_hotlinked += 1;
                }
                Ok(None) => info!("No photo found for \"{query}\""),
                Err(e) => {
                    error!("{document_key}: failed to illustrate section \"{label}\": {e}");
                    fill.failures.push((section.header.clone(), e.to_string()));
                }
            }
        }
    }
    edits
}

fn fill_placeholders<T: Transport, C: Clock>(
    content: &str,
    kind: DocumentKind,
    document_key: &str,
    client: &mut ResilientClient<T, C>,
    options: &FillOptions,
    fill: &mut DocumentFill,
) -> Vec<Edit> {
    let mut document_keyword: Option<String> = None;
    let mut edits = Vec::new();

    for placeholder in find_placeholders(content) {
        if placeholder.processed {
            fill.already_processed += 1;
            continue;
        }

        let query = match placeholder.query {
            PlaceholderQuery::Search(term) => term,
            PlaceholderQuery::Auto => document_keyword
                .get_or_insert_with(|| best_keyword(content, kind))
                .clone(),
        };
        info!("Found placeholder in {document_key}. Query: \"{query}\"");
        if options.dry_run {
            info!("[dry-run] Would search for \"{query}\" and update the image src");
            continue;
        }

        match hotlink(client, &query) {
            Ok(Some(photo)) => {
                edits.push(Edit {
                    range: placeholder.range,
                    text: rewrite_placeholder(&placeholder.tag, &photo.url, &photo.id),
                });
                fill.images_hotlinked += 1;
            }
            Ok(None) => info!("No photo found for \"{query}\""),
            Err(e) => {
                error!("{document_key}: failed to fill placeholder: {e}");
                fill.failures.push((None, e.to_string()));
            }
        }
    }
    edits
}

/// Search for one photo and register its use. `None` when there is no
/// usable result.
fn hotlink<T: Transport, C: Clock>(
    client: &mut ResilientClient<T, C>,
    query: &str,
) -> Result<Option<Hotlink>, ClientError> {
    let Some(photo) = client.search_photos(query, 1)?.into_iter().next() else {
        return Ok(None);
    };
    let Some(url) = photo.regular_url().map(str::to_string) else {
        return Ok(None);
    };
    client.track_download(&photo.links.download_location);
    Ok(Some(Hotlink { id: photo.id, url }))
}
