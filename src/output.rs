//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Scan
//!
//! ```text
//! Files
//! 001 blog/trip.html
//!     Placeholders: 1 (2 already filled)
//!     Article 1: auto → paragraphs, 6 sections, 2 to illustrate
//! 002 src/Hero.tsx
//!     Placeholders: 1
//! 003 broken.html
//!     Error: Read failed: stream did not contain valid UTF-8
//!
//! Found 3 files, 2 placeholders, 1 article
//! ```
//!
//! ## Fill summary
//!
//! ```text
//! Summary
//!     Files scanned: 3
//!     Files modified: 1
//!     Skipped (already processed): 2
//!     Files failed: 1
//!     Images hotlinked: 3
//!     API: 4 request(s), 2 cache hit(s)
//!
//! Errors (1)
//!     broken.html: Read failed: stream did not contain valid UTF-8
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::client::ClientStats;
use crate::document::ArticleMode;
use crate::fill::{FillFailure, FillStats, FileReport};

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `1 file`, `2 files`.
fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

fn mode_name(mode: ArticleMode) -> &'static str {
    match mode {
        ArticleMode::Sections => "sections",
        ArticleMode::Paragraphs => "paragraphs",
        ArticleMode::Auto => "auto",
    }
}

fn failure_line(failure: &FillFailure) -> String {
    match &failure.section {
        Some(section) => format!(
            "{}{} [{}]: {}",
            indent(1),
            failure.file,
            section,
            failure.message
        ),
        None => format!("{}{}: {}", indent(1), failure.file, failure.message),
    }
}

// ============================================================================
// Scan
// ============================================================================

/// One scanned file: its report, or the message of why it couldn't be read.
pub type ScanLine = (String, Result<FileReport, String>);

/// Format the `scan` command listing.
pub fn format_scan(entries: &[ScanLine]) -> Vec<String> {
    let mut lines = vec!["Files".to_string()];
    let mut placeholders = 0;
    let mut articles = 0;

    for (i, (key, report)) in entries.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), key));
        let report = match report {
            Ok(report) => report,
            Err(message) => {
                lines.push(format!("{}Error: {}", indent(1), message));
                continue;
            }
        };

        if report.placeholders > 0 || report.already_processed > 0 {
            let mut line = format!("{}Placeholders: {}", indent(1), report.placeholders);
            if report.already_processed > 0 {
                line.push_str(&format!(" ({} already filled)", report.already_processed));
            }
            lines.push(line);
        }
        for (n, article) in report.articles.iter().enumerate() {
            let mode = if article.mode == article.resolved {
                mode_name(article.mode).to_string()
            } else {
                format!("{} → {}", mode_name(article.mode), mode_name(article.resolved))
            };
            lines.push(format!(
                "{}Article {}: {}, {}, {} to illustrate",
                indent(1),
                n + 1,
                mode,
                plural(article.sections, "section"),
                article.planned
            ));
        }
        placeholders += report.placeholders;
        articles += report.articles.len();
    }

    lines.push(String::new());
    lines.push(format!(
        "Found {}, {}, {}",
        plural(entries.len(), "file"),
        plural(placeholders, "placeholder"),
        plural(articles, "article")
    ));
    lines
}

pub fn print_scan(entries: &[ScanLine]) {
    for line in format_scan(entries) {
        println!("{line}");
    }
}

// ============================================================================
// Fill summary
// ============================================================================

/// Format the end-of-run summary of a `fill`.
pub fn format_summary(stats: &FillStats, client: &ClientStats, dry_run: bool) -> Vec<String> {
    let mut lines = vec![
        "Summary".to_string(),
        format!("{}Files scanned: {}", indent(1), stats.files_scanned),
        format!("{}Files modified: {}", indent(1), stats.files_modified),
        format!(
            "{}Skipped (already processed): {}",
            indent(1),
            stats.already_processed
        ),
        format!("{}Files failed: {}", indent(1), stats.files_failed),
        format!("{}Images hotlinked: {}", indent(1), stats.images_hotlinked),
        format!("{}API: {}", indent(1), client),
    ];

    if !stats.errors.is_empty() {
        lines.push(String::new());
        lines.push(format!("Errors ({})", stats.errors.len()));
        lines.extend(stats.errors.iter().map(failure_line));
    }

    if dry_run {
        lines.push(String::new());
        lines.push("[dry-run] No files were modified.".to_string());
    }
    lines
}

pub fn print_summary(stats: &FillStats, client: &ClientStats, dry_run: bool) {
    for line in format_summary(stats, client, dry_run) {
        println!("{line}");
    }
}
