//! # Unsplash Fill
//!
//! Fills image placeholders in HTML and JSX/TSX files with hotlinked photos
//! from Unsplash, and illustrates long articles by inserting photos between
//! their sections. Photos are only ever referenced by URL; no image bytes are
//! downloaded or stored.
//!
//! # Pipeline
//!
//! ```text
//! 1. Scan      site/          →  candidate files     (extension filter, ignored dirs pruned)
//! 2. Articles  <article ...>  →  photo after sections (HTML only, sampled when long)
//! 3. Fill      <img ...>      →  src + processed mark (search term given or derived)
//! 4. Write     changed files only
//! ```
//!
//! Every run is idempotent: inserted and rewritten tags carry
//! `data-unsplash-processed="true"` and are skipped next time.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Walks the target directory for candidate files |
//! | [`document`] | Article sectioning, placeholder detection, tag rewriting, edits |
//! | [`keywords`] | Derives a search term from document or section text |
//! | [`sampler`] | Chooses which article sections get a photo |
//! | [`hash`] | Deterministic string hash seeding the sampler |
//! | [`credentials`] | Access-key pool with rotation, key-source precedence |
//! | [`client`] | Paced, retrying, caching Unsplash client over a `Transport` seam |
//! | [`fill`] | Per-file and per-directory orchestration, run statistics |
//! | [`config`] | `unsplash.toml` loading, merging over stock defaults, validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Byte-Range Edits Instead of Re-serialization
//!
//! Documents are never parsed into a tree and printed back. The [`document`]
//! module locates what it needs and produces edits against the original
//! text, so formatting, comments and framework syntax in the rest of the file
//! survive untouched. The same code path works for JSX, which no HTML parser
//! would round-trip.
//!
//! ## Deterministic Sampling
//!
//! Which paragraphs of an `auto` article get photos depends only on the
//! document's relative path and its paragraph count, through
//! [`hash::stable_hash`]. Re-running on the same site makes the same choices
//! on every machine.
//!
//! ## Synchronous, Sequential Requests
//!
//! The API budget is per key and per hour. The [`client`] processes one
//! request at a time with a minimum spacing, rotates keys on quota signals and
//! backs off exponentially otherwise. Parallelism would only exhaust keys
//! sooner, so there is no async runtime.

pub mod client;
pub mod config;
pub mod credentials;
pub mod document;
pub mod fill;
pub mod hash;
pub mod keywords;
pub mod output;
pub mod sampler;
pub mod scan;

#[cfg(test)]
pub(crate) mod test_helpers;
