//! Access-key pool with round-robin rotation.
//!
//! Unsplash rate limits are per access key (50 requests/hour for demo
//! applications), so a run over a large site can burn through a single key.
//! The pool holds every key the user supplied and the client rotates to the
//! next one when a key reports it is out of quota.
//!
//! Keys can come from three places, highest priority first:
//!
//! ```text
//! --keys a,b --key c                         (CLI)
//! UNSPLASH_ACCESS_KEYS / UNSPLASH_ACCESS_KEY (environment)
//! access_keys / access_key                   (unsplash.toml)
//! ```
//!
//! The first source that yields any key wins; sources are never mixed.

use log::{debug, warn};
use rand::Rng;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CredentialError {
    #[error(
        "at least one Unsplash access key is required (--keys/--key, \
         UNSPLASH_ACCESS_KEYS/UNSPLASH_ACCESS_KEY, or access_keys/access_key in unsplash.toml)"
    )]
    EmptyPool,
}

/// An opaque API access key. Identity is the key string itself.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the key itself
        let visible: String = self.0.chars().take(4).collect();
        write!(f, "Credential({visible}…)")
    }
}

/// A fixed set of credentials and a cursor pointing at the one in use.
///
/// Membership never changes after construction; [`rotate`](Self::rotate)
/// only moves the cursor.
#[derive(Debug, Clone)]
pub struct CredentialPool {
    credentials: Vec<Credential>,
    cursor: usize,
}

impl CredentialPool {
    /// Build a pool from raw key strings, starting at a random position.
    ///
    /// Keys are trimmed, empty ones dropped, and duplicates removed
    /// (first occurrence wins). A random start keeps many short runs from
    /// all hammering the first key.
    pub fn new<I, S>(raw: I) -> Result<Self, CredentialError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let credentials = normalize(raw);
        if credentials.is_empty() {
            return Err(CredentialError::EmptyPool);
        }
        let cursor = rand::thread_rng().gen_range(0..credentials.len());
        debug!(
            "Using {} access key(s), starting at {}/{}",
            credentials.len(),
            cursor + 1,
            credentials.len()
        );
        Ok(Self {
            credentials,
            cursor,
        })
    }

    /// Like [`new`](Self::new) but with a fixed starting position
    /// (wrapped into range). Useful when reproducible order matters.
    pub fn starting_at<I, S>(raw: I, cursor: usize) -> Result<Self, CredentialError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut pool = Self::new(raw)?;
        pool.cursor = cursor % pool.credentials.len();
        Ok(pool)
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Always false; construction rejects empty pools.
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Zero-based cursor position.
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> &Credential {
        &self.credentials[self.cursor]
    }

    /// Advance to the next credential, wrapping around.
    ///
    /// Returns `false` (and does nothing) for a single-key pool.
    pub fn rotate(&mut self, reason: &str) -> bool {
        let total = self.credentials.len();
        if total <= 1 {
            return false;
        }
        let previous = self.cursor;
        self.cursor = (self.cursor + 1) % total;
        if reason.is_empty() {
            warn!("Switching access key {}/{total} -> {}/{total}", previous + 1, self.cursor + 1);
        } else {
            warn!(
                "Switching access key {}/{total} -> {}/{total} ({reason})",
                previous + 1,
                self.cursor + 1
            );
        }
        true
    }
}

fn normalize<I, S>(raw: I) -> Vec<Credential>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|key| key.as_ref().trim().to_string())
        .filter(|key| !key.is_empty())
        .filter(|key| seen.insert(key.clone()))
        .map(Credential)
        .collect()
}

/// Split a multi-value key string on `,`, `;` or newlines.
pub fn parse_access_keys(raw: &str) -> Vec<String> {
    raw.split([',', ';', '\n'])
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}

/// Raw key strings gathered from one source, in priority order within it.
#[derive(Debug, Clone, Default)]
pub struct KeySource {
    pub values: Vec<String>,
}

impl KeySource {
    /// Collect from any number of optional multi-value strings.
    pub fn from_values<'a>(values: impl IntoIterator<Item = Option<&'a str>>) -> Self {
        Self {
            values: values
                .into_iter()
                .flatten()
                .flat_map(parse_access_keys)
                .collect(),
        }
    }
}

/// Pick the first non-empty source (CLI, then environment, then config)
/// and return its keys deduplicated in first-seen order.
pub fn resolve_access_keys(cli: &KeySource, env: &KeySource, config: &KeySource) -> Vec<String> {
    let chosen = [cli, env, config]
        .into_iter()
        .find(|source| !source.values.is_empty())
        .map(|source| source.values.as_slice())
        .unwrap_or_default();

    let mut seen = HashSet::new();
    chosen
        .iter()
        .filter(|key| seen.insert(key.as_str()))
        .cloned()
        .collect()
}
