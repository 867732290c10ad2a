//! The on-disk feeds document.
//!
//! Layout, keyed by category name (the empty string holds uncategorized
//! feeds):
//!
//! ```json
//! {
//!   "tech": {
//!     "feeds": [{ "url": "https://a.com/rss" }],
//!     "entries": {
//!       "https://a.com/rss": [
//!         { "title": "...", "link": "...", "published": "...", "summary": "..." }
//!       ]
//!     }
//!   }
//! }
//! ```
//!
//! The `enabled` flag is not stored, so every restored feed is enabled.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use super::types::{Feed, PersistError};
use crate::feed::{entry_details, EntryDetails, EntrySource};
use crate::util::validate_url;

/// Document key for feeds without a category.
pub const UNCATEGORIZED: &str = "";

static WRITE_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Cached entry details keyed by feed URL.
pub type CachedEntries = HashMap<String, Vec<EntryDetails>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedRecord {
    pub url: String,
}

/// One category's feeds plus the entries last seen for each of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySnapshot {
    #[serde(default)]
    pub feeds: Vec<FeedRecord>,
    #[serde(default)]
    pub entries: BTreeMap<String, Vec<EntryDetails>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    pub categories: BTreeMap<String, CategorySnapshot>,
}

impl Document {
    /// Group `feeds` by category, attaching whatever `entries` holds for each URL.
    ///
    /// Feeds with no entry list in `entries` get no `entries` key.
    pub fn from_parts(feeds: &[Feed], entries: &CachedEntries) -> Self {
        let mut categories: BTreeMap<String, CategorySnapshot> = BTreeMap::new();

        for feed in feeds {
            let key = feed.category.as_deref().unwrap_or(UNCATEGORIZED);
            let snapshot = categories.entry(key.to_owned()).or_default();
            snapshot.feeds.push(FeedRecord {
                url: feed.url.clone(),
            });
            if let Some(details) = entries.get(&feed.url) {
                snapshot.entries.insert(feed.url.clone(), details.clone());
            }
        }

        Self { categories }
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Build a document by fetching every feed's current entries from `source`.
///
/// A feed whose fetch fails is still listed under its category but gets no
/// entry list; the other feeds are unaffected.
pub async fn snapshot<S: EntrySource>(feeds: &[Feed], source: &S, concurrency: usize) -> Document {
    let entries = fetch_all(feeds, source, concurrency).await;
    Document::from_parts(feeds, &entries)
}

/// Fetch each distinct feed URL once, up to `concurrency` at a time.
///
/// Only successful fetches appear in the result; failures are logged.
pub async fn fetch_all<S: EntrySource>(
    feeds: &[Feed],
    source: &S,
    concurrency: usize,
) -> CachedEntries {
    let urls: Vec<String> = {
        let mut seen = HashSet::new();
        feeds
            .iter()
            .filter(|f| seen.insert(f.url.as_str()))
            .map(|f| f.url.clone())
            .collect()
    };

    tracing::info!(feeds = urls.len(), "Snapshotting feeds");

    let results: Vec<_> = stream::iter(urls)
        .map(|url| async move {
            let result = source.fetch_entries(&url).await;
            (url, result)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut entries = CachedEntries::new();
    for (url, result) in results {
        match result {
            Ok(fetched) => {
                let details = fetched.iter().map(entry_details).collect();
                entries.insert(url, details);
            }
            Err(e) => {
                tracing::warn!(feed = %url, error = %e, "Skipping feed entries in snapshot");
            }
        }
    }
    entries
}

/// Reverse of [`Document::from_parts`]: feeds (all enabled) and cached entries.
///
/// Feed URLs that no longer validate are skipped with a warning.
pub fn restore(document: &Document) -> (Vec<Feed>, CachedEntries) {
    let mut feeds = Vec::new();
    let mut entries = CachedEntries::new();

    for (category, snapshot) in &document.categories {
        let category = (category.trim() != UNCATEGORIZED).then(|| category.clone());

        for record in &snapshot.feeds {
            if let Err(e) = validate_url(&record.url) {
                tracing::warn!(feed = %record.url, error = %e, "Skipping invalid feed in document");
                continue;
            }
            feeds.push(Feed::new(record.url.clone(), category.clone()));
            if let Some(details) = snapshot.entries.get(&record.url) {
                entries.insert(record.url.clone(), details.clone());
            }
        }
    }

    tracing::debug!(feeds = feeds.len(), cached = entries.len(), "Restored feeds document");
    (feeds, entries)
}

/// Read the document at `path`. A missing or blank file is an empty document.
pub fn read_document(path: &Path) -> Result<Document, PersistError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No feeds file found, starting empty");
            return Ok(Document::default());
        }
        Err(e) => return Err(PersistError::Io(e)),
    };

    if content.trim().is_empty() {
        return Ok(Document::default());
    }

    Ok(serde_json::from_str(&content)?)
}

/// Write `document` as 2-space-indented JSON, replacing `path` atomically.
///
/// Callers sharing a path must serialize their writes; the last rename wins.
pub fn write_document(path: &Path, document: &Document) -> Result<(), PersistError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(document)?;

    // Unique per write so concurrent writers never share a temp file
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let sequence = WRITE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let temp_path = path.with_extension(format!(
        "tmp.{}.{}.{:016x}",
        std::process::id(),
        sequence,
        random_suffix
    ));

    if let Err(e) = write_then_rename(&temp_path, path, json.as_bytes()) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(PersistError::Io(e));
    }

    tracing::info!(path = %path.display(), categories = document.categories.len(), "Saved feeds");
    Ok(())
}

fn write_then_rename(temp_path: &Path, path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut temp_file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(temp_path)?;
    temp_file.write_all(content)?;
    temp_file.write_all(b"\n")?;
    temp_file.sync_all()?;
    drop(temp_file);

    // On Windows, rename fails if destination exists
    #[cfg(windows)]
    if path.exists() {
        std::fs::remove_file(path)?;
    }

    std::fs::rename(temp_path, path)
}
