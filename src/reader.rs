//! The feed reader: the one object a UI or CLI talks to.
//!
//! [`FeedReader`] owns the subscribed feeds, the entries cached from the last
//! snapshot, the fetcher, and the location of the feeds document. Feed
//! mutations go through a single async mutex; network fetches happen with
//! the lock released. Writes to the document are serialized by a separate
//! lock and always reflect the feeds as they are at write time.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use crate::feed::{
    entry_details, sort_entries, Entry, EntryDetails, FeedFetcher, FetchError, Sorting,
};
use crate::storage::{
    fetch_all, read_document, restore, write_document, CachedEntries, Document, Feed, FeedStore,
    FeedUpdate, PersistError, StoreError,
};

pub struct FeedReader {
    store: Mutex<FeedStore>,
    cached: Mutex<CachedEntries>,
    write_lock: Mutex<()>,
    fetcher: FeedFetcher,
    path: PathBuf,
    concurrency: usize,
}

impl FeedReader {
    /// Open the feeds document at `path`; a missing file starts an empty reader.
    pub fn open(path: impl Into<PathBuf>, fetcher: FeedFetcher) -> Result<Self, PersistError> {
        let path = path.into();
        let document = read_document(&path)?;
        let (feeds, cached) = restore(&document);

        tracing::info!(path = %path.display(), feeds = feeds.len(), "Loaded feeds");

        Ok(Self {
            store: Mutex::new(FeedStore::from_feeds(feeds)),
            cached: Mutex::new(cached),
            write_lock: Mutex::new(()),
            fetcher,
            path,
            concurrency: 4,
        })
    }

    /// How many feeds [`refresh`](Self::refresh) fetches at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ========================================================================
    // Feed Operations
    // ========================================================================

    pub async fn add_feed(&self, url: &str, category: Option<String>) -> Result<Feed, StoreError> {
        let mut store = self.store.lock().await;
        store.add(url, category).cloned()
    }

    /// Remove every feed with `url` and forget its cached entries.
    pub async fn remove_feed(&self, url: &str) -> usize {
        let removed = self.store.lock().await.remove(url);
        if removed > 0 {
            self.cached.lock().await.remove(url);
        }
        removed
    }

    pub async fn update_feed(&self, url: &str, update: FeedUpdate) -> Result<Feed, StoreError> {
        let mut store = self.store.lock().await;
        store.update(url, update).cloned()
    }

    pub async fn feeds(&self, category: Option<&str>, enabled: bool) -> Vec<Feed> {
        self.store.lock().await.list(category, enabled)
    }

    pub async fn categories(&self) -> Vec<String> {
        self.store.lock().await.categories()
    }

    // ========================================================================
    // Entry Operations
    // ========================================================================

    /// Fetch `url` now and return its entries in `sorting` order.
    pub async fn entries(&self, url: &str, sorting: Sorting) -> Result<Vec<Entry>, FetchError> {
        let entries = self.fetcher.fetch_entries(url).await?;
        Ok(sort_entries(entries, sorting))
    }

    /// Entries saved by the last snapshot, in `sorting` order. Empty if none.
    pub async fn cached_entries(&self, url: &str, sorting: Sorting) -> Vec<EntryDetails> {
        let cached = self
            .cached
            .lock()
            .await
            .get(url)
            .cloned()
            .unwrap_or_default();
        sort_entries(cached, sorting)
    }

    /// Fetch `url` and return the details of the entry with `entry_id`.
    pub async fn entry_details(
        &self,
        url: &str,
        entry_id: &str,
    ) -> Result<Option<EntryDetails>, FetchError> {
        let entries = self.fetcher.fetch_entries(url).await?;
        Ok(entries
            .iter()
            .find(|e| e.id == entry_id)
            .map(entry_details))
    }

    /// Drop one cached entry of `url`. Returns whether anything was removed.
    pub async fn remove_entry(&self, url: &str, entry_id: &str) -> bool {
        let mut cached = self.cached.lock().await;
        let Some(entries) = cached.get_mut(url) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|e| e.id() != entry_id);
        let removed = entries.len() != before;

        if removed {
            tracing::info!(feed = %url, entry = %entry_id, "Removed cached entry");
        }
        removed
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Write feeds and the current entry cache without fetching anything.
    pub async fn persist(&self) -> Result<(), PersistError> {
        let _write = self.write_lock.lock().await;
        let document = self.current_document().await;
        write_document(&self.path, &document)
    }

    /// Fetch every feed, refresh the entry cache with the results, and write
    /// the document.
    ///
    /// Feeds that fail to fetch lose their cached entries. Changes made while
    /// the fetch is in flight are kept: the written document is built from
    /// the feeds present once fetching is done.
    pub async fn refresh(&self) -> Result<Document, PersistError> {
        let feeds = self.store.lock().await.all().to_vec();
        let fresh = fetch_all(&feeds, &self.fetcher, self.concurrency).await;

        let _write = self.write_lock.lock().await;
        let document = {
            let store = self.store.lock().await;
            let mut cached = self.cached.lock().await;
            for feed in &feeds {
                cached.remove(&feed.url);
            }
            // Feeds removed mid-fetch stay removed
            cached.extend(
                fresh
                    .into_iter()
                    .filter(|(url, _)| store.all().iter().any(|f| &f.url == url)),
            );
            Document::from_parts(store.all(), &cached)
        };

        write_document(&self.path, &document)?;
        Ok(document)
    }

    async fn current_document(&self) -> Document {
        let store = self.store.lock().await;
        let cached = self.cached.lock().await;
        Document::from_parts(store.all(), &cached)
    }
}
