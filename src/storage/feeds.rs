use std::collections::BTreeSet;

use super::types::{Feed, FeedUpdate, StoreError};
use crate::util::validate_url;

/// In-memory, insertion-ordered collection of subscribed feeds.
#[derive(Debug, Clone, Default)]
pub struct FeedStore {
    feeds: Vec<Feed>,
}

impl FeedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from feeds restored off disk. URLs are not re-validated.
    pub fn from_feeds(feeds: Vec<Feed>) -> Self {
        Self { feeds }
    }

    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Subscribe to a feed. The new feed starts enabled.
    ///
    /// Duplicate URLs are accepted and appended as a separate feed. The URL is
    /// stored trimmed, and a blank category means uncategorized.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidUrl`] if the URL has no scheme or host. The store
    /// is left unchanged.
    pub fn add(&mut self, url: &str, category: Option<String>) -> Result<&Feed, StoreError> {
        tracing::info!(feed = %url, category = ?category, "Adding feed");

        if let Err(source) = validate_url(url) {
            tracing::warn!(feed = %url, error = %source, "Invalid feed URL");
            return Err(StoreError::InvalidUrl {
                url: url.to_owned(),
                source,
            });
        }

        self.feeds.push(Feed::new(url.trim(), non_blank(category)));
        let index = self.feeds.len() - 1;
        Ok(&self.feeds[index])
    }

    /// Unsubscribe every feed with this URL, returning how many were removed.
    ///
    /// Removing an unknown URL is not an error.
    pub fn remove(&mut self, url: &str) -> usize {
        let before = self.feeds.len();
        self.feeds.retain(|f| f.url != url);
        let removed = before - self.feeds.len();

        if removed == 0 {
            tracing::debug!(feed = %url, "No feed to remove");
        } else {
            tracing::info!(feed = %url, removed = removed, "Removed feed");
        }
        removed
    }

    /// Apply the supplied fields to the first feed with this URL.
    ///
    /// A blank category clears the feed's category.
    ///
    /// # Errors
    ///
    /// [`StoreError::FeedNotFound`] if no feed has this URL.
    pub fn update(&mut self, url: &str, update: FeedUpdate) -> Result<&Feed, StoreError> {
        let Some(feed) = self.feeds.iter_mut().find(|f| f.url == url) else {
            tracing::warn!(feed = %url, "Feed not found");
            return Err(StoreError::FeedNotFound(url.to_owned()));
        };

        if let Some(category) = update.category {
            feed.category = non_blank(Some(category));
        }
        if let Some(enabled) = update.enabled {
            feed.enabled = enabled;
        }

        tracing::info!(feed = %url, category = ?feed.category, enabled = feed.enabled, "Updated feed");
        Ok(feed)
    }

    /// Feeds whose `enabled` flag equals `enabled`, restricted to `category`
    /// when one is given.
    ///
    /// `None` means "any category", not "uncategorized".
    pub fn list(&self, category: Option<&str>, enabled: bool) -> Vec<Feed> {
        self.feeds
            .iter()
            .filter(|f| f.enabled == enabled)
            .filter(|f| match category {
                Some(c) => f.category.as_deref() == Some(c),
                None => true,
            })
            .cloned()
            .collect()
    }

    /// Every feed regardless of flags, in insertion order.
    pub fn all(&self) -> &[Feed] {
        &self.feeds
    }

    /// Distinct non-empty categories, sorted.
    pub fn categories(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self
            .feeds
            .iter()
            .filter_map(|f| f.category.as_deref())
            .filter(|c| !c.is_empty())
            .collect();
        set.into_iter().map(str::to_owned).collect()
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}

/// `""` is the document key for uncategorized feeds, so blank names fold into `None`.
fn non_blank(category: Option<String>) -> Option<String> {
    category.filter(|c| !c.trim().is_empty())
}
