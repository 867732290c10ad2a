use thiserror::Error;

use crate::util::UrlValidationError;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised by feed collection operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The URL lacks a scheme or host, or does not parse at all.
    #[error("Invalid feed URL: {url}. Please provide a valid RSS feed URL.")]
    InvalidUrl {
        url: String,
        #[source]
        source: UrlValidationError,
    },

    /// No subscribed feed has this URL.
    #[error("Feed not found: {0}")]
    FeedNotFound(String),
}

/// Errors raised while reading or writing the feeds document.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Failed to access feeds file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid feeds document: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Feed
// ============================================================================

/// A subscribed syndication source.
///
/// The URL is the logical key, but the collection does not enforce
/// uniqueness: subscribing twice yields two entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub url: String,
    pub category: Option<String>,
    pub enabled: bool,
}

impl Feed {
    pub fn new(url: impl Into<String>, category: Option<String>) -> Self {
        Self {
            url: url.into(),
            category,
            enabled: true,
        }
    }
}

/// Partial update applied by [`FeedStore::update`](super::FeedStore::update).
///
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedUpdate {
    pub category: Option<String>,
    pub enabled: Option<bool>,
}
