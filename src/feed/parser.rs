use chrono::{DateTime, Utc};
use feed_rs::parser;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One article within a feed, produced fresh by every fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Stable identifier: the link, or a hash of title and publish date.
    pub id: String,
    pub title: String,
    pub link: String,
    /// RFC 3339 rendering of `published_at`, empty when the feed has no date.
    pub published: String,
    pub published_at: Option<DateTime<Utc>>,
    pub summary: String,
}

/// The user-facing projection of an [`Entry`], also the persisted record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDetails {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub published: String,
    #[serde(default)]
    pub summary: String,
}

impl EntryDetails {
    /// Same identifier scheme as [`Entry::id`].
    pub fn id(&self) -> String {
        entry_id(&self.link, &self.title, &self.published)
    }

    /// Publish date re-read from the stored string (RFC 3339, then RFC 2822).
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.published.trim();
        if raw.is_empty() {
            return None;
        }
        DateTime::parse_from_rfc3339(raw)
            .or_else(|_| DateTime::parse_from_rfc2822(raw))
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Project an entry to its details. Missing fields are already empty strings.
pub fn entry_details(entry: &Entry) -> EntryDetails {
    tracing::debug!(title = %entry.title, "Retrieving entry details");
    EntryDetails {
        title: entry.title.clone(),
        link: entry.link.clone(),
        published: entry.published.clone(),
        summary: entry.summary.clone(),
    }
}

/// Parse decoded feed text (RSS 0.9x/1.0/2.0, Atom, JSON Feed).
///
/// Any parser failure is the malformed-feed case.
pub fn parse_feed(text: &str) -> Result<Vec<Entry>, parser::ParseFeedError> {
    let feed = parser::parse(text.as_bytes())?;

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default();
            let published_at = entry.published.or(entry.updated);
            let published = published_at
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_default();
            let summary = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();
            let title = entry.title.map(|t| t.content).unwrap_or_default();

            Entry {
                id: entry_id(&link, &title, &published),
                title,
                link,
                published,
                published_at,
                summary,
            }
        })
        .collect();

    Ok(entries)
}

fn entry_id(link: &str, title: &str, published: &str) -> String {
    let link = link.trim();
    if !link.is_empty() {
        return link.to_string();
    }

    let input = format!("{}|{}", title, published);
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)
}
