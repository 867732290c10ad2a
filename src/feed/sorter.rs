use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::parser::{Entry, EntryDetails};

/// Which key entries are ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMethod {
    /// Parser-normalized publish timestamp; undated entries sort as the minimum.
    #[default]
    Date,
    /// Raw title, compared lexicographically.
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[serde(alias = "asc")]
    Ascending,
    #[default]
    #[serde(alias = "desc")]
    Descending,
}

/// A sort method paired with a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sorting {
    pub method: SortMethod,
    pub order: SortOrder,
}

impl Sorting {
    pub fn new(method: SortMethod, order: SortOrder) -> Self {
        Self { method, order }
    }
}

impl FromStr for SortMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "date" => Ok(SortMethod::Date),
            "title" => Ok(SortMethod::Title),
            _ => Err(format!("Unknown sort method: {s} (expected date or title)")),
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ascending" | "asc" => Ok(SortOrder::Ascending),
            "descending" | "desc" => Ok(SortOrder::Descending),
            _ => Err(format!(
                "Unknown sort order: {s} (expected ascending or descending)"
            )),
        }
    }
}

impl fmt::Display for SortMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortMethod::Date => f.write_str("date"),
            SortMethod::Title => f.write_str("title"),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Ascending => f.write_str("ascending"),
            SortOrder::Descending => f.write_str("descending"),
        }
    }
}

/// Anything that can be ordered for display.
pub trait SortKey {
    fn sort_title(&self) -> &str;
    fn sort_date(&self) -> Option<DateTime<Utc>>;
}

impl SortKey for Entry {
    fn sort_title(&self) -> &str {
        &self.title
    }

    fn sort_date(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }
}

impl SortKey for EntryDetails {
    fn sort_title(&self) -> &str {
        &self.title
    }

    fn sort_date(&self) -> Option<DateTime<Utc>> {
        self.published_at()
    }
}

/// Stable sort by `sorting.method`. Descending is the exact reverse of the
/// ascending order, ties included.
pub fn sort_entries<T: SortKey>(mut entries: Vec<T>, sorting: Sorting) -> Vec<T> {
    tracing::debug!(
        method = %sorting.method,
        order = %sorting.order,
        count = entries.len(),
        "Sorting entries"
    );

    match sorting.method {
        // Option orders None before Some, so undated entries come first
        SortMethod::Date => entries.sort_by_cached_key(|e| e.sort_date()),
        SortMethod::Title => entries.sort_by(|a, b| a.sort_title().cmp(b.sort_title())),
    }

    if sorting.order == SortOrder::Descending {
        entries.reverse();
    }
    entries
}
