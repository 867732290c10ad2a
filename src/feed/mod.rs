//! Feed retrieval: fetching, decoding, parsing and ordering entries.
//!
//! - [`fetcher`] - HTTP retrieval with timeout, size limit and retry
//! - [`encoding`] - charset detection and strict decoding of response bodies
//! - [`parser`] - `feed-rs` parsing into [`Entry`] values and their details
//! - [`sorter`] - stable ordering by date or title
//!
//! # Example
//!
//! ```ignore
//! use feedshelf::feed::{sort_entries, FeedFetcher, Sorting};
//!
//! let fetcher = FeedFetcher::new(reqwest::Client::new());
//! let entries = fetcher.fetch_entries("https://example.com/feed.xml").await?;
//! let newest_first = sort_entries(entries, Sorting::default());
//! ```

pub mod encoding;
mod fetcher;
mod parser;
mod sorter;

pub use encoding::DecodeError;
pub use fetcher::{EntrySource, FeedFetcher, FetchError};
pub use parser::{entry_details, parse_feed, Entry, EntryDetails};
pub use sorter::{sort_entries, SortKey, SortMethod, SortOrder, Sorting};
