//! # feedshelf
//!
//! Feed subscription management for RSS/Atom readers: keep a list of feeds
//! grouped into categories, fetch and read their entries, and persist the
//! list (with the entries last seen) to a local JSON file.
//!
//! ```text
//! FeedStore → FeedFetcher → sort_entries → feeds.json
//! ```
//!
//! - [`storage`]: the in-memory feed collection and the JSON document
//! - [`feed`]: HTTP fetching, charset decoding, parsing and sorting
//! - [`reader`]: [`FeedReader`](reader::FeedReader), the interface a UI holds
//! - [`config`]: optional TOML configuration
//! - [`util`]: URL validation

pub mod config;
pub mod feed;
pub mod reader;
pub mod storage;
pub mod util;
