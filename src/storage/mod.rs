mod feeds;
pub mod persistence;
mod types;

pub use feeds::FeedStore;
pub use persistence::{
    fetch_all, read_document, restore, snapshot, write_document, CachedEntries, Document,
    UNCATEGORIZED,
};
pub use types::{Feed, FeedUpdate, PersistError, StoreError};
