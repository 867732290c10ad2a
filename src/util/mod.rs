//! Utility functions shared by the storage and feed layers.
//!
//! - **URL validation**: absolute-URI checks for feed subscriptions
//!
//! # Examples
//!
//! ```
//! use feedshelf::util::validate_url;
//!
//! let url = validate_url("https://example.com/feed.xml").unwrap();
//! assert_eq!(url.scheme(), "https");
//! ```

mod url_validator;

pub use url_validator::{validate_url, UrlValidationError};
