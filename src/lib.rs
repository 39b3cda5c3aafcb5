//! Converts a Hatena Bookmark Atom export into an Omnivore URL-list import.
//!
//! The run is a straight pipeline:
//!
//! 1. [`feed`] parses the Atom document into [`types::BookmarkRecord`]s
//! 2. [`export`] encodes the records as CSV
//! 3. [`import`] obtains a signed upload URL and PUTs the CSV to it

pub mod config;
pub mod export;
pub mod feed;
pub mod import;
pub mod pipeline;
pub mod types;
pub mod util;
