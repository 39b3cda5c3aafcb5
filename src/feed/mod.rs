//! Feed extraction: Atom bookmark export to normalized records.
//!
//! - [`atom`] - Event-based `quick-xml` reader producing [`FeedEntry`](crate::types::FeedEntry) values
//! - [`parser`] - Flattening entries into one record per `related` link
//!
//! # Example
//!
//! ```ignore
//! use hatebu_import::feed::read_feed;
//! use hatebu_import::types::SaveState;
//!
//! let records = read_feed(Path::new("bookmarks.xml"), SaveState::Succeeded).await?;
//! ```

mod atom;
mod parser;

pub use atom::{parse_timestamp, read_entries, ParseError};
pub use parser::{extract_records, parse_feed, read_feed, FeedError};
