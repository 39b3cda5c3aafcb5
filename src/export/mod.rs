//! CSV encoding of bookmark records in the URL-list import format.

mod writer;

pub use writer::{encode_csv, format_labels, parse_labels, write_csv, EncodeError, CSV_HEADER};
