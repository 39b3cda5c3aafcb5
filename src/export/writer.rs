use serde::Serialize;
use std::io::Write;
use thiserror::Error;

use crate::types::BookmarkRecord;

/// Column set of the URL-list import format, in order.
pub const CSV_HEADER: [&str; 5] = ["url", "state", "labels", "saved_at", "published_at"];

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Failed to write CSV record: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to flush CSV output: {0}")]
    Io(#[from] std::io::Error),
}

/// One CSV data row. Field order matches [`CSV_HEADER`].
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    url: &'a str,
    state: &'static str,
    labels: String,
    saved_at: Option<i64>,
    /// The export has no publish date distinct from `issued`.
    published_at: Option<i64>,
}

impl<'a> From<&'a BookmarkRecord> for CsvRow<'a> {
    fn from(record: &'a BookmarkRecord) -> Self {
        Self {
            url: &record.url,
            state: record.state.as_str(),
            labels: format_labels(&record.tags),
            saved_at: record.saved_at_epoch(),
            published_at: None,
        }
    }
}

/// Writes the header and one row per record to `sink`, then flushes.
///
/// Quoting follows RFC 4180: fields containing a comma, quote or line break
/// are wrapped in double quotes and embedded quotes are doubled.
pub fn write_csv<W: Write>(records: &[BookmarkRecord], sink: W) -> Result<(), EncodeError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(sink);

    writer.write_record(CSV_HEADER)?;
    for record in records {
        writer.serialize(CsvRow::from(record))?;
    }
    writer.flush()?;

    Ok(())
}

/// Encodes records into an in-memory CSV buffer.
pub fn encode_csv(records: &[BookmarkRecord]) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::new();
    write_csv(records, &mut buf)?;
    tracing::debug!(records = records.len(), bytes = buf.len(), "Encoded CSV");
    Ok(buf)
}

/// Renders tags as the import format's label list: `["a","b"]`.
///
/// Quotes inside a tag are doubled. An empty list renders as an empty string,
/// not `[]`.
pub fn format_labels(tags: &[String]) -> String {
    if tags.is_empty() {
        return String::new();
    }

    let quoted: Vec<String> = tags
        .iter()
        .map(|tag| format!("\"{}\"", tag.replace('"', "\"\"")))
        .collect();
    format!("[{}]", quoted.join(","))
}

/// Inverse of [`format_labels`]. Returns `None` if `cell` is not a label list.
pub fn parse_labels(cell: &str) -> Option<Vec<String>> {
    if cell.is_empty() {
        return Some(Vec::new());
    }

    let inner = cell.strip_prefix('[')?.strip_suffix(']')?;
    let mut tags = Vec::new();
    let mut chars = inner.chars().peekable();

    loop {
        if chars.next()? != '"' {
            return None;
        }
        let mut tag = String::new();
        loop {
            match chars.next()? {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    tag.push('"');
                }
                '"' => break,
                c => tag.push(c),
            }
        }
        tags.push(tag);

        match chars.next() {
            None => return Some(tags),
            Some(',') => continue,
            Some(_) => return None,
        }
    }
}
