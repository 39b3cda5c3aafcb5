use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::types::{FeedEntry, Link};

/// SEC-003: Maximum element nesting depth accepted in a feed document.
/// Bookmark exports are at most four levels deep; anything far beyond that is hostile.
const MAX_FEED_DEPTH: usize = 64;

/// Errors that can occur while reading an Atom document.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The document is not well-formed XML.
    #[error("XML parse error at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    /// An `<issued>` element holds something other than an RFC 3339 timestamp.
    #[error("Invalid issued timestamp {value:?}: {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// The input contains no root element at all.
    #[error("Document has no root element")]
    MissingRoot,

    /// The root element is not an Atom `<feed>`.
    #[error("Expected <feed> root element, found <{0}>")]
    UnexpectedRoot(String),

    /// The document ended while an element was still open.
    #[error("Unexpected end of document: <{0}> is not closed")]
    UnclosedElement(String),

    /// SEC-003: Nesting depth exceeds safety limit.
    #[error("Feed nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),
}

/// Entry child elements whose text content is collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextField {
    Title,
    Subject,
    Issued,
}

impl TextField {
    fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(TextField::Title),
            b"subject" => Some(TextField::Subject),
            b"issued" => Some(TextField::Issued),
            _ => None,
        }
    }
}

/// Reads every `<entry>` of an Atom feed, in document order.
///
/// Element names are matched on their local part, so `<dc:subject>` and
/// `<subject>` are treated alike. Only direct children of `<feed>` count as
/// entries and only direct children of `<entry>` contribute fields; the feed's
/// own `<title>` and `<author><name>` are ignored.
///
/// # Errors
///
/// Returns [`ParseError`] if the document is not well-formed, has no `<feed>`
/// root, or contains an `<issued>` value that is not a valid timestamp.
/// A feed without entries is not an error.
pub fn read_entries(xml: &[u8]) -> Result<Vec<FeedEntry>, ParseError> {
    // SEC-002: quick-xml (0.37) never expands <!ENTITY> declarations; only the five
    // predefined XML entities are resolved by `unescape()`.
    // Text is kept as written; whitespace between elements is dropped because
    // only text inside a collected field is read.
    let mut reader = Reader::from_reader(xml);

    let mut entries = Vec::new();
    let mut buf = Vec::new();
    // Local names of the currently open elements, root first
    let mut open: Vec<String> = Vec::new();
    let mut seen_root = false;

    let mut entry: Option<FeedEntry> = None;
    let mut field: Option<TextField> = None;
    let mut text = String::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|source| ParseError::Xml {
                position: reader.error_position(),
                source,
            })?;

        match event {
            Event::Start(e) => {
                let name = local_name(&e);
                if open.is_empty() {
                    check_root(&name)?;
                    seen_root = true;
                }
                match open.len() {
                    1 if name == "entry" => entry = Some(FeedEntry::default()),
                    2 if entry.is_some() => {
                        if name == "link" {
                            push_link(&reader, &e, entry.as_mut())?;
                        } else if let Some(f) = TextField::from_local_name(name.as_bytes()) {
                            field = Some(f);
                            text.clear();
                        }
                    }
                    _ => {}
                }

                open.push(name);
                if open.len() > MAX_FEED_DEPTH {
                    return Err(ParseError::MaxDepthExceeded(MAX_FEED_DEPTH));
                }
            }
            Event::Empty(e) => {
                let name = local_name(&e);
                if open.is_empty() {
                    check_root(&name)?;
                    seen_root = true;
                }
                if open.len() == 2 {
                    if name == "link" {
                        push_link(&reader, &e, entry.as_mut())?;
                    } else if let (Some(f), Some(current)) = (
                        TextField::from_local_name(name.as_bytes()),
                        entry.as_mut(),
                    ) {
                        apply_field(current, f, String::new())?;
                    }
                } else if open.len() == 1 && name == "entry" {
                    entries.push(FeedEntry::default());
                }
            }
            Event::Text(e) => {
                if field.is_some() {
                    let unescaped = e.unescape().map_err(|source| ParseError::Xml {
                        position: reader.buffer_position(),
                        source,
                    })?;
                    text.push_str(&unescaped);
                }
            }
            Event::CData(e) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::End(_) => {
                open.pop();
                match open.len() {
                    2 => {
                        if let (Some(f), Some(current)) = (field.take(), entry.as_mut()) {
                            apply_field(current, f, std::mem::take(&mut text))?;
                        }
                    }
                    1 => {
                        if let Some(done) = entry.take() {
                            entries.push(done);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(name) = open.pop() {
        return Err(ParseError::UnclosedElement(name));
    }
    if !seen_root {
        return Err(ParseError::MissingRoot);
    }

    Ok(entries)
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn check_root(name: &str) -> Result<(), ParseError> {
    if name == "feed" {
        Ok(())
    } else {
        Err(ParseError::UnexpectedRoot(name.to_string()))
    }
}

/// Stores collected text into the matching entry field.
fn apply_field(entry: &mut FeedEntry, field: TextField, value: String) -> Result<(), ParseError> {
    match field {
        TextField::Title => entry.title = value,
        TextField::Subject => entry.tags.push(value),
        TextField::Issued => entry.issued = Some(parse_timestamp(&value)?),
    }
    Ok(())
}

/// Parses an `<issued>` value such as `2023-12-31T09:25:43Z`.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ParseError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|source| ParseError::Timestamp {
            value: value.to_string(),
            source,
        })
}

/// Extracts `rel`/`href` from a `<link>` element and appends it to the entry.
///
/// A link without `rel` gets an empty relation and is later ignored.
fn push_link(
    reader: &Reader<&[u8]>,
    e: &BytesStart<'_>,
    entry: Option<&mut FeedEntry>,
) -> Result<(), ParseError> {
    let Some(entry) = entry else {
        return Ok(());
    };

    let xml_err = |source: quick_xml::Error| ParseError::Xml {
        position: reader.buffer_position(),
        source,
    };

    let mut rel = String::new();
    let mut href = String::new();
    let decoder = reader.decoder();
    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|err| xml_err(err.into()))?;
        match attr.key.local_name().as_ref() {
            b"rel" => {
                rel = attr
                    .decode_and_unescape_value(decoder)
                    .map_err(xml_err)?
                    .into_owned()
            }
            b"href" => {
                href = attr
                    .decode_and_unescape_value(decoder)
                    .map_err(xml_err)?
                    .into_owned()
            }
            _ => {}
        }
    }

    entry.links.push(Link { rel, href });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const TWO_ENTRIES: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed version="0.3" xmlns="http://purl.org/atom/ns#" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <title>tkancfのブックマーク</title>
  <link type="text/html" rel="alternate" href="https://b.hatena.ne.jp/tkancf/bookmark"/>
  <entry>
    <title>2023年の振り返り</title>
    <link type="text/html" rel="related" href="https://tkancf.com/blog/2023-summary/"/>
    <link type="text/html" rel="alternate" href="https://b.hatena.ne.jp/tkancf/20231231"/>
    <issued>2023-12-31T09:25:43Z</issued>
    <author><name>tkancf</name></author>
    <dc:subject>tkancf</dc:subject>
  </entry>
  <entry>
    <title>Tom &amp; Jerry</title>
    <link rel="related" href="https://example.com/?a=1&amp;b=2"></link>
    <issued>2023-10-06T15:19:42+09:00</issued>
  </entry>
</feed>"#;

    #[test]
    fn test_reads_entries_in_order() {
        let entries = read_entries(TWO_ENTRIES.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].title, "2023年の振り返り");
        assert_eq!(entries[0].links.len(), 2);
        assert_eq!(entries[0].links[0].rel, "related");
        assert_eq!(entries[0].links[0].href, "https://tkancf.com/blog/2023-summary/");
        assert_eq!(entries[0].tags, vec!["tkancf".to_string()]);
        assert_eq!(
            entries[0].issued,
            Some(Utc.with_ymd_and_hms(2023, 12, 31, 9, 25, 43).unwrap())
        );
    }

    #[test]
    fn test_unescapes_text_and_attributes() {
        let entries = read_entries(TWO_ENTRIES.as_bytes()).unwrap();
        assert_eq!(entries[1].title, "Tom & Jerry");
        assert_eq!(entries[1].links[0].href, "https://example.com/?a=1&b=2");
        assert!(entries[1].tags.is_empty());
    }

    #[test]
    fn test_offset_timestamp_normalized_to_utc() {
        let entries = read_entries(TWO_ENTRIES.as_bytes()).unwrap();
        assert_eq!(
            entries[1].issued,
            Some(Utc.with_ymd_and_hms(2023, 10, 6, 6, 19, 42).unwrap())
        );
    }

    #[test]
    fn test_feed_title_not_taken_as_entry_title() {
        let xml = r#"<feed><title>Feed</title><entry><link rel="related" href="https://a.test"/></entry></feed>"#;
        let entries = read_entries(xml.as_bytes()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "");
    }

    #[test]
    fn test_author_name_ignored() {
        let xml = r#"<feed><entry><title>A</title><author><name>someone</name></author></entry></feed>"#;
        let entries = read_entries(xml.as_bytes()).unwrap();
        assert_eq!(entries[0].title, "A");
        assert!(entries[0].tags.is_empty());
    }

    #[test]
    fn test_text_whitespace_preserved() {
        let xml = "<feed>\n  <entry>\n    <title> Spaced  title </title>\n    <dc:subject> a b </dc:subject>\n  </entry>\n</feed>\n";
        let entries = read_entries(xml.as_bytes()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, " Spaced  title ");
        assert_eq!(entries[0].tags, vec![" a b ".to_string()]);
    }

    #[test]
    fn test_whitespace_only_input_rejected() {
        assert!(matches!(read_entries(b"  \n "), Err(ParseError::MissingRoot)));
    }

    #[test]
    fn test_cdata_title() {
        let xml = r#"<feed><entry><title><![CDATA[a < b]]></title></entry></feed>"#;
        let entries = read_entries(xml.as_bytes()).unwrap();
        assert_eq!(entries[0].title, "a < b");
    }

    #[test]
    fn test_missing_issued_is_none() {
        let xml = r#"<feed><entry><title>A</title></entry></feed>"#;
        let entries = read_entries(xml.as_bytes()).unwrap();
        assert_eq!(entries[0].issued, None);
    }

    #[test]
    fn test_empty_feed() {
        assert!(read_entries(b"<feed></feed>").unwrap().is_empty());
        assert!(read_entries(b"<feed/>").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_timestamp_rejected() {
        let xml = r#"<feed><entry><issued>yesterday</issued></entry></feed>"#;
        let err = read_entries(xml.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::Timestamp { ref value, .. } if value == "yesterday"));
    }

    #[test]
    fn test_unclosed_tag_rejected() {
        let xml = r#"<feed><entry><title>A</title>"#;
        let err = read_entries(xml.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            ParseError::UnclosedElement(_) | ParseError::Xml { .. }
        ));
    }

    #[test]
    fn test_mismatched_end_tag_rejected() {
        let xml = r#"<feed><entry><title>A</entry></feed>"#;
        let err = read_entries(xml.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::Xml { .. }));
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(matches!(read_entries(b""), Err(ParseError::MissingRoot)));
    }

    #[test]
    fn test_non_feed_root_rejected() {
        let err = read_entries(b"<rss><channel/></rss>").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedRoot(ref name) if name == "rss"));
    }

    // SEC-003: Nesting limit
    #[test]
    fn test_deep_nesting_rejected() {
        let depth = MAX_FEED_DEPTH + 5;
        let xml = format!(
            "<feed>{}{}</feed>",
            "<x>".repeat(depth),
            "</x>".repeat(depth)
        );
        let err = read_entries(xml.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::MaxDepthExceeded(_)));
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(
            parse_timestamp(" 2024-01-01T00:00:00Z\n").unwrap().timestamp(),
            1_704_067_200
        );
        assert!(parse_timestamp("2024-01-01").is_err());
    }
}
