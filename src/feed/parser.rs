use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::feed::atom::{read_entries, ParseError};
use crate::types::{BookmarkRecord, FeedEntry, SaveState};

/// Errors that can occur while turning a feed file into records.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The feed file could not be opened or read.
    #[error("Failed to read feed file '{}': {source}", path.display())]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The feed content is malformed.
    #[error("Failed to parse feed: {0}")]
    Parse(#[from] ParseError),
}

/// Flattens entries into one record per `related` link.
///
/// Order follows the document: entries first, then links within an entry.
/// Every record gets the same `state`.
pub fn extract_records(entries: Vec<FeedEntry>, state: SaveState) -> Vec<BookmarkRecord> {
    let mut records = Vec::new();

    for entry in entries {
        let FeedEntry {
            title,
            links,
            tags,
            issued,
        } = entry;

        let before = records.len();
        records.extend(
            links
                .into_iter()
                .filter(|link| link.is_related())
                .map(|link| BookmarkRecord {
                    title: title.clone(),
                    url: link.href,
                    state,
                    tags: tags.clone(),
                    saved_at: issued,
                }),
        );

        if records.len() == before {
            tracing::debug!(title = %title, "Entry has no related link, skipping");
        }
    }

    records
}

/// Parses raw Atom bytes into normalized records.
pub fn parse_feed(bytes: &[u8], state: SaveState) -> Result<Vec<BookmarkRecord>, ParseError> {
    let entries = read_entries(bytes)?;
    let entry_count = entries.len();
    let records = extract_records(entries, state);

    tracing::debug!(
        entries = entry_count,
        records = records.len(),
        state = %state,
        "Parsed feed"
    );
    Ok(records)
}

/// Reads the feed file at `path` fully into memory and extracts its records.
pub async fn read_feed(path: &Path, state: SaveState) -> Result<Vec<BookmarkRecord>, FeedError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| FeedError::Input {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(parse_feed(&bytes, state)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Link;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    const HATEBU_EXPORT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed version="0.3" xmlns="http://purl.org/atom/ns#" xmlns:dc="http://purl.org/dc/elements/1.1/" xml:lang="ja">
  <title>tkancfのブックマーク</title>
  <link type="text/html" rel="alternate" href="https://b.hatena.ne.jp/tkancf/bookmark"/>
  <link type="application/x.atom+xml" rel="service.post" href="https://b.hatena.ne.jp/atom/post" title="tkancfのブックマーク"/>
  <author>
    <name>tkancf</name>
  </author>
  <entry>
    <id>tag:hatena.ne.jp,2005:bookmark-tkancf-4747196714236931727</id>
    <title>2023年の振り返り</title>
    <link type="text/html" rel="related" href="https://tkancf.com/blog/2023-summary/"/>
    <link type="text/html" rel="alternate" href="https://b.hatena.ne.jp/tkancf/20231231#bookmark-4747196714236931727"/>
    <link type="application/x.atom+xml" rel="service.edit" title="2023年の振り返り" href="https://b.hatena.ne.jp/atom/edit/4747196714236931727"/>
    <summary>年末なのでね、振り返りましたよ。</summary>
    <issued>2023-12-31T09:25:43Z</issued>
    <author>
      <name>tkancf</name>
    </author>
    <dc:subject>tkancf</dc:subject>
  </entry>
  <entry>
    <id>tag:hatena.ne.jp,2005:bookmark-tkancf-4746065390374578287</id>
    <title>Vimの設定整理した - 2020年版</title>
    <link type="text/html" rel="related" href="https://tkancf.com/blog/vim%E3%81%AE%E8%A8%AD%E5%AE%9A%E6%95%B4%E7%90%86%E3%81%97%E3%81%9F-2020%E5%B9%B4%E7%89%88/"/>
    <link type="text/html" rel="alternate" href="https://b.hatena.ne.jp/tkancf/20231207#bookmark-4746065390374578287"/>
    <summary></summary>
    <issued>2023-12-07T00:04:45Z</issued>
    <dc:subject>vim</dc:subject>
    <dc:subject>tkancf</dc:subject>
  </entry>
  <entry>
    <id>tag:hatena.ne.jp,2005:bookmark-tkancf-4743218953048896367</id>
    <title>GitHub Mobile + GitHub issueでメモが良い感じ</title>
    <link type="text/html" rel="related" href="https://tkancf.com/blog/2023-10-05/"/>
    <link type="text/html" rel="alternate" href="https://b.hatena.ne.jp/tkancf/20231007#bookmark-4743218953048896367"/>
    <summary>書きました</summary>
    <issued>2023-10-06T15:19:42Z</issued>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_hatebu_export() {
        let records = parse_feed(HATEBU_EXPORT.as_bytes(), SaveState::Archived).unwrap();
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].title, "2023年の振り返り");
        assert_eq!(records[0].url, "https://tkancf.com/blog/2023-summary/");
        assert_eq!(records[0].tags, vec!["tkancf"]);
        assert_eq!(
            records[0].saved_at,
            Some(Utc.with_ymd_and_hms(2023, 12, 31, 9, 25, 43).unwrap())
        );

        assert_eq!(records[1].title, "Vimの設定整理した - 2020年版");
        assert_eq!(records[1].tags, vec!["vim", "tkancf"]);
        assert_eq!(
            records[1].saved_at,
            Some(Utc.with_ymd_and_hms(2023, 12, 7, 0, 4, 45).unwrap())
        );

        assert_eq!(records[2].url, "https://tkancf.com/blog/2023-10-05/");
        assert!(records[2].tags.is_empty());
        assert_eq!(
            records[2].saved_at,
            Some(Utc.with_ymd_and_hms(2023, 10, 6, 15, 19, 42).unwrap())
        );

        assert!(records.iter().all(|r| r.state == SaveState::Archived));
    }

    #[test]
    fn test_state_does_not_depend_on_feed() {
        let records = parse_feed(HATEBU_EXPORT.as_bytes(), SaveState::Succeeded).unwrap();
        assert!(records.iter().all(|r| r.state == SaveState::Succeeded));
    }

    #[test]
    fn test_multiple_related_links_yield_multiple_records() {
        let xml = r#"<feed>
  <entry>
    <title>Pair</title>
    <link rel="related" href="https://a.test/1"/>
    <link rel="alternate" href="https://b.test/"/>
    <link rel="related" href="https://a.test/2"/>
    <issued>2024-01-01T00:00:00Z</issued>
    <dc:subject xmlns:dc="http://purl.org/dc/elements/1.1/">x</dc:subject>
  </entry>
</feed>"#;
        let records = parse_feed(xml.as_bytes(), SaveState::Succeeded).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].url, "https://a.test/1");
        assert_eq!(records[1].url, "https://a.test/2");
        assert_eq!(records[0].title, records[1].title);
        assert_eq!(records[0].tags, records[1].tags);
        assert_eq!(records[0].saved_at, records[1].saved_at);
    }

    #[test]
    fn test_entry_without_related_link_yields_nothing() {
        let xml = r#"<feed><entry><title>A</title><link rel="alternate" href="https://a.test"/></entry></feed>"#;
        let records = parse_feed(xml.as_bytes(), SaveState::Succeeded).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_malformed_xml_is_parse_error() {
        let xml = r#"<feed><entry><title>A</entry></feed>"#;
        assert!(parse_feed(xml.as_bytes(), SaveState::Succeeded).is_err());
    }

    #[tokio::test]
    async fn test_read_feed_missing_file() {
        let path = Path::new("/tmp/hatebu_import_test_nonexistent.xml");
        let err = read_feed(path, SaveState::Succeeded).await.unwrap_err();
        assert!(matches!(err, FeedError::Input { .. }));
        assert!(err.to_string().contains("hatebu_import_test_nonexistent.xml"));
    }

    #[tokio::test]
    async fn test_read_feed_from_file() {
        let dir = std::env::temp_dir().join("hatebu_import_test_read_feed");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bookmarks.xml");
        std::fs::write(&path, HATEBU_EXPORT).unwrap();

        let records = read_feed(&path, SaveState::Succeeded).await.unwrap();
        assert_eq!(records.len(), 3);

        std::fs::remove_dir_all(&dir).ok();
    }

    fn arb_entry() -> impl Strategy<Value = FeedEntry> {
        let rel = prop_oneof![
            Just("related".to_string()),
            Just("alternate".to_string()),
            Just("service.edit".to_string()),
        ];
        let link = (rel, "[a-z]{1,8}").prop_map(|(rel, path)| Link {
            rel,
            href: format!("https://x.test/{}", path),
        });
        (
            "[a-zA-Z ]{0,12}",
            prop::collection::vec(link, 0..5),
            prop::collection::vec("[a-z]{1,6}", 0..3),
        )
            .prop_map(|(title, links, tags)| FeedEntry {
                title,
                links,
                tags,
                issued: None,
            })
    }

    proptest! {
        #[test]
        fn prop_one_record_per_related_link(entries in prop::collection::vec(arb_entry(), 0..8)) {
            let expected: Vec<String> = entries
                .iter()
                .flat_map(|e| e.links.iter().filter(|l| l.is_related()).map(|l| l.href.clone()))
                .collect();

            let records = extract_records(entries, SaveState::Archived);
            let urls: Vec<String> = records.iter().map(|r| r.url.clone()).collect();

            prop_assert_eq!(urls, expected);
            prop_assert!(records.iter().all(|r| r.state == SaveState::Archived));
        }
    }
}
