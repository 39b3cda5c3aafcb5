//! The import run: extract, encode, then upload or write.
//!
//! Stages run strictly one after another and the first error aborts the run.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

use crate::config::{Destination, Settings};
use crate::export::{encode_csv, write_csv};
use crate::feed::read_feed;
use crate::import::ImportClient;
use crate::types::BookmarkRecord;

/// Outcome of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Number of CSV data rows produced.
    pub records: usize,
    /// Size of the CSV payload in bytes when uploaded, `None` when written locally.
    pub uploaded_bytes: Option<usize>,
}

pub async fn run(settings: Settings) -> Result<RunSummary> {
    let records = read_feed(&settings.input, settings.state)
        .await
        .context("Failed to extract bookmarks")?;
    tracing::info!(
        input = %settings.input.display(),
        records = records.len(),
        state = %settings.state,
        "Extracted bookmarks"
    );

    match settings.destination {
        Destination::Write(path) => {
            write_to(&path, &records)?;
            Ok(RunSummary {
                records: records.len(),
                uploaded_bytes: None,
            })
        }
        Destination::Upload { api_url, token } => {
            let payload = encode_csv(&records).context("Failed to encode CSV")?;
            let size = payload.len();

            let client = ImportClient::new(&api_url, token)?;
            let signed_url = client
                .request_signed_url()
                .await
                .context("Failed to obtain signed upload URL")?;
            client
                .upload(&signed_url, payload)
                .await
                .context("Failed to upload CSV")?;

            Ok(RunSummary {
                records: records.len(),
                uploaded_bytes: Some(size),
            })
        }
    }
}

/// Streams the CSV to `path`, or to stdout when `path` is `-`.
fn write_to(path: &Path, records: &[BookmarkRecord]) -> Result<()> {
    if path == Path::new("-") {
        let stdout = std::io::stdout();
        write_csv(records, stdout.lock()).context("Failed to write CSV to stdout")?;
        return Ok(());
    }

    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create output file '{}'", path.display()))?;
    let mut out = std::io::BufWriter::new(file);
    write_csv(records, &mut out)
        .with_context(|| format!("Failed to write CSV to '{}'", path.display()))?;
    out.flush()
        .with_context(|| format!("Failed to flush '{}'", path.display()))?;

    tracing::info!(path = %path.display(), records = records.len(), "Wrote CSV");
    Ok(())
}
