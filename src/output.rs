//! CSV rendering of scrape rows.

use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::models::{ScrapeRow, COLUMNS};
use crate::utils::{channel_key, ChannelKey};

pub const DEFAULT_FILE_NAME: &str = "channel_videos_with_transcripts.csv";

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Write the header and one record per row. The header is written even
/// when `rows` is empty.
pub fn write_rows<W: Write>(writer: W, rows: &[ScrapeRow]) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(COLUMNS)?;
    for row in rows {
        csv_writer.write_record(row.to_record())?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Render rows as an in-memory CSV document.
pub fn to_csv_string(rows: &[ScrapeRow]) -> Result<String, csv::Error> {
    let mut buf = Vec::new();
    write_rows(&mut buf, rows)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Write rows to `path`, creating parent directories as needed.
pub fn write_csv(path: &Path, rows: &[ScrapeRow]) -> Result<(), OutputError> {
    let io_err = |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let file = std::fs::File::create(path).map_err(io_err)?;
    write_rows(file, rows)?;
    info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// Output file name derived from the channel, e.g. `veritasium_popular.csv`.
pub fn default_file_name(base_url: Option<&str>, mode: &str) -> String {
    let name = match base_url.and_then(channel_key) {
        Some(ChannelKey::Handle(name) | ChannelKey::Id(name) | ChannelKey::Legacy(name)) => name,
        None => return DEFAULT_FILE_NAME.to_string(),
    };
    let slug: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("{}_{}.csv", slug, mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SourcedMetadata, TranscriptErrorKind, TranscriptResult, VideoMetadata};

    fn row(id: &str, title: &str) -> ScrapeRow {
        let mut metadata = VideoMetadata::new(id);
        metadata.title = title.to_string();
        metadata.view_count = Some(1234);
        metadata.tags = vec!["a".into(), "b".into()];
        ScrapeRow::assemble(
            SourcedMetadata::Authoritative(metadata),
            TranscriptResult::failure(id, TranscriptErrorKind::NotFound, Vec::new()),
        )
    }

    #[test]
    fn test_header_only_for_empty_rows() {
        let csv = to_csv_string(&[]).unwrap();
        let header = csv.lines().next().unwrap();
        assert!(header.starts_with("video_id,title,url,views,published_at"));
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn test_quotes_and_list_cells() {
        let csv = to_csv_string(&[row("abcdefghijk", "Hello, \"world\"")]).unwrap();
        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let headers = reader.headers().unwrap().clone();
        let record = reader.records().next().unwrap().unwrap();

        assert_eq!(record.len(), COLUMNS.len());
        let cell = |name: &str| {
            let idx = headers.iter().position(|h| h == name).unwrap();
            record.get(idx).unwrap().to_string()
        };
        assert_eq!(cell("title"), "Hello, \"world\"");
        assert_eq!(cell("tags"), "a|b");
        assert_eq!(cell("views"), "1234");
        assert_eq!(cell("transcript_error"), "not_found");
        assert_eq!(cell("channel_id"), "");
    }

    #[test]
    fn test_write_csv_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/nested/rows.csv");
        write_csv(&path, &[row("abcdefghijk", "t")]).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn test_default_file_name() {
        assert_eq!(
            default_file_name(Some("https://www.youtube.com/@veritasium"), "popular"),
            "veritasium_popular.csv"
        );
        assert_eq!(
            default_file_name(Some("https://www.youtube.com/channel/UCabc"), "recent"),
            "UCabc_recent.csv"
        );
        assert_eq!(default_file_name(None, "popular"), DEFAULT_FILE_NAME);
    }
}
