use std::path::Path;

use thiserror::Error;

use crate::feed::document::{DocumentError, FeedDocument};
use crate::util::atomic_write;

/// Failure of the final indentation pass.
///
/// Never fatal: the unformatted document written before it stays on disk.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Failed to re-read written feed: {0}")]
    Read(#[source] std::io::Error),

    #[error("Written feed could not be reformatted: {0}")]
    Document(#[from] DocumentError),

    #[error("Failed to rewrite formatted feed: {0}")]
    Write(#[source] std::io::Error),
}

/// Errors from [`write_document`].
#[derive(Debug, Error)]
pub enum WriteError {
    #[error(transparent)]
    Serialize(#[from] DocumentError),

    #[error("{0}")]
    Io(#[source] std::io::Error),
}

/// Serializes `doc` with an XML declaration and replaces `path` with it.
pub fn write_document(doc: &FeedDocument, path: &Path) -> Result<usize, WriteError> {
    let xml = doc.to_xml(false)?;
    atomic_write(path, xml.as_bytes()).map_err(WriteError::Io)?;
    tracing::debug!(path = %path.display(), bytes = xml.len(), "Wrote merged feed");
    Ok(xml.len())
}

/// Rewrites the XML file at `path` with two-space indentation.
pub fn prettify_file(path: &Path) -> Result<(), FormatError> {
    let content = std::fs::read_to_string(path).map_err(FormatError::Read)?;
    let doc = FeedDocument::parse(&content)?;
    let pretty = doc.to_xml(true)?;
    atomic_write(path, pretty.as_bytes()).map_err(FormatError::Write)?;
    tracing::debug!(path = %path.display(), "Reformatted merged feed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    const FEED: &str = r#"<rss version="2.0"><channel><title>Show</title><item><guid>a</guid></item></channel></rss>"#;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("podmerge_writer_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_write_then_prettify() {
        let dir = test_dir("pretty");
        let path = dir.join("merged.rss");
        let doc = FeedDocument::parse(FEED).unwrap();

        write_document(&doc, &path).unwrap();
        let compact = std::fs::read_to_string(&path).unwrap();
        assert!(compact.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(compact.contains("<channel><title>Show</title>"));

        prettify_file(&path).unwrap();
        let pretty = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            pretty,
            r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Show</title>
    <item>
      <guid>a</guid>
    </item>
  </channel>
</rss>
"#
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_prettify_failure_keeps_file() {
        let dir = test_dir("broken");
        let path = dir.join("merged.rss");
        std::fs::write(&path, "<rss><channel>").unwrap();

        let result = prettify_file(&path);
        assert!(matches!(result, Err(FormatError::Document(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<rss><channel>");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_prettify_missing_file() {
        let path = std::env::temp_dir().join("podmerge_writer_missing/none.rss");
        assert!(matches!(prettify_file(&path), Err(FormatError::Read(_))));
    }
}
