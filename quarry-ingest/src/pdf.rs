//! Text extraction for PDF files.
//!
//! Pages are read in page-number order and their text is joined with a
//! newline. Table cells come out as part of the page text; there is no
//! separate table pass. A page whose text cannot be decoded is skipped, while
//! a file that cannot be parsed at all is an error.

use crate::error::{IngestError, Result};
use std::path::Path;
use tracing::{debug, warn};

/// Extract the text of every page of the PDF at `path`.
///
/// Scanned documents without a text layer yield an empty string.
pub fn extract_text(path: &Path) -> Result<String> {
    let document = lopdf::Document::load(path).map_err(|source| IngestError::Pdf {
        path: path.to_path_buf(),
        source,
    })?;

    let pages = document.get_pages();
    let mut text = String::new();
    for &page in pages.keys() {
        match document.extract_text(&[page]) {
            Ok(page_text) => {
                if !text.is_empty() && !text.ends_with('\n') {
                    text.push('\n');
                }
                text.push_str(&page_text);
            }
            Err(e) => warn!("Skipping page {} of {}: {}", page, path.display(), e),
        }
    }

    debug!("Extracted {} bytes from {} pages of {}", text.len(), pages.len(), path.display());
    Ok(text)
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_pages_are_extracted_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("handbook.pdf");
        fixtures::write_pdf(&path, &["Invoices are due in 30 days", "Travel needs approval"]);

        let text = extract_text(&path).unwrap();
        let first = text.find("Invoices are due in 30 days").unwrap();
        let second = text.find("Travel needs approval").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_unparseable_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, "plain text wearing a pdf extension").unwrap();

        assert!(matches!(extract_text(&path), Err(IngestError::Pdf { .. })));
    }
}
