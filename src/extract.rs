//! Text extraction for source files.
//!
//! Turns raw bytes into ordered [`Page`]s of plain UTF-8 text. PDF text is
//! split on the form feeds `pdf-extract` emits between pages; Markdown and
//! plain text are a single page. Extraction never panics: a bad file
//! produces an [`ExtractError`] and the pipeline skips that document.

use std::path::Path;
use thiserror::Error;

use crate::models::Page;

/// File formats the extractor understands, decided by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Pdf,
    Text,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file extension: {0}")]
    UnsupportedExtension(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("file is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
}

/// Classify a path by extension. Case-insensitive.
pub fn content_kind(path: &Path) -> Result<ContentKind, ExtractError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => Ok(ContentKind::Pdf),
        "md" | "markdown" | "txt" => Ok(ContentKind::Text),
        other => Err(ExtractError::UnsupportedExtension(other.to_string())),
    }
}

/// Extract ordered pages of plain text from raw bytes.
///
/// Page numbers are 1-based. Pages with no visible text are dropped, but
/// numbering still reflects the original position so citations stay honest.
pub fn extract_pages(bytes: &[u8], kind: ContentKind) -> Result<Vec<Page>, ExtractError> {
    match kind {
        ContentKind::Pdf => extract_pdf(bytes),
        ContentKind::Text => extract_text(bytes),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<Vec<Page>, ExtractError> {
    let text =
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;

    let pages: Vec<Page> = text
        .split('\u{c}')
        .enumerate()
        .filter_map(|(i, page_text)| {
            let trimmed = page_text.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(Page {
                    number: i as i64 + 1,
                    text: trimmed.to_string(),
                })
            }
        })
        .collect();

    Ok(pages)
}

fn extract_text(bytes: &[u8]) -> Result<Vec<Page>, ExtractError> {
    let text = std::str::from_utf8(bytes)?.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![Page {
        number: 1,
        text: text.to_string(),
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn kind_by_extension() {
        assert_eq!(
            content_kind(&PathBuf::from("a/b/report.PDF")).unwrap(),
            ContentKind::Pdf
        );
        assert_eq!(
            content_kind(&PathBuf::from("notes.md")).unwrap(),
            ContentKind::Text
        );
        assert!(matches!(
            content_kind(&PathBuf::from("image.png")),
            Err(ExtractError::UnsupportedExtension(_))
        ));
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_pages(b"not a pdf", ContentKind::Pdf).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn text_file_is_single_page() {
        let pages = extract_pages(b"hello\n\nworld", ContentKind::Text).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].number, 1);
        assert_eq!(pages[0].text, "hello\n\nworld");
    }

    #[test]
    fn empty_text_file_has_no_pages() {
        let pages = extract_pages(b"  \n ", ContentKind::Text).unwrap();
        assert!(pages.is_empty());
    }

    #[test]
    fn invalid_utf8_returns_error() {
        let err = extract_pages(&[0xff, 0xfe, 0x00], ContentKind::Text).unwrap_err();
        assert!(matches!(err, ExtractError::Encoding(_)));
    }
}
