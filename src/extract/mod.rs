//! Document text extraction
//!
//! Uploads are checked for a supported type before any state changes, then
//! split into per-page text.

use crate::error::{DocQaError, Result};
use std::path::Path;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Text of one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 1-based page number
    pub page_number: u32,
    pub text: String,
}

/// Turns a document into per-page text
///
/// Pages are returned in order, including pages with no text.
pub trait DocumentExtractor: Send + Sync {
    fn extract(&self, document: &str, data: &[u8]) -> Result<Vec<PageText>>;
}

/// PDF text extraction via `pdf-extract`
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

impl DocumentExtractor for PdfExtractor {
    fn extract(&self, document: &str, data: &[u8]) -> Result<Vec<PageText>> {
        let pages = pdf_extract::extract_text_from_mem_by_pages(data).map_err(|e| {
            DocQaError::Extraction {
                document: document.to_string(),
                message: e.to_string(),
            }
        })?;

        if let Some(missing) = page_shortfall(data, pages.len()) {
            tracing::warn!(
                document,
                extracted = pages.len(),
                missing,
                "Extraction stopped early, later pages are missing"
            );
        }

        tracing::debug!(document, pages = pages.len(), "Extracted PDF text");

        Ok(pages
            .into_iter()
            .enumerate()
            .map(|(i, text)| PageText {
                page_number: i as u32 + 1,
                text,
            })
            .collect())
    }
}

/// Pages of the PDF tree that extraction did not return
///
/// pdf-extract stops at the first page it cannot read, dropping the rest.
fn page_shortfall(data: &[u8], extracted: usize) -> Option<usize> {
    let doc = pdf_extract::Document::load_mem(data).ok()?;
    let expected = doc.get_pages().len();
    (expected > extracted).then(|| expected - extracted)
}

/// Reject anything that is not a PDF by name and content
pub fn validate_document(name: &str, data: &[u8]) -> Result<()> {
    let is_pdf_name = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    if !is_pdf_name {
        return Err(DocQaError::UnsupportedInputType {
            name: name.to_string(),
            reason: "Only PDF files are allowed.".to_string(),
        });
    }

    if !data.starts_with(PDF_MAGIC) {
        return Err(DocQaError::UnsupportedInputType {
            name: name.to_string(),
            reason: "file content is not a PDF document".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_pdf() {
        assert!(validate_document("Report.PDF", b"%PDF-1.7\n...").is_ok());
        assert!(validate_document("listing.pdf", b"%PDF-1.4").is_ok());
    }

    #[test]
    fn test_rejects_other_extensions() {
        let result = validate_document("notes.txt", b"%PDF-1.4");
        assert!(matches!(
            result,
            Err(DocQaError::UnsupportedInputType { .. })
        ));
        assert!(validate_document("pdf", b"%PDF-1.4").is_err());
    }

    #[test]
    fn test_rejects_renamed_files() {
        let result = validate_document("image.pdf", b"\x89PNG\r\n\x1a\n");
        assert!(matches!(
            result,
            Err(DocQaError::UnsupportedInputType { .. })
        ));
    }

    /// A PDF with `pages` empty pages
    fn blank_pdf(pages: usize) -> Vec<u8> {
        use pdf_extract::{Dictionary, Document, Object};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let kids: Vec<Object> = (0..pages)
            .map(|_| {
                let mut page = Dictionary::new();
                page.set("Type", Object::Name(b"Page".to_vec()));
                page.set("Parent", Object::Reference(pages_id));
                Object::Reference(doc.add_object(page))
            })
            .collect();

        let mut tree = Dictionary::new();
        tree.set("Type", Object::Name(b"Pages".to_vec()));
        tree.set("Count", Object::Integer(pages as i64));
        tree.set("Kids", Object::Array(kids));
        tree.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(595),
                Object::Integer(842),
            ]),
        );
        doc.objects.insert(pages_id, Object::Dictionary(tree));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_page_shortfall_counts_dropped_pages() {
        let pdf = blank_pdf(3);
        assert_eq!(page_shortfall(&pdf, 1), Some(2));
        assert_eq!(page_shortfall(&pdf, 3), None);
        assert_eq!(page_shortfall(b"%PDF-1.4 not really", 0), None);
    }

    #[test]
    fn test_garbage_pdf_is_an_extraction_error() {
        let result = PdfExtractor.extract("broken.pdf", b"%PDF-1.4 not really");
        assert!(matches!(result, Err(DocQaError::Extraction { .. })));
    }
}
