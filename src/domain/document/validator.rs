//! Validated PDF document

use std::collections::BTreeMap;
use std::fmt;

use lopdf::{Document, ObjectId};
use tracing::debug;

use super::error::DocumentError;

/// How far into the file the `%PDF-` marker may appear
const HEADER_SEARCH_WINDOW: usize = 1024;
const PDF_HEADER: &[u8] = b"%PDF-";
const ENCRYPT_MARKER: &[u8] = b"/Encrypt";

/// True if the bytes carry a PDF header near the start of the file.
pub fn has_pdf_header(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    contains(window, PDF_HEADER)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// A parsed, unencrypted PDF with at least one page. Never mutated; page
/// ranges are extracted from clones.
#[derive(Clone)]
pub struct PdfDocument {
    document: Document,
    pages: BTreeMap<u32, ObjectId>,
}

impl PdfDocument {
    /// Parse and validate raw bytes
    pub fn load(bytes: &[u8]) -> Result<Self, DocumentError> {
        if !has_pdf_header(bytes) {
            return Err(DocumentError::NotPdf);
        }

        let document = Document::load_mem(bytes).map_err(|e| {
            if contains(bytes, ENCRYPT_MARKER) {
                DocumentError::Encrypted
            } else {
                DocumentError::malformed(e.to_string())
            }
        })?;

        if document.is_encrypted() || document.trailer.get(b"Encrypt").is_ok() {
            return Err(DocumentError::Encrypted);
        }

        let pages = document.get_pages();
        if pages.is_empty() {
            return Err(DocumentError::NoPages);
        }

        debug!(page_count = pages.len(), "Loaded PDF");
        Ok(Self { document, pages })
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Build a standalone PDF holding pages `start..=end` (1-indexed).
    pub fn extract_pages(&self, start: u32, end: u32) -> Result<Vec<u8>, DocumentError> {
        let page_count = self.page_count();
        if start == 0 || start > end || end > page_count {
            return Err(DocumentError::malformed(format!(
                "Page range {}-{} is outside the document (1-{})",
                start, end, page_count
            )));
        }

        let to_delete: Vec<u32> = self
            .pages
            .keys()
            .copied()
            .filter(|page| *page < start || *page > end)
            .collect();

        let mut slice = self.document.clone();
        if !to_delete.is_empty() {
            slice.delete_pages(&to_delete);
            slice.prune_objects();
        }
        slice.compress();

        let mut buffer = Vec::new();
        slice
            .save_to(&mut buffer)
            .map_err(|e| DocumentError::malformed(format!("Failed to write page range: {}", e)))?;

        Ok(buffer)
    }
}

impl fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfDocument")
            .field("page_count", &self.page_count())
            .finish()
    }
}
