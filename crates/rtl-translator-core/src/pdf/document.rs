use std::path::Path;
use std::sync::Arc;

use mupdf::Document as MuDocument;

use crate::error::{Error, Result};

/// Input PDF held in memory; MuPDF handles are opened on demand.
pub struct PdfDocument {
    bytes: Arc<Vec<u8>>,
    page_count: usize,
}

impl PdfDocument {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();

        let doc = MuDocument::from_bytes(&bytes, "")
            .map_err(|e| Error::PdfOpen(format!("Failed to parse PDF: {e}")))?;

        let page_count = doc
            .page_count()
            .map_err(|e| Error::PdfOpen(format!("Failed to get page count: {e}")))?;

        Ok(Self {
            bytes: Arc::new(bytes),
            page_count: usize::try_from(page_count).unwrap_or(0),
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref()).map_err(|e| {
            Error::PdfOpen(format!(
                "Failed to read file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_bytes(bytes)
    }

    pub const fn page_count(&self) -> usize {
        self.page_count
    }

    /// The untouched input bytes, which the writer edits a copy of.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn open_document(&self) -> Result<MuDocument> {
        MuDocument::from_bytes(&self.bytes, "")
            .map_err(|e| Error::PdfOpen(format!("Failed to open document: {e}")))
    }
}

impl Clone for PdfDocument {
    fn clone(&self) -> Self {
        Self {
            bytes: Arc::clone(&self.bytes),
            page_count: self.page_count,
        }
    }
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("page_count", &self.page_count)
            .field("bytes_len", &self.bytes.len())
            .finish()
    }
}
