use crate::error::ExtractionError;
use crate::models::{ExtractedDocument, PdfUpload};
use lopdf::Document;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// How extracted documents are laid out before chunking.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DocumentBoundary {
    /// Join every document's text with no marker, so a chunk may span two documents.
    #[default]
    Concatenate,
    /// Chunk every document on its own; chunks carry their document name.
    Isolate,
}

pub trait PdfExtractor {
    /// Returns every page in document order, including pages with no text.
    fn extract_pages(&self, name: &str, bytes: &[u8]) -> Result<Vec<PageText>, ExtractionError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, name: &str, bytes: &[u8]) -> Result<Vec<PageText>, ExtractionError> {
        let document = Document::load_mem(bytes).map_err(|error| ExtractionError::PdfParse {
            document: name.to_string(),
            details: error.to_string(),
        })?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| ExtractionError::PdfParse {
                    document: name.to_string(),
                    details: format!("page {page_no}: {error}"),
                })?;

            pages.push(PageText {
                number: page_no,
                text,
            });
        }

        Ok(pages)
    }
}

#[derive(Debug, Clone)]
pub struct SkippedDocument {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    pub documents: Vec<ExtractedDocument>,
    pub skipped: Vec<SkippedDocument>,
}

impl ExtractionReport {
    /// All document texts joined back to back, with no boundary marker.
    pub fn concatenated_text(&self) -> String {
        self.documents
            .iter()
            .map(|document| document.text.as_str())
            .collect()
    }
}

/// Extracts text from a batch of uploads.
///
/// A document that fails to parse is reported in `skipped` and the batch
/// carries on; the batch only fails when no document produced any text.
pub fn extract_documents<X>(
    extractor: &X,
    uploads: &[PdfUpload],
) -> Result<ExtractionReport, ExtractionError>
where
    X: PdfExtractor + ?Sized,
{
    let mut report = ExtractionReport::default();

    for upload in uploads {
        let pages = match extractor.extract_pages(&upload.name, &upload.bytes) {
            Ok(pages) => pages,
            Err(error) => {
                warn!(document = %upload.name, reason = %error, "skipped pdf");
                report.skipped.push(SkippedDocument {
                    name: upload.name.clone(),
                    reason: error.to_string(),
                });
                continue;
            }
        };

        let total = pages.len();
        let mut text = String::new();
        let mut pages_read = 0;
        for page in pages {
            if page.text.trim().is_empty() {
                debug!(document = %upload.name, page = page.number, "page has no text");
                continue;
            }
            text.push_str(&page.text);
            pages_read += 1;
        }

        if pages_read == 0 {
            warn!(document = %upload.name, "pdf had no readable page text");
            report.skipped.push(SkippedDocument {
                name: upload.name.clone(),
                reason: "pdf had no readable page text".to_string(),
            });
            continue;
        }

        report.documents.push(ExtractedDocument {
            name: upload.name.clone(),
            text,
            pages_read,
            pages_skipped: total - pages_read,
        });
    }

    if report.documents.is_empty() {
        return Err(ExtractionError::NoText);
    }

    Ok(report)
}
