// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF extraction — per-page text, embedded image counts, and document
// metadata using the `lopdf` crate.

use std::path::Path;

use folium_core::error::{FoliumError, Result};
use folium_core::{PdfContent, PdfPage};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, info, instrument, warn};

/// Reads a source PDF and produces the extraction input the QA engine
/// consumes.
pub struct PdfExtractor {
    /// The underlying lopdf document.
    document: Document,
    /// Source path, if opened from a file (useful for diagnostics).
    source_path: Option<String>,
}

impl PdfExtractor {
    // -- Construction ---------------------------------------------------------

    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        info!("Opening PDF: {}", path_ref.display());

        let document = Document::load(path_ref).map_err(|err| {
            FoliumError::PdfError(format!("failed to open {}: {}", path_ref.display(), err))
        })?;

        debug!(pages = document.get_pages().len(), "PDF loaded");

        Ok(Self {
            document,
            source_path: Some(path_ref.display().to_string()),
        })
    }

    /// Create an extractor from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|err| {
            FoliumError::PdfError(format!("failed to load PDF from memory: {}", err))
        })?;
        Ok(Self { document, source_path: None })
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Return the source path if the extractor was created via [`PdfExtractor::open`].
    pub fn source_path(&self) -> Option<&str> {
        self.source_path.as_deref()
    }

    // -- Extraction -----------------------------------------------------------

    /// Extract every page's text and image count, plus document
    /// metadata.
    ///
    /// Text extraction failure on one page yields an empty-text page
    /// (the QA engine classifies it from there) rather than aborting
    /// the document.
    #[instrument(skip(self))]
    pub fn extract(&self) -> PdfContent {
        let page_map = self.document.get_pages();
        let mut pages = Vec::with_capacity(page_map.len());

        for (&page_number, &page_id) in &page_map {
            let text = match self.document.extract_text(&[page_number]) {
                Ok(text) => text,
                Err(err) => {
                    warn!(page = page_number, %err, "page text extraction failed");
                    String::new()
                }
            };
            let image_count = self.count_page_images(page_id);
            pages.push(PdfPage { page_number, text, image_count });
        }
        pages.sort_by_key(|p| p.page_number);

        let content = PdfContent {
            page_count: pages.len() as u32,
            pages,
            title: self.info_string(b"Title"),
            author: self.info_string(b"Author"),
            language: self.catalog_language(),
        };
        info!(
            pages = content.page_count,
            images = content.image_count(),
            "PDF extraction complete"
        );
        content
    }

    /// Count image XObjects reachable from a page's resources.
    fn count_page_images(&self, page_id: ObjectId) -> u32 {
        let (inline_resources, resource_ids) = match self.document.get_page_resources(page_id) {
            Ok(resources) => resources,
            Err(err) => {
                warn!(?page_id, %err, "page resources unreadable");
                return 0;
            }
        };

        let mut dicts: Vec<&Dictionary> = Vec::new();
        if let Some(dict) = inline_resources {
            dicts.push(dict);
        }
        for id in resource_ids {
            if let Ok(dict) = self.document.get_object(id).and_then(Object::as_dict) {
                dicts.push(dict);
            }
        }

        let mut count = 0;
        for resources in dicts {
            let Some(xobjects) = resources
                .get(b"XObject")
                .ok()
                .and_then(|obj| self.resolve_dict(obj))
            else {
                continue;
            };
            for (_name, entry) in xobjects.iter() {
                if self.is_image_xobject(entry) {
                    count += 1;
                }
            }
        }
        count
    }

    fn is_image_xobject(&self, entry: &Object) -> bool {
        let stream = match entry {
            Object::Reference(id) => match self.document.get_object(*id) {
                Ok(Object::Stream(stream)) => stream,
                _ => return false,
            },
            Object::Stream(stream) => stream,
            _ => return false,
        };
        matches!(
            stream.dict.get(b"Subtype").and_then(Object::as_name),
            Ok(b"Image")
        )
    }

    /// Follow one level of indirection to a dictionary.
    fn resolve_dict<'a>(&'a self, obj: &'a Object) -> Option<&'a Dictionary> {
        match obj {
            Object::Dictionary(dict) => Some(dict),
            Object::Reference(id) => self
                .document
                .get_object(*id)
                .ok()
                .and_then(|o| o.as_dict().ok()),
            _ => None,
        }
    }

    /// Read a string entry from the trailer Info dictionary.
    fn info_string(&self, key: &[u8]) -> Option<String> {
        let info = self.document.trailer.get(b"Info").ok()?;
        let dict = self.resolve_dict(info)?;
        let value = dict.get(key).ok()?;
        let bytes = match value {
            Object::String(bytes, _) => bytes.clone(),
            Object::Reference(id) => match self.document.get_object(*id).ok()? {
                Object::String(bytes, _) => bytes.clone(),
                _ => return None,
            },
            _ => return None,
        };
        let text = String::from_utf8_lossy(&bytes).trim().to_string();
        (!text.is_empty()).then_some(text)
    }

    /// Document language from the catalog's `/Lang` entry.
    fn catalog_language(&self) -> Option<String> {
        let catalog = self.document.catalog().ok()?;
        match catalog.get(b"Lang").ok()? {
            Object::String(bytes, _) => {
                let text = String::from_utf8_lossy(bytes).trim().to_string();
                (!text.is_empty()).then_some(text)
            }
            _ => None,
        }
    }
}

/// Convenience wrapper: open and extract in one call.
pub fn extract_pdf(path: impl AsRef<Path>) -> Result<PdfContent> {
    Ok(PdfExtractor::open(path)?.extract())
}

#[cfg(test)]
mod tests {
    use super::*;

    // A minimal single-page PDF with the text "Hello" and a Title entry,
    // assembled with lopdf so the fixture stays in sync with the parser.
    fn minimal_pdf_bytes() -> Vec<u8> {
        use lopdf::content::{Content, Operation};
        use lopdf::dictionary;
        use lopdf::{Object, Stream};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal("Hello")]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().unwrap(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal("Test Book"),
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn extracts_text_and_metadata_from_minimal_pdf() {
        let extractor = PdfExtractor::from_bytes(&minimal_pdf_bytes()).unwrap();
        assert_eq!(extractor.page_count(), 1);

        let content = extractor.extract();
        assert_eq!(content.page_count, 1);
        assert_eq!(content.pages[0].page_number, 1);
        assert!(content.pages[0].text.contains("Hello"));
        assert_eq!(content.pages[0].image_count, 0);
        assert_eq!(content.title.as_deref(), Some("Test Book"));
    }

    #[test]
    fn garbage_bytes_fail_to_open() {
        assert!(PdfExtractor::from_bytes(b"not a pdf at all").is_err());
    }
}
