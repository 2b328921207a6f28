// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Folium — Document extraction collaborators.
//
// These modules feed the QA engine: `pdf` extracts per-page text and
// image counts from the source PDF, `epub` recovers anchored blocks and
// page images from the produced EPUB, and `raster` (behind the `render`
// feature) supplies a pdfium-backed page renderer for visual QA.

pub mod epub;
pub mod pdf;

#[cfg(feature = "render")]
pub mod raster;

pub use epub::extract_epub;
pub use pdf::extract_pdf;
