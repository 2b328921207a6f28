// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Folium QA engine.
//
// Compares the text extracted from a source PDF against the content of
// the produced EPUB and renders a structured fidelity report. The
// pipeline: normalize both sides into token streams, align them with an
// order-preserving diff, resolve EPUB content back to PDF pages via
// `page-N` anchors, score coverage per page and for the whole document,
// optionally corroborate fixed-layout conversions with a pixel-level
// comparison, and assemble the technical and plain-language reports.
//
// The engine holds no shared mutable state and owns no files or
// sockets; a caller may run one engine per document concurrently.

pub mod align;
pub mod anchor;
pub mod engine;
pub mod normalize;
pub mod report;
pub mod score;
pub mod visual;

pub use engine::QaEngine;
pub use visual::PageRenderer;
