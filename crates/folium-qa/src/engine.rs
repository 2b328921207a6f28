// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The QA engine pipeline.
//
// One engine instance per configuration; `review` runs synchronously on
// the caller's thread and touches no shared state, so independent
// documents may be reviewed concurrently with one engine each.

use folium_core::error::Result;
use folium_core::{EpubContent, NormalizeOptions, PdfContent, PdfPage, QaConfig, QaReport, SimplifiedReport};
use tracing::{info, instrument};

use crate::report::PageTokenRanges;
use crate::visual::PageRenderer;
use crate::{align, anchor, normalize, report, score, visual};

/// Compares extracted PDF content against extracted EPUB content and
/// produces the fidelity report.
pub struct QaEngine {
    config: QaConfig,
}

impl QaEngine {
    /// Build an engine from an explicit configuration. The engine never
    /// consults environment variables or other ambient state.
    pub fn new(config: QaConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &QaConfig {
        &self.config
    }

    /// Run the full QA pipeline for one document pair.
    ///
    /// `renderer` supplies PDF page rasterization for visual QA; pass
    /// `None` when visual QA is disabled or no backend is available.
    /// Input malformation (page-count mismatch, stray anchors) degrades
    /// to report warnings; only a breached internal contract aborts.
    #[instrument(skip_all, fields(pdf_pages = pdf.pages.len(), layout = %epub.layout))]
    pub fn review(
        &self,
        pdf: &PdfContent,
        epub: &EpubContent,
        renderer: Option<&dyn PageRenderer>,
    ) -> Result<QaReport> {
        let mut warnings = Vec::new();
        if pdf.page_count as usize != pdf.pages.len() {
            warnings.push(format!(
                "PDF reports {} pages but extraction produced {}",
                pdf.page_count,
                pdf.pages.len()
            ));
        }

        let (pdf_tokens, page_ranges) =
            page_token_stream(&pdf.pages, &self.config.normalize);
        let epub_tokens = normalize::tokenize(&epub.full_text, &self.config.normalize);

        let alignment = align::align(&pdf_tokens, &epub_tokens);
        let coverage =
            score::document_coverage_percent(alignment.matched_tokens, pdf_tokens.len());

        let resolved = anchor::resolve(&epub.blocks, pdf.page_count, &mut warnings);
        anchor::verify_key_set(&resolved, pdf.page_count)?;

        let issues = score::score_pages(
            &pdf.pages,
            &resolved,
            &self.config.normalize,
            self.config.page_coverage_threshold,
        );
        let (missing_segments, extra_segments) =
            report::build_segments(&alignment, &pdf_tokens, &epub_tokens, &page_ranges);

        let visual_qa = visual::run(
            &self.config,
            epub.layout,
            pdf.page_count,
            &epub.page_images,
            renderer,
            &mut warnings,
        );

        info!(
            coverage,
            missing = missing_segments.len(),
            extra = extra_segments.len(),
            "QA review complete"
        );

        Ok(report::assemble(
            coverage,
            missing_segments,
            extra_segments,
            pdf.image_count(),
            epub.image_count,
            issues,
            visual_qa,
            warnings,
        ))
    }

    /// Derive the plain-language summary for a report produced by
    /// `review` (or loaded back from persisted JSON).
    pub fn simplify(&self, report: &QaReport) -> SimplifiedReport {
        report::simplify(report)
    }
}

/// Concatenate all pages into one token stream, remembering which token
/// range each page occupies so missing segments can name their page.
fn page_token_stream(
    pages: &[PdfPage],
    opts: &NormalizeOptions,
) -> (Vec<String>, PageTokenRanges) {
    let mut all_tokens = Vec::new();
    let mut ranges = Vec::with_capacity(pages.len());
    for page in pages {
        let tokens = normalize::tokenize(&page.text, opts);
        let start = all_tokens.len();
        all_tokens.extend(tokens);
        ranges.push((page.page_number, start, all_tokens.len()));
    }
    (all_tokens, ranges)
}
