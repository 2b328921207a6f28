// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Coverage scoring.
//
// Document-level coverage comes from the single global alignment, not a
// sum of per-page ratios — reflow can legitimately move content across
// page boundaries, and only the global alignment credits it. Per-page
// ratios are computed independently, each page against its resolved
// anchor blob.

use std::collections::BTreeMap;

use folium_core::{NormalizeOptions, PageIssue, PageStatus, PdfPage};
use tracing::debug;

use crate::align;
use crate::normalize::tokenize;

/// Whole-document text coverage as a percentage of PDF tokens.
pub fn document_coverage_percent(matched_tokens: usize, pdf_token_count: usize) -> f64 {
    (matched_tokens as f64 / pdf_token_count.max(1) as f64) * 100.0
}

/// Classify every PDF page.
///
/// Status priority is fixed and order-sensitive:
/// 1. nothing extractable to preserve (no text, no images) → `no_text`;
/// 2. the page has text but no anchor blob → `missing_page`;
/// 3. per-page coverage below `threshold` → `low_coverage`;
/// 4. otherwise `ok`.
///
/// A page with no text must never surface as `missing_page` or
/// `low_coverage` — there is nothing the conversion could have lost.
pub fn score_pages(
    pages: &[PdfPage],
    resolved: &BTreeMap<u32, String>,
    opts: &NormalizeOptions,
    threshold: f64,
) -> Vec<PageIssue> {
    let mut issues = Vec::with_capacity(pages.len());
    for page in pages {
        let pdf_tokens = tokenize(&page.text, opts);

        if pdf_tokens.is_empty() && page.image_count == 0 {
            issues.push(PageIssue {
                page_number: page.page_number,
                status: PageStatus::NoText,
                coverage_ratio: 0.0,
                notes: "Pagina sem texto selecionavel.".into(),
            });
            continue;
        }

        if pdf_tokens.is_empty() {
            // Image-only page: no text to compare, so textual coverage
            // is vacuously complete. Image preservation is checked at
            // document level.
            issues.push(PageIssue {
                page_number: page.page_number,
                status: PageStatus::Ok,
                coverage_ratio: 1.0,
                notes: String::new(),
            });
            continue;
        }

        let blob = resolved.get(&page.page_number).map(String::as_str).unwrap_or("");
        let blob_tokens = tokenize(blob, opts);
        if blob_tokens.is_empty() {
            issues.push(PageIssue {
                page_number: page.page_number,
                status: PageStatus::MissingPage,
                coverage_ratio: 0.0,
                notes: "Nao encontrou ancora correspondente no EPUB.".into(),
            });
            continue;
        }

        let alignment = align::align(&pdf_tokens, &blob_tokens);
        let ratio = alignment.matched_tokens as f64 / pdf_tokens.len() as f64;
        let status = if ratio >= threshold { PageStatus::Ok } else { PageStatus::LowCoverage };
        debug!(page = page.page_number, ratio, "page scored");
        issues.push(PageIssue {
            page_number: page.page_number,
            status,
            coverage_ratio: (ratio * 10_000.0).round() / 10_000.0,
            notes: if status == PageStatus::Ok {
                String::new()
            } else {
                "Baixa cobertura por pagina.".into()
            },
        });
    }
    issues
}
