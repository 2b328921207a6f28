// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Folium QA engine.
//
// The report structures here are the wire format: external callers
// persist them as JSON, so field names are part of the contract and
// must not drift.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One page of the source PDF, as produced by extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfPage {
    /// 1-based page number, unique and ordered.
    pub page_number: u32,
    /// Raw extracted text. Empty for image-only or blank pages.
    pub text: String,
    /// Number of embedded images on the page.
    pub image_count: u32,
}

/// Full extraction output for a PDF document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfContent {
    pub pages: Vec<PdfPage>,
    /// Total page count. Always equals `pages.len()`, carried explicitly
    /// because the anchor resolver's contract is stated in terms of it.
    pub page_count: u32,
    pub title: Option<String>,
    pub author: Option<String>,
    pub language: Option<String>,
}

impl PdfContent {
    /// Sum of per-page image counts.
    pub fn image_count(&self) -> u32 {
        self.pages.iter().map(|p| p.image_count).sum()
    }
}

/// A run of EPUB content claiming correspondence to one PDF page via a
/// `page-N` anchor. Several blocks may claim the same page when layout
/// splits content across spine items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchoredBlock {
    /// The PDF page this block claims to come from.
    pub page_number: u32,
    /// HTML-stripped text belonging to the anchor.
    pub text: String,
    /// Position in document flow, across all spine items.
    pub order_index: usize,
}

/// EPUB rendering mode. Closed set: adding a mode means adding a
/// variant and a comparator strategy, not editing call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutMode {
    /// Each source page maps to one fixed-size rendered page image.
    Fixed,
    /// Content flows freely without fixed page boundaries.
    Reflow,
}

impl std::fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed => write!(f, "fixed"),
            Self::Reflow => write!(f, "reflow"),
        }
    }
}

/// Extraction output for the produced EPUB.
#[derive(Debug, Clone)]
pub struct EpubContent {
    /// Anchored blocks in document-flow order.
    pub blocks: Vec<AnchoredBlock>,
    /// Whole-document text, including content outside any anchor.
    pub full_text: String,
    /// Image count, excluding fixed-layout page render assets.
    pub image_count: u32,
    /// For fixed-layout EPUBs: encoded page images keyed by PDF page
    /// number. Empty for reflow.
    pub page_images: BTreeMap<u32, Vec<u8>>,
    pub layout: LayoutMode,
}

/// Per-page classification, highest priority first: a page with no
/// extractable text is `no_text` even when its resolved blob is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Ok,
    LowCoverage,
    MissingPage,
    NoText,
}

/// One entry in the technical report's `issues` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageIssue {
    pub page_number: u32,
    pub status: PageStatus,
    /// Matched tokens / PDF-page tokens for this page alone.
    pub coverage_ratio: f64,
    /// Short human-readable note; empty for `ok` pages.
    pub notes: String,
}

/// A contiguous run of tokens classified as missing or extra, with a
/// few tokens of surrounding context so a reviewer can locate it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub snippet: String,
    pub context_before: String,
    pub context_after: String,
    /// Originating PDF page, when attributable (missing segments only).
    pub page: Option<u32>,
    pub token_count: usize,
}

/// Result of comparing one rendered PDF page against its EPUB page image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualComparison {
    pub page_number: u32,
    /// Similarity in [0, 1]; 1.0 is pixel-identical after grayscale.
    pub similarity_score: f64,
    pub passed: bool,
    /// Mean absolute grayscale difference (0-255 scale), for diagnostics.
    pub mean_error: f64,
}

/// Outcome of the visual QA stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VisualQa {
    /// Visual QA was not enabled for this run.
    Disabled,
    /// Reflow EPUBs have no 1:1 page correspondence; comparison is not
    /// meaningful and no rasterization is attempted.
    UnsupportedLayout,
    /// No page fell inside the configured comparison window.
    NoPages,
    Compared {
        threshold: f64,
        compared_pages: usize,
        /// Mean similarity across compared pages, as a percentage.
        coverage_visual_percent: f64,
        pages: Vec<VisualComparison>,
    },
}

impl VisualQa {
    /// True when every compared page passed. Sentinel states are not
    /// failures.
    pub fn all_passed(&self) -> bool {
        match self {
            Self::Compared { pages, .. } => pages.iter().all(|p| p.passed),
            _ => true,
        }
    }

    pub fn failed_pages(&self) -> Vec<u32> {
        match self {
            Self::Compared { pages, .. } => pages
                .iter()
                .filter(|p| !p.passed)
                .map(|p| p.page_number)
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// The technical fidelity report. Immutable once assembled; persistence
/// is the caller's responsibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaReport {
    /// Matched tokens / PDF tokens over the whole document, 0-100.
    pub coverage_text_percent: f64,
    pub missing_segments: Vec<Segment>,
    pub extra_segments: Vec<Segment>,
    pub image_count_pdf: u32,
    pub image_count_epub: u32,
    pub issues: Vec<PageIssue>,
    pub visual_qa: VisualQa,
    /// Input-malformation warnings (e.g. anchors pointing outside the
    /// PDF page range). A partial report is still produced.
    pub warnings: Vec<String>,
}

/// Overall verdict in the plain-language summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverallStatus {
    #[serde(rename = "excelente")]
    Excellent,
    #[serde(rename = "bom")]
    Good,
    #[serde(rename = "revisar")]
    NeedsReview,
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Excellent => write!(f, "excelente"),
            Self::Good => write!(f, "bom"),
            Self::NeedsReview => write!(f, "revisar"),
        }
    }
}

/// Counts and examples of textual differences, for the summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextDifferences {
    pub trechos_faltando: usize,
    pub trechos_extras: usize,
    pub exemplos_faltando: Vec<String>,
    pub exemplos_extras: Vec<String>,
}

/// Plain-language view of a `QaReport`. A pure function of the
/// technical report with no independent state; never exposes raw error
/// detail, only categorized attention signals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimplifiedReport {
    pub status_geral: OverallStatus,
    pub mensagem: String,
    pub texto_preservado_percent: f64,
    pub imagens_preservadas: bool,
    pub imagens_pdf: u32,
    pub imagens_epub: u32,
    pub paginas_total: usize,
    pub paginas_com_alerta: usize,
    pub paginas_sem_texto: Vec<u32>,
    pub paginas_baixa_cobertura: Vec<u32>,
    pub paginas_sem_ancora: Vec<u32>,
    pub visual_qa_status: String,
    pub visual_qa_percent: Option<f64>,
    pub diferencas_texto: TextDifferences,
    pub explicacao_simples: Vec<String>,
    pub sinais_de_atencao: Vec<String>,
    pub recomendacoes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The JSON field names are a contract with external consumers;
    /// catch accidental renames.
    #[test]
    fn report_serializes_with_contract_field_names() {
        let report = QaReport {
            coverage_text_percent: 99.5,
            missing_segments: vec![],
            extra_segments: vec![],
            image_count_pdf: 2,
            image_count_epub: 2,
            issues: vec![PageIssue {
                page_number: 1,
                status: PageStatus::Ok,
                coverage_ratio: 1.0,
                notes: String::new(),
            }],
            visual_qa: VisualQa::UnsupportedLayout,
            warnings: vec![],
        };
        let json = serde_json::to_value(&report).unwrap();
        for key in [
            "coverage_text_percent",
            "missing_segments",
            "extra_segments",
            "image_count_pdf",
            "image_count_epub",
            "issues",
            "visual_qa",
            "warnings",
        ] {
            assert!(json.get(key).is_some(), "missing field {key}");
        }
        assert_eq!(json["issues"][0]["status"], "ok");
        assert_eq!(json["visual_qa"]["status"], "unsupported_layout");
    }

    #[test]
    fn page_status_uses_snake_case_wire_names() {
        assert_eq!(
            serde_json::to_string(&PageStatus::LowCoverage).unwrap(),
            "\"low_coverage\""
        );
        assert_eq!(
            serde_json::to_string(&PageStatus::MissingPage).unwrap(),
            "\"missing_page\""
        );
        assert_eq!(
            serde_json::to_string(&PageStatus::NoText).unwrap(),
            "\"no_text\""
        );
    }

    #[test]
    fn overall_status_serializes_in_portuguese() {
        assert_eq!(
            serde_json::to_string(&OverallStatus::NeedsReview).unwrap(),
            "\"revisar\""
        );
    }

    #[test]
    fn visual_qa_all_passed_treats_sentinels_as_success() {
        assert!(VisualQa::Disabled.all_passed());
        assert!(VisualQa::UnsupportedLayout.all_passed());
        let compared = VisualQa::Compared {
            threshold: 0.985,
            compared_pages: 1,
            coverage_visual_percent: 90.0,
            pages: vec![VisualComparison {
                page_number: 1,
                similarity_score: 0.9,
                passed: false,
                mean_error: 25.5,
            }],
        };
        assert!(!compared.all_passed());
        assert_eq!(compared.failed_pages(), vec![1]);
    }
}
