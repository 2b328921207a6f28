// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Visual QA — pixel-level corroboration for fixed-layout conversions.
//
// Each compared page is rendered from the PDF, converted to grayscale
// alongside the EPUB's page image, and scored by mean absolute pixel
// difference (1.0 = identical). Grayscale plus the mean keeps the score
// insensitive to minor anti-aliasing differences. Reflow EPUBs have no
// 1:1 page correspondence, so their comparator is a sentinel that never
// touches the renderer.

use std::collections::BTreeMap;

use folium_core::error::Result;
use folium_core::{LayoutMode, QaConfig, VisualComparison, VisualQa};
use image::DynamicImage;
use image::imageops::FilterType;
use tracing::{debug, instrument, warn};

/// Renders one PDF page to an in-memory image.
///
/// The engine owns no rendering backend; callers inject one (the
/// `folium-document` crate ships a pdfium-backed implementation behind
/// the `render` feature).
pub trait PageRenderer {
    /// Render the 1-based `page_number` at `dpi`.
    fn render_page(&self, page_number: u32, dpi: u32) -> Result<DynamicImage>;
}

/// Run the visual QA stage for one document.
#[instrument(skip_all, fields(layout = %layout, pages = page_images.len()))]
pub fn run(
    config: &QaConfig,
    layout: LayoutMode,
    pdf_page_count: u32,
    page_images: &BTreeMap<u32, Vec<u8>>,
    renderer: Option<&dyn PageRenderer>,
    warnings: &mut Vec<String>,
) -> VisualQa {
    if !config.visual_enabled {
        return VisualQa::Disabled;
    }
    comparator_for(layout).compare(config, pdf_page_count, page_images, renderer, warnings)
}

/// Per-layout comparison strategy. A new layout mode gets a new
/// implementation here; call sites stay untouched.
trait LayoutComparator {
    fn compare(
        &self,
        config: &QaConfig,
        pdf_page_count: u32,
        page_images: &BTreeMap<u32, Vec<u8>>,
        renderer: Option<&dyn PageRenderer>,
        warnings: &mut Vec<String>,
    ) -> VisualQa;
}

fn comparator_for(layout: LayoutMode) -> &'static dyn LayoutComparator {
    match layout {
        LayoutMode::Fixed => &FixedLayout,
        LayoutMode::Reflow => &ReflowLayout,
    }
}

struct FixedLayout;

impl LayoutComparator for FixedLayout {
    fn compare(
        &self,
        config: &QaConfig,
        pdf_page_count: u32,
        page_images: &BTreeMap<u32, Vec<u8>>,
        renderer: Option<&dyn PageRenderer>,
        warnings: &mut Vec<String>,
    ) -> VisualQa {
        let Some(renderer) = renderer else {
            warnings.push(
                "visual QA enabled but no page renderer was provided; skipping".into(),
            );
            return VisualQa::Disabled;
        };
        if page_images.is_empty() {
            return VisualQa::UnsupportedLayout;
        }

        let mut pages = Vec::new();
        for (&page_number, encoded) in page_images {
            if page_number == 0 || page_number > pdf_page_count {
                warnings.push(format!(
                    "fixed-layout image for page {page_number} outside PDF page range"
                ));
                continue;
            }
            // Pages beyond the cap are omitted, not failed.
            if pages.len() as u32 >= config.visual_max_pages {
                break;
            }
            pages.push(compare_page(renderer, page_number, encoded, config));
        }

        if pages.is_empty() {
            return VisualQa::NoPages;
        }

        let mean_score: f64 =
            pages.iter().map(|p| p.similarity_score).sum::<f64>() / pages.len() as f64;
        VisualQa::Compared {
            threshold: config.visual_threshold,
            compared_pages: pages.len(),
            coverage_visual_percent: (mean_score * 10_000.0).round() / 100.0,
            pages,
        }
    }
}

struct ReflowLayout;

impl LayoutComparator for ReflowLayout {
    fn compare(
        &self,
        _config: &QaConfig,
        _pdf_page_count: u32,
        _page_images: &BTreeMap<u32, Vec<u8>>,
        _renderer: Option<&dyn PageRenderer>,
        _warnings: &mut Vec<String>,
    ) -> VisualQa {
        VisualQa::UnsupportedLayout
    }
}

/// Compare one page. Render or decode failure is isolated: it records a
/// failed comparison for this page and the remaining pages still run.
fn compare_page(
    renderer: &dyn PageRenderer,
    page_number: u32,
    encoded_epub_image: &[u8],
    config: &QaConfig,
) -> VisualComparison {
    let rendered = match renderer.render_page(page_number, config.visual_dpi) {
        Ok(img) => img,
        Err(err) => {
            warn!(page = page_number, %err, "PDF page render failed");
            return failed_comparison(page_number);
        }
    };
    let epub_image = match image::load_from_memory(encoded_epub_image) {
        Ok(img) => img,
        Err(err) => {
            warn!(page = page_number, %err, "EPUB page image decode failed");
            return failed_comparison(page_number);
        }
    };

    let (score, mean_error) = similarity(&rendered, &epub_image);
    debug!(page = page_number, score, "page compared");
    VisualComparison {
        page_number,
        similarity_score: (score * 1_000_000.0).round() / 1_000_000.0,
        passed: score >= config.visual_threshold,
        mean_error: (mean_error * 10_000.0).round() / 10_000.0,
    }
}

fn failed_comparison(page_number: u32) -> VisualComparison {
    VisualComparison {
        page_number,
        similarity_score: 0.0,
        passed: false,
        mean_error: 255.0,
    }
}

/// Mean absolute grayscale difference, mapped to a [0, 1] score.
///
/// The EPUB image is resampled to the rendered page's dimensions first
/// (Lanczos3), since export pipelines rarely agree on exact pixel size.
fn similarity(pdf_image: &DynamicImage, epub_image: &DynamicImage) -> (f64, f64) {
    let pdf = pdf_image.to_luma8();
    if pdf.width() == 0 || pdf.height() == 0 {
        return (0.0, 255.0);
    }
    let mut epub = epub_image.to_luma8();
    if epub.dimensions() != pdf.dimensions() {
        epub = image::imageops::resize(&epub, pdf.width(), pdf.height(), FilterType::Lanczos3);
    }

    let total: u64 = pdf
        .pixels()
        .zip(epub.pixels())
        .map(|(p, q)| u64::from(p[0].abs_diff(q[0])))
        .sum();
    let mean_error = total as f64 / f64::from(pdf.width() * pdf.height());
    ((1.0 - mean_error / 255.0).max(0.0), mean_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use folium_core::error::FoliumError;
    use image::{GrayImage, ImageFormat, Luma};
    use std::cell::Cell;
    use std::io::Cursor;

    /// Renderer returning a uniform gray page and counting calls.
    struct FlatRenderer {
        level: u8,
        calls: Cell<u32>,
        fail_on: Option<u32>,
    }

    impl FlatRenderer {
        fn new(level: u8) -> Self {
            Self { level, calls: Cell::new(0), fail_on: None }
        }
    }

    impl PageRenderer for FlatRenderer {
        fn render_page(&self, page_number: u32, _dpi: u32) -> Result<DynamicImage> {
            self.calls.set(self.calls.get() + 1);
            if self.fail_on == Some(page_number) {
                return Err(FoliumError::RenderError(format!("page {page_number}")));
            }
            Ok(DynamicImage::ImageLuma8(GrayImage::from_pixel(
                64,
                64,
                Luma([self.level]),
            )))
        }
    }

    fn png_of_level(level: u8) -> Vec<u8> {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(64, 64, Luma([level])));
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    fn enabled_config() -> QaConfig {
        QaConfig { visual_enabled: true, ..QaConfig::default() }
    }

    #[test]
    fn disabled_config_short_circuits() {
        let mut warnings = Vec::new();
        let result = run(
            &QaConfig::default(),
            LayoutMode::Fixed,
            3,
            &BTreeMap::new(),
            None,
            &mut warnings,
        );
        assert!(matches!(result, VisualQa::Disabled));
    }

    #[test]
    fn reflow_returns_sentinel_without_rendering() {
        let renderer = FlatRenderer::new(128);
        let mut images = BTreeMap::new();
        images.insert(1, png_of_level(128));
        let mut warnings = Vec::new();
        let result = run(
            &enabled_config(),
            LayoutMode::Reflow,
            3,
            &images,
            Some(&renderer),
            &mut warnings,
        );
        assert!(matches!(result, VisualQa::UnsupportedLayout));
        assert_eq!(renderer.calls.get(), 0, "reflow must never rasterize");
    }

    #[test]
    fn identical_pages_score_one_and_pass() {
        let renderer = FlatRenderer::new(128);
        let mut images = BTreeMap::new();
        images.insert(1, png_of_level(128));
        let mut warnings = Vec::new();
        let result = run(
            &enabled_config(),
            LayoutMode::Fixed,
            1,
            &images,
            Some(&renderer),
            &mut warnings,
        );
        let VisualQa::Compared { compared_pages, coverage_visual_percent, pages, .. } = result
        else {
            panic!("expected compared result");
        };
        assert_eq!(compared_pages, 1);
        assert_eq!(pages[0].similarity_score, 1.0);
        assert!(pages[0].passed);
        assert_eq!(coverage_visual_percent, 100.0);
    }

    #[test]
    fn score_near_threshold_splits_pass_and_fail() {
        // Mean error 2 → score ≈ 0.9922 (above the 0.985 threshold);
        // mean error 26 → score ≈ 0.898 (below).
        for (delta, expect_pass) in [(2u8, true), (26u8, false)] {
            let renderer = FlatRenderer::new(128);
            let mut images = BTreeMap::new();
            images.insert(1, png_of_level(128 + delta));
            let mut warnings = Vec::new();
            let result = run(
                &enabled_config(),
                LayoutMode::Fixed,
                1,
                &images,
                Some(&renderer),
                &mut warnings,
            );
            let VisualQa::Compared { pages, .. } = result else {
                panic!("expected compared result");
            };
            assert_eq!(pages[0].passed, expect_pass, "delta {delta}");
        }
    }

    #[test]
    fn render_failure_is_isolated_to_its_page() {
        let mut renderer = FlatRenderer::new(128);
        renderer.fail_on = Some(1);
        let mut images = BTreeMap::new();
        images.insert(1, png_of_level(128));
        images.insert(2, png_of_level(128));
        let mut warnings = Vec::new();
        let result = run(
            &enabled_config(),
            LayoutMode::Fixed,
            2,
            &images,
            Some(&renderer),
            &mut warnings,
        );
        let VisualQa::Compared { pages, .. } = result else {
            panic!("expected compared result");
        };
        assert_eq!(pages.len(), 2);
        assert!(!pages[0].passed);
        assert_eq!(pages[0].similarity_score, 0.0);
        assert!(pages[1].passed, "page 2 must still be compared");
    }

    #[test]
    fn page_cap_omits_pages_beyond_limit() {
        let renderer = FlatRenderer::new(128);
        let mut images = BTreeMap::new();
        for page in 1..=5 {
            images.insert(page, png_of_level(128));
        }
        let config = QaConfig { visual_max_pages: 2, ..enabled_config() };
        let mut warnings = Vec::new();
        let result = run(&config, LayoutMode::Fixed, 5, &images, Some(&renderer), &mut warnings);
        let VisualQa::Compared { compared_pages, pages, .. } = result else {
            panic!("expected compared result");
        };
        assert_eq!(compared_pages, 2);
        assert!(pages.iter().all(|p| p.passed), "omitted pages are not failures");
    }

    #[test]
    fn out_of_range_page_image_is_skipped_with_warning() {
        let renderer = FlatRenderer::new(128);
        let mut images = BTreeMap::new();
        images.insert(9, png_of_level(128));
        let mut warnings = Vec::new();
        let result = run(
            &enabled_config(),
            LayoutMode::Fixed,
            2,
            &images,
            Some(&renderer),
            &mut warnings,
        );
        assert!(matches!(result, VisualQa::NoPages));
        assert_eq!(warnings.len(), 1);
    }
}
