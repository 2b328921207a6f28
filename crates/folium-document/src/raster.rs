// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pdfium-backed page rasterization for visual QA.
//
// Pdfium document handles borrow from the library binding, so the
// renderer keeps the source path and reloads per call instead of
// holding a document open. Visual QA renders at most a handful of
// pages per document; reload cost is not the bottleneck there.

use std::path::{Path, PathBuf};

use folium_core::error::{FoliumError, Result};
use folium_qa::PageRenderer;
use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::{debug, instrument};

/// Renders source PDF pages through pdfium.
pub struct PdfiumRenderer {
    pdfium: Pdfium,
    path: PathBuf,
}

impl PdfiumRenderer {
    /// Bind pdfium (bundled library next to the executable, falling
    /// back to the system library) and remember the PDF to render.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let pdfium = Pdfium::new(
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library())
                .map_err(|err| {
                    FoliumError::RenderError(format!("failed to bind pdfium library: {err}"))
                })?,
        );
        Ok(Self { pdfium, path: path.as_ref().to_path_buf() })
    }
}

impl PageRenderer for PdfiumRenderer {
    fn render_page(&self, page_number: u32, dpi: u32) -> Result<DynamicImage> {
        let document = self.pdfium.load_pdf_from_file(&self.path, None).map_err(|err| {
            FoliumError::RenderError(format!(
                "failed to load {}: {}",
                self.path.display(),
                err
            ))
        })?;

        if page_number == 0 {
            return Err(FoliumError::RenderError("page numbers start at 1".into()));
        }
        let index = u16::try_from(page_number - 1).map_err(|_| {
            FoliumError::RenderError(format!("page {page_number} out of pdfium index range"))
        })?;
        let page = document.pages().get(index).map_err(|err| {
            FoliumError::RenderError(format!("page {page_number} not found: {err}"))
        })?;

        // PDF user space is 72 points per inch.
        let scale = dpi as f32 / 72.0;
        let pixel_width = (page.width().value * scale) as i32;
        let pixel_height = (page.height().value * scale) as i32;
        debug!(page = page_number, dpi, pixel_width, pixel_height, "rendering page");

        let bitmap = page
            .render_with_config(
                &PdfRenderConfig::new()
                    .set_target_width(pixel_width)
                    .set_target_height(pixel_height),
            )
            .map_err(|err| {
                FoliumError::RenderError(format!("failed to render page {page_number}: {err}"))
            })?;
        Ok(bitmap.as_image())
    }
}
