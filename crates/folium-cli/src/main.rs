// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Folium — PDF→EPUB conversion fidelity auditor.
//
// Entry point. Initialises logging, parses the command line, and
// dispatches to the review pipeline.

mod batch;
mod cli;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use folium_core::{QaConfig, QaReport};
use folium_qa::{PageRenderer, QaEngine, report};

use cli::{Cli, Command};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Review { pdf, epub, output, summary, qa } => {
            review(&pdf, &epub, &output, summary, qa.to_config())
        }
        Command::BatchReview { inputs, output_dir, workers, no_recursive, qa } => {
            let manifest =
                batch::run(&qa.to_config(), &inputs, &output_dir, workers, !no_recursive)?;
            println!(
                "Reviewed {} documents: {} ok, {} failed. Manifest: {}",
                manifest.input_count,
                manifest.success_count,
                manifest.failed_count,
                output_dir.join("batch_report.json").display()
            );
            Ok(())
        }
        Command::Summary { report } => summary_from_file(&report),
    }
}

fn review(
    pdf_path: &Path,
    epub_path: &Path,
    output: &Path,
    print_summary: bool,
    config: QaConfig,
) -> Result<()> {
    let pdf = folium_document::extract_pdf(pdf_path)
        .with_context(|| format!("failed to extract {}", pdf_path.display()))?;
    let epub = folium_document::extract_epub(epub_path)
        .with_context(|| format!("failed to extract {}", epub_path.display()))?;

    let engine = QaEngine::new(config.clone())?;
    let renderer = renderer_for(&config, pdf_path);
    let qa_report = engine.review(&pdf, &epub, renderer.as_deref())?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    fs::write(output, serde_json::to_string_pretty(&qa_report)?)
        .with_context(|| format!("cannot write {}", output.display()))?;
    println!("Report written to {}", output.display());

    if print_summary {
        println!("{}", report::format_simplified(&report::simplify(&qa_report)));
    }
    Ok(())
}

fn summary_from_file(path: &Path) -> Result<()> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let qa_report: QaReport = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a Folium report", path.display()))?;
    println!("{}", report::format_simplified(&report::simplify(&qa_report)));
    Ok(())
}

/// Build the visual QA renderer for a document when one is both
/// requested and compiled in. Without the `render` feature the engine
/// receives no renderer and reports visual QA as disabled.
#[cfg(feature = "render")]
pub(crate) fn renderer_for(config: &QaConfig, pdf_path: &Path) -> Option<Box<dyn PageRenderer>> {
    if !config.visual_enabled {
        return None;
    }
    match folium_document::raster::PdfiumRenderer::new(pdf_path) {
        Ok(renderer) => Some(Box::new(renderer)),
        Err(err) => {
            tracing::warn!(error = %err, "visual QA renderer unavailable");
            None
        }
    }
}

#[cfg(not(feature = "render"))]
pub(crate) fn renderer_for(_config: &QaConfig, _pdf_path: &Path) -> Option<Box<dyn PageRenderer>> {
    None
}
