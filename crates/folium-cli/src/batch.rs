// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch review: discover PDFs, pair each with its sibling EPUB, review
// the pairs across a rayon pool, and write per-document reports plus a
// manifest summarising the run. One document failing never aborts the
// batch; it lands in the manifest as a failed item.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use folium_core::QaConfig;
use folium_qa::QaEngine;
use folium_qa::report;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, instrument, warn};

#[derive(Debug, Serialize)]
pub struct BatchItemResult {
    pub input_pdf: String,
    pub input_epub: String,
    pub report_file: Option<String>,
    pub status: String,
    pub error: Option<String>,
    pub coverage_text_percent: Option<f64>,
    pub status_geral: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchManifest {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub workers: usize,
    pub output_dir: String,
    pub input_count: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub failed_pdfs: Vec<String>,
    pub results: Vec<BatchItemResult>,
}

/// Walk the given files and directories and return every PDF found,
/// deduplicated and sorted case-insensitively.
pub fn discover_pdf_inputs(paths: &[PathBuf], recursive: bool) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            if is_pdf(path) {
                files.push(path.clone());
            }
            continue;
        }
        if path.is_dir() {
            walk_dir(path, recursive, &mut files);
        }
    }
    files.sort_by_key(|p| p.to_string_lossy().to_lowercase());
    files.dedup();
    files
}

fn walk_dir(dir: &Path, recursive: bool, files: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        warn!(dir = %dir.display(), "cannot read directory, skipping");
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if recursive {
                walk_dir(&path, recursive, files);
            }
        } else if is_pdf(&path) {
            files.push(path);
        }
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// The EPUB a PDF is paired with: same directory, same stem.
pub fn sibling_epub(pdf: &Path) -> PathBuf {
    pdf.with_extension("epub")
}

/// Report file names, one per input, deduplicated case-insensitively so
/// `Book.pdf` and `book.pdf` from different directories do not clobber
/// each other's reports.
pub fn report_names(files: &[PathBuf]) -> Vec<String> {
    let mut used: Vec<String> = Vec::new();
    let mut names = Vec::with_capacity(files.len());
    for file in files {
        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "document".to_string());
        let mut name = format!("{stem}.report.json");
        let mut counter = 1;
        while used.iter().any(|u| u.eq_ignore_ascii_case(&name)) {
            name = format!("{stem}-{counter}.report.json");
            counter += 1;
        }
        used.push(name.clone());
        names.push(name);
    }
    names
}

/// Run the whole batch and write the manifest to
/// `<output_dir>/batch_report.json`.
#[instrument(skip_all, fields(inputs = inputs.len()))]
pub fn run(
    config: &QaConfig,
    inputs: &[PathBuf],
    output_dir: &Path,
    workers: Option<usize>,
    recursive: bool,
) -> Result<BatchManifest> {
    let files = discover_pdf_inputs(inputs, recursive);
    if files.is_empty() {
        bail!("no PDF files found in the given inputs");
    }
    fs::create_dir_all(output_dir)
        .with_context(|| format!("cannot create output directory {}", output_dir.display()))?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.unwrap_or(0))
        .build()
        .context("failed to build worker pool")?;
    let names = report_names(&files);

    let started_at = Utc::now();
    let mut results: Vec<BatchItemResult> = pool.install(|| {
        files
            .par_iter()
            .zip(names.par_iter())
            .map(|(pdf, name)| review_one(config, pdf, &output_dir.join(name)))
            .collect()
    });
    let finished_at = Utc::now();

    results.sort_by_key(|item| item.input_pdf.to_lowercase());
    let failed_pdfs: Vec<String> = results
        .iter()
        .filter(|item| item.status == "error")
        .map(|item| item.input_pdf.clone())
        .collect();
    let success_count = results.len() - failed_pdfs.len();

    let manifest = BatchManifest {
        started_at,
        finished_at,
        duration_seconds: (finished_at - started_at).num_milliseconds() as f64 / 1000.0,
        workers: pool.current_num_threads(),
        output_dir: output_dir.display().to_string(),
        input_count: files.len(),
        success_count,
        failed_count: failed_pdfs.len(),
        failed_pdfs,
        results,
    };

    let manifest_path = output_dir.join("batch_report.json");
    fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)
        .with_context(|| format!("cannot write {}", manifest_path.display()))?;
    info!(
        inputs = manifest.input_count,
        failed = manifest.failed_count,
        manifest = %manifest_path.display(),
        "batch review complete"
    );
    Ok(manifest)
}

/// Review a single pair; any failure becomes an error item.
fn review_one(config: &QaConfig, pdf: &Path, report_path: &Path) -> BatchItemResult {
    let epub_path = sibling_epub(pdf);
    let mut item = BatchItemResult {
        input_pdf: pdf.display().to_string(),
        input_epub: epub_path.display().to_string(),
        report_file: None,
        status: "error".to_string(),
        error: None,
        coverage_text_percent: None,
        status_geral: None,
    };
    if !epub_path.is_file() {
        item.error = Some("no sibling EPUB found".to_string());
        return item;
    }
    match try_review(config, pdf, &epub_path, report_path) {
        Ok((coverage, status_geral)) => {
            item.report_file = Some(report_path.display().to_string());
            item.status = "ok".to_string();
            item.coverage_text_percent = Some(coverage);
            item.status_geral = Some(status_geral);
        }
        Err(err) => {
            warn!(pdf = %pdf.display(), error = %err, "batch item failed");
            item.error = Some(err.to_string());
        }
    }
    item
}

fn try_review(
    config: &QaConfig,
    pdf_path: &Path,
    epub_path: &Path,
    report_path: &Path,
) -> Result<(f64, String)> {
    let pdf = folium_document::extract_pdf(pdf_path)?;
    let epub = folium_document::extract_epub(epub_path)?;
    let engine = QaEngine::new(config.clone())?;
    let renderer = crate::renderer_for(config, pdf_path);
    let qa_report = engine.review(&pdf, &epub, renderer.as_deref())?;
    let summary = report::simplify(&qa_report);

    fs::write(report_path, serde_json::to_string_pretty(&qa_report)?)
        .with_context(|| format!("cannot write {}", report_path.display()))?;
    Ok((qa_report.coverage_text_percent, summary.status_geral.to_string()))
}
