// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use folium_core::QaConfig;

/// Audit PDF→EPUB conversions page by page
#[derive(Parser, Debug)]
#[command(name = "folium", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Review one PDF/EPUB pair and write the technical report as JSON
    Review {
        /// Path to the source PDF
        pdf: PathBuf,

        /// Path to the EPUB produced from it
        epub: PathBuf,

        /// Output report file
        #[arg(short, long, default_value = "report.json")]
        output: PathBuf,

        /// Also print the plain-language summary
        #[arg(long, default_value_t = false)]
        summary: bool,

        #[command(flatten)]
        qa: QaFlags,
    },

    /// Review every PDF found in the inputs against its sibling EPUB
    BatchReview {
        /// PDF files or directories to scan
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Directory for per-document reports and the batch manifest
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Worker threads (defaults to the rayon global pool size)
        #[arg(long)]
        workers: Option<usize>,

        /// Do not descend into subdirectories
        #[arg(long, default_value_t = false)]
        no_recursive: bool,

        #[command(flatten)]
        qa: QaFlags,
    },

    /// Re-derive the plain-language summary from a stored report
    Summary {
        /// Path to a report JSON written by `review`
        report: PathBuf,
    },
}

/// Flags shared by the review commands, mapped onto [`QaConfig`].
#[derive(Args, Debug)]
pub struct QaFlags {
    /// Enable visual QA (requires a fixed-layout EPUB and a render backend)
    #[arg(long, default_value_t = false)]
    pub visual: bool,

    /// Per-page similarity threshold for visual QA
    #[arg(long)]
    pub visual_threshold: Option<f64>,

    /// Maximum number of pages visual QA compares
    #[arg(long)]
    pub visual_max_pages: Option<u32>,

    /// Render resolution for visual QA
    #[arg(long)]
    pub visual_dpi: Option<u32>,

    /// Per-page text coverage ratio below which a page is flagged
    #[arg(long)]
    pub page_threshold: Option<f64>,
}

impl QaFlags {
    pub fn to_config(&self) -> QaConfig {
        let defaults = QaConfig::default();
        QaConfig {
            visual_enabled: self.visual,
            visual_threshold: self.visual_threshold.unwrap_or(defaults.visual_threshold),
            visual_max_pages: self.visual_max_pages.unwrap_or(defaults.visual_max_pages),
            visual_dpi: self.visual_dpi.unwrap_or(defaults.visual_dpi),
            page_coverage_threshold: self
                .page_threshold
                .unwrap_or(defaults.page_coverage_threshold),
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_defaults_to_report_json() {
        let cli = Cli::parse_from(["folium", "review", "book.pdf", "book.epub"]);
        let Command::Review { output, summary, qa, .. } = cli.command else {
            panic!("expected review command");
        };
        assert_eq!(output, PathBuf::from("report.json"));
        assert!(!summary);
        assert!(!qa.visual);
    }

    #[test]
    fn qa_flags_override_config_defaults() {
        let cli = Cli::parse_from([
            "folium",
            "review",
            "book.pdf",
            "book.epub",
            "--visual",
            "--visual-threshold",
            "0.9",
            "--page-threshold",
            "0.7",
        ]);
        let Command::Review { qa, .. } = cli.command else {
            panic!("expected review command");
        };
        let config = qa.to_config();
        assert!(config.visual_enabled);
        assert_eq!(config.visual_threshold, 0.9);
        assert_eq!(config.page_coverage_threshold, 0.7);
        assert_eq!(config.visual_max_pages, QaConfig::default().visual_max_pages);
    }

    #[test]
    fn batch_review_requires_inputs() {
        assert!(Cli::try_parse_from(["folium", "batch-review", "-o", "out"]).is_err());
    }
}
