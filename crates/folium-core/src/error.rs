// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Folium.

use thiserror::Error;

/// Top-level error type for all Folium operations.
#[derive(Debug, Error)]
pub enum FoliumError {
    // -- Document errors --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("EPUB operation failed: {0}")]
    EpubError(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("page rendering failed: {0}")]
    RenderError(String),

    // -- QA engine errors --
    /// A contract breach in an upstream collaborator (e.g. the anchor
    /// resolver producing a key set other than 1..=page_count). Fatal:
    /// report assembly must abort rather than emit a wrong report.
    #[error("invariant violation: {0}")]
    Invariant(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    // -- I/O and persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FoliumError>;
