// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// QA engine configuration.
//
// The engine never reads ambient process state (environment variables,
// global statics). Callers build a `QaConfig` once and pass it into
// `QaEngine::new`, so tests can vary thresholds deterministically.

use serde::{Deserialize, Serialize};

/// Text normalization options.
///
/// The exact punctuation set the original coverage numbers were computed
/// with matters: changing it silently shifts `coverage_text_percent`.
/// It is therefore carried here rather than hard-coded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeOptions {
    /// Strip punctuation when tokenizing. When false, tokens split on
    /// whitespace only.
    pub strip_punctuation: bool,
    /// Characters treated as word-internal despite being punctuation.
    /// The default keeps apostrophes so "don't" stays one token.
    pub keep_chars: Vec<char>,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            strip_punctuation: true,
            keep_chars: vec!['\''],
        }
    }
}

/// Immutable settings for a QA run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaConfig {
    /// Run the visual (pixel-level) comparison for fixed-layout EPUBs.
    pub visual_enabled: bool,
    /// Upper bound on pages compared visually. Pages beyond the cap are
    /// omitted, not failed.
    pub visual_max_pages: u32,
    /// DPI used to rasterize PDF pages for visual comparison.
    pub visual_dpi: u32,
    /// Minimum similarity score for a visual comparison to pass.
    pub visual_threshold: f64,
    /// Minimum per-page token coverage before a page is flagged
    /// `low_coverage`.
    pub page_coverage_threshold: f64,
    /// Tokenization rules applied to both PDF and EPUB text.
    pub normalize: NormalizeOptions,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            visual_enabled: false,
            visual_max_pages: 10,
            visual_dpi: 144,
            visual_threshold: 0.985,
            page_coverage_threshold: 0.80,
            normalize: NormalizeOptions::default(),
        }
    }
}

impl QaConfig {
    /// Validate threshold ranges. Thresholds are ratios in [0, 1].
    pub fn validate(&self) -> Result<(), crate::FoliumError> {
        if !(0.0..=1.0).contains(&self.visual_threshold) {
            return Err(crate::FoliumError::Config(format!(
                "visual_threshold {} outside [0, 1]",
                self.visual_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.page_coverage_threshold) {
            return Err(crate::FoliumError::Config(format!(
                "page_coverage_threshold {} outside [0, 1]",
                self.page_coverage_threshold
            )));
        }
        if self.visual_dpi == 0 {
            return Err(crate::FoliumError::Config("visual_dpi must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(QaConfig::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let cfg = QaConfig {
            visual_threshold: 1.5,
            ..QaConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
