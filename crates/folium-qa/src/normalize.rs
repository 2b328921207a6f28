// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text normalization and tokenization.
//
// Both sides of the comparison pass through the same rules, so coverage
// numbers only reflect genuine content differences, never formatting or
// encoding noise. Normalization is deterministic and idempotent:
// re-tokenizing a token stream's reconstructed text yields the same
// stream.

use folium_core::NormalizeOptions;
use unicode_normalization::UnicodeNormalization;

/// NFKC-fold, lowercase, and collapse whitespace runs to single spaces.
///
/// Total over all inputs: the empty string normalizes to the empty
/// string, and no input can make this panic.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for ch in text.nfkc() {
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        for lowered in ch.to_lowercase() {
            out.push(lowered);
        }
    }
    out
}

/// Split normalized text into tokens.
///
/// A token is a maximal run of word characters: alphanumerics,
/// underscore, and any character listed in `opts.keep_chars` (by
/// default the apostrophe, so contractions stay whole). Numeric tokens
/// pass through intact. With `strip_punctuation` off, tokens are
/// whitespace-separated words with punctuation attached.
pub fn tokenize(text: &str, opts: &NormalizeOptions) -> Vec<String> {
    let normalized = normalize_text(text);
    if !opts.strip_punctuation {
        return normalized.split(' ').filter(|t| !t.is_empty()).map(String::from).collect();
    }

    let is_word_char =
        |c: char| c.is_alphanumeric() || c == '_' || opts.keep_chars.contains(&c);

    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in normalized.chars() {
        if is_word_char(ch) {
            current.push(ch);
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
