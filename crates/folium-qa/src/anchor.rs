// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page anchor resolution.
//
// Maps EPUB content back to originating PDF pages. The EPUB carries
// `page-N` anchors inserted at packaging time; all blocks claiming the
// same page are concatenated in document-flow order. The resolver never
// invents or drops a PDF page: the output key set is exactly
// `{1..=pdf_page_count}` no matter how malformed the anchors are.

use std::collections::BTreeMap;

use folium_core::AnchoredBlock;
use folium_core::error::{FoliumError, Result};
use tracing::{debug, warn};

/// Concatenate anchored blocks into one text blob per PDF page.
///
/// Pages with no claiming block map to an empty blob, which downstream
/// scoring classifies as `missing_page` rather than `low_coverage`.
/// Blocks claiming a page outside `[1, pdf_page_count]` are dropped and
/// reported through `warnings` — they come from upstream anchor
/// malformation and must not widen the key set.
pub fn resolve(
    blocks: &[AnchoredBlock],
    pdf_page_count: u32,
    warnings: &mut Vec<String>,
) -> BTreeMap<u32, String> {
    let mut resolved: BTreeMap<u32, String> = (1..=pdf_page_count)
        .map(|page| (page, String::new()))
        .collect();

    let mut ordered: Vec<&AnchoredBlock> = blocks.iter().collect();
    ordered.sort_by_key(|blk| blk.order_index);

    for block in ordered {
        let Some(blob) = resolved.get_mut(&block.page_number) else {
            warn!(
                page = block.page_number,
                pdf_page_count, "anchor outside PDF page range, dropping block"
            );
            warnings.push(format!(
                "anchor page-{} is outside the PDF page range 1..={}",
                block.page_number, pdf_page_count
            ));
            continue;
        };
        if !blob.is_empty() {
            blob.push('\n');
        }
        blob.push_str(block.text.trim());
    }

    debug!(
        pages = pdf_page_count,
        populated = resolved.values().filter(|b| !b.is_empty()).count(),
        "anchors resolved"
    );
    resolved
}

/// Guard the resolver contract before report assembly. A wrong key set
/// means an upstream collaborator breached its contract; assembling a
/// report from it would silently produce wrong numbers.
pub fn verify_key_set(resolved: &BTreeMap<u32, String>, pdf_page_count: u32) -> Result<()> {
    let expected = pdf_page_count as usize;
    let ok = resolved.len() == expected
        && resolved.keys().copied().eq(1..=pdf_page_count);
    if ok {
        Ok(())
    } else {
        Err(FoliumError::Invariant(format!(
            "resolved page map has {} keys, expected exactly 1..={}",
            resolved.len(),
            pdf_page_count
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(page: u32, text: &str, order: usize) -> AnchoredBlock {
        AnchoredBlock { page_number: page, text: text.into(), order_index: order }
    }

    #[test]
    fn key_set_is_always_the_full_page_range() {
        let blocks = vec![block(2, "two", 0)];
        let mut warnings = Vec::new();
        let resolved = resolve(&blocks, 4, &mut warnings);
        assert_eq!(resolved.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(resolved[&2], "two");
        assert!(resolved[&1].is_empty());
        assert!(warnings.is_empty());
        assert!(verify_key_set(&resolved, 4).is_ok());
    }

    #[test]
    fn blocks_sharing_a_page_concatenate_in_flow_order() {
        let blocks = vec![
            block(1, "second half", 5),
            block(1, "first half", 2),
        ];
        let mut warnings = Vec::new();
        let resolved = resolve(&blocks, 1, &mut warnings);
        assert_eq!(resolved[&1], "first half\nsecond half");
    }

    #[test]
    fn out_of_range_anchor_is_dropped_with_warning() {
        let blocks = vec![block(7, "phantom", 0), block(0, "zero", 1)];
        let mut warnings = Vec::new();
        let resolved = resolve(&blocks, 3, &mut warnings);
        assert_eq!(resolved.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(warnings.len(), 2);
        assert!(verify_key_set(&resolved, 3).is_ok());
    }

    #[test]
    fn zero_page_document_resolves_to_empty_map() {
        let mut warnings = Vec::new();
        let resolved = resolve(&[], 0, &mut warnings);
        assert!(resolved.is_empty());
        assert!(verify_key_set(&resolved, 0).is_ok());
    }

    #[test]
    fn verify_rejects_tampered_key_set() {
        let mut resolved = BTreeMap::new();
        resolved.insert(1, String::new());
        resolved.insert(3, String::new());
        assert!(matches!(
            verify_key_set(&resolved, 2),
            Err(FoliumError::Invariant(_))
        ));
    }
}
