// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// EPUB extraction — anchored text blocks, image counts, and
// fixed-layout page images using the `epub` crate.
//
// The converter that produced the EPUB marks each PDF page boundary
// with an element carrying `id="page-N"`. Splitting spine documents at
// those anchors recovers the per-page correspondence the QA engine
// scores against. Content before the first anchor of a document (cover
// matter, headings injected at packaging time) belongs to the full
// text but to no page.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use epub::doc::EpubDoc;
use folium_core::error::{FoliumError, Result};
use folium_core::{AnchoredBlock, EpubContent, LayoutMode};
use regex::Regex;
use tracing::{debug, info, instrument, warn};

static RE_PAGE_ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)id\s*=\s*["']page-(\d+)["']"#).expect("valid anchor pattern")
});
static RE_IMG_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<img[^>]*>").expect("valid img pattern"));
static RE_PDF_PAGE_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)data-pdf-page\s*=\s*["'](\d+)["']"#).expect("valid page attr pattern")
});
static RE_SRC_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)src\s*=\s*["']([^"']+)["']"#).expect("valid src pattern")
});
static RE_FIXED_PAGE_ASSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^fixed_pages/page_(\d+)\.png$").expect("valid asset pattern")
});
static RE_SCRIPT_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").expect("valid script pattern")
});
static RE_BLOCK_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</(p|div|h[1-6]|li|tr|section|article|figure)>|<br\s*/?>")
        .expect("valid break pattern")
});
static RE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"));
static RE_NUMERIC_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x?[0-9a-fA-F]+);").expect("valid entity pattern"));

/// Extract QA input from an EPUB file.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn extract_epub(path: impl AsRef<Path>) -> Result<EpubContent> {
    let mut doc = EpubDoc::new(path.as_ref()).map_err(|err| {
        FoliumError::EpubError(format!(
            "failed to open {}: {}",
            path.as_ref().display(),
            err
        ))
    })?;

    let mut blocks = Vec::new();
    let mut full_text_parts = Vec::new();
    let mut page_images: BTreeMap<u32, Vec<u8>> = BTreeMap::new();
    let mut order_index = 0usize;

    doc.set_current_chapter(0);
    loop {
        let Some((content, _media_type)) = doc.get_current_str() else {
            break;
        };
        let doc_dir = doc
            .get_current_path()
            .and_then(|p| p.parent().map(|d| d.to_string_lossy().to_string()))
            .unwrap_or_default();

        let (unanchored, page_sections) = split_page_anchors(&content);
        let unanchored_text = html_to_text(&unanchored);
        if !unanchored_text.trim().is_empty() {
            full_text_parts.push(unanchored_text);
        }
        for (page_number, section_html) in page_sections {
            let text = html_to_text(&section_html);
            full_text_parts.push(text.clone());
            blocks.push(AnchoredBlock { page_number, text, order_index });
            order_index += 1;
        }

        collect_page_image_refs(&content, &doc_dir, &mut doc, &mut page_images);

        if !doc.go_next() {
            break;
        }
    }

    if page_images.is_empty() {
        collect_fixed_page_assets(&mut doc, &mut page_images);
    }

    let image_count = count_content_images(&doc);
    let layout = if page_images.is_empty() { LayoutMode::Reflow } else { LayoutMode::Fixed };

    info!(
        blocks = blocks.len(),
        image_count,
        page_images = page_images.len(),
        %layout,
        "EPUB extraction complete"
    );

    Ok(EpubContent {
        blocks,
        full_text: full_text_parts.join("\n"),
        image_count,
        page_images,
        layout,
    })
}

/// Split one spine document at its `page-N` anchors.
///
/// Returns the HTML before the first anchor, then `(page_number, html)`
/// for each anchored section, in document order.
fn split_page_anchors(html: &str) -> (String, Vec<(u32, String)>) {
    let mut marks: Vec<(usize, u32)> = Vec::new();
    for captures in RE_PAGE_ANCHOR.captures_iter(html) {
        let whole = captures.get(0).expect("regex match");
        let Ok(page) = captures[1].parse::<u32>() else {
            continue;
        };
        marks.push((whole.start(), page));
    }

    if marks.is_empty() {
        return (html.to_string(), Vec::new());
    }

    let head = html[..marks[0].0].to_string();
    let mut sections = Vec::with_capacity(marks.len());
    for (i, &(start, page)) in marks.iter().enumerate() {
        let end = marks.get(i + 1).map_or(html.len(), |&(next, _)| next);
        sections.push((page, html[start..end].to_string()));
    }
    (head, sections)
}

/// Strip tags and decode common entities, keeping block boundaries as
/// newlines. The QA normalizer collapses whitespace afterwards, so this
/// only needs to avoid gluing words together.
fn html_to_text(html: &str) -> String {
    let without_scripts = RE_SCRIPT_STYLE.replace_all(html, " ");
    let with_breaks = RE_BLOCK_BREAK.replace_all(&without_scripts, "\n");
    let stripped = RE_TAG.replace_all(&with_breaks, " ");
    decode_entities(&stripped)
}

fn decode_entities(text: &str) -> String {
    let named = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'");
    RE_NUMERIC_ENTITY
        .replace_all(&named, |captures: &regex::Captures<'_>| {
            let body = &captures[1];
            let parsed = if let Some(hex) = body.strip_prefix('x').or_else(|| body.strip_prefix('X')) {
                u32::from_str_radix(hex, 16)
            } else {
                body.parse::<u32>()
            };
            parsed
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_default()
        })
        .into_owned()
}

/// POSIX-style path normalization for intra-EPUB references.
fn normalize_epub_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let normalized = path.replace('\\', "/");
    for part in normalized.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Page render assets are not content images; they must not inflate the
/// image-count comparison.
fn is_rendered_page_asset(name: &str) -> bool {
    normalize_epub_path(name).starts_with("fixed_pages/")
}

/// Harvest `<img data-pdf-page="N" src="...">` references from one
/// spine document into the page-image map. The first image claiming a
/// page wins.
fn collect_page_image_refs(
    html: &str,
    doc_dir: &str,
    doc: &mut EpubDoc<std::io::BufReader<std::fs::File>>,
    page_images: &mut BTreeMap<u32, Vec<u8>>,
) {
    for img_match in RE_IMG_TAG.find_iter(html) {
        let tag = img_match.as_str();
        let Some(page_captures) = RE_PDF_PAGE_ATTR.captures(tag) else {
            continue;
        };
        let Some(src_captures) = RE_SRC_ATTR.captures(tag) else {
            continue;
        };
        let Ok(page_number) = page_captures[1].parse::<u32>() else {
            continue;
        };
        if page_images.contains_key(&page_number) {
            continue;
        }

        let resolved = normalize_epub_path(&format!("{doc_dir}/{}", &src_captures[1]));
        match doc.get_resource_by_path(&resolved) {
            Some(bytes) => {
                page_images.insert(page_number, bytes);
            }
            None => warn!(page = page_number, path = %resolved, "page image not found in EPUB"),
        }
    }
}

/// Fallback for EPUBs without `data-pdf-page` attributes: page renders
/// stored under the conventional `fixed_pages/page_N.png` names.
fn collect_fixed_page_assets(
    doc: &mut EpubDoc<std::io::BufReader<std::fs::File>>,
    page_images: &mut BTreeMap<u32, Vec<u8>>,
) {
    let asset_paths: Vec<(u32, String)> = doc
        .resources
        .values()
        .filter_map(|item| {
            let path = &item.path;
            let name = normalize_epub_path(&path.to_string_lossy());
            let page = RE_FIXED_PAGE_ASSET.captures(&name)?[1].parse::<u32>().ok()?;
            Some((page, name))
        })
        .collect();
    for (page, name) in asset_paths {
        if let Some(bytes) = doc.get_resource_by_path(&name) {
            page_images.insert(page, bytes);
        }
    }
    debug!(count = page_images.len(), "fixed page assets collected");
}

/// Count content images declared in the manifest, excluding page
/// render assets.
fn count_content_images(doc: &EpubDoc<std::io::BufReader<std::fs::File>>) -> u32 {
    doc.resources
        .values()
        .filter(|item| {
            item.mime.starts_with("image/") && !is_rendered_page_asset(&item.path.to_string_lossy())
        })
        .count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_document_at_page_anchors() {
        let html = r#"<html><body><h1>Intro heading</h1>
<a id="page-1"></a><p>First page text.</p>
<a id="page-2"></a><p>Second page text.</p>
</body></html>"#;
        let (head, sections) = split_page_anchors(html);
        assert!(head.contains("Intro heading"));
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].0, 1);
        assert!(sections[0].1.contains("First page text"));
        assert!(!sections[0].1.contains("Second page"));
        assert_eq!(sections[1].0, 2);
        assert!(sections[1].1.contains("Second page text"));
    }

    #[test]
    fn document_without_anchors_is_all_unanchored() {
        let html = "<p>No anchors here.</p>";
        let (head, sections) = split_page_anchors(html);
        assert_eq!(head, html);
        assert!(sections.is_empty());
    }

    #[test]
    fn anchor_id_matches_double_or_single_quotes() {
        let (_, sections) = split_page_anchors(r#"<span id='page-7'></span>content"#);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].0, 7);
    }

    #[test]
    fn html_to_text_strips_tags_and_decodes_entities() {
        let html = "<p>Caf&#233;? No: caf&#233; &amp; ch&#xE1;.</p><script>var x = 1;</script>";
        let text = html_to_text(html);
        assert!(text.contains("café & chá"), "got {text:?}");
        assert!(!text.contains("var x"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn block_ends_become_newlines_so_words_do_not_glue() {
        let text = html_to_text("<p>one</p><p>two</p>");
        let words: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(words, vec!["one", "two"]);
    }

    #[test]
    fn normalizes_relative_epub_paths() {
        assert_eq!(normalize_epub_path("OEBPS/text/../images/p1.png"), "OEBPS/images/p1.png");
        assert_eq!(normalize_epub_path("./a/b.png"), "a/b.png");
        assert_eq!(normalize_epub_path("a\\b\\c.png"), "a/b/c.png");
    }

    #[test]
    fn fixed_page_assets_are_not_content_images() {
        assert!(is_rendered_page_asset("fixed_pages/page_3.png"));
        assert!(is_rendered_page_asset("text/../fixed_pages/page_1.png"));
        assert!(!is_rendered_page_asset("images/figure1.png"));
    }
}
