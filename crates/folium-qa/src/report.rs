// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Report assembly.
//
// Merges alignment output, page issues, image counts, and visual QA
// into the technical `QaReport`, and derives the plain-language
// `SimplifiedReport`. The simplified view is a pure function of the
// technical report: deterministic, total over every reachable report
// state, and it never exposes raw error detail — only categorized
// attention signals. User-facing strings are Portuguese, matching the
// audience of the conversion tool.

use folium_core::{
    OverallStatus, PageIssue, PageStatus, QaReport, Segment, SimplifiedReport, TextDifferences,
    VisualQa,
};

use crate::align::{Alignment, Span};

/// Maximum characters kept in a segment snippet.
const SNIPPET_LIMIT: usize = 200;
/// Maximum characters kept in a segment context window.
const CONTEXT_LIMIT: usize = 120;
/// Tokens of context captured on each side of a segment.
const CONTEXT_TOKENS: usize = 5;

/// Truncate to `max_len` characters, appending an ellipsis. Operates on
/// characters, not bytes, so multi-byte text never splits mid-scalar.
pub fn limit_text(text: &str, max_len: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_len {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(max_len.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

/// Token ranges per PDF page within the concatenated document stream:
/// `(page_number, start, end)`, half-open.
pub type PageTokenRanges = Vec<(u32, usize, usize)>;

/// The PDF page owning a given token index in the document stream.
fn page_for_index(ranges: &PageTokenRanges, index: usize) -> Option<u32> {
    ranges
        .iter()
        .find(|&&(_, start, end)| start <= index && index < end)
        .map(|&(page, _, _)| page)
}

fn make_segment(tokens: &[String], span: Span, page: Option<u32>) -> Segment {
    let before = tokens[span.start.saturating_sub(CONTEXT_TOKENS)..span.start].join(" ");
    let snippet = tokens[span.start..span.end].join(" ");
    let after_end = (span.end + CONTEXT_TOKENS).min(tokens.len());
    let after = tokens[span.end..after_end].join(" ");
    Segment {
        snippet: limit_text(&snippet, SNIPPET_LIMIT),
        context_before: limit_text(&before, CONTEXT_LIMIT),
        context_after: limit_text(&after, CONTEXT_LIMIT),
        page,
        token_count: span.len(),
    }
}

/// Turn alignment gap spans into human-readable segments. Missing
/// segments carry the PDF page they fell on; extra segments have no
/// PDF page to attribute.
pub fn build_segments(
    alignment: &Alignment,
    pdf_tokens: &[String],
    epub_tokens: &[String],
    page_ranges: &PageTokenRanges,
) -> (Vec<Segment>, Vec<Segment>) {
    let missing = alignment
        .missing
        .iter()
        .map(|&span| make_segment(pdf_tokens, span, page_for_index(page_ranges, span.start)))
        .collect();
    let extra = alignment
        .extra
        .iter()
        .map(|&span| make_segment(epub_tokens, span, None))
        .collect();
    (missing, extra)
}

/// Assemble the final technical report. Pure aggregation.
#[allow(clippy::too_many_arguments)]
pub fn assemble(
    coverage_text_percent: f64,
    missing_segments: Vec<Segment>,
    extra_segments: Vec<Segment>,
    image_count_pdf: u32,
    image_count_epub: u32,
    issues: Vec<PageIssue>,
    visual_qa: VisualQa,
    warnings: Vec<String>,
) -> QaReport {
    QaReport {
        coverage_text_percent: (coverage_text_percent * 100.0).round() / 100.0,
        missing_segments,
        extra_segments,
        image_count_pdf,
        image_count_epub,
        issues,
        visual_qa,
        warnings,
    }
}

fn pages_with_status(issues: &[PageIssue], status: PageStatus) -> Vec<u32> {
    issues
        .iter()
        .filter(|issue| issue.status == status)
        .map(|issue| issue.page_number)
        .collect()
}

/// "3, 7, 12 e mais 4" — a capped, de-duplicated page list.
fn compact_page_list(pages: &[u32], max_items: usize) -> String {
    let mut sorted: Vec<u32> = pages.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.is_empty() {
        return "nenhuma".to_string();
    }
    let shown: Vec<String> = sorted.iter().take(max_items).map(u32::to_string).collect();
    let mut text = shown.join(", ");
    let remaining = sorted.len().saturating_sub(max_items);
    if remaining > 0 {
        text.push_str(&format!(" e mais {remaining}"));
    }
    text
}

fn segment_examples(segments: &[Segment], max_items: usize) -> Vec<String> {
    segments
        .iter()
        .take(max_items)
        .filter_map(|seg| {
            let snippet = limit_text(&seg.snippet, 100);
            if snippet.is_empty() {
                return None;
            }
            Some(match seg.page {
                Some(page) => format!("Pagina {page}: \"{snippet}\""),
                None => format!("Trecho: \"{snippet}\""),
            })
        })
        .collect()
}

fn visual_status_label(visual: &VisualQa) -> (String, Option<f64>) {
    match visual {
        VisualQa::Disabled => ("disabled".into(), None),
        VisualQa::UnsupportedLayout => ("unsupported_layout".into(), None),
        VisualQa::NoPages => ("no_pages".into(), None),
        VisualQa::Compared { coverage_visual_percent, .. } => {
            let status = if visual.all_passed() { "ok" } else { "differences_found" };
            (status.into(), Some(*coverage_visual_percent))
        }
    }
}

/// Derive the plain-language summary from a technical report.
pub fn simplify(report: &QaReport) -> SimplifiedReport {
    let issues = &report.issues;
    let non_ok = issues.iter().filter(|i| i.status != PageStatus::Ok).count();
    let no_text_pages = pages_with_status(issues, PageStatus::NoText);
    let low_coverage_pages = pages_with_status(issues, PageStatus::LowCoverage);
    let missing_page_pages = pages_with_status(issues, PageStatus::MissingPage);

    let coverage = report.coverage_text_percent;
    let image_match = report.image_count_pdf == report.image_count_epub;
    let (visual_status, visual_percent) = visual_status_label(&report.visual_qa);

    let (status, message) = if coverage >= 98.0 && non_ok == 0 && image_match {
        (
            OverallStatus::Excellent,
            "Conversao muito fiel ao arquivo original.".to_string(),
        )
    } else if coverage >= 95.0 && image_match {
        (
            OverallStatus::Good,
            "Conversao boa, com pequenas diferencas em algumas paginas.".to_string(),
        )
    } else {
        (
            OverallStatus::NeedsReview,
            "Conversao concluida, mas recomenda-se revisar paginas sinalizadas.".to_string(),
        )
    };

    let visual_label = match visual_status.as_str() {
        "ok" => format!("aprovado ({}%)", visual_percent.unwrap_or(0.0)),
        "differences_found" => {
            format!("diferencas detectadas ({}%)", visual_percent.unwrap_or(0.0))
        }
        "unsupported_layout" => "nao suportado para este tipo de EPUB".to_string(),
        _ => "nao executado".to_string(),
    };

    let explicacao_simples = vec![
        format!("Texto aproveitado: {coverage:.2}% do conteudo do PDF apareceu no EPUB."),
        format!(
            "Imagens: {} no EPUB para {} no PDF.",
            report.image_count_epub, report.image_count_pdf
        ),
        format!("Paginas com alerta: {} de {}.", non_ok, issues.len()),
        format!(
            "Diferencas de texto detectadas: {} trechos possivelmente faltando e {} trechos extras.",
            report.missing_segments.len(),
            report.extra_segments.len()
        ),
        format!("Comparacao visual: {visual_label}."),
    ];

    let mut sinais_de_atencao = Vec::new();
    if !no_text_pages.is_empty() {
        sinais_de_atencao.push(format!(
            "Paginas sem texto selecionavel no PDF: {}.",
            compact_page_list(&no_text_pages, 10)
        ));
    }
    if !low_coverage_pages.is_empty() {
        sinais_de_atencao.push(format!(
            "Paginas com baixa cobertura textual: {}.",
            compact_page_list(&low_coverage_pages, 10)
        ));
    }
    if !missing_page_pages.is_empty() {
        sinais_de_atencao.push(format!(
            "Paginas sem ancora mapeada no EPUB: {}.",
            compact_page_list(&missing_page_pages, 10)
        ));
    }
    if !image_match {
        sinais_de_atencao.push(format!(
            "Quantidade de imagens diferente: PDF={} vs EPUB={}.",
            report.image_count_pdf, report.image_count_epub
        ));
    }
    if visual_status == "differences_found" {
        sinais_de_atencao
            .push("Comparacao visual encontrou paginas com diferenca perceptivel.".to_string());
    }
    if !report.warnings.is_empty() {
        sinais_de_atencao
            .push("Entradas com anomalias estruturais detectadas durante a analise.".to_string());
    }
    if sinais_de_atencao.is_empty() {
        sinais_de_atencao.push("Nenhum alerta relevante encontrado.".to_string());
    }

    let mut recomendacoes = Vec::new();
    if status == OverallStatus::Excellent {
        recomendacoes.push("Arquivo pronto para publicacao.".to_string());
    } else {
        recomendacoes
            .push("Abra o EPUB final e revise as paginas sinalizadas antes de publicar.".to_string());
    }
    if !low_coverage_pages.is_empty() {
        recomendacoes.push(format!(
            "Priorize a revisao das paginas: {}.",
            compact_page_list(&low_coverage_pages, 8)
        ));
    }
    if visual_status != "ok" {
        recomendacoes.push(
            "Para manter visual mais proximo do PDF no leitor, prefira --layout fixed.".to_string(),
        );
    }
    recomendacoes
        .push("Se encontrar falhas recorrentes, rode a conversao com OCR habilitado.".to_string());

    SimplifiedReport {
        status_geral: status,
        mensagem: message,
        texto_preservado_percent: (coverage * 100.0).round() / 100.0,
        imagens_preservadas: image_match,
        imagens_pdf: report.image_count_pdf,
        imagens_epub: report.image_count_epub,
        paginas_total: issues.len(),
        paginas_com_alerta: non_ok,
        paginas_sem_texto: no_text_pages.into_iter().take(20).collect(),
        paginas_baixa_cobertura: low_coverage_pages.into_iter().take(20).collect(),
        paginas_sem_ancora: missing_page_pages.into_iter().take(20).collect(),
        visual_qa_status: visual_status,
        visual_qa_percent: visual_percent,
        diferencas_texto: TextDifferences {
            trechos_faltando: report.missing_segments.len(),
            trechos_extras: report.extra_segments.len(),
            exemplos_faltando: segment_examples(&report.missing_segments, 3),
            exemplos_extras: segment_examples(&report.extra_segments, 3),
        },
        explicacao_simples,
        sinais_de_atencao,
        recomendacoes,
    }
}

/// Render the simplified report for terminal display.
pub fn format_simplified(summary: &SimplifiedReport) -> String {
    let mut lines = vec![
        format!("Status geral: {}", summary.status_geral),
        format!("Mensagem: {}", summary.mensagem),
        String::new(),
        "Resumo simples:".to_string(),
    ];
    for item in &summary.explicacao_simples {
        lines.push(format!("- {item}"));
    }

    lines.push(String::new());
    lines.push("Pontos de atencao:".to_string());
    for item in &summary.sinais_de_atencao {
        lines.push(format!("- {item}"));
    }

    lines.push(String::new());
    lines.push("Recomendacoes:".to_string());
    for item in &summary.recomendacoes {
        lines.push(format!("- {item}"));
    }

    let missing = &summary.diferencas_texto.exemplos_faltando;
    let extra = &summary.diferencas_texto.exemplos_extras;
    if !missing.is_empty() || !extra.is_empty() {
        lines.push(String::new());
        lines.push("Exemplos de diferencas de texto:".to_string());
        for item in missing {
            lines.push(format!("- Faltando: {item}"));
        }
        for item in extra {
            lines.push(format!("- Extra: {item}"));
        }
    }

    lines.join("\n").trim().to_string()
}
