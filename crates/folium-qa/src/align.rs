// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Order-preserving alignment of two token streams.
//
// Strategy: intern tokens to integer ids, trim common prefix/suffix,
// then anchor on tokens that occur exactly once in both streams
// (patience diff) and recurse between anchors. Subproblems without
// unique anchors fall back to a bounded dynamic-programming LCS, or to
// splitting on the rarest common token when still too large. This stays
// near-linear on book-length documents; a full LCS table over two
// ~100k-token streams is never built.
//
// The anchor-first strategy also produces few, long matched runs, so
// the missing/extra segments read as coherent passages instead of
// scattered single tokens.

use std::collections::HashMap;

/// Half-open token range `[start, end)` within one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A run of `len` tokens present in both streams, at `a_start` in the
/// PDF stream and `b_start` in the EPUB stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchBlock {
    pub a_start: usize,
    pub b_start: usize,
    pub len: usize,
}

/// Alignment of a PDF token stream (`a`) against an EPUB token stream
/// (`b`). `matched`, `missing`, and `extra` tile each stream exactly:
/// every `a` index is in exactly one matched block or missing span, and
/// every `b` index is in exactly one matched block or extra span.
#[derive(Debug, Clone)]
pub struct Alignment {
    pub matched: Vec<MatchBlock>,
    /// Coalesced runs present in `a` but absent from `b`.
    pub missing: Vec<Span>,
    /// Coalesced runs present in `b` but absent from `a`.
    pub extra: Vec<Span>,
    pub matched_tokens: usize,
}

/// Subproblems at most this many DP cells are solved exactly.
const DP_CELL_LIMIT: usize = 1 << 14;

/// Align two token streams.
pub fn align(a: &[String], b: &[String]) -> Alignment {
    let (a_ids, b_ids) = intern(a, b);

    let mut blocks: Vec<MatchBlock> = Vec::new();
    // Explicit work stack of (a-range, b-range) subproblems, so a
    // pathological document cannot overflow the call stack.
    let mut work: Vec<(Span, Span)> = vec![(
        Span { start: 0, end: a_ids.len() },
        Span { start: 0, end: b_ids.len() },
    )];

    while let Some((ar, br)) = work.pop() {
        diff_step(&a_ids, &b_ids, ar, br, &mut blocks, &mut work);
    }

    blocks.sort_by_key(|blk| blk.a_start);
    let merged = merge_adjacent(blocks);
    finish(merged, a_ids.len(), b_ids.len())
}

/// Map tokens to dense integer ids shared by both streams, so the diff
/// compares u32s instead of strings.
fn intern<'a>(a: &'a [String], b: &'a [String]) -> (Vec<u32>, Vec<u32>) {
    let mut table: HashMap<&'a str, u32> = HashMap::with_capacity(a.len() + b.len());
    let mut id_of = |token: &'a str| -> u32 {
        let next = table.len() as u32;
        *table.entry(token).or_insert(next)
    };
    let a_ids = a.iter().map(|t| id_of(t.as_str())).collect();
    let b_ids = b.iter().map(|t| id_of(t.as_str())).collect();
    (a_ids, b_ids)
}

/// Process one subproblem: trim common ends, then anchor or fall back.
fn diff_step(
    a: &[u32],
    b: &[u32],
    ar: Span,
    br: Span,
    blocks: &mut Vec<MatchBlock>,
    work: &mut Vec<(Span, Span)>,
) {
    let (mut a_lo, mut a_hi) = (ar.start, ar.end);
    let (mut b_lo, mut b_hi) = (br.start, br.end);

    // Common prefix.
    let prefix_start = (a_lo, b_lo);
    while a_lo < a_hi && b_lo < b_hi && a[a_lo] == b[b_lo] {
        a_lo += 1;
        b_lo += 1;
    }
    if a_lo > prefix_start.0 {
        blocks.push(MatchBlock {
            a_start: prefix_start.0,
            b_start: prefix_start.1,
            len: a_lo - prefix_start.0,
        });
    }

    // Common suffix.
    let mut suffix = 0;
    while a_hi > a_lo && b_hi > b_lo && a[a_hi - 1] == b[b_hi - 1] {
        a_hi -= 1;
        b_hi -= 1;
        suffix += 1;
    }
    if suffix > 0 {
        blocks.push(MatchBlock { a_start: a_hi, b_start: b_hi, len: suffix });
    }

    let a_len = a_hi - a_lo;
    let b_len = b_hi - b_lo;
    if a_len == 0 || b_len == 0 {
        return;
    }

    let a_mid = &a[a_lo..a_hi];
    let b_mid = &b[b_lo..b_hi];

    // Patience anchors: tokens unique in both sides of this subproblem.
    let anchors = unique_anchor_chain(a_mid, b_mid);
    if !anchors.is_empty() {
        let mut prev = (0usize, 0usize);
        for &(ai, bi) in &anchors {
            work.push((
                Span { start: a_lo + prev.0, end: a_lo + ai },
                Span { start: b_lo + prev.1, end: b_lo + bi },
            ));
            blocks.push(MatchBlock { a_start: a_lo + ai, b_start: b_lo + bi, len: 1 });
            prev = (ai + 1, bi + 1);
        }
        work.push((
            Span { start: a_lo + prev.0, end: a_hi },
            Span { start: b_lo + prev.1, end: b_hi },
        ));
        return;
    }

    // No unique anchors. Solve exactly when small enough.
    if a_len.saturating_mul(b_len) <= DP_CELL_LIMIT {
        lcs_dp(a_mid, b_mid, a_lo, b_lo, blocks);
        return;
    }

    // Large and repetitive: split on the rarest token common to both
    // sides, matching its first occurrences.
    if let Some((ai, bi)) = rarest_common_split(a_mid, b_mid) {
        blocks.push(MatchBlock { a_start: a_lo + ai, b_start: b_lo + bi, len: 1 });
        work.push((
            Span { start: a_lo, end: a_lo + ai },
            Span { start: b_lo, end: b_lo + bi },
        ));
        work.push((
            Span { start: a_lo + ai + 1, end: a_hi },
            Span { start: b_lo + bi + 1, end: b_hi },
        ));
    }
    // No common token at all: the whole subproblem is missing + extra.
}

/// Longest chain of (a_pos, b_pos) pairs over tokens occurring exactly
/// once in each side, increasing in both coordinates.
fn unique_anchor_chain(a: &[u32], b: &[u32]) -> Vec<(usize, usize)> {
    #[derive(Clone, Copy)]
    enum Seen {
        Once(usize),
        Many,
    }

    let mut a_seen: HashMap<u32, Seen> = HashMap::new();
    for (i, &id) in a.iter().enumerate() {
        a_seen
            .entry(id)
            .and_modify(|s| *s = Seen::Many)
            .or_insert(Seen::Once(i));
    }
    let mut b_seen: HashMap<u32, Seen> = HashMap::new();
    for (j, &id) in b.iter().enumerate() {
        b_seen
            .entry(id)
            .and_modify(|s| *s = Seen::Many)
            .or_insert(Seen::Once(j));
    }

    // Candidate pairs in a-order.
    let mut pairs: Vec<(usize, usize)> = Vec::new();
    for (i, &id) in a.iter().enumerate() {
        if let (Some(Seen::Once(ai)), Some(Seen::Once(bj))) = (a_seen.get(&id), b_seen.get(&id)) {
            debug_assert_eq!(*ai, i);
            let _ = ai;
            pairs.push((i, *bj));
        }
    }
    if pairs.is_empty() {
        return pairs;
    }

    // Longest increasing subsequence on the b coordinate (patience
    // sorting with backpointers).
    let mut tails: Vec<usize> = Vec::new(); // indices into `pairs`
    let mut back: Vec<Option<usize>> = vec![None; pairs.len()];
    for (idx, &(_, bj)) in pairs.iter().enumerate() {
        let pos = tails.partition_point(|&t| pairs[t].1 < bj);
        if pos > 0 {
            back[idx] = Some(tails[pos - 1]);
        }
        if pos == tails.len() {
            tails.push(idx);
        } else {
            tails[pos] = idx;
        }
    }

    let mut chain = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(idx) = cursor {
        chain.push(pairs[idx]);
        cursor = back[idx];
    }
    chain.reverse();
    chain
}

/// Exact LCS for small subproblems, emitting matched blocks with
/// absolute offsets. Traceback prefers extending the current run, which
/// keeps blocks long when several maximal alignments exist.
fn lcs_dp(a: &[u32], b: &[u32], a_off: usize, b_off: usize, blocks: &mut Vec<MatchBlock>) {
    let n = a.len();
    let m = b.len();
    // dp[i][j] = LCS length of a[i..] and b[j..], row-major on (n+1)x(m+1).
    let mut dp = vec![0u32; (n + 1) * (m + 1)];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            let idx = i * (m + 1) + j;
            dp[idx] = if a[i] == b[j] {
                dp[idx + (m + 1) + 1] + 1
            } else {
                dp[idx + (m + 1)].max(dp[idx + 1])
            };
        }
    }

    let (mut i, mut j) = (0usize, 0usize);
    let mut run: Option<MatchBlock> = None;
    while i < n && j < m {
        let idx = i * (m + 1) + j;
        if a[i] == b[j] && dp[idx] == dp[idx + (m + 1) + 1] + 1 {
            match run.as_mut() {
                Some(blk) if blk.a_start + blk.len == a_off + i && blk.b_start + blk.len == b_off + j => {
                    blk.len += 1;
                }
                _ => {
                    if let Some(blk) = run.take() {
                        blocks.push(blk);
                    }
                    run = Some(MatchBlock { a_start: a_off + i, b_start: b_off + j, len: 1 });
                }
            }
            i += 1;
            j += 1;
        } else if dp[idx + (m + 1)] >= dp[idx + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    if let Some(blk) = run {
        blocks.push(blk);
    }
}

/// First occurrences of the common token with the fewest total
/// occurrences across both sides.
fn rarest_common_split(a: &[u32], b: &[u32]) -> Option<(usize, usize)> {
    let mut a_first: HashMap<u32, usize> = HashMap::new();
    let mut a_count: HashMap<u32, usize> = HashMap::new();
    for (i, &id) in a.iter().enumerate() {
        a_first.entry(id).or_insert(i);
        *a_count.entry(id).or_insert(0) += 1;
    }

    let mut best: Option<(usize, (usize, usize))> = None;
    let mut b_first: HashMap<u32, usize> = HashMap::new();
    let mut b_count: HashMap<u32, usize> = HashMap::new();
    for (j, &id) in b.iter().enumerate() {
        b_first.entry(id).or_insert(j);
        *b_count.entry(id).or_insert(0) += 1;
    }
    for (&id, &cb) in &b_count {
        if let (Some(&ai), Some(&ca)) = (a_first.get(&id), a_count.get(&id)) {
            let weight = ca + cb;
            let candidate = (weight, (ai, b_first[&id]));
            match best {
                Some((w, _)) if w <= weight => {}
                _ => best = Some(candidate),
            }
        }
    }
    best.map(|(_, pos)| pos)
}

/// Merge matched blocks that are contiguous in both streams.
fn merge_adjacent(blocks: Vec<MatchBlock>) -> Vec<MatchBlock> {
    let mut merged: Vec<MatchBlock> = Vec::with_capacity(blocks.len());
    for blk in blocks {
        match merged.last_mut() {
            Some(prev)
                if prev.a_start + prev.len == blk.a_start
                    && prev.b_start + prev.len == blk.b_start =>
            {
                prev.len += blk.len;
            }
            _ => merged.push(blk),
        }
    }
    merged
}

/// Derive missing/extra spans from the gaps between matched blocks.
fn finish(matched: Vec<MatchBlock>, a_len: usize, b_len: usize) -> Alignment {
    let mut missing = Vec::new();
    let mut extra = Vec::new();
    let (mut a_pos, mut b_pos) = (0usize, 0usize);
    for blk in &matched {
        if blk.a_start > a_pos {
            missing.push(Span { start: a_pos, end: blk.a_start });
        }
        if blk.b_start > b_pos {
            extra.push(Span { start: b_pos, end: blk.b_start });
        }
        a_pos = blk.a_start + blk.len;
        b_pos = blk.b_start + blk.len;
    }
    if a_pos < a_len {
        missing.push(Span { start: a_pos, end: a_len });
    }
    if b_pos < b_len {
        extra.push(Span { start: b_pos, end: b_len });
    }

    let matched_tokens = matched.iter().map(|blk| blk.len).sum();
    Alignment { matched, missing, extra, matched_tokens }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    /// Matched blocks plus missing spans must tile the PDF stream, and
    /// matched blocks plus extra spans must tile the EPUB stream.
    fn assert_tiles(alignment: &Alignment, a_len: usize, b_len: usize) {
        let mut a_covered = vec![0u8; a_len];
        let mut b_covered = vec![0u8; b_len];
        for blk in &alignment.matched {
            for i in blk.a_start..blk.a_start + blk.len {
                a_covered[i] += 1;
            }
            for j in blk.b_start..blk.b_start + blk.len {
                b_covered[j] += 1;
            }
        }
        for span in &alignment.missing {
            for i in span.start..span.end {
                a_covered[i] += 1;
            }
        }
        for span in &alignment.extra {
            for j in span.start..span.end {
                b_covered[j] += 1;
            }
        }
        assert!(a_covered.iter().all(|&c| c == 1), "a not tiled exactly once");
        assert!(b_covered.iter().all(|&c| c == 1), "b not tiled exactly once");
    }

    #[test]
    fn identical_streams_fully_match() {
        let a = toks("the quick brown fox jumps over the lazy dog");
        let result = align(&a, &a);
        assert_eq!(result.matched_tokens, a.len());
        assert!(result.missing.is_empty());
        assert!(result.extra.is_empty());
        assert_eq!(result.matched.len(), 1);
        assert_tiles(&result, a.len(), a.len());
    }

    #[test]
    fn empty_pdf_is_all_extra() {
        let b = toks("some epub only content");
        let result = align(&[], &b);
        assert_eq!(result.matched_tokens, 0);
        assert!(result.missing.is_empty());
        assert_eq!(result.extra, vec![Span { start: 0, end: b.len() }]);
    }

    #[test]
    fn empty_epub_is_all_missing() {
        let a = toks("some pdf only content");
        let result = align(&a, &[]);
        assert_eq!(result.matched_tokens, 0);
        assert_eq!(result.missing, vec![Span { start: 0, end: a.len() }]);
        assert!(result.extra.is_empty());
    }

    #[test]
    fn both_empty_is_trivially_aligned() {
        let result = align(&[], &[]);
        assert_eq!(result.matched_tokens, 0);
        assert!(result.missing.is_empty() && result.extra.is_empty());
    }

    #[test]
    fn dropped_middle_run_is_one_coalesced_segment() {
        let a = toks("alpha beta gamma delta epsilon zeta eta theta");
        let b = toks("alpha beta eta theta");
        let result = align(&a, &b);
        assert_eq!(result.missing, vec![Span { start: 2, end: 6 }]);
        assert!(result.extra.is_empty());
        assert_eq!(result.matched_tokens, 4);
        assert_tiles(&result, a.len(), b.len());
    }

    #[test]
    fn inserted_run_is_one_extra_segment() {
        let a = toks("one two three four");
        let b = toks("one two ad content here three four");
        let result = align(&a, &b);
        assert!(result.missing.is_empty());
        assert_eq!(result.extra, vec![Span { start: 2, end: 5 }]);
        assert_tiles(&result, a.len(), b.len());
    }

    #[test]
    fn replacement_yields_missing_and_extra() {
        let a = toks("intro original passage outro");
        let b = toks("intro rewritten text outro");
        let result = align(&a, &b);
        assert_eq!(result.missing, vec![Span { start: 1, end: 3 }]);
        assert_eq!(result.extra, vec![Span { start: 1, end: 3 }]);
        assert_tiles(&result, a.len(), b.len());
    }

    #[test]
    fn repetitive_streams_still_tile_exactly() {
        // No unique anchors here; exercises the DP fallback.
        let a: Vec<String> = std::iter::repeat(["on", "off"])
            .take(30)
            .flatten()
            .map(String::from)
            .collect();
        let mut b = a.clone();
        b.drain(10..16);
        let result = align(&a, &b);
        assert_eq!(result.matched_tokens, b.len());
        assert_tiles(&result, a.len(), b.len());
    }

    #[test]
    fn long_similar_documents_align_near_completely() {
        // ~6000 tokens with a handful of edits; exercises anchoring.
        let mut a: Vec<String> = Vec::new();
        for i in 0..2000 {
            a.push(format!("word{i}"));
            a.push("the".into());
            a.push("and".into());
        }
        let mut b = a.clone();
        b.drain(300..330);
        b.insert(1000, "inserted".into());
        let result = align(&a, &b);
        assert_tiles(&result, a.len(), b.len());
        let missing_total: usize = result.missing.iter().map(Span::len).sum();
        assert!(missing_total >= 30 && missing_total <= 40, "missing {missing_total}");
        assert!(result.matched_tokens >= a.len() - 40);
    }

    #[test]
    fn round_trip_reconstructs_both_streams() {
        let a = toks("a b c d e f g h i j");
        let b = toks("a b x d e y z h i j k");
        let result = align(&a, &b);
        assert_tiles(&result, a.len(), b.len());
    }
}
