//! Character-bounded text splitting with boundary preference and overlap.
//!
//! The splitter walks the text in windows of at most `max_chars` characters and cuts, in order
//! of preference, after a blank-line run (paragraph boundary), after sentence-ending
//! punctuation followed by whitespace, or at the window edge when no natural boundary exists.
//! Each chunk after the first is prefixed with up to `overlap` characters duplicated from the
//! previous chunk's tail so cross-chunk context survives embedding. Concatenating the raw
//! (non-overlap) parts in `order_index` order reconstructs the source text exactly.

use crate::processing::types::{Chunk, DocumentMetadata};

/// Split text into ordered chunks, attaching a copy of the document metadata to each.
///
/// Returns an empty vector when the input is empty or all whitespace; callers treat that as a
/// no-op success, not an error.
pub fn split(
    text: &str,
    metadata: &DocumentMetadata,
    max_chars: usize,
    overlap: usize,
) -> Vec<Chunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let max_chars = max_chars.max(1);
    let overlap = overlap.min(max_chars.saturating_sub(1));
    let segments = raw_segments(text, max_chars);

    let mut chunks = Vec::with_capacity(segments.len());
    for (order_index, segment) in segments.iter().enumerate() {
        let (chunk_text, overlap_chars) = if order_index == 0 {
            (segment.to_string(), 0)
        } else {
            let prefix = tail_chars(segments[order_index - 1], overlap);
            let mut combined = String::with_capacity(prefix.len() + segment.len());
            combined.push_str(prefix);
            combined.push_str(segment);
            (combined, prefix.chars().count())
        };
        chunks.push(Chunk {
            text: chunk_text,
            order_index,
            overlap_with_previous: overlap_chars,
            metadata: metadata.clone(),
        });
    }

    chunks
}

/// Cut the text into consecutive raw segments of at most `max_chars` characters each.
fn raw_segments(text: &str, max_chars: usize) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let window_end = offset_after_chars(text, start, max_chars);
        if window_end == text.len() {
            segments.push(&text[start..]);
            break;
        }
        let cut = find_cut(text, start, window_end);
        segments.push(&text[start..cut]);
        start = cut;
    }

    segments
}

/// Pick the cut point inside `[start, window_end)`, preferring paragraph boundaries, then
/// sentence ends, then the window edge.
fn find_cut(text: &str, start: usize, window_end: usize) -> usize {
    let window = &text[start..window_end];

    if let Some(idx) = window.rfind("\n\n") {
        // Cut after the whole newline run so the blank line stays with the earlier chunk.
        let mut cut = start + idx;
        while cut < window_end && text.as_bytes()[cut] == b'\n' {
            cut += 1;
        }
        if cut > start {
            return cut;
        }
    }

    if let Some(cut) = last_sentence_end(window) {
        return start + cut;
    }

    window_end
}

/// Byte offset just past the last sentence-ending punctuation mark that is followed by
/// whitespace within the window.
fn last_sentence_end(window: &str) -> Option<usize> {
    let mut best = None;
    let mut chars = window.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        if matches!(ch, '.' | '!' | '?')
            && chars
                .peek()
                .is_some_and(|(_, next)| next.is_whitespace())
        {
            best = Some(idx + ch.len_utf8());
        }
    }
    best
}

/// Byte offset after at most `count` characters starting at byte `start`.
fn offset_after_chars(text: &str, start: usize, count: usize) -> usize {
    text[start..]
        .char_indices()
        .nth(count)
        .map(|(offset, _)| start + offset)
        .unwrap_or(text.len())
}

/// Final `count` characters of `s`, on a char boundary.
fn tail_chars(s: &str, count: usize) -> &str {
    if count == 0 {
        return "";
    }
    let total = s.chars().count();
    if total <= count {
        return s;
    }
    let (idx, _) = s
        .char_indices()
        .nth(total - count)
        .expect("tail offset within bounds for non-empty tail");
    &s[idx..]
}
