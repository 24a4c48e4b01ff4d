//! Deterministic paragraph-boundary chunker.
//!
//! Splits extracted pages into [`ChunkRecord`]s bounded by a configurable
//! character budget, with optional overlap carried between consecutive
//! chunks. Splitting prefers paragraph boundaries (`\n\n`); paragraphs
//! larger than the budget are hard-split at the nearest space or newline.
//!
//! Chunking is a pure function of the input text and configuration:
//! re-chunking identical text yields byte-identical chunks with identical
//! ordinals, which is what makes document replacement idempotent.

use crate::config::ChunkingConfig;
use crate::models::{ChunkRecord, Page};

/// Chunk all pages of one document. Ordinals are contiguous from 0 across
/// page boundaries; each chunk records the page it starts on.
pub fn chunk_pages(doc_key: &str, pages: &[Page], cfg: &ChunkingConfig) -> Vec<ChunkRecord> {
    let mut chunks = Vec::new();
    for page in pages {
        for text in split_text(&page.text, cfg.max_chars, cfg.overlap_chars) {
            chunks.push(ChunkRecord {
                doc_key: doc_key.to_string(),
                ordinal: chunks.len() as i64,
                page: page.number,
                text,
            });
        }
    }
    chunks
}

/// Split one page's text into pieces of at most `max_chars` characters,
/// seeding each piece after the first with up to `overlap_chars` from the
/// tail of its predecessor.
fn split_text(text: &str, max_chars: usize, overlap_chars: usize) -> Vec<String> {
    let mut pieces: Vec<String> = Vec::new();
    let mut buf = String::new();
    // Whether buf holds anything beyond the overlap seed.
    let mut has_new = false;

    let flush = |buf: &mut String, has_new: &mut bool, pieces: &mut Vec<String>| {
        if *has_new && !buf.is_empty() {
            pieces.push(std::mem::take(buf));
        } else {
            buf.clear();
        }
        if overlap_chars > 0 {
            if let Some(last) = pieces.last() {
                *buf = overlap_tail(last, overlap_chars);
            }
        }
        *has_new = false;
    };

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }
        let para_chars = trimmed.chars().count();

        if para_chars > max_chars {
            flush(&mut buf, &mut has_new, &mut pieces);
            buf.clear();
            for piece in hard_split(trimmed, max_chars) {
                pieces.push(piece);
            }
            if overlap_chars > 0 {
                if let Some(last) = pieces.last() {
                    buf = overlap_tail(last, overlap_chars);
                }
            }
            continue;
        }

        let would_be = if buf.is_empty() {
            para_chars
        } else {
            buf.chars().count() + 2 + para_chars
        };
        if would_be > max_chars {
            flush(&mut buf, &mut has_new, &mut pieces);
            // The seed alone may still not leave room for this paragraph.
            if !buf.is_empty() && buf.chars().count() + 2 + para_chars > max_chars {
                buf.clear();
            }
        }

        if !buf.is_empty() {
            buf.push_str("\n\n");
        }
        buf.push_str(trimmed);
        has_new = true;
    }

    if has_new && !buf.is_empty() {
        pieces.push(buf);
    }

    pieces
}

/// Hard-split an oversized paragraph into pieces of at most `max_chars`,
/// preferring space/newline boundaries. Best-effort: a run of `max_chars`
/// characters with no whitespace is cut mid-word.
fn hard_split(text: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        let limit = byte_index_of_char(remaining, max_chars);
        let cut = if limit < remaining.len() {
            remaining[..limit]
                .rfind(['\n', ' '])
                .map(|pos| pos + 1)
                .unwrap_or(limit)
        } else {
            limit
        };
        // Guard against a zero-width cut when the budget is smaller than
        // the first character.
        let cut = if cut == 0 {
            remaining
                .chars()
                .next()
                .map(|c| c.len_utf8())
                .unwrap_or(remaining.len())
        } else {
            cut
        };

        let piece = remaining[..cut].trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }
        remaining = &remaining[cut..];
    }

    pieces
}

/// Tail of `s` of at most `n` characters, aligned to a word start. Returns
/// an empty string when the tail would cover all of `s` (overlapping an
/// entire chunk into the next would only duplicate it).
fn overlap_tail(s: &str, n: usize) -> String {
    if n == 0 {
        return String::new();
    }
    let total = s.chars().count();
    if total <= n {
        return String::new();
    }
    let tail = &s[byte_index_of_char(s, total - n)..];
    match tail.find([' ', '\n']) {
        Some(pos) => tail[pos..].trim_start().to_string(),
        None => tail.to_string(),
    }
}

/// Byte index of the `n`-th character, or the full length when `s` has
/// fewer than `n` characters.
fn byte_index_of_char(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}
