//! Character-window chunker with sentence-aware cut points.
//!
//! Offsets are counted in characters (not bytes) so French accented text
//! never splits inside a UTF-8 sequence.

use triage_core::error::{Error, Result};
use triage_core::types::{Chunk, Document};

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Window size in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks. Must stay below
    /// `chunk_size`.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
        }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 || overlap >= chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunking requires 0 < overlap < chunk_size, got chunk_size={chunk_size} overlap={overlap}"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }
}

/// Content-derived chunk identifier, stable across re-ingestion of the same
/// source text.
fn chunk_id(doc: &Document, chunk_index: usize, text: &str) -> String {
    let seed = format!(
        "{}:{}:{}:{}",
        doc.meta.source,
        doc.meta.page.unwrap_or(0),
        chunk_index,
        text
    );
    blake3::hash(seed.as_bytes()).to_hex()[..16].to_string()
}

/// Find the last sentence-terminal cut point in `[floor, end)`, scanning
/// backward. A cut point is the position just after a newline, or just
/// after `.`/`?`/`!` followed by a space (or end of text).
fn sentence_break(chars: &[char], floor: usize, end: usize) -> Option<usize> {
    let mut j = end;
    while j > floor {
        j -= 1;
        let c = chars[j];
        if c == '\n' {
            return Some(j + 1);
        }
        if matches!(c, '.' | '?' | '!') {
            let followed_by_space = chars.get(j + 1).map_or(true, |&n| n == ' ');
            if followed_by_space {
                return Some(j + 1);
            }
        }
    }
    None
}

/// Split one document into bounded, overlapping chunks.
///
/// A document no longer than `chunk_size` becomes a single chunk with
/// `is_chunked = false`. Longer documents are cut on a sliding window,
/// preferring a sentence boundary in the upper half of each window so
/// sentences are not severed. Empty chunks are never emitted and
/// `chunk_index` strictly increases.
pub fn chunk_document(doc: &Document, cfg: &ChunkingConfig) -> Vec<Chunk> {
    let chars: Vec<char> = doc.text.chars().collect();
    let len = chars.len();

    if len <= cfg.chunk_size {
        let trimmed = doc.text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        return vec![Chunk {
            id: chunk_id(doc, 0, trimmed),
            text: trimmed.to_string(),
            meta: doc.meta.clone(),
            chunk_index: 0,
            start_char: 0,
            end_char: len,
            is_chunked: false,
        }];
    }

    let mut chunks = Vec::new();
    let mut chunk_index = 0usize;
    let mut start = 0usize;

    while start < len {
        let mut end = (start + cfg.chunk_size).min(len);
        if end < len {
            // The floor stays above start + overlap so the next window
            // always advances, even with a large overlap.
            let floor = start + (cfg.chunk_size / 2).max(cfg.overlap + 1);
            if let Some(cut) = sentence_break(&chars, floor, end) {
                end = cut;
            }
        }

        let raw: String = chars[start..end].iter().collect();
        let piece = raw.trim();
        if !piece.is_empty() {
            chunks.push(Chunk {
                id: chunk_id(doc, chunk_index, piece),
                text: piece.to_string(),
                meta: doc.meta.clone(),
                chunk_index,
                start_char: start,
                end_char: end,
                is_chunked: true,
            });
            chunk_index += 1;
        }

        if end >= len {
            break;
        }
        start = end - cfg.overlap;
        // Stops a near-duplicate trailing chunk (and the degenerate loop
        // when a natural break lands close to the previous start).
        if start >= len - cfg.overlap {
            break;
        }
    }

    chunks
}

pub fn chunk_documents(docs: &[Document], cfg: &ChunkingConfig) -> Vec<Chunk> {
    docs.iter().flat_map(|d| chunk_document(d, cfg)).collect()
}
