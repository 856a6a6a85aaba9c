
use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

/// Sentence terminator followed by whitespace; the break lands after the whitespace
static SENTENCE_BOUNDARY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?<=[.!?])\s+").expect("regex is valid"));

/// A contiguous segment of a document, ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// The chunk text, an exact slice of the source document
    pub content: String,
    /// Position of this chunk within the document
    pub chunk_index: usize,
    /// Byte offset of the first character in the source document
    pub start: usize,
    /// Byte offset one past the last character in the source document
    pub end: usize,
}

impl TextChunk {
    /// Number of characters in the chunk
    #[inline]
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Configuration for text chunking, measured in characters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length
    pub chunk_size: usize,
    /// Number of trailing characters of a chunk repeated at the start of the next one
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Break priority, strongest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Breakpoint {
    Paragraph,
    Line,
    Sentence,
    Word,
}

/// Split document text into ordered, overlapping chunks.
///
/// Every chunk holds at most `chunk_size` characters and consecutive chunks share at
/// most `chunk_overlap` characters, so stitching the chunks back together with the
/// shared prefix removed reproduces the input. Cuts prefer paragraph, line, sentence
/// and word boundaries, in that order, before falling back to a hard cut.
///
/// Text that is empty or only whitespace yields no chunks.
#[inline]
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<TextChunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let chunk_size = config.chunk_size.max(1);
    let overlap = config.chunk_overlap.min(chunk_size - 1);

    // Byte offset of every char boundary, including the end of the text
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = boundaries.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let hard_end = (start + chunk_size).min(char_count);
        if hard_end == char_count {
            chunks.push(make_chunk(text, &boundaries, start, char_count, chunks.len()));
            break;
        }

        // The cut must leave room for the overlap and still make progress
        let min_end = start + (overlap + 1).max(chunk_size / 2);
        let end = find_breakpoint(text, &boundaries, min_end, hard_end).unwrap_or(hard_end);
        chunks.push(make_chunk(text, &boundaries, start, end, chunks.len()));

        start = overlap_start(text, &boundaries, end - overlap, end);
    }

    debug!(
        "Chunked {} characters into {} chunks (size {}, overlap {})",
        char_count,
        chunks.len(),
        chunk_size,
        overlap
    );

    chunks
}

fn make_chunk(
    text: &str,
    boundaries: &[usize],
    start: usize,
    end: usize,
    chunk_index: usize,
) -> TextChunk {
    let (start_byte, end_byte) = (boundaries[start], boundaries[end]);
    TextChunk {
        content: text[start_byte..end_byte].to_string(),
        chunk_index,
        start: start_byte,
        end: end_byte,
    }
}

/// Find the latest, strongest break in `(min_end, hard_end]`, as a char position
fn find_breakpoint(
    text: &str,
    boundaries: &[usize],
    min_end: usize,
    hard_end: usize,
) -> Option<usize> {
    if min_end >= hard_end {
        return None;
    }

    let window_start = boundaries[min_end];
    let window = &text[window_start..boundaries[hard_end]];

    let mut best: Option<(Breakpoint, usize)> = None;
    let mut consider = |kind: Breakpoint, byte_end: usize| {
        if byte_end == 0 || byte_end > window.len() {
            return;
        }
        let replace = best.is_none_or(|(best_kind, best_end)| {
            kind < best_kind || (kind == best_kind && byte_end > best_end)
        });
        if replace {
            best = Some((kind, byte_end));
        }
    };

    for (offset, _) in window.match_indices("\n\n") {
        consider(Breakpoint::Paragraph, offset + 2);
    }
    for (offset, _) in window.match_indices('\n') {
        consider(Breakpoint::Line, offset + 1);
    }
    for found in SENTENCE_BOUNDARY_REGEX.find_iter(window).flatten() {
        consider(Breakpoint::Sentence, found.end());
    }
    for (offset, ch) in window.char_indices() {
        if ch.is_whitespace() {
            consider(Breakpoint::Word, offset + ch.len_utf8());
        }
    }

    let (_, byte_end) = best?;
    boundaries
        .binary_search(&(window_start + byte_end))
        .ok()
        .filter(|&pos| pos > min_end && pos <= hard_end)
}

/// Start of the next chunk: the first word boundary inside the overlap region
fn overlap_start(text: &str, boundaries: &[usize], from: usize, end: usize) -> usize {
    (from..end)
        .find(|&pos| {
            pos > 0
                && text[boundaries[pos - 1]..boundaries[pos]]
                    .chars()
                    .all(char::is_whitespace)
        })
        .unwrap_or(from)
}
