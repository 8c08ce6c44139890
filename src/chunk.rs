//! Boundary-aware text chunker.
//!
//! Splits normalized document text into overlapping spans that respect a
//! character budget. Each chunk ends at the strongest separator available in
//! the back half of its window (paragraph break, line break, sentence end,
//! clause break, word break, in that order), and the next chunk starts a
//! fixed overlap before that split so context survives the cut.
//!
//! When the separator pass yields nothing usable, [`chunk_text`] falls back
//! to fixed windows with a whitespace breakpoint search. Output is degraded
//! but still within budget, deterministic, and aligned to char boundaries.

/// Split budgets, taken from `[chunking]` config.
#[derive(Debug, Clone, Copy)]
pub struct ChunkParams {
    /// Upper bound on chunk length, in chars.
    pub max_chars: usize,
    /// Chars of trailing context repeated at the start of the next chunk.
    pub overlap_chars: usize,
    /// Chunks shorter than this after trimming are discarded.
    pub min_chars: usize,
    /// Skip the separator pass and window directly.
    pub force_window: bool,
}

impl Default for ChunkParams {
    fn default() -> Self {
        ChunkParams {
            max_chars: 1500,
            overlap_chars: 200,
            min_chars: 50,
            force_window: false,
        }
    }
}

/// One chunk of the input, with its byte offset in the source text.
///
/// The offset points at the first kept (post-trim) character and is used for
/// proportional page attribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpan {
    pub offset: usize,
    pub text: String,
}

/// Split points tried within each window, strongest first.
const SEPARATORS: &[&str] = &["\n\n\n", "\n\n", "\n", ". ", ", ", " "];

/// Chunk `text` into overlapping spans.
///
/// Deterministic: the same text and params always produce the same spans.
/// Returns an empty vec for text with no content worth keeping.
pub fn chunk_text(text: &str, params: &ChunkParams) -> Vec<ChunkSpan> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    if !params.force_window {
        let spans = separator_spans(text, params);
        let over_budget = spans
            .iter()
            .any(|s| s.text.chars().count() > params.max_chars);
        if !spans.is_empty() && !over_budget {
            return spans;
        }
    }
    window_spans(text, params)
}

/// Primary pass: walk forward, ending each chunk at the strongest separator
/// in the back half of the current window.
fn separator_spans(text: &str, params: &ChunkParams) -> Vec<ChunkSpan> {
    // offs[i] is the byte offset of char i; offs[n] is text.len().
    let offs: Vec<usize> = text
        .char_indices()
        .map(|(b, _)| b)
        .chain(std::iter::once(text.len()))
        .collect();
    let n = offs.len() - 1;

    let mut spans = Vec::new();
    let mut start = 0usize;
    while start < n {
        if n - start <= params.max_chars {
            push_span(&mut spans, text, offs[start], offs[n], params.min_chars);
            break;
        }

        let window_end = start + params.max_chars;
        let search_lo = start + params.max_chars / 2;
        let window = &text[offs[search_lo]..offs[window_end]];

        let mut split_byte = None;
        for sep in SEPARATORS {
            if let Some(rel) = window.rfind(sep) {
                split_byte = Some(offs[search_lo] + rel + sep.len());
                break;
            }
        }

        let split = match split_byte {
            Some(b) => char_index_of(&offs, b),
            None => window_end,
        };
        push_span(&mut spans, text, offs[start], offs[split], params.min_chars);

        let back = split.saturating_sub(params.overlap_chars);
        start = if back > start { back } else { split };
    }
    spans
}

/// Fallback pass: fixed stride of `max - overlap`, breaking at the last
/// whitespace in the trailing tenth of each window when one exists.
fn window_spans(text: &str, params: &ChunkParams) -> Vec<ChunkSpan> {
    let offs: Vec<usize> = text
        .char_indices()
        .map(|(b, _)| b)
        .chain(std::iter::once(text.len()))
        .collect();
    let n = offs.len() - 1;

    let mut spans = Vec::new();
    let mut start = 0usize;
    while start < n {
        if n - start <= params.max_chars {
            push_span(&mut spans, text, offs[start], offs[n], params.min_chars);
            break;
        }

        let window_end = start + params.max_chars;
        let tail_lo = window_end - params.max_chars / 10;
        let tail = &text[offs[tail_lo]..offs[window_end]];
        let split = match tail.rfind(char::is_whitespace) {
            Some(rel) => char_index_of(&offs, offs[tail_lo] + rel) + 1,
            None => window_end,
        };
        push_span(&mut spans, text, offs[start], offs[split], params.min_chars);

        let back = split.saturating_sub(params.overlap_chars);
        start = if back > start { back } else { split };
    }
    spans
}

/// Char index whose byte offset is `byte`. `offs` is sorted and complete,
/// and `byte` always comes from a match inside the same text.
fn char_index_of(offs: &[usize], byte: usize) -> usize {
    match offs.binary_search(&byte) {
        Ok(i) => i,
        Err(i) => i,
    }
}

fn push_span(spans: &mut Vec<ChunkSpan>, text: &str, lo: usize, hi: usize, min_chars: usize) {
    let raw = &text[lo..hi];
    let trimmed = raw.trim();
    if trimmed.chars().count() < min_chars {
        return;
    }
    let lead = raw.len() - raw.trim_start().len();
    spans.push(ChunkSpan {
        offset: lo + lead,
        text: trimmed.to_string(),
    });
}

/// Proportional page attribution: map a chunk's byte offset to a 1-based
/// page number given the document's total byte length and page count.
pub fn page_for_offset(offset: usize, total_bytes: usize, page_count: i64) -> Option<i64> {
    if page_count <= 0 || total_bytes == 0 {
        return None;
    }
    let page = 1 + (offset as i64 * page_count) / total_bytes as i64;
    Some(page.min(page_count))
}
