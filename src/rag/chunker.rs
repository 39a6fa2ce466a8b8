#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    pub chunk_index: usize,
}

/// Preferred split points, strongest first.
const BREAKS: [&str; 7] = ["\n\n", "\n", ". ", "? ", "! ", "; ", " "];

/// Splits `text` into windows of at most `max_chars` characters, each starting
/// `overlap` characters before the previous one ended. Sizes are counted in
/// chars so Vietnamese diacritics never split a code point.
pub fn chunk_text(text: &str, max_chars: usize, overlap: usize) -> Vec<TextChunk> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let max_chars = max_chars.max(1);
    let overlap = overlap.min(max_chars - 1);
    let offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let total = offsets.len();
    let byte_at = |idx: usize| offsets.get(idx).copied().unwrap_or(text.len());

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < total {
        let limit = (start + max_chars).min(total);
        let end = if limit < total {
            let cut = find_break_point(text, byte_at(start), byte_at(limit));
            offsets.partition_point(|&b| b < cut)
        } else {
            limit
        };

        let piece = text[byte_at(start)..byte_at(end)].trim();
        if !piece.is_empty() {
            chunks.push(TextChunk {
                text: piece.to_string(),
                chunk_index: chunks.len(),
            });
        }

        if end >= total {
            break;
        }
        let next = end.saturating_sub(overlap);
        start = if next <= start { end } else { next };
    }

    chunks
}

fn find_break_point(text: &str, start: usize, max_end: usize) -> usize {
    let segment = &text[start..max_end];
    BREAKS
        .iter()
        .find_map(|sep| segment.rfind(sep).map(|pos| start + pos + sep.len()))
        .unwrap_or(max_end)
}
