//! Paragraph-boundary text chunker.
//!
//! Splits extracted filing text into [`TextChunk`]s that respect a
//! `max_tokens` limit. Splitting happens on paragraph boundaries (`\n\n`)
//! so a chunk rarely cuts through a table row or a sentence; oversized
//! paragraphs are hard-split on the last newline or space before the limit.

/// Approximate chars-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub index: i64,
    pub text: String,
}

/// Split text into chunks on paragraph boundaries, respecting max_tokens.
/// Returns chunks with contiguous indices starting at 0, or none for
/// blank text.
pub fn chunk_text(text: &str, max_tokens: usize) -> Vec<TextChunk> {
    let max_chars = max_tokens.max(1) * CHARS_PER_TOKEN;
    let normalized = text.replace("\r\n", "\n");

    let mut chunks = Vec::new();
    let mut current_buf = String::new();

    for para in normalized.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        let would_be = if current_buf.is_empty() {
            trimmed.len()
        } else {
            current_buf.len() + 2 + trimmed.len()
        };

        if would_be > max_chars && !current_buf.is_empty() {
            push_chunk(&mut chunks, &current_buf);
            current_buf.clear();
        }

        if trimmed.len() > max_chars {
            let mut remaining = trimmed;
            while !remaining.is_empty() {
                let split_at = floor_char_boundary(remaining, max_chars);
                let actual_split = if split_at < remaining.len() {
                    remaining[..split_at]
                        .rfind('\n')
                        .or_else(|| remaining[..split_at].rfind(' '))
                        .map(|pos| pos + 1)
                        .unwrap_or(split_at)
                } else {
                    split_at
                };
                push_chunk(&mut chunks, remaining[..actual_split].trim());
                remaining = &remaining[actual_split..];
            }
        } else {
            if !current_buf.is_empty() {
                current_buf.push_str("\n\n");
            }
            current_buf.push_str(trimmed);
        }
    }

    if !current_buf.is_empty() {
        push_chunk(&mut chunks, &current_buf);
    }

    chunks
}

fn push_chunk(chunks: &mut Vec<TextChunk>, text: &str) {
    if text.is_empty() {
        return;
    }
    chunks.push(TextChunk {
        index: chunks.len() as i64,
        text: text.to_string(),
    });
}

/// Largest byte index `<= max` that lies on a char boundary, and at least
/// one full character so progress is always made.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    let mut idx = max;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    if idx == 0 {
        s.chars().next().map(|c| c.len_utf8()).unwrap_or(s.len())
    } else {
        idx
    }
}
