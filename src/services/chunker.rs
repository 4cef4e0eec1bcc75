pub const DEFAULT_MAX_CHUNK_CHARS: usize = 1200;
pub const DEFAULT_CHUNK_OVERLAP_CHARS: usize = 150;

/// Split plain text into length-bounded chunks on paragraph boundaries,
/// carrying a short overlap from the tail of each chunk into the next so
/// sentences that straddle a boundary stay retrievable.
pub fn chunk_text(text: &str, max_chars: usize, overlap_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let overlap_chars = overlap_chars.min(max_chars / 2);

    let mut pieces: Vec<String> = Vec::new();
    for paragraph in text.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        if paragraph.chars().count() <= max_chars {
            pieces.push(paragraph.to_string());
        } else {
            pieces.extend(split_long_paragraph(paragraph, max_chars));
        }
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    for piece in pieces {
        let current_len = current.chars().count();
        let piece_len = piece.chars().count();
        if current_len > 0 && current_len + piece_len + 2 > max_chars {
            let tail = overlap_tail(&current, overlap_chars);
            chunks.push(std::mem::take(&mut current));
            if !tail.is_empty() {
                current.push_str(&tail);
                current.push('\n');
                current.push('\n');
            }
        }
        if !current.is_empty() {
            current.push('\n');
            current.push('\n');
        }
        current.push_str(&piece);
    }
    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks
}

fn split_long_paragraph(paragraph: &str, max_chars: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    for word in paragraph.split_whitespace() {
        let word_len = word.chars().count();
        if word_len > max_chars {
            if current_len > 0 {
                parts.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let symbols: Vec<char> = word.chars().collect();
            for piece in symbols.chunks(max_chars) {
                parts.push(piece.iter().collect());
            }
            continue;
        }
        if current_len > 0 && current_len + word_len + 1 > max_chars {
            parts.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

fn overlap_tail(chunk: &str, overlap_chars: usize) -> String {
    if overlap_chars == 0 {
        return String::new();
    }
    let words: Vec<&str> = chunk.split_whitespace().collect();
    let mut taken: Vec<&str> = Vec::new();
    let mut total = 0usize;
    for word in words.iter().rev() {
        let word_len = word.chars().count() + 1;
        if total + word_len > overlap_chars {
            break;
        }
        taken.push(word);
        total += word_len;
    }
    taken.reverse();
    taken.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunk_text("A short paragraph.", 1200, 150);
        assert_eq!(chunks, vec!["A short paragraph.".to_string()]);
    }

    #[test]
    fn respects_paragraph_boundaries() {
        let text = format!("{}\n\n{}", "a".repeat(700), "b".repeat(700));
        let chunks = chunk_text(&text, 1200, 0);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].contains('a'));
        assert!(chunks[1].contains('b'));
    }

    #[test]
    fn splits_oversized_paragraphs() {
        let word = "word ";
        let text = word.repeat(600);
        let chunks = chunk_text(&text, 300, 0);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 300);
        }
    }

    #[test]
    fn overlap_carries_tail_words() {
        let text = format!("{}\n\n{}", "alpha beta gamma delta", "x".repeat(1500));
        let chunks = chunk_text(&text, 1200, 30);
        assert!(chunks.len() >= 2);
        assert!(chunks[1].starts_with("alpha beta gamma delta") || chunks[1].contains("delta"));
    }

    #[test]
    fn empty_input_gives_no_chunks() {
        assert!(chunk_text("", 1200, 150).is_empty());
        assert!(chunk_text("  \n\n  ", 1200, 150).is_empty());
    }
}
