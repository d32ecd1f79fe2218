/// Splits reference documents into overlapping passages.
///
/// Headings start new sections; oversized sections are split by paragraph, and
/// oversized paragraphs at sentence boundaries. Consecutive passages of one
/// section share `overlap_chars` of text.
pub struct TextChunker {
    max_chunk_chars: usize,
    min_chunk_chars: usize,
    overlap_chars: usize,
}

pub const DEFAULT_CHUNK_CHARS: usize = 900;
pub const DEFAULT_OVERLAP_CHARS: usize = 120;

impl TextChunker {
    pub fn new(max_chunk_chars: usize, overlap_chars: usize) -> Self {
        Self {
            max_chunk_chars,
            min_chunk_chars: 20,
            overlap_chars: overlap_chars.min(max_chunk_chars / 2),
        }
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        for section in split_by_headings(text) {
            if section.len() <= self.max_chunk_chars {
                chunks.push(section);
            } else {
                chunks.extend(self.split_section(&section));
            }
        }
        merge_tiny_chunks(&mut chunks, self.min_chunk_chars);
        chunks
    }

    fn split_section(&self, section: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut has_new_text = false;

        for para in section.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
            if current.len() + para.len() > self.max_chunk_chars && has_new_text {
                chunks.push(current.trim().to_string());
                current = format!("{}\n\n", tail(current.trim_end(), self.overlap_chars));
                has_new_text = false;
            }

            if para.len() > self.max_chunk_chars {
                if has_new_text {
                    chunks.push(current.trim().to_string());
                }
                chunks.extend(self.split_long_paragraph(para));
                current.clear();
                has_new_text = false;
            } else {
                current.push_str(para);
                current.push_str("\n\n");
                has_new_text = true;
            }
        }

        if has_new_text {
            chunks.push(current.trim().to_string());
        }
        chunks
    }

    fn split_long_paragraph(&self, para: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < para.len() {
            let end = floor_char_boundary(para, (start + self.max_chunk_chars).min(para.len()));

            // Prefer a sentence break in the last fifth of the window.
            let break_at = if end < para.len() {
                let search_start = floor_char_boundary(para, start + self.max_chunk_chars * 4 / 5);
                para[search_start..end]
                    .rfind(". ")
                    .map(|pos| search_start + pos + 2)
                    .unwrap_or(end)
            } else {
                end
            };

            if break_at <= start {
                break;
            }
            let piece = para[start..break_at].trim();
            if !piece.is_empty() {
                chunks.push(piece.to_string());
            }
            if break_at >= para.len() {
                break;
            }

            let next = floor_char_boundary(para, break_at.saturating_sub(self.overlap_chars));
            start = if next > start { next } else { break_at };
        }
        chunks
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_CHARS, DEFAULT_OVERLAP_CHARS)
    }
}

/// Sections begin at Markdown headings; the heading line stays with its section.
fn split_by_headings(text: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if line.starts_with('#') && !current.trim().is_empty() {
            sections.push(current.trim().to_string());
            current.clear();
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.trim().is_empty() {
        sections.push(current.trim().to_string());
    }
    sections
}

fn merge_tiny_chunks(chunks: &mut Vec<String>, min_chars: usize) {
    let mut i = 0;
    while i < chunks.len() {
        if chunks[i].len() < min_chars && i + 1 < chunks.len() {
            let next = chunks.remove(i + 1);
            chunks[i].push_str("\n\n");
            chunks[i].push_str(&next);
        } else {
            i += 1;
        }
    }
}

/// Last `n` bytes of `s`, widened to a char boundary.
fn tail(s: &str, n: usize) -> &str {
    if s.len() <= n {
        return s;
    }
    let mut start = s.len() - n;
    while !s.is_char_boundary(start) {
        start -= 1;
    }
    &s[start..]
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_follow_headings() {
        let md = "# Hypertension\n\nHigh blood pressure, often without symptoms.\n\n## Treatment\n\nLifestyle changes and medication such as ACE inhibitors.";
        let chunks = TextChunker::default().chunk(md);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].starts_with("# Hypertension"));
        assert!(chunks[1].starts_with("## Treatment"));
    }

    #[test]
    fn long_sections_respect_size_with_overlap() {
        let para = "Asthma is a chronic condition of the airways. ".repeat(12);
        let doc = vec![para.trim(); 6].join("\n\n");
        let chunks = TextChunker::default().chunk(&doc);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(
                chunk.len() <= DEFAULT_CHUNK_CHARS + DEFAULT_OVERLAP_CHARS,
                "chunk too large: {}",
                chunk.len()
            );
        }
    }

    #[test]
    fn very_long_paragraph_breaks_at_sentences() {
        let para = "Insulin helps glucose enter cells. ".repeat(80);
        let chunks = TextChunker::default().chunk(&para);
        assert!(chunks.len() >= 3);
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.len() <= DEFAULT_CHUNK_CHARS);
            assert!(chunk.ends_with('.'), "chunk does not end at a sentence: {chunk:?}");
        }
    }

    #[test]
    fn consecutive_paragraph_chunks_overlap() {
        let para = "x".repeat(500);
        let doc = [para.as_str(), para.as_str(), para.as_str()].join("\n\n");
        let chunks = TextChunker::default().chunk(&doc);
        assert!(chunks.len() >= 2);
        let carried = tail(&chunks[0], DEFAULT_OVERLAP_CHARS);
        assert!(chunks[1].starts_with(carried.trim()));
    }

    #[test]
    fn multibyte_text_never_splits_a_char() {
        let para = "Ménière’s disease affects the inner ear — vertigo, tinnitus. ".repeat(40);
        let chunks = TextChunker::default().chunk(&para);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= DEFAULT_CHUNK_CHARS));
    }

    #[test]
    fn tiny_sections_merged() {
        let md = "# A\n\nShort.\n\n# B\n\nThis section is long enough to stand on its own as a chunk.";
        let chunks = TextChunker::default().chunk(md);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("Short.") && chunks[0].contains("long enough"));
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(TextChunker::default().chunk("").is_empty());
        assert!(TextChunker::default().chunk("\n\n  \n").is_empty());
    }
}
