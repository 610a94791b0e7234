//! Sentence-packing text splitter for syllabus documents

use crate::types::TextChunk;
use sha2::{Digest, Sha256};

pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
        }
    }

    /// Split `text` into chunks of at most `chunk_size` bytes.
    ///
    /// Whole sentences are packed greedily; a sentence that alone exceeds the
    /// limit is cut into windows that share `overlap` bytes.
    pub fn split(&self, pdf_id: &str, text: &str) -> Vec<TextChunk> {
        let mut pieces: Vec<String> = Vec::new();
        let mut current = String::new();

        for sentence in split_sentences(text) {
            if sentence.len() > self.chunk_size {
                if !current.is_empty() {
                    pieces.push(std::mem::take(&mut current));
                }
                pieces.extend(self.split_long(&sentence).into_iter().map(str::to_string));
                continue;
            }

            if !current.is_empty() && current.len() + 1 + sentence.len() > self.chunk_size {
                pieces.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&sentence);
        }
        if !current.is_empty() {
            pieces.push(current);
        }

        pieces
            .into_iter()
            .enumerate()
            .map(|(chunk_index, content)| make_chunk(pdf_id, chunk_index, content))
            .collect()
    }

    fn split_long<'a>(&self, content: &'a str) -> Vec<&'a str> {
        let mut windows = Vec::new();
        let content_len = content.len();

        let mut byte_pos = 0;
        while byte_pos < content_len {
            let target_end = (byte_pos + self.chunk_size).min(content_len);

            let mut end_pos = target_end;
            while end_pos > byte_pos && !content.is_char_boundary(end_pos) {
                end_pos -= 1;
            }

            if end_pos == byte_pos {
                end_pos = byte_pos + 1;
                while end_pos < content_len && !content.is_char_boundary(end_pos) {
                    end_pos += 1;
                }
            }

            windows.push(&content[byte_pos..end_pos]);

            if end_pos >= content_len {
                break;
            }

            byte_pos = if self.overlap > 0 && end_pos > self.overlap {
                let mut safe_start = end_pos - self.overlap;
                while safe_start < content_len && !content.is_char_boundary(safe_start) {
                    safe_start += 1;
                }
                if safe_start > byte_pos {
                    safe_start
                } else {
                    next_char_boundary(content, byte_pos)
                }
            } else {
                end_pos
            };
        }

        windows
    }
}

fn next_char_boundary(content: &str, pos: usize) -> usize {
    let mut next = pos + 1;
    while next < content.len() && !content.is_char_boundary(next) {
        next += 1;
    }
    next
}

fn make_chunk(pdf_id: &str, chunk_index: usize, content: String) -> TextChunk {
    let hash = format!("{:x}", Sha256::digest(content.as_bytes()));

    let mut hasher = Sha256::new();
    hasher.update(pdf_id.as_bytes());
    hasher.update(b":");
    hasher.update(chunk_index.to_string().as_bytes());
    hasher.update(b":");
    hasher.update(hash.as_bytes());
    let id = format!("{:x}", hasher.finalize());

    TextChunk {
        id,
        pdf_id: pdf_id.to_string(),
        content,
        chunk_index,
        hash,
    }
}

/// Sentences with whitespace collapsed. Blank lines always end a sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();

    for paragraph in paragraphs(text) {
        let normalized = paragraph.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut start = 0;
        let mut chars = normalized.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            let at_boundary = matches!(c, '.' | '!' | '?')
                && chars.peek().map(|&(_, next)| next == ' ').unwrap_or(false);
            if at_boundary {
                let end = i + c.len_utf8();
                push_trimmed(&mut sentences, &normalized[start..end]);
                start = end;
            }
        }
        push_trimmed(&mut sentences, &normalized[start..]);
    }

    sentences
}

/// Runs of non-blank lines. A line holding only whitespace ends a paragraph.
fn paragraphs(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        out.push(current.join(" "));
    }

    out
}

fn push_trimmed(out: &mut Vec<String>, s: &str) {
    let s = s.trim();
    if !s.is_empty() {
        out.push(s.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentence_splitting() {
        let text = "Welcome to CS 350.  Office hours are Monday!\nLabs   start week 2?\n\nGrading\nis curved";
        let sentences = split_sentences(text);
        assert_eq!(
            sentences,
            vec![
                "Welcome to CS 350.",
                "Office hours are Monday!",
                "Labs start week 2?",
                "Grading is curved",
            ]
        );
    }

    #[test]
    fn test_blank_lines_with_crlf_or_spaces_end_sentences() {
        let text = "Grading is curved\r\n\r\nLabs are weekly\n  \t\nNo late work";
        assert_eq!(
            split_sentences(text),
            vec!["Grading is curved", "Labs are weekly", "No late work"]
        );
    }

    #[test]
    fn test_decimal_points_do_not_split() {
        let sentences = split_sentences("Version 2.5 is required. Done");
        assert_eq!(sentences, vec!["Version 2.5 is required.", "Done"]);
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunker = TextChunker::new(1000, 200);
        let chunks = chunker.split("pdf1", "Exam one. Exam two.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Exam one. Exam two.");
        assert_eq!(chunks[0].pdf_id, "pdf1");
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[test]
    fn test_packing_respects_limit() {
        let chunker = TextChunker::new(40, 5);
        let text = "The midterm is in week eight. The final is cumulative. Homework is due Fridays.";
        let chunks = chunker.split("pdf1", text);

        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.content.len() <= 40));
        assert_eq!(chunks[1].content, "The final is cumulative.");
    }

    #[test]
    fn test_long_sentence_windows_overlap() {
        let chunker = TextChunker::new(10, 3);
        let chunks = chunker.split("pdf1", "abcdefghijklmnopqrstuvwxyz");

        assert_eq!(chunks[0].content, "abcdefghij");
        assert_eq!(chunks[1].content, "hijklmnopq");
        assert!(chunks.iter().all(|c| c.content.len() <= 10));
        assert!(chunks.last().unwrap().content.ends_with('z'));
    }

    #[test]
    fn test_multibyte_text_is_cut_on_char_boundaries() {
        let chunker = TextChunker::new(5, 2);
        let chunks = chunker.split("pdf1", "ééééééééé");
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.content.chars().all(|ch| ch == 'é')));
    }

    #[test]
    fn test_wide_overlap_on_multibyte_text() {
        let text = "éééééééééé";
        let chunker = TextChunker::new(5, 4);
        let chunks = chunker.split("pdf1", text);

        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.content.len() <= 5));
        assert!(chunks.iter().all(|c| c.content.chars().all(|ch| ch == 'é')));
        assert!(chunks.last().unwrap().content.ends_with('é'));

        let chunks = TextChunker::new(7, 6).split("pdf1", "añbñcñdñeñfñgñ");
        assert!(chunks.last().unwrap().content.ends_with('ñ'));
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        let chunker = TextChunker::new(100, 10);
        assert!(chunker.split("pdf1", "  \n\n \t").is_empty());
    }

    #[test]
    fn test_ids_are_stable_and_scoped_to_pdf() {
        let chunker = TextChunker::new(100, 10);
        let a = chunker.split("pdf1", "Same text.");
        let b = chunker.split("pdf1", "Same text.");
        let c = chunker.split("pdf2", "Same text.");

        assert_eq!(a[0].id, b[0].id);
        assert_ne!(a[0].id, c[0].id);
        assert_eq!(a[0].hash, c[0].hash);
    }
}
