//! Plain text chunking with sentence-aligned windows and overlap.

use super::{char_len, single_chunk};

/// Sliding-window chunker that prefers to cut after a sentence terminator
#[derive(Debug, Clone)]
pub struct TextChunker {
    max_size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Create a chunker producing windows of at most `max_size` characters,
    /// repeating `overlap` characters between consecutive windows
    pub fn new(max_size: usize, overlap: usize) -> Self {
        Self {
            max_size: max_size.max(1),
            overlap,
        }
    }

    /// Chunk plain text into sentence-aligned windows
    #[must_use]
    pub fn chunk(&self, content: &str) -> Vec<String> {
        if char_len(content) <= self.max_size {
            return single_chunk(content);
        }

        let chars: Vec<char> = content.chars().collect();
        let total = chars.len();
        let mut chunks = Vec::default();
        let mut start = 0;

        while start < total {
            let mut end = (start + self.max_size).min(total);
            if end < total {
                end = self.find_sentence_boundary(&chars, start, end);
            }

            let window: String = chars[start..end].iter().collect();
            let trimmed = window.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_owned());
            }

            if end == total {
                break;
            }

            // Never step backwards, otherwise a large overlap loops forever
            let next = end.saturating_sub(self.overlap);
            start = if next > start { next } else { end };
        }

        chunks
    }

    /// Latest index in `(start + max_size / 2, end]` that directly follows a
    /// sentence terminator; `end` when there is none
    fn find_sentence_boundary(&self, chars: &[char], start: usize, end: usize) -> usize {
        let minimum = start + self.max_size / 2;
        let total = chars.len();

        (minimum + 1..=end)
            .rev()
            .find(|&index| {
                matches!(chars[index - 1], '.' | '!' | '?')
                    && (index == total || chars[index].is_whitespace())
            })
            .unwrap_or(end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_returns_single_trimmed_chunk() {
        let chunker = TextChunker::new(100, 10);
        assert_eq!(chunker.chunk("  Short text.\n"), vec!["Short text.".to_owned()]);
    }

    #[test]
    fn test_long_text_splits_into_multiple_chunks() {
        let chunker = TextChunker::new(40, 5);
        let content = "Sentence one. Sentence two. Sentence three. Sentence four.";
        let chunks = chunker.chunk(content);

        assert!(chunks.len() > 1, "Expected multiple chunks, got {chunks:?}");
        for chunk in &chunks {
            assert!(!chunk.is_empty(), "Chunk should not be empty");
            assert!(chunk.chars().count() <= 40, "Chunk too long: {chunk}");
        }
    }

    #[test]
    fn test_cuts_at_sentence_boundary() {
        let chunker = TextChunker::new(40, 0);
        let content = "Sentence one. Sentence two. Sentence three. Sentence four.";
        let chunks = chunker.chunk(content);

        assert_eq!(chunks[0], "Sentence one. Sentence two.");
        assert!(chunks[0].ends_with('.'));
    }

    #[test]
    fn test_boundary_never_before_midpoint() {
        // The only terminator sits in the first half of the window, so the
        // window is cut at full length instead
        let chunker = TextChunker::new(20, 0);
        let content = "Hi. abcdefghijklmnopqrstuvwxyz abcdefghij";
        let chunks = chunker.chunk(content);

        assert_eq!(chunks[0], "Hi. abcdefghijklmnop");
    }

    #[test]
    fn test_overlap_repeats_tail_of_previous_window() {
        let chunker = TextChunker::new(10, 3);
        let content = "abcdefghijklmnopqrstuvwxyz";
        let chunks = chunker.chunk(content);

        assert_eq!(chunks[0], "abcdefghij");
        assert_eq!(chunks[1], "hijklmnopq");
        assert!(chunks.last().is_some_and(|last| last.ends_with('z')));
    }

    #[test]
    fn test_stops_after_window_reaching_the_end() {
        let chunker = TextChunker::new(10, 3);
        let chunks = chunker.chunk("abcdefghijklmnopqrstuvwxyz");

        assert_eq!(chunks, vec!["abcdefghij", "hijklmnopq", "opqrstuvwx", "vwxyz"]);
    }

    #[test]
    fn test_overlap_larger_than_window_terminates() {
        let chunker = TextChunker::new(5, 50);
        let content = "abcdefghijklmnopqrstuvwxyz";
        let chunks = chunker.chunk(content);

        assert_eq!(chunks.concat(), content);
    }

    #[test]
    fn test_whitespace_only_windows_are_dropped() {
        let chunker = TextChunker::new(4, 0);
        let chunks = chunker.chunk("ab          cd");
        assert_eq!(chunks, vec!["ab".to_owned(), "cd".to_owned()]);
    }

    #[test]
    fn test_multibyte_text_is_split_on_char_boundaries() {
        let chunker = TextChunker::new(4, 1);
        let content = "éèêëēėęěĕȩ";
        let chunks = chunker.chunk(content);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 4);
        }
    }

    #[test]
    fn test_zero_size_is_clamped() {
        let chunker = TextChunker::new(0, 0);
        assert_eq!(chunker.chunk("abc").len(), 3);
    }
}
