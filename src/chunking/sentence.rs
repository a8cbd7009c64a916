use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

// Sentence end followed by the (already collapsed) single space.
static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?] ").expect("sentence boundary pattern is valid"));

/// Sentence segments with page-artifact filtering
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    min_chars: usize,
}

impl SentenceChunker {
    pub fn new(min_chars: usize) -> Self {
        Self { min_chars }
    }

    /// Collapse whitespace, split after `.`, `!` or `?`, and keep segments
    /// that are long enough and not bare page numbers
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let collapsed = WHITESPACE.replace_all(text, " ");

        let mut segments = Vec::new();
        let mut start = 0;
        for boundary in SENTENCE_END.find_iter(&collapsed) {
            // Punctuation is one byte; keep it with the sentence.
            segments.push(&collapsed[start..boundary.start() + 1]);
            start = boundary.end();
        }
        segments.push(&collapsed[start..]);

        segments
            .into_iter()
            .map(str::trim)
            .filter(|s| s.chars().count() >= self.min_chars)
            .filter(|s| !s.chars().all(|c| c.is_ascii_digit()))
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_on_sentence_punctuation() {
        let chunker = SentenceChunker::new(10);
        let chunks = chunker.chunk(
            "The lease term is twelve months.   Rent is due monthly!\nIs parking included? Yes it is included.",
        );
        assert_eq!(
            chunks,
            vec![
                "The lease term is twelve months.",
                "Rent is due monthly!",
                "Is parking included?",
                "Yes it is included.",
            ]
        );
    }

    #[test]
    fn test_short_segments_dropped() {
        let chunker = SentenceChunker::new(40);
        let chunks = chunker.chunk(
            "Short. The property at 12 Elm Street was appraised at fair market value in 2021.",
        );
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].starts_with("The property"));
    }

    #[test]
    fn test_page_numbers_dropped() {
        let chunker = SentenceChunker::new(1);
        let chunks = chunker.chunk("Closing costs are shared. 17");
        assert_eq!(chunks, vec!["Closing costs are shared."]);

        let chunker = SentenceChunker::new(3);
        assert!(chunker.chunk("   1234567   ").is_empty());
    }

    #[test]
    fn test_decimal_points_do_not_split() {
        let chunker = SentenceChunker::new(1);
        let chunks = chunker.chunk("The rate is 4.5 percent. Taxes apply.");
        assert_eq!(chunks, vec!["The rate is 4.5 percent.", "Taxes apply."]);
    }
}
