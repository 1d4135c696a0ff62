//! Splitting a text payload into stream chunks.
//!
//! Chunks are produced lazily from an owned cursor, so a session never
//! materializes the whole chunk list up front.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

/// Separator appended to every word chunk.
const WORD_SEPARATOR: &str = " ";

/// Paragraph boundary, also appended to every paragraph chunk.
const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Chunk granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChunkMode {
    /// One chunk per whitespace-separated token.
    #[default]
    Word,
    /// One chunk per blank-line separated paragraph.
    Paragraph,
}

impl ChunkMode {
    /// Pacing used when no explicit delay is configured.
    pub fn default_delay(self) -> Duration {
        match self {
            ChunkMode::Word => Duration::from_millis(10),
            ChunkMode::Paragraph => Duration::from_millis(100),
        }
    }

    /// Static label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            ChunkMode::Word => "word",
            ChunkMode::Paragraph => "paragraph",
        }
    }
}

impl fmt::Display for ChunkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of streamed output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub content: String,
}

impl Chunk {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Owning, lazy iterator over the chunks of a text.
#[derive(Debug)]
pub struct ChunkCursor {
    text: String,
    mode: ChunkMode,
    /// Byte offset of the first unconsumed character.
    pos: usize,
}

impl ChunkCursor {
    pub fn new(text: impl Into<String>, mode: ChunkMode) -> Self {
        Self {
            text: text.into(),
            mode,
            pos: 0,
        }
    }

    pub fn mode(&self) -> ChunkMode {
        self.mode
    }

    fn next_word(&mut self) -> Option<Chunk> {
        let rest = &self.text[self.pos..];
        let start = rest.find(|c: char| !c.is_whitespace());
        let Some(start) = start else {
            self.pos = self.text.len();
            return None;
        };

        let token = &rest[start..];
        let len = token.find(char::is_whitespace).unwrap_or(token.len());
        let chunk = Chunk::new(format!("{}{}", &token[..len], WORD_SEPARATOR));
        self.pos += start + len;
        Some(chunk)
    }

    fn next_paragraph(&mut self) -> Option<Chunk> {
        while self.pos < self.text.len() {
            let rest = &self.text[self.pos..];
            let (segment, consumed) = match rest.find(PARAGRAPH_SEPARATOR) {
                Some(end) => (&rest[..end], end + PARAGRAPH_SEPARATOR.len()),
                None => (rest, rest.len()),
            };
            self.pos += consumed;

            if segment.chars().any(|c| !c.is_whitespace()) {
                return Some(Chunk::new(format!("{segment}{PARAGRAPH_SEPARATOR}")));
            }
        }
        None
    }
}

impl Iterator for ChunkCursor {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        match self.mode {
            ChunkMode::Word => self.next_word(),
            ChunkMode::Paragraph => self.next_paragraph(),
        }
    }
}

impl std::iter::FusedIterator for ChunkCursor {}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(text: &str, mode: ChunkMode) -> Vec<String> {
        ChunkCursor::new(text, mode).map(|c| c.content).collect()
    }

    #[test]
    fn test_word_chunks() {
        assert_eq!(contents("hello world", ChunkMode::Word), ["hello ", "world "]);
    }

    #[test]
    fn test_word_chunks_collapse_whitespace() {
        assert_eq!(
            contents("  one\t two\n\nthree  ", ChunkMode::Word),
            ["one ", "two ", "three "]
        );
    }

    #[test]
    fn test_word_chunks_match_split_whitespace() {
        let text = "Ünïcode 世界 \u{3000}wide\u{00A0}space 🚀";
        let expected: Vec<String> = text.split_whitespace().map(|w| format!("{w} ")).collect();
        assert_eq!(contents(text, ChunkMode::Word), expected);
    }

    #[test]
    fn test_paragraph_chunks() {
        assert_eq!(
            contents("para one\n\npara two", ChunkMode::Paragraph),
            ["para one\n\n", "para two\n\n"]
        );
    }

    #[test]
    fn test_paragraph_chunks_skip_blank_segments() {
        assert_eq!(
            contents("\n\na\n\n  \n\n\n\nb\n\n", ChunkMode::Paragraph),
            ["a\n\n", "b\n\n"]
        );
    }

    #[test]
    fn test_paragraph_keeps_inner_text_verbatim() {
        // An odd newline run leaves the extra newline on the next paragraph.
        assert_eq!(
            contents("a\n\n\nb line\nstill b", ChunkMode::Paragraph),
            ["a\n\n", "\nb line\nstill b\n\n"]
        );
    }

    #[test]
    fn test_empty_and_whitespace_input() {
        for mode in [ChunkMode::Word, ChunkMode::Paragraph] {
            assert!(contents("", mode).is_empty());
            assert!(contents(" \n\n \t ", mode).is_empty());
        }
    }

    #[test]
    fn test_cursor_is_fused() {
        let mut cursor = ChunkCursor::new("only", ChunkMode::Word);
        assert_eq!(cursor.next(), Some(Chunk::new("only ")));
        assert_eq!(cursor.next(), None);
        assert_eq!(cursor.next(), None);
    }

    #[test]
    fn test_mode_labels_and_defaults() {
        assert_eq!(ChunkMode::Word.to_string(), "word");
        assert_eq!(ChunkMode::Paragraph.as_str(), "paragraph");
        assert_eq!(ChunkMode::Word.default_delay(), Duration::from_millis(10));
        assert_eq!(ChunkMode::Paragraph.default_delay(), Duration::from_millis(100));
    }
}
