//! Recursive text splitting for documents that are too long to embed whole.
//!
//! [`TextSplitter`] breaks text into chunks of at most `chunk_size` bytes,
//! preferring to cut at the most significant delimiter available: paragraph
//! breaks first, then line breaks, sentence ends, spaces, and finally raw
//! character boundaries. Segments produced by the recursive pass are merged
//! greedily back into chunks, and every chunk after the first is prefixed with
//! up to `chunk_overlap` bytes taken from the end of the previous chunk so that
//! sentences straddling a cut stay retrievable from either side.
//!
//! Each [`TextChunk`] remembers its *core* byte range: the part of the source
//! it owns, without the overlap prefix. Concatenating the cores of all chunks
//! reproduces the input exactly.
//!
//! ```
//! use quarry_ingest::text::TextSplitter;
//!
//! let splitter = TextSplitter::new(40, 10).unwrap();
//! let text = "First paragraph is here.\n\nSecond paragraph follows it.\n\nThird.";
//! let chunks = splitter.split(text);
//!
//! assert!(chunks.len() > 1);
//! let rebuilt: String = chunks.iter().map(|c| &text[c.core.clone()]).collect();
//! assert_eq!(rebuilt, text);
//! ```

use crate::error::{IngestError, Result};
use regex::Regex;
use std::ops::Range;

/// Default delimiters, most significant first.
///
/// - `\n\s*\n`: paragraph breaks
/// - `\n`: line breaks
/// - `[.!?]\s+`: sentence ends
/// - ` `: spaces
pub const DEFAULT_DELIMITERS: &[&str] = &[r"\n\s*\n", r"\n", r"[.!?]\s+", r" "];

/// One chunk of a split document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Position of this chunk within the document (0-indexed)
    pub sequence: usize,
    /// Chunk text, including the overlap prefix
    pub text: String,
    /// Byte range of the source this chunk owns, excluding overlap
    pub core: Range<usize>,
}

/// Splits text into bounded, overlapping chunks.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    delimiters: Vec<Regex>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    /// Create a splitter using [`DEFAULT_DELIMITERS`].
    ///
    /// Fails when `chunk_size` is zero or `chunk_overlap` is not smaller than
    /// `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(IngestError::InvalidChunking {
                message: "chunk_size must be at least 1".to_string(),
            });
        }
        if chunk_overlap >= chunk_size {
            return Err(IngestError::InvalidChunking {
                message: format!(
                    "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
                ),
            });
        }
        let splitter = Self {
            delimiters: Vec::new(),
            chunk_size,
            chunk_overlap,
        };
        splitter.with_delimiters(DEFAULT_DELIMITERS)
    }

    /// Replace the delimiter patterns, most significant first.
    pub fn with_delimiters(mut self, patterns: &[&str]) -> Result<Self> {
        self.delimiters = patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| IngestError::InvalidDelimiter {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into chunks. Empty input yields no chunks.
    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        let mut segments = Vec::new();
        self.split_recursively(text, 0, 0, &mut segments);

        let mut cores: Vec<Range<usize>> = Vec::new();
        let mut current: Option<Range<usize>> = None;

        for segment in segments {
            current = match current {
                Some(open) if segment.end - open.start > self.chunk_size => {
                    cores.push(open);
                    Some(segment)
                }
                Some(open) => Some(open.start..segment.end),
                None => Some(segment),
            };
        }
        if let Some(open) = current {
            cores.push(open);
        }

        let mut chunks = Vec::with_capacity(cores.len());
        for (sequence, core) in cores.into_iter().enumerate() {
            let start = if sequence == 0 || self.chunk_overlap == 0 {
                core.start
            } else {
                ceil_boundary(text, core.start.saturating_sub(self.chunk_overlap))
            };
            chunks.push(TextChunk {
                sequence,
                text: text[start..core.end].to_string(),
                core,
            });
        }
        chunks
    }

    // Appends byte ranges (relative to the whole text) that each fit in
    // chunk_size, in source order. Together the ranges cover `text` without
    // gaps.
    fn split_recursively(
        &self,
        text: &str,
        delimiter_idx: usize,
        offset: usize,
        out: &mut Vec<Range<usize>>,
    ) {
        if text.is_empty() {
            return;
        }

        if text.len() <= self.chunk_size {
            out.push(offset..offset + text.len());
            return;
        }

        let Some(delimiter) = self.delimiters.get(delimiter_idx) else {
            // Out of delimiters: cut on char boundaries
            let mut start = 0;
            while start < text.len() {
                let mut end = floor_boundary(text, (start + self.chunk_size).min(text.len()));
                if end <= start {
                    end = ceil_boundary(text, start + 1);
                }
                out.push(offset + start..offset + end);
                start = end;
            }
            return;
        };

        let mut local_start = 0;
        for mat in delimiter.find_iter(text) {
            if mat.start() > local_start {
                self.split_recursively(
                    &text[local_start..mat.start()],
                    delimiter_idx + 1,
                    offset + local_start,
                    out,
                );
            }
            // Long delimiter runs (e.g. blank lines full of spaces) are split too
            self.split_recursively(mat.as_str(), delimiter_idx + 1, offset + mat.start(), out);
            local_start = mat.end();
        }

        if local_start < text.len() {
            self.split_recursively(
                &text[local_start..],
                delimiter_idx + 1,
                offset + local_start,
                out,
            );
        }
    }
}

fn floor_boundary(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_boundary(text: &str, mut idx: usize) -> usize {
    while idx < text.len() && !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx.min(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rebuild(text: &str, chunks: &[TextChunk]) -> String {
        chunks.iter().map(|c| &text[c.core.clone()]).collect()
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let splitter = TextSplitter::new(500, 50).unwrap();
        let text = "A short note about invoices.";
        let chunks = splitter.split(text);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].sequence, 0);
        assert_eq!(chunks[0].text, text);
        assert_eq!(chunks[0].core, 0..text.len());
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        let splitter = TextSplitter::new(500, 50).unwrap();
        assert!(splitter.split("").is_empty());
    }

    #[test]
    fn test_long_text_respects_size_and_overlap() {
        let splitter = TextSplitter::new(100, 20).unwrap();
        let text = (0..60)
            .map(|i| format!("Sentence number {i} talks about retrieval. "))
            .collect::<String>();
        let chunks = splitter.split(&text);

        assert!(chunks.len() > 1);
        assert_eq!(rebuild(&text, &chunks), text);

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.sequence, i);
            assert!(chunk.core.len() <= 100, "core too long: {}", chunk.core.len());
            assert!(chunk.text.len() <= 120, "chunk too long: {}", chunk.text.len());
            assert!(chunk.text.ends_with(&text[chunk.core.clone()]));
        }

        // Overlap text comes from the tail of the previous chunk
        let prefix_len = chunks[1].text.len() - chunks[1].core.len();
        assert!(prefix_len > 0 && prefix_len <= 20);
        assert!(chunks[0].text.ends_with(&chunks[1].text[..prefix_len]));
    }

    #[test]
    fn test_paragraphs_are_preferred_cut_points() {
        let splitter = TextSplitter::new(60, 0).unwrap();
        let text = "Alpha paragraph with some words in it.\n\nBeta paragraph, also with words.";
        let chunks = splitter.split(text);

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.starts_with("Alpha"));
        assert!(chunks[1].text.starts_with("Beta") || chunks[1].text.starts_with("\n"));
        assert_eq!(rebuild(text, &chunks), text);
    }

    #[test]
    fn test_multibyte_text_never_splits_a_char() {
        let splitter = TextSplitter::new(7, 3).unwrap();
        let text = "ééééééééééééééééééééé";
        let chunks = splitter.split(text);

        assert!(chunks.len() > 1);
        assert_eq!(rebuild(text, &chunks), text);
        for chunk in &chunks {
            assert!(chunk.text.chars().all(|c| c == 'é'));
        }
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        assert!(TextSplitter::new(0, 0).is_err());
        assert!(TextSplitter::new(50, 50).is_err());
        assert!(matches!(
            TextSplitter::new(50, 5).unwrap().with_delimiters(&["("]),
            Err(IngestError::InvalidDelimiter { .. })
        ));
    }

    #[test]
    fn test_oversized_delimiter_run_is_split() {
        let splitter = TextSplitter::new(10, 0).unwrap();
        let text = format!("aaaa\n{}\nbbbb", " ".repeat(30));
        let chunks = splitter.split(&text);

        assert_eq!(rebuild(&text, &chunks), text);
        for chunk in &chunks {
            assert!(chunk.core.len() <= 10, "core too long: {}", chunk.core.len());
        }
    }
}
