/// Text chunking strategies.
///
/// Two strategies ship: `CharacterChunker` cuts fixed-size windows
/// with backward overlap and boundary retraction, `HeaderChunker`
/// respects `## ` section headers so wiki-style notes keep one topic
/// per chunk. Offsets are byte positions into the original text.
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^## ").unwrap());

#[derive(Error, Debug)]
pub enum ChunkingError {
    #[error("chunk_overlap ({overlap}) must be smaller than chunk_size ({size})")]
    OverlapTooLarge { size: usize, overlap: usize },

    #[error("chunk_size must be non-zero")]
    ZeroChunkSize,
}

/// One piece of a document, with its position in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

pub trait ChunkingStrategy: Send + Sync {
    fn split(&self, text: &str) -> Vec<Chunk>;
}

// ── Character windows ────────────────────────────────────────────────

/// Fixed-size windows with backward overlap.
///
/// Each window prefers to end at the last newline inside it, then the
/// last space, then a hard cut. The next window starts `chunk_overlap`
/// bytes before the previous cut, clamped so the walk always moves
/// forward.
#[derive(Debug, Clone)]
pub struct CharacterChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl CharacterChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ChunkingError> {
        if chunk_size == 0 {
            return Err(ChunkingError::ZeroChunkSize);
        }
        if chunk_overlap >= chunk_size {
            return Err(ChunkingError::OverlapTooLarge {
                size: chunk_size,
                overlap: chunk_overlap,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Split with all offsets shifted by `base`, for callers that
    /// chunk a slice of a larger document.
    pub fn split_at(&self, text: &str, base: usize) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let len = text.len();
        let mut pos = 0;

        while pos < len {
            let window_end = floor_char_boundary(text, (pos + self.chunk_size).min(len));
            if window_end >= len {
                push_trimmed(&mut chunks, text, pos, len, base);
                break;
            }

            let cut = boundary_cut(text, pos, window_end);
            push_trimmed(&mut chunks, text, pos, cut, base);

            let mut next = cut.saturating_sub(self.chunk_overlap).max(pos + 1);
            while next < len && !text.is_char_boundary(next) {
                next += 1;
            }
            pos = next;
        }
        chunks
    }
}

impl ChunkingStrategy for CharacterChunker {
    fn split(&self, text: &str) -> Vec<Chunk> {
        self.split_at(text, 0)
    }
}

/// Retract a window end to the last newline inside it, else the last
/// space; keep the hard cut when neither leaves a non-empty chunk.
fn boundary_cut(text: &str, start: usize, window_end: usize) -> usize {
    let window = &text[start..window_end];
    if let Some(i) = window.rfind('\n') {
        if i > 0 {
            return start + i;
        }
    }
    if let Some(i) = window.rfind(' ') {
        if i > 0 {
            return start + i;
        }
    }
    window_end
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Append `text[start..end]` with surrounding whitespace trimmed and
/// offsets adjusted to the trimmed region; empty chunks are dropped.
fn push_trimmed(chunks: &mut Vec<Chunk>, text: &str, start: usize, end: usize, base: usize) {
    let raw = &text[start..end];
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return;
    }
    let lead = raw.len() - raw.trim_start().len();
    chunks.push(Chunk {
        text: trimmed.to_string(),
        start_offset: base + start + lead,
        end_offset: base + start + lead + trimmed.len(),
    });
}

// ── Header sections ──────────────────────────────────────────────────

/// Splits at top-level `## ` headers before windowing.
///
/// Content before the first header is character-chunked. Each section
/// is cut at newlines, but never before `min_section` bytes have
/// accumulated, so short sections stay whole. Documents without
/// headers fall back to plain character chunking.
#[derive(Debug, Clone)]
pub struct HeaderChunker {
    inner: CharacterChunker,
    min_section: usize,
}

impl HeaderChunker {
    pub fn new(
        chunk_size: usize,
        chunk_overlap: usize,
        min_section: usize,
    ) -> Result<Self, ChunkingError> {
        Ok(Self {
            inner: CharacterChunker::new(chunk_size, chunk_overlap)?,
            min_section,
        })
    }

    fn split_section(&self, section: &str, base: usize) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let len = section.len();
        let mut pos = 0;

        while pos < len {
            if len - pos <= self.min_section {
                push_trimmed(&mut chunks, section, pos, len, base);
                break;
            }
            let mut floor = pos + self.min_section;
            while floor < len && !section.is_char_boundary(floor) {
                floor += 1;
            }
            let cut = match section[floor..].find('\n') {
                Some(i) => floor + i,
                None => len,
            };
            push_trimmed(&mut chunks, section, pos, cut, base);
            pos = (cut + 1).min(len);
        }
        chunks
    }
}

impl ChunkingStrategy for HeaderChunker {
    fn split(&self, text: &str) -> Vec<Chunk> {
        let header_starts: Vec<usize> = HEADER_RE.find_iter(text).map(|m| m.start()).collect();
        if header_starts.is_empty() {
            return self.inner.split(text);
        }

        let mut chunks = Vec::new();
        if header_starts[0] > 0 {
            chunks.extend(self.inner.split_at(&text[..header_starts[0]], 0));
        }
        for (i, &start) in header_starts.iter().enumerate() {
            let end = header_starts
                .get(i + 1)
                .copied()
                .unwrap_or(text.len());
            chunks.extend(self.split_section(&text[start..end], start));
        }
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_overlap_ge_size() {
        assert!(matches!(
            CharacterChunker::new(100, 100),
            Err(ChunkingError::OverlapTooLarge { .. })
        ));
        assert!(matches!(
            CharacterChunker::new(100, 200),
            Err(ChunkingError::OverlapTooLarge { .. })
        ));
        assert!(CharacterChunker::new(100, 99).is_ok());
    }

    #[test]
    fn test_empty_text_no_chunks() {
        let chunker = CharacterChunker::new(500, 100).unwrap();
        assert!(chunker.split("").is_empty());
        let headers = HeaderChunker::new(500, 100, 800).unwrap();
        assert!(headers.split("").is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunker = CharacterChunker::new(500, 100).unwrap();
        let chunks = chunker.split("short text");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "short text");
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks[0].end_offset, 10);
    }

    #[test]
    fn test_hard_cut_window_walk() {
        // no newlines or spaces: hard cuts at exactly chunk_size,
        // next window starts overlap bytes back
        let text = "x".repeat(1200);
        let chunker = CharacterChunker::new(500, 100).unwrap();
        let chunks = chunker.split(&text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(
            (chunks[0].start_offset, chunks[0].end_offset),
            (0, 500)
        );
        assert_eq!(
            (chunks[1].start_offset, chunks[1].end_offset),
            (400, 900)
        );
        assert_eq!(
            (chunks[2].start_offset, chunks[2].end_offset),
            (800, 1200)
        );
    }

    #[test]
    fn test_newline_boundary_preferred() {
        let text = format!("{}\n{}", "a".repeat(300), "b".repeat(300));
        let chunker = CharacterChunker::new(500, 50).unwrap();
        let chunks = chunker.split(&text);
        assert_eq!(chunks[0].text, "a".repeat(300));
        assert!(chunks[1].text.ends_with(&"b".repeat(300)));
    }

    #[test]
    fn test_space_boundary_fallback() {
        let text = format!("{} {}", "a".repeat(300), "b".repeat(300));
        let chunker = CharacterChunker::new(500, 50).unwrap();
        let chunks = chunker.split(&text);
        assert_eq!(chunks[0].text, "a".repeat(300));
    }

    #[test]
    fn test_coverage_no_gaps() {
        // every byte of the input is inside some chunk window
        let text: String = (0..50)
            .map(|i| format!("word{i} and some filler text here\n"))
            .collect();
        let chunker = CharacterChunker::new(120, 30).unwrap();
        let chunks = chunker.split(&text);
        assert!(!chunks.is_empty());
        let mut covered_to = 0usize;
        for chunk in &chunks {
            assert!(
                chunk.start_offset <= covered_to + 1,
                "gap before offset {}",
                chunk.start_offset
            );
            covered_to = covered_to.max(chunk.end_offset);
        }
        assert!(covered_to >= text.trim_end().len());
    }

    #[test]
    fn test_always_makes_progress() {
        // pathological window where the only boundary is at index 0
        let text = format!("\n{}", "x".repeat(400));
        let chunker = CharacterChunker::new(100, 99).unwrap();
        let chunks = chunker.split(&text);
        assert!(!chunks.is_empty());
        assert!(chunks.len() < 500, "chunker must terminate");
    }

    #[test]
    fn test_multibyte_safe() {
        let text = "héllo wörld ".repeat(100);
        let chunker = CharacterChunker::new(64, 16).unwrap();
        for chunk in chunker.split(&text) {
            assert_eq!(chunk.text, text[chunk.start_offset..chunk.end_offset].trim());
        }
    }

    #[test]
    fn test_header_split_sections() {
        let text = "intro line\n## First\nalpha content\n## Second\nbeta content\n";
        let chunker = HeaderChunker::new(500, 100, 800).unwrap();
        let chunks = chunker.split(text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "intro line");
        assert!(chunks[1].text.starts_with("## First"));
        assert!(chunks[2].text.starts_with("## Second"));
    }

    #[test]
    fn test_header_offsets_point_into_source() {
        let text = "preamble\n## Title\nbody text here\n";
        let chunker = HeaderChunker::new(500, 100, 800).unwrap();
        for chunk in chunker.split(text) {
            assert_eq!(chunk.text, text[chunk.start_offset..chunk.end_offset].trim());
        }
    }

    #[test]
    fn test_no_headers_falls_back() {
        let text = "plain text without any section markers";
        let chunker = HeaderChunker::new(500, 100, 800).unwrap();
        let char_chunker = CharacterChunker::new(500, 100).unwrap();
        assert_eq!(chunker.split(text), char_chunker.split(text));
    }

    #[test]
    fn test_section_floor_keeps_short_sections_whole() {
        let body = "line one\nline two\nline three";
        let text = format!("## Small\n{body}\n");
        let chunker = HeaderChunker::new(500, 100, 800).unwrap();
        let chunks = chunker.split(&text);
        assert_eq!(chunks.len(), 1, "section under the floor must not fragment");
    }

    #[test]
    fn test_section_floor_cuts_at_newline_past_floor() {
        let line = format!("{}\n", "w".repeat(99));
        let section_body = line.repeat(20); // 2000 bytes
        let text = format!("## Big\n{section_body}");
        let chunker = HeaderChunker::new(500, 100, 800).unwrap();
        let chunks = chunker.split(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(
                chunk.text.len() >= 800,
                "non-final piece under floor: {}",
                chunk.text.len()
            );
        }
    }

    #[test]
    fn test_inline_hash_not_a_header() {
        let text = "content with ## inline marks\nmore ## here\n";
        let chunker = HeaderChunker::new(500, 100, 800).unwrap();
        let chunks = chunker.split(text);
        assert_eq!(chunks.len(), 1);
    }
}
