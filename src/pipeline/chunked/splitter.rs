use serde::Deserialize;

/// Window geometry for splitting a long document into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ChunkingConfig {
    /// Lines per chunk.
    pub window: usize,
    /// Lines shared by consecutive chunks, so a row straddling a boundary
    /// is seen whole by at least one chunk.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window: 60,
            overlap: 5,
        }
    }
}

impl ChunkingConfig {
    /// Distance between chunk starts. Always at least 1.
    pub fn stride(&self) -> usize {
        let window = self.window.max(1);
        window.saturating_sub(self.overlap).max(1)
    }
}

/// A contiguous slice of document lines.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub index: usize,
    /// Index of the chunk's first line in the document.
    pub start_line: usize,
    pub lines: Vec<String>,
}

impl Chunk {
    /// Document line range covered by this chunk.
    pub fn line_range(&self) -> std::ops::Range<usize> {
        self.start_line..self.start_line + self.lines.len()
    }
}

/// Split lines into overlapping windows. Every line lands in at least one
/// chunk; the last chunk may be shorter than the window.
pub fn split_into_chunks(lines: &[String], config: &ChunkingConfig) -> Vec<Chunk> {
    let window = config.window.max(1);
    let stride = config.stride();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < lines.len() {
        let end = (start + window).min(lines.len());
        chunks.push(Chunk {
            index: chunks.len(),
            start_line: start,
            lines: lines[start..end].to_vec(),
        });
        if end == lines.len() {
            break;
        }
        start += stride;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("line {i}")).collect()
    }

    #[test]
    fn short_document_is_one_chunk() {
        let chunks = split_into_chunks(&doc(10), &ChunkingConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].lines.len(), 10);
    }

    #[test]
    fn sixty_five_lines_make_two_overlapping_chunks() {
        let chunks = split_into_chunks(&doc(65), &ChunkingConfig::default());
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].line_range(), 0..60);
        assert_eq!(chunks[1].line_range(), 55..65);
        assert_eq!(chunks[1].index, 1);
    }

    #[test]
    fn exact_window_is_one_chunk() {
        assert_eq!(split_into_chunks(&doc(60), &ChunkingConfig::default()).len(), 1);
    }

    #[test]
    fn empty_document_has_no_chunks() {
        assert!(split_into_chunks(&[], &ChunkingConfig::default()).is_empty());
    }

    #[test]
    fn every_line_covered_and_overlaps_shared() {
        let lines = doc(200);
        let config = ChunkingConfig { window: 30, overlap: 4 };
        let chunks = split_into_chunks(&lines, &config);

        let mut covered = vec![false; lines.len()];
        for chunk in &chunks {
            for i in chunk.line_range() {
                covered[i] = true;
            }
        }
        assert!(covered.iter().all(|c| *c));

        for pair in chunks.windows(2) {
            let shared = pair[0].line_range().end.saturating_sub(pair[1].start_line);
            assert_eq!(shared, 4);
        }
    }

    #[test]
    fn overlap_not_smaller_than_window_still_advances() {
        let config = ChunkingConfig { window: 3, overlap: 5 };
        assert_eq!(config.stride(), 1);
        let chunks = split_into_chunks(&doc(5), &config);
        assert_eq!(chunks.len(), 3);
    }
}
