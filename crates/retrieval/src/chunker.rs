/// Splits raw document text into overlapping bounded-length passages.
///
/// Each window scans backward from its end for the nearest natural
/// breakpoint, preferring (in order) a paragraph break, a line break, a
/// sentence terminator, then a plain space. When a breakpoint is found the
/// cut lands just after it and the next window starts `overlap` bytes
/// earlier, clamped so the window start strictly advances. When the window
/// contains no breakpoint at all the text is hard-cut at `chunk_size` and
/// the start retreats by `overlap`. Either way the splitter terminates in
/// O(len / chunk_size) windows, even on input with no natural breaks.
#[derive(Clone, Debug)]
pub struct ChunkingEngine {
    chunk_size: usize,
    overlap: usize,
}

/// A passage plus its byte offset into the source text. Offsets let callers
/// reconstruct the original document from overlapping chunks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitChunk {
    pub start: usize,
    pub text: String,
}

impl Default for ChunkingEngine {
    fn default() -> Self {
        Self::new(1000, 200)
    }
}

impl ChunkingEngine {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self { chunk_size, overlap: overlap.min(chunk_size - 1) }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with_offsets(text).into_iter().map(|chunk| chunk.text).collect()
    }

    pub fn split_with_offsets(&self, text: &str) -> Vec<SplitChunk> {
        let len = text.len();
        let mut chunks = Vec::new();
        let mut start = 0usize;

        while start < len {
            let mut window_end = floor_char_boundary(text, start + self.chunk_size);
            if window_end <= start {
                // chunk_size is smaller than the next character; take the
                // character whole rather than emit an empty chunk.
                window_end = ceil_char_boundary(text, start + 1);
            }

            if window_end >= len {
                chunks.push(SplitChunk { start, text: text[start..].to_string() });
                break;
            }

            let cut = find_breakpoint(text, start, window_end);
            let (end, proposed_next) = match cut {
                Some(position) => (position, position.saturating_sub(self.overlap)),
                None => (window_end, window_end.saturating_sub(self.overlap)),
            };

            chunks.push(SplitChunk { start, text: text[start..end].to_string() });

            // The start must strictly advance or adversarial input could
            // loop forever on a breakpoint near the window start.
            start = ceil_char_boundary(text, proposed_next.max(start + 1));
        }

        chunks
    }
}

/// Backward scan for the best cut position in `(start, window_end]`.
/// Returns the byte offset just past the breakpoint, so delimiters stay
/// attached to the chunk they terminate.
fn find_breakpoint(text: &str, start: usize, window_end: usize) -> Option<usize> {
    let window = &text[start..window_end];

    if let Some(index) = window.rfind("\n\n") {
        return Some(start + index + 2);
    }
    if let Some(index) = window.rfind('\n') {
        return Some(start + index + 1);
    }
    if let Some(index) = window.rfind(['.', '!', '?']) {
        return Some(start + index + 1);
    }
    if let Some(index) = window.rfind(' ') {
        return Some(start + index + 1);
    }

    None
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut boundary = index;
    while boundary > 0 && !text.is_char_boundary(boundary) {
        boundary -= 1;
    }
    boundary
}

fn ceil_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut boundary = index;
    while boundary < text.len() && !text.is_char_boundary(boundary) {
        boundary += 1;
    }
    boundary
}

#[cfg(test)]
mod tests {
    use super::{ChunkingEngine, SplitChunk};

    /// Rebuild the source text from overlapping chunks using their offsets.
    fn reconstruct(chunks: &[SplitChunk]) -> String {
        let mut output = String::new();
        for chunk in chunks {
            let consumed = output.len();
            if chunk.start < consumed {
                output.push_str(&chunk.text[consumed - chunk.start..]);
            } else {
                output.push_str(&chunk.text);
            }
        }
        output
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let engine = ChunkingEngine::new(1000, 200);
        let chunks = engine.split("hello world");
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn round_trip_reproduces_natural_prose() {
        let engine = ChunkingEngine::new(120, 30);
        let text = "First paragraph with a few sentences. Another sentence here.\n\n\
                    Second paragraph continues the story with more detail. It keeps going.\n\
                    A third line follows. And a final thought to close things out. The end is near now.";

        let chunks = engine.split_with_offsets(text);
        assert!(chunks.len() > 1, "expected multiple chunks");
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn round_trip_reproduces_adversarial_text_with_no_breakpoints() {
        let engine = ChunkingEngine::new(100, 20);
        let text = "x".repeat(1037);

        let chunks = engine.split_with_offsets(&text);
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn window_start_always_advances_and_terminates() {
        let engine = ChunkingEngine::new(100, 20);
        let text = "a".repeat(10_000);

        let chunks = engine.split_with_offsets(&text);

        let mut previous_start = None;
        for chunk in &chunks {
            if let Some(previous) = previous_start {
                assert!(chunk.start > previous, "window start must strictly advance");
            }
            previous_start = Some(chunk.start);
        }
        // Hard cuts advance by chunk_size - overlap = 80 bytes per window.
        assert_eq!(chunks.len(), 10_000usize.div_ceil(80));
    }

    #[test]
    fn paragraph_break_wins_over_later_sentence_terminator() {
        let engine = ChunkingEngine::new(60, 10);
        let text = "Alpha sentence one.\n\nBeta sentence two. Gamma sentence three is longer.";

        let chunks = engine.split(&text.to_string());
        assert_eq!(chunks[0], "Alpha sentence one.\n\n");
    }

    #[test]
    fn hard_cut_2500_chars_yields_three_chunks() {
        let engine = ChunkingEngine::new(1000, 200);
        let text = "q".repeat(2500);

        let chunks = engine.split_with_offsets(&text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks[1].start, 800);
        assert_eq!(chunks[2].start, 1600);
        assert_eq!(chunks[2].text.len(), 900);
    }

    #[test]
    fn multibyte_text_never_splits_inside_a_character() {
        let engine = ChunkingEngine::new(50, 10);
        let text = "héllo wörld ça va très bien aujourd'hui non ".repeat(20);

        // Slicing panics on a non-boundary, so surviving is the assertion.
        let chunks = engine.split_with_offsets(&text);
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn chunk_size_smaller_than_one_character_takes_it_whole() {
        let engine = ChunkingEngine::new(2, 1);

        let chunks = engine.split_with_offsets("€x");
        assert_eq!(chunks[0].text, "€");
        assert_eq!(reconstruct(&chunks), "€x");

        let text = "€".repeat(5);
        let chunks = engine.split_with_offsets(&text);
        assert_eq!(chunks.len(), 5);
        assert!(chunks.iter().all(|chunk| chunk.text == "€"));
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let engine = ChunkingEngine::default();
        assert!(engine.split("").is_empty());
    }
}
