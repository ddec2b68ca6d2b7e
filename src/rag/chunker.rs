/// Splits text into fixed-size character windows that overlap by a fixed
/// amount. Every character of the input lands in at least one window.
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    /// `chunk_overlap` is clamped below `chunk_size` so the window always advances.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    /// Character ranges `[start, end)` of the windows for a text of `len` chars.
    pub fn spans(&self, len: usize) -> Vec<(usize, usize)> {
        let step = self.chunk_size - self.chunk_overlap;
        let mut spans = Vec::new();
        let mut start = 0;

        while start < len {
            let end = (start + self.chunk_size).min(len);
            spans.push((start, end));
            if end == len {
                break;
            }
            start += step;
        }

        spans
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        self.spans(chars.len())
            .into_iter()
            .map(|(start, end)| chars[start..end].iter().collect())
            .collect()
    }
}
