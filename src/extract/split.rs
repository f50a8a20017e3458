//! Recursive character text splitting.
//!
//! Long documents are cut on the coarsest separator that occurs
//! (paragraph, line, sentence, word), and pieces that are still too long
//! are split again on the next separator. Adjacent small pieces are then
//! merged back up to `chunk_size` characters, with the tail of each chunk
//! repeated at the head of the next (`chunk_overlap`) so no sentence is
//! only ever seen cut in half.

/// Default chunk length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default overlap between consecutive chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
/// Separators from coarsest to finest.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", ".", " "];

#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl TextSplitter {
    /// A splitter with custom sizes. The overlap is clamped below the size.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
            ..Self::default()
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split `text` into chunks of at most `chunk_size` characters where
    /// the separators allow it.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &self.separators)
    }

    fn split_with(&self, text: &str, separators: &[String]) -> Vec<String> {
        let (separator, rest) = match separators.iter().position(|s| text.contains(s.as_str())) {
            Some(i) => (separators[i].as_str(), &separators[i + 1..]),
            None => (separators.last().map_or(" ", String::as_str), &separators[..0]),
        };

        let mut chunks = Vec::new();
        let mut small: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                small.push(piece);
                continue;
            }
            if !small.is_empty() {
                chunks.extend(self.merge(&small));
                small.clear();
            }
            if rest.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_with(piece, rest));
            }
        }
        if !small.is_empty() {
            chunks.extend(self.merge(&small));
        }
        chunks
    }

    /// Concatenate pieces into chunks, carrying `chunk_overlap` characters
    /// of tail into the next chunk.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut out = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !current.is_empty() {
                if let Some(chunk) = join(&current) {
                    out.push(chunk);
                }
                while total > 0 && (total > self.chunk_overlap || total + len > self.chunk_size) {
                    let first = current.remove(0);
                    total -= char_len(first);
                }
            }
            current.push(piece);
            total += len;
        }
        if let Some(chunk) = join(&current) {
            out.push(chunk);
        }
        out
    }
}

/// Split with the default 1000/200 settings.
pub fn split_into_chunks(text: &str) -> Vec<String> {
    TextSplitter::default().split(text)
}

/// Split on `separator`, keeping it at the start of every piece but the
/// first so sentences keep their punctuation.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn join(pieces: &[&str]) -> Option<String> {
    let joined = pieces.concat();
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
