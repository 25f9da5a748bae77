//! Per-turn transcript accumulation.

/// Ordered sequence of recognized words for the current turn.
///
/// Cleared at the start of each turn and whenever a turn is submitted.
#[derive(Debug, Clone, Default)]
pub struct TranscriptBuffer {
    words: Vec<String>,
}

impl TranscriptBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a recognized fragment. Whitespace-only fragments are dropped.
    pub fn push(&mut self, fragment: &str) {
        for word in fragment.split_whitespace() {
            self.words.push(word.to_string());
        }
    }

    /// The accumulated text of the current turn.
    pub fn text(&self) -> String {
        self.words.join(" ")
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn clear(&mut self) {
        self.words.clear();
    }

    /// Returns the accumulated text and clears the buffer.
    pub fn take(&mut self) -> String {
        let text = self.text();
        self.words.clear();
        text
    }
}
