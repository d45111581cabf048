/// Word-by-word reveal of a reply.
///
/// The text is split on single spaces so the revealed prefix always joins
/// back into the original text, newlines included. One call to [`tick`]
/// reveals one word.
///
/// [`tick`]: TypingAnimator::tick
#[derive(Debug, Clone)]
pub struct TypingAnimator {
    words: Vec<String>,
    index: usize,
    revealed: String,
}

impl TypingAnimator {
    pub fn new(text: &str) -> Self {
        Self {
            words: text.split(' ').map(str::to_string).collect(),
            index: 0,
            revealed: String::new(),
        }
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    pub fn revealed(&self) -> &str {
        &self.revealed
    }

    pub fn is_done(&self) -> bool {
        self.index >= self.words.len()
    }

    /// Reveal the next word and return the text shown so far, or `None` once
    /// every word is out.
    pub fn tick(&mut self) -> Option<&str> {
        let word = self.words.get(self.index)?;
        if self.index > 0 {
            self.revealed.push(' ');
        }
        self.revealed.push_str(word);
        self.index += 1;
        Some(&self.revealed)
    }
}
