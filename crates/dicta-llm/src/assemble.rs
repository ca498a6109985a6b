//! Response-buffer assembly: whitespace-aware chunk joining, duplicate-pair
//! collapsing and bullet normalisation.
//!
//! Tokens arrive with arbitrary splits ("21" / "-year" / "-old"), so naive
//! concatenation with spaces would corrupt numbers and words. The join rule
//! only inserts a space where neither side already provides separation.

/// Accumulates response chunks into the display/artifact buffer.
#[derive(Debug, Default)]
pub struct ResponseAssembler {
    buffer: String,
}

impl ResponseAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one chunk at the join point, then re-normalise the buffer.
    /// Appending `a` then `b` produces the same buffer as appending `a+b`.
    pub fn append(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        if let (Some(prev), Some(next)) = (self.buffer.chars().last(), chunk.chars().next()) {
            if needs_space(prev, next) {
                self.buffer.push(' ');
            }
        }
        self.buffer.push_str(chunk);
        self.buffer = normalize_bullets(&dedup_pairs(&self.buffer));
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn into_text(self) -> String {
        self.buffer
    }
}

/// Whether a single space belongs between `prev` and `next`.
fn needs_space(prev: char, next: char) -> bool {
    if prev.is_whitespace() || next.is_whitespace() {
        return false;
    }
    // Multi-digit numbers split across chunks stay intact.
    if prev.is_ascii_digit() && next.is_ascii_digit() {
        return false;
    }
    // Never pad around a hyphen ("21" + "-year").
    if prev == '-' || next == '-' {
        return false;
    }
    // No space before closing punctuation.
    if matches!(next, '.' | ',' | ';' | ':' | '/' | '(' | ')') {
        return false;
    }
    // A word split mid-way rejoins seamlessly.
    if prev.is_alphabetic() && next.is_alphabetic() {
        return false;
    }
    true
}

/// Collapse case-insensitive `word-word` and `word word` pairs to a single
/// word. Idempotent.
pub fn dedup_pairs(text: &str) -> String {
    let mut tokens = tokenize(text);
    let mut i = 0;
    while i + 1 < tokens.len() {
        let same = tokens[i].word.to_lowercase() == tokens[i + 1].word.to_lowercase();
        let sep_is_pair_joiner = tokens[i].sep == "-" || tokens[i].sep == " ";
        if same && sep_is_pair_joiner && !tokens[i].word.is_empty() {
            let next = tokens.remove(i + 1);
            tokens[i].sep = next.sep;
        } else {
            i += 1;
        }
    }
    let mut out = String::with_capacity(text.len());
    for token in tokens {
        out.push_str(&token.word);
        out.push_str(&token.sep);
    }
    out
}

/// Turn inline ` - ` separators into bullet line breaks, and break a list
/// that starts straight after a period.
pub fn normalize_bullets(text: &str) -> String {
    text.replace(" - ", "\n- ").replace(".- ", ".\n- ")
}

#[derive(Debug)]
struct Token {
    word: String,
    sep: String,
}

fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut word = String::new();
    let mut sep = String::new();
    let mut in_word = true;

    for c in text.chars() {
        let is_word_char = c.is_alphanumeric() || c == '\'';
        if is_word_char {
            if !in_word {
                tokens.push(Token {
                    word: std::mem::take(&mut word),
                    sep: std::mem::take(&mut sep),
                });
                in_word = true;
            }
            word.push(c);
        } else {
            in_word = false;
            sep.push(c);
        }
    }
    tokens.push(Token { word, sep });
    tokens
}
