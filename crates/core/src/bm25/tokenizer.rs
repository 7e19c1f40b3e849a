//! Whitespace tokenizer with punctuation stripping.
//!
//! Tokenizes text by lowercasing, splitting on whitespace, and removing every
//! character that is not alphanumeric or `_` from each token (so `t-shirt` becomes
//! `tshirt`). Tokens of one character or less are discarded. Uses a single buffer
//! with byte spans instead of one `String` per token.

/// Tokenized text: owns the cleaned buffer, provides &str slices via byte spans.
pub struct Tokens {
    buffer: String,
    spans: Vec<(u32, u32)>, // (start, end) byte offsets into buffer
}

impl Tokens {
    /// Returns an iterator over the token `&str` slices.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.spans
            .iter()
            .map(|&(s, e)| &self.buffer[s as usize..e as usize])
    }

    /// Returns the number of tokens.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Returns `true` if there are no tokens.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

/// Tokenize text: lowercase, split on whitespace, strip punctuation, drop tokens of length <= 1.
pub fn tokenize(text: &str) -> Tokens {
    let lowered = text.to_lowercase();
    let mut buffer = String::with_capacity(lowered.len());
    let mut spans = Vec::new();
    let mut start = 0usize;
    let mut chars_in_token = 0usize;

    for c in lowered.chars() {
        if c.is_whitespace() {
            close_token(&mut buffer, &mut spans, start, chars_in_token);
            start = buffer.len();
            chars_in_token = 0;
        } else if c.is_alphanumeric() || c == '_' {
            buffer.push(c);
            chars_in_token += 1;
        }
    }
    close_token(&mut buffer, &mut spans, start, chars_in_token);

    Tokens { buffer, spans }
}

fn close_token(buffer: &mut String, spans: &mut Vec<(u32, u32)>, start: usize, chars: usize) {
    if chars > 1 {
        spans.push((start as u32, buffer.len() as u32));
    } else {
        // Single-character leftovers are dropped from the buffer too.
        buffer.truncate(start);
    }
}

/// Number of whitespace-separated words, used by auto mode selection.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        let tokens = tokenize("Red Cotton T-Shirt, size: M");
        let words: Vec<&str> = tokens.iter().collect();
        assert_eq!(words, vec!["red", "cotton", "tshirt", "size"]);
    }

    #[test]
    fn test_tokenize_empty_and_punctuation_only() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("  !!! ? - ").is_empty());
    }

    #[test]
    fn test_tokenize_keeps_digits() {
        let tokens = tokenize("iPhone 15 128GB");
        let words: Vec<&str> = tokens.iter().collect();
        assert_eq!(words, vec!["iphone", "15", "128gb"]);
    }

    #[test]
    fn test_tokenize_unicode_lowercase() {
        let tokens = tokenize("ÉCOUTEURS Sans-Fil");
        let words: Vec<&str> = tokens.iter().collect();
        assert_eq!(words, vec!["écouteurs", "sansfil"]);
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count("  what is the best  phone "), 5);
    }
}
