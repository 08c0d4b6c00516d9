//! Tokenizing of chat command arguments
//!
//! A token is either a run of characters that are neither whitespace nor a
//! quote, or the contents of a `"..."` or `'...'` span with the quotes
//! removed. A quote with no closing partner is skipped and whatever follows it
//! is tokenized as ordinary words. There is no escape processing.

/// Splits raw command text into positional tokens
pub fn tokenize(input: &str) -> Vec<String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if is_quote(c) {
            match chars[i + 1..].iter().position(|&next| next == c) {
                Some(len) => {
                    tokens.push(chars[i + 1..i + 1 + len].iter().collect());
                    i += len + 2;
                }
                None => i += 1,
            }
            continue;
        }

        let start = i;
        while i < chars.len() && !chars[i].is_whitespace() && !is_quote(chars[i]) {
            i += 1;
        }
        tokens.push(chars[start..i].iter().collect());
    }

    tokens
}

fn is_quote(c: char) -> bool {
    c == '"' || c == '\''
}

/// Tokens of one command invocation with a read cursor
///
/// Every accessor returns `None` once the cursor has run past the last token,
/// so callers always see a missing argument as an absent value.
#[derive(Debug, Clone, Default)]
pub struct CommandArguments {
    tokens: Vec<String>,
    cursor: usize,
}

impl CommandArguments {
    pub fn new(input: &str) -> Self {
        Self {
            tokens: tokenize(input),
            cursor: 0,
        }
    }

    /// Total number of tokens, independent of the cursor
    pub fn count(&self) -> usize {
        self.tokens.len()
    }

    pub fn next_string(&mut self) -> Option<String> {
        let token = self.tokens.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(token)
    }

    /// Joins every token from the cursor onwards with single spaces
    pub fn remaining_joined(&mut self) -> Option<String> {
        if self.cursor >= self.tokens.len() {
            return None;
        }
        let joined = self.tokens[self.cursor..].join(" ");
        self.cursor = self.tokens.len();
        Some(joined)
    }

    /// Consumes the next token even when it does not parse
    pub fn next_int(&mut self) -> Option<i32> {
        self.next_string()?.parse().ok()
    }

    /// Accepts `true`/`false` in any letter case; consumes the token either way
    pub fn next_bool(&mut self) -> Option<bool> {
        let token = self.next_string()?;
        if token.eq_ignore_ascii_case("true") {
            Some(true)
        } else if token.eq_ignore_ascii_case("false") {
            Some(false)
        } else {
            None
        }
    }
}
