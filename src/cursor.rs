//! Pull-based access to the words of a tokenized line.
//!
//! The resolver consumes command names from the front of the line, then the resolved
//! command's parameter parsers consume the rest through the same cursor.

use std::fmt;

use crate::tokenizer::{TokenizedLine, Word};

/// Cursor over the remaining words of a command line.
pub trait CommandLine {
    /// Whether another word can be read.
    fn has_next(&self) -> bool;

    /// Look at the next word without consuming it.
    fn peek(&mut self) -> Option<&str>;

    /// Consume and return the next word.
    fn next_word(&mut self) -> Option<String>;

    /// Consume everything left and return it verbatim, starting at the raw text of the
    /// next word. Nothing can be read afterwards.
    fn flush(&mut self) -> String;

    /// The whole raw line.
    fn raw_line(&self) -> &str;
}

/// [`CommandLine`] over a [`TokenizedLine`].
#[derive(Debug, Clone)]
pub struct ParsedCommandLine {
    line: TokenizedLine,
    /// Index of the next unread word.
    pos: usize,
    /// Set once the remainder of the line was handed out.
    flushed: bool,
}

impl ParsedCommandLine {
    pub fn new(line: TokenizedLine) -> Self {
        Self {
            line,
            pos: 0,
            flushed: false,
        }
    }

    /// The words that have not been consumed yet.
    pub fn remaining(&self) -> &[Word] {
        if self.flushed {
            return &[];
        }
        &self.line.words()[self.pos..]
    }

    pub fn tokenized(&self) -> &TokenizedLine {
        &self.line
    }
}

impl CommandLine for ParsedCommandLine {
    fn has_next(&self) -> bool {
        !self.flushed && self.pos < self.line.words().len()
    }

    fn peek(&mut self) -> Option<&str> {
        if !self.has_next() {
            return None;
        }
        Some(self.line.words()[self.pos].text())
    }

    fn next_word(&mut self) -> Option<String> {
        if !self.has_next() {
            return None;
        }
        let word = self.line.words()[self.pos].text().to_string();
        self.pos += 1;
        Some(word)
    }

    fn flush(&mut self) -> String {
        let rest = if self.has_next() {
            let offset = self.line.words()[self.pos].raw_offset();
            self.line.line()[offset..].to_string()
        } else {
            String::new()
        };
        self.flushed = true;
        rest
    }

    fn raw_line(&self) -> &str {
        self.line.line()
    }
}

impl fmt::Display for ParsedCommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.line.line())
    }
}

/// Substitutes a default for a blank or missing first word.
///
/// Until something is consumed, a missing word or one that is only whitespace reads as
/// `default`. Afterwards the wrapped line is passed through untouched.
pub struct DefaultedLine<'a> {
    inner: &'a mut dyn CommandLine,
    default: &'a str,
    fetched: bool,
}

impl<'a> DefaultedLine<'a> {
    pub fn new(inner: &'a mut dyn CommandLine, default: &'a str) -> Self {
        Self {
            inner,
            default,
            fetched: false,
        }
    }
}

fn is_blank(word: Option<&str>) -> bool {
    word.is_none_or(|w| w.trim().is_empty())
}

impl CommandLine for DefaultedLine<'_> {
    fn has_next(&self) -> bool {
        if self.fetched {
            return self.inner.has_next();
        }
        true
    }

    fn peek(&mut self) -> Option<&str> {
        if self.fetched {
            return self.inner.peek();
        }
        let default = self.default;
        match self.inner.peek() {
            Some(word) if !word.trim().is_empty() => Some(word),
            _ => Some(default),
        }
    }

    fn next_word(&mut self) -> Option<String> {
        if self.fetched {
            return self.inner.next_word();
        }
        self.fetched = true;
        let word = self.inner.next_word();
        if is_blank(word.as_deref()) {
            return Some(self.default.to_string());
        }
        word
    }

    fn flush(&mut self) -> String {
        if self.fetched {
            return self.inner.flush();
        }
        self.fetched = true;
        let rest = self.inner.flush();
        if is_blank(Some(&rest)) {
            return self.default.to_string();
        }
        rest
    }

    fn raw_line(&self) -> &str {
        self.inner.raw_line()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::Tokenizer;

    fn cursor(line: &str) -> ParsedCommandLine {
        ParsedCommandLine::new(Tokenizer::default().tokenize_accepted(line).unwrap())
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut line = cursor("a b");
        assert_eq!(line.peek(), Some("a"));
        assert_eq!(line.peek(), Some("a"));
        assert_eq!(line.next_word().as_deref(), Some("a"));
        assert_eq!(line.next_word().as_deref(), Some("b"));
        assert!(!line.has_next());
        assert_eq!(line.next_word(), None);
        assert_eq!(line.peek(), None);
    }

    #[test]
    fn test_flush_returns_raw_remainder() {
        let mut line = cursor("say 'hello   world'  and\\ more");
        assert_eq!(line.next_word().as_deref(), Some("say"));
        assert_eq!(line.flush(), "'hello   world'  and\\ more");
        assert!(!line.has_next());
        assert_eq!(line.next_word(), None);
        assert_eq!(line.flush(), "");
    }

    #[test]
    fn test_flush_is_the_same_with_or_without_peek() {
        let mut peeked = cursor("say hi  there");
        peeked.next_word();
        peeked.peek();
        let mut unpeeked = cursor("say hi  there");
        unpeeked.next_word();
        assert_eq!(peeked.flush(), "hi  there");
        assert_eq!(unpeeked.flush(), "hi  there");
        assert!(!peeked.has_next());
        assert_eq!(peeked.peek(), None);
    }

    #[test]
    fn test_flush_at_end_is_empty() {
        let mut line = cursor("say ");
        line.next_word();
        // the trailing empty word sits at the end of the line
        assert_eq!(line.flush(), "");
    }

    #[test]
    fn test_remaining_tracks_consumption() {
        let mut line = cursor("a b c");
        line.next_word();
        let rest: Vec<&str> = line.remaining().iter().map(Word::text).collect();
        assert_eq!(rest, vec!["b", "c"]);
        line.flush();
        assert!(line.remaining().is_empty());
        assert_eq!(line.to_string(), "a b c");
    }

    #[test]
    fn test_defaulted_line_fills_blank_first_word() {
        let mut inner = cursor("cmd ");
        inner.next_word();
        let mut line = DefaultedLine::new(&mut inner, "fallback");
        assert!(line.has_next());
        assert_eq!(line.peek(), Some("fallback"));
        assert_eq!(line.next_word().as_deref(), Some("fallback"));
        assert!(!line.has_next());
    }

    #[test]
    fn test_defaulted_line_fills_missing_word() {
        let mut inner = cursor("cmd");
        inner.next_word();
        let mut line = DefaultedLine::new(&mut inner, "7");
        assert!(line.has_next());
        assert_eq!(line.next_word().as_deref(), Some("7"));
    }

    #[test]
    fn test_defaulted_line_passes_real_words_through() {
        let mut inner = cursor("cmd x y");
        inner.next_word();
        let mut line = DefaultedLine::new(&mut inner, "d");
        assert_eq!(line.next_word().as_deref(), Some("x"));
        assert_eq!(line.next_word().as_deref(), Some("y"));
    }
}
