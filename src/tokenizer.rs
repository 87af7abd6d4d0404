//! Splitting of an edited line into logical words.
//!
//! The tokenizer understands quoting, escaping and (optionally) bracket balance, and keeps
//! track of where every logical word came from in the raw line. The same pass serves three
//! consumers: execution (resolving a command and its parameters), completion (finding the
//! word under the cursor) and validation (deciding whether the line needs more input).

use std::sync::Arc;

use thiserror::Error;

/// Bracket pairs the tokenizer can be asked to balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bracket {
    /// `(` and `)`
    Round,
    /// `{` and `}`
    Curly,
    /// `[` and `]`
    Square,
    /// `<` and `>`
    Angle,
}

impl Bracket {
    /// Opening and closing characters of this pair.
    pub fn chars(self) -> (char, char) {
        match self {
            Bracket::Round => ('(', ')'),
            Bracket::Curly => ('{', '}'),
            Bracket::Square => ('[', ']'),
            Bracket::Angle => ('<', '>'),
        }
    }
}

/// What the tokenized line is going to be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// The line was accepted and will be resolved and executed.
    Execute,
    /// The line is being completed; structural problems are tolerated.
    Complete,
    /// The editor asks whether the line is complete.
    Validate,
}

/// Lexical settings of the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizerConfig {
    /// Characters opening (and closing) a quoted region.
    pub quote_chars: Vec<char>,
    /// Characters escaping the character that follows. The first one is used when
    /// completion candidates must be escaped.
    pub escape_chars: Vec<char>,
    /// Report an unterminated quote as incomplete input.
    pub eof_on_unclosed_quote: bool,
    /// Report a trailing escape character as incomplete input.
    pub eof_on_escaped_newline: bool,
    /// Bracket pairs to balance outside of quotes. Empty disables the check.
    pub brackets: Vec<Bracket>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            quote_chars: vec!['\'', '"'],
            escape_chars: vec!['\\'],
            eof_on_unclosed_quote: true,
            eof_on_escaped_newline: true,
            brackets: Vec::new(),
        }
    }
}

impl TokenizerConfig {
    /// Enable balance checking for the given bracket pairs.
    pub fn with_brackets(mut self, brackets: &[Bracket]) -> Self {
        self.brackets.clear();
        for bracket in brackets {
            if !self.brackets.contains(bracket) {
                self.brackets.push(*bracket);
            }
        }
        self
    }

    fn is_quote(&self, ch: char) -> bool {
        self.quote_chars.contains(&ch)
    }

    fn is_escape(&self, ch: char) -> bool {
        self.escape_chars.contains(&ch)
    }

    fn is_delimiter(&self, ch: char) -> bool {
        ch.is_whitespace()
    }

    /// A character is escaped when an odd run of escape characters precedes it.
    fn is_escaped(&self, buf: &[char], pos: usize) -> bool {
        let run = buf[..pos]
            .iter()
            .rev()
            .take_while(|c| self.is_escape(**c))
            .count();
        run % 2 == 1
    }

    /// An escape character that is not itself escaped.
    fn is_escape_at(&self, buf: &[char], pos: usize) -> bool {
        self.is_escape(buf[pos]) && !self.is_escaped(buf, pos)
    }

    fn is_quote_at(&self, buf: &[char], pos: usize) -> bool {
        self.is_quote(buf[pos]) && !self.is_escaped(buf, pos)
    }

    fn is_delimiter_at(&self, buf: &[char], pos: usize) -> bool {
        !self.is_escaped(buf, pos) && self.is_delimiter(buf[pos])
    }
}

/// Reasons a line cannot be accepted yet.
///
/// These are never hard failures: an interactive editor keeps the line open, a one-shot
/// caller reports them as syntax errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Incomplete {
    /// The line ends with an escape character.
    #[error("escaped new line")]
    EscapedNewline,
    /// A quoted region is still open at the end of the line.
    #[error("missing closing quote ({})", quote_name(.quote))]
    MissingClosingQuote { quote: char },
    /// Brackets are still open; `expected` lists the closers, innermost first.
    #[error("missing closing brackets, add: {expected}")]
    MissingClosingBrackets {
        expected: String,
        open_brackets: usize,
        next_closing: Option<char>,
    },
    /// A closing bracket did not match any opening one.
    #[error("missing opening bracket: {bracket}")]
    MissingOpeningBracket {
        bracket: char,
        open_brackets: usize,
        next_closing: Option<char>,
    },
}

fn quote_name(quote: &char) -> &'static str {
    if *quote == '\'' { "quote" } else { "dquote" }
}

/// One logical word together with its location in the raw line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    text: String,
    raw_text: String,
    raw_offset: usize,
}

impl Word {
    /// Unquoted, unescaped value.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The exact source of this word, quotes and escapes included.
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// Byte offset of the raw text in the line.
    pub fn raw_offset(&self) -> usize {
        self.raw_offset
    }

    /// Byte length of the raw text.
    pub fn raw_len(&self) -> usize {
        self.raw_text.len()
    }
}

/// Bracket balance observed during a tokenizing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BracketReport {
    /// Number of brackets open at the cursor position.
    pub open_brackets: usize,
    /// Closers needed to balance the line, innermost first.
    pub missing_closing: Option<String>,
    /// Opening bracket matching an unexpected closer.
    pub missing_opening: Option<char>,
    /// Closer expected next at the cursor. Only reported when exactly two brackets are
    /// still nested at the end of the line.
    pub next_closing: Option<char>,
}

/// Immutable result of tokenizing one edited line.
#[derive(Debug, Clone)]
pub struct TokenizedLine {
    config: Arc<TokenizerConfig>,
    line: String,
    words: Vec<Word>,
    cursor: usize,
    cursor_word_index: Option<usize>,
    cursor_word_offset: usize,
    raw_word_cursor: usize,
    opening_quote: Option<char>,
    brackets: BracketReport,
}

impl TokenizedLine {
    /// The raw line.
    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    /// Byte position of the cursor in the line.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Index of the word under the cursor.
    pub fn cursor_word_index(&self) -> Option<usize> {
        self.cursor_word_index
    }

    /// Position of the cursor inside the logical text of the current word, in chars.
    pub fn cursor_word_offset(&self) -> usize {
        self.cursor_word_offset
    }

    /// Position of the cursor inside the raw text of the current word, in chars.
    pub fn raw_word_cursor(&self) -> usize {
        self.raw_word_cursor
    }

    /// The word under the cursor, or an empty string.
    pub fn word(&self) -> &str {
        self.cursor_word_index
            .and_then(|index| self.words.get(index))
            .map(Word::text)
            .unwrap_or("")
    }

    /// Quote opening the last word when that quote is still open.
    pub fn opening_quote(&self) -> Option<char> {
        self.opening_quote
    }

    pub fn brackets(&self) -> &BracketReport {
        &self.brackets
    }

    /// Render a completion candidate so that tokenizing the line again yields `candidate`
    /// as one logical word.
    ///
    /// When the current word was opened by a quote, the candidate reuses that quote and
    /// only escape characters and that quote are escaped. When the candidate carries quote
    /// characters of its own, only escape characters are escaped. Otherwise delimiters,
    /// quotes and escapes are all escaped. Without escape characters configured, a
    /// candidate containing delimiters is wrapped in single quotes instead. `complete`
    /// closes the quote after the candidate.
    pub fn escape(&self, candidate: &str, complete: bool) -> String {
        let config = &self.config;
        let chars: Vec<char> = candidate.chars().collect();
        let mut quote = self.opening_quote;
        let middle_quotes =
            self.opening_quote.is_none() && (0..chars.len()).any(|i| config.is_quote_at(&chars, i));

        let mut out = String::with_capacity(candidate.len() + 2);
        match config.escape_chars.first() {
            Some(&escape) => {
                for &ch in &chars {
                    let needs_escape = if let Some(opening) = self.opening_quote {
                        config.is_escape(ch) || ch == opening
                    } else if middle_quotes {
                        config.is_escape(ch)
                    } else {
                        config.is_delimiter(ch) || config.is_escape(ch) || config.is_quote(ch)
                    };
                    if needs_escape {
                        out.push(escape);
                    }
                    out.push(ch);
                }
            }
            None => {
                if self.opening_quote.is_none()
                    && !middle_quotes
                    && chars.iter().any(|c| config.is_delimiter(*c))
                {
                    quote = Some('\'');
                }
                out.push_str(candidate);
            }
        }

        match quote {
            Some(q) => {
                let mut quoted = String::with_capacity(out.len() + 2);
                quoted.push(q);
                quoted.push_str(&out);
                if complete {
                    quoted.push(q);
                }
                quoted
            }
            None => out,
        }
    }
}

/// Tracks bracket nesting outside of quotes.
struct BracketChecker {
    openings: Vec<char>,
    closings: Vec<char>,
    nested: Vec<usize>,
    cursor: usize,
    missing_opening: Option<usize>,
    open_brackets: usize,
    next_closing: Option<char>,
}

impl BracketChecker {
    fn new(brackets: &[Bracket], cursor: usize) -> Self {
        let (openings, closings) = brackets.iter().map(|b| b.chars()).unzip();
        Self {
            openings,
            closings,
            nested: Vec::new(),
            cursor,
            missing_opening: None,
            open_brackets: 0,
            next_closing: None,
        }
    }

    fn check(&mut self, ch: char, pos: usize) {
        if self.openings.is_empty() {
            return;
        }
        if let Some(id) = self.openings.iter().position(|c| *c == ch) {
            self.nested.push(id);
        } else if let Some(id) = self.closings.iter().position(|c| *c == ch) {
            if self.nested.last() == Some(&id) {
                self.nested.pop();
            } else {
                self.missing_opening = Some(id);
            }
        }
        if self.cursor > pos {
            self.open_brackets = self.nested.len();
            if let Some(&top) = self.nested.last() {
                self.next_closing = Some(self.closings[top]);
            }
        }
    }

    fn report(&self) -> BracketReport {
        let missing_closing = if self.nested.is_empty() {
            None
        } else {
            Some(self.nested.iter().rev().map(|id| self.closings[*id]).collect())
        };
        BracketReport {
            open_brackets: self.open_brackets,
            missing_closing,
            missing_opening: self.missing_opening.map(|id| self.openings[id]),
            next_closing: if self.nested.len() == 2 {
                self.next_closing
            } else {
                None
            },
        }
    }
}

/// Single pass over one line.
struct TokenizingFSM<'a> {
    config: &'a TokenizerConfig,
    chars: Vec<char>,
    offsets: Vec<usize>,
    line_len: usize,
    words: Vec<Word>,
    current: String,
    quote_start: Option<usize>,
    quoted_word: bool,
    raw_start: usize,
}

impl<'a> TokenizingFSM<'a> {
    fn new(config: &'a TokenizerConfig, line: &str) -> Self {
        let (offsets, chars) = line.char_indices().unzip();
        TokenizingFSM {
            config,
            chars,
            offsets,
            line_len: line.len(),
            words: Vec::new(),
            current: String::new(),
            quote_start: None,
            quoted_word: false,
            raw_start: 0,
        }
    }

    /// Byte offset of the char at `index`, or the line length past the end.
    fn byte_offset(&self, index: usize) -> usize {
        self.offsets.get(index).copied().unwrap_or(self.line_len)
    }

    fn emit(&mut self, line: &str, raw_end: usize) {
        let start = self.byte_offset(self.raw_start);
        let end = self.byte_offset(raw_end);
        self.words.push(Word {
            text: std::mem::take(&mut self.current),
            raw_text: line[start..end].to_string(),
            raw_offset: start,
        });
    }

    fn handle_char(&mut self, line: &str, i: usize, checker: &mut BracketChecker) {
        let ch = self.chars[i];
        let config = self.config;
        match self.quote_start {
            None if config.is_quote_at(&self.chars, i) => {
                self.quote_start = Some(i);
                if self.current.is_empty() {
                    self.quoted_word = true;
                } else {
                    self.quoted_word = false;
                    self.current.push(ch);
                }
            }
            Some(start) if self.chars[start] == ch && !config.is_escaped(&self.chars, i) => {
                if !self.quoted_word {
                    self.current.push(ch);
                }
                self.quote_start = None;
            }
            None if config.is_delimiter_at(&self.chars, i) => {
                if !self.current.is_empty() || self.quoted_word {
                    self.emit(line, i);
                }
                self.quoted_word = false;
                self.raw_start = i + 1;
            }
            _ => {
                if !config.is_escape_at(&self.chars, i) {
                    self.current.push(ch);
                    if self.quote_start.is_none() {
                        checker.check(ch, i);
                    }
                }
            }
        }
    }
}

/// Splits raw lines into [`TokenizedLine`]s.
#[derive(Debug, Clone, Default)]
pub struct Tokenizer {
    config: Arc<TokenizerConfig>,
}

impl Tokenizer {
    pub fn new(config: TokenizerConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &TokenizerConfig {
        &self.config
    }

    /// Tokenize `line` with the cursor at byte position `cursor`.
    ///
    /// A cursor past the end of the line is treated as being at the end. Outside of
    /// [`Mode::Complete`], structurally incomplete lines are rejected with [`Incomplete`].
    pub fn tokenize(
        &self,
        line: &str,
        cursor: usize,
        mode: Mode,
    ) -> Result<TokenizedLine, Incomplete> {
        let config = &*self.config;
        let cursor = cursor.min(line.len());
        let mut fsm = TokenizingFSM::new(config, line);
        let len = fsm.chars.len();
        // index of the first char at or after the cursor
        let cursor_index = fsm.offsets.iter().take_while(|offset| **offset < cursor).count();
        let cursor_at_end = cursor == line.len();
        let mut checker = BracketChecker::new(&config.brackets, cursor_index);

        let mut cursor_word_index = None;
        let mut cursor_word_offset = 0;
        let mut raw_word_cursor = 0;

        for i in 0..len {
            if i == cursor_index {
                cursor_word_index = Some(fsm.words.len());
                cursor_word_offset = fsm.current.chars().count();
                raw_word_cursor = i - fsm.raw_start;
            }
            fsm.handle_char(line, i, &mut checker);
        }

        let opening_quote = match fsm.quote_start {
            Some(start) if fsm.quoted_word => Some(fsm.chars[start]),
            _ => None,
        };

        if !fsm.current.is_empty() || cursor_at_end || fsm.quoted_word {
            fsm.emit(line, len);
        }

        if cursor_at_end {
            // completing at the end of the line completes the last word
            let last = fsm.words.len() - 1;
            cursor_word_index = Some(last);
            cursor_word_offset = fsm.words[last].text.chars().count();
            raw_word_cursor = len - fsm.raw_start;
        }

        if mode != Mode::Complete {
            if config.eof_on_escaped_newline
                && len > 0
                && config.is_escape_at(&fsm.chars, len - 1)
            {
                return Err(Incomplete::EscapedNewline);
            }
            if config.eof_on_unclosed_quote {
                if let Some(start) = fsm.quote_start {
                    return Err(Incomplete::MissingClosingQuote {
                        quote: fsm.chars[start],
                    });
                }
            }
            let report = checker.report();
            if let Some(expected) = report.missing_closing {
                return Err(Incomplete::MissingClosingBrackets {
                    expected,
                    open_brackets: report.open_brackets,
                    next_closing: report.next_closing,
                });
            }
            if let Some(bracket) = report.missing_opening {
                return Err(Incomplete::MissingOpeningBracket {
                    bracket,
                    open_brackets: report.open_brackets,
                    next_closing: report.next_closing,
                });
            }
        }

        Ok(TokenizedLine {
            config: Arc::clone(&self.config),
            line: line.to_string(),
            words: fsm.words,
            cursor,
            cursor_word_index,
            cursor_word_offset,
            raw_word_cursor,
            opening_quote,
            brackets: checker.report(),
        })
    }

    /// Tokenize an accepted line, cursor at its end.
    pub fn tokenize_accepted(&self, line: &str) -> Result<TokenizedLine, Incomplete> {
        self.tokenize(line, line.len(), Mode::Execute)
    }
}
