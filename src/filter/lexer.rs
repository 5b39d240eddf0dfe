//! Tokenizer for filter text.
//!
//! Lexing is context-sensitive in one place: the token right after `=` or
//! `=~` is a value, and a bareword value runs to the next whitespace or
//! quote. Parentheses inside a value are kept as long as they balance, so
//! `proto=~^(TC|UD)P` is one value while the `)` in `(src=10.0.0.1)` still
//! closes the group.

use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use crate::utils::error::FilterSyntaxError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Field name, keyword or bareword value
    Word(String),
    /// Quoted string, quotes stripped
    Str(String),
    /// `=`
    Eq,
    /// `=~`
    Match,
    LParen,
    RParen,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Word(w) => write!(f, "'{}'", w),
            TokenKind::Str(s) => write!(f, "string {:?}", s),
            TokenKind::Eq => f.write_str("'='"),
            TokenKind::Match => f.write_str("'=~'"),
            TokenKind::LParen => f.write_str("'('"),
            TokenKind::RParen => f.write_str("')'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the token's first character
    pub position: usize,
}

fn is_quote(c: char) -> bool {
    c == '\'' || c == '"'
}

pub struct Lexer<'a> {
    text: &'a str,
    chars: Peekable<CharIndices<'a>>,
    /// Previous token was an operator
    expect_value: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.char_indices().peekable(),
            expect_value: false,
        }
    }

    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
    }

    /// Offset of the next unread character
    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.text.len(), |(i, _)| *i)
    }

    fn quoted(&mut self, start: usize, quote: char) -> Result<TokenKind, FilterSyntaxError> {
        let body_start = start + quote.len_utf8();
        for (i, c) in self.chars.by_ref() {
            if c == quote {
                return Ok(TokenKind::Str(self.text[body_start..i].to_string()));
            }
        }
        Err(FilterSyntaxError::UnterminatedString { position: start })
    }

    /// Bareword in field/keyword position: stops at operators and parentheses
    fn word(&mut self, start: usize) -> TokenKind {
        while self
            .chars
            .next_if(|(_, c)| !(c.is_whitespace() || is_quote(*c) || matches!(*c, '(' | ')' | '=')))
            .is_some()
        {}
        let end = self.offset();
        TokenKind::Word(self.text[start..end].to_string())
    }

    /// Bareword in value position: stops at whitespace, quotes or an unmatched `)`
    fn value_word(&mut self, start: usize) -> TokenKind {
        let mut depth = 0usize;
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_whitespace() || is_quote(c) {
                break;
            }
            match c {
                '(' => depth += 1,
                ')' if depth == 0 => break,
                ')' => depth -= 1,
                _ => {}
            }
            self.chars.next();
        }
        let end = self.offset();
        TokenKind::Word(self.text[start..end].to_string())
    }

    fn next_token(&mut self) -> Option<Result<Token, FilterSyntaxError>> {
        self.skip_whitespace();
        let &(position, c) = self.chars.peek()?;
        let expect_value = std::mem::replace(&mut self.expect_value, false);

        let kind = if is_quote(c) {
            self.chars.next();
            match self.quoted(position, c) {
                Ok(kind) => kind,
                Err(e) => return Some(Err(e)),
            }
        } else if expect_value && c != ')' {
            self.value_word(position)
        } else {
            match c {
                '(' => {
                    self.chars.next();
                    TokenKind::LParen
                }
                ')' => {
                    self.chars.next();
                    TokenKind::RParen
                }
                '=' => {
                    self.chars.next();
                    self.expect_value = true;
                    if self.chars.next_if(|(_, c)| *c == '~').is_some() {
                        TokenKind::Match
                    } else {
                        TokenKind::Eq
                    }
                }
                _ => self.word(position),
            }
        };

        Some(Ok(Token { kind, position }))
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, FilterSyntaxError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

/// Split filter text into tokens
pub fn tokenize(text: &str) -> Result<Vec<Token>, FilterSyntaxError> {
    Lexer::new(text).collect()
}
