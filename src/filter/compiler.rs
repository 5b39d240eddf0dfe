//! Recursive-descent parser from tokens to a [`FilterExpr`].
//!
//! ```text
//! expression := term ( ("and" | "or") term )*
//! term       := "not" term | comparison | "(" expression ")"
//! comparison := field ("=" | "=~") value
//! ```
//!
//! `and` and `or` share one precedence level and associate to the left.

use std::iter::Peekable;
use std::vec::IntoIter;

use crate::filter::lexer::{tokenize, Token, TokenKind};
use crate::models::filter::{CompiledFilter, Field, FilterExpr, Pattern};
use crate::utils::error::FilterSyntaxError;

const KW_AND: &str = "and";
const KW_OR: &str = "or";
const KW_NOT: &str = "not";

fn is_keyword(word: &str) -> bool {
    matches!(word, KW_AND | KW_OR | KW_NOT)
}

/// Compile filter text. Blank text compiles to the accept-all filter.
pub fn compile(text: &str) -> Result<CompiledFilter, FilterSyntaxError> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Ok(CompiledFilter::accept_all());
    }

    let mut parser = Parser {
        tokens: tokens.into_iter().peekable(),
        end: text.len(),
    };
    let expr = parser.expression()?;

    if let Some(token) = parser.tokens.next() {
        return Err(unexpected(&token));
    }

    Ok(CompiledFilter::new(text, expr))
}

fn unexpected(token: &Token) -> FilterSyntaxError {
    FilterSyntaxError::UnexpectedToken {
        found: token.kind.to_string(),
        position: token.position,
    }
}

struct Parser {
    tokens: Peekable<IntoIter<Token>>,
    /// Length of the source text, reported for errors at end of input
    end: usize,
}

impl Parser {
    fn end_of_input(&self) -> FilterSyntaxError {
        FilterSyntaxError::UnexpectedToken {
            found: "end of input".to_string(),
            position: self.end,
        }
    }

    /// Next token, unless the operand is missing (end of input or a closing parenthesis)
    fn operand(&mut self) -> Result<Token, FilterSyntaxError> {
        if let Some(token) = self.tokens.next_if(|t| t.kind != TokenKind::RParen) {
            return Ok(token);
        }
        let position = self.tokens.peek().map_or(self.end, |t| t.position);
        Err(FilterSyntaxError::EmptyExpression { position })
    }

    fn next_keyword(&mut self, keyword: &str) -> bool {
        self.tokens
            .next_if(|t| matches!(&t.kind, TokenKind::Word(w) if w == keyword))
            .is_some()
    }

    fn expression(&mut self) -> Result<FilterExpr, FilterSyntaxError> {
        let mut left = self.term()?;
        loop {
            if self.next_keyword(KW_AND) {
                let right = self.term()?;
                left = FilterExpr::And {
                    left: Box::new(left),
                    right: Box::new(right),
                };
            } else if self.next_keyword(KW_OR) {
                let right = self.term()?;
                left = FilterExpr::Or {
                    left: Box::new(left),
                    right: Box::new(right),
                };
            } else {
                return Ok(left);
            }
        }
    }

    fn term(&mut self) -> Result<FilterExpr, FilterSyntaxError> {
        let token = self.operand()?;

        match token.kind {
            TokenKind::Word(ref w) if w == KW_NOT => Ok(FilterExpr::Not {
                inner: Box::new(self.term()?),
            }),
            TokenKind::Word(ref w) if is_keyword(w) => Err(unexpected(&token)),
            TokenKind::Word(name) => self.comparison(name, token.position),
            TokenKind::LParen => {
                let inner = self.expression()?;
                match self.tokens.next() {
                    Some(Token { kind: TokenKind::RParen, .. }) => Ok(inner),
                    Some(other) => Err(unexpected(&other)),
                    None => Err(self.end_of_input()),
                }
            }
            _ => Err(unexpected(&token)),
        }
    }

    fn comparison(&mut self, name: String, position: usize) -> Result<FilterExpr, FilterSyntaxError> {
        let field = Field::resolve(&name)
            .ok_or(FilterSyntaxError::UnknownField { name, position })?;

        let is_match = match self.tokens.next() {
            Some(Token { kind: TokenKind::Eq, .. }) => false,
            Some(Token { kind: TokenKind::Match, .. }) => true,
            Some(other) => return Err(unexpected(&other)),
            None => return Err(self.end_of_input()),
        };

        let token = self.operand()?;
        let value_position = token.position;
        let value = match token.kind {
            TokenKind::Word(v) | TokenKind::Str(v) => v,
            _ => return Err(unexpected(&token)),
        };

        if is_match {
            let pattern = Pattern::new(&value).map_err(|e| FilterSyntaxError::InvalidPattern {
                pattern: value.clone(),
                position: value_position,
                reason: e.to_string(),
            })?;
            Ok(FilterExpr::Match { field, pattern })
        } else {
            Ok(FilterExpr::Comparison { field, literal: value })
        }
    }
}
