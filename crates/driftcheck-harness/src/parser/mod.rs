//! A minimal configuration parser for harness fixtures.
//!
//! Covers the subset of HCL-style syntax rule tests need: attributes with
//! string, number, and boolean literals, blocks with quoted labels
//! (including single-line bodies), `#` and `//` comments. Any other
//! attribute expression is kept as raw source text and is not statically
//! evaluable. Positions are tracked precisely so issue ranges can be
//! asserted against real line/column values.

use driftcheck_model::{Expression, Pos, Range};
use serde_json::Value;
use thiserror::Error;

#[cfg(test)]
mod tests;

/// A parse failure with its source location.
#[derive(Debug, Error)]
#[error("{filename}:{line}:{column}: {message}")]
pub struct ParseError {
    /// File the failure occurred in.
    pub filename: String,
    /// One-based line of the failure.
    pub line: usize,
    /// One-based column of the failure.
    pub column: usize,
    /// What went wrong.
    pub message: String,
}

/// An unfiltered attribute as written in source.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAttribute {
    /// Attribute name.
    pub name: String,
    /// The parsed value expression.
    pub expr: Expression,
    /// Span of the whole attribute, name through expression.
    pub range: Range,
    /// Span of just the name.
    pub name_range: Range,
}

/// An unfiltered block as written in source.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBlock {
    /// Block type keyword.
    pub block_type: String,
    /// Quoted labels in positional order.
    pub labels: Vec<String>,
    /// The block's body.
    pub body: RawBody,
    /// Span of type keyword through last label.
    pub def_range: Range,
    /// Span of the type keyword.
    pub type_range: Range,
    /// Span of each label, quotes included.
    pub label_ranges: Vec<Range>,
}

/// The full, unfiltered contents of one body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBody {
    /// Attributes in source order.
    pub attributes: Vec<RawAttribute>,
    /// Blocks in source order.
    pub blocks: Vec<RawBlock>,
}

/// Parses one source file into its raw body.
///
/// # Errors
///
/// Returns a [`ParseError`] naming the offending location on malformed
/// input.
pub fn parse(filename: &str, source: &str) -> Result<RawBody, ParseError> {
    let mut parser = Parser {
        filename,
        src: source,
        line: 1,
        column: 1,
        byte: 0,
    };
    let body = parser.parse_body(false)?;
    match parser.peek() {
        None => Ok(body),
        Some(ch) => Err(parser.error(format!("unexpected character '{ch}'"))),
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '-'
}

struct Parser<'s> {
    filename: &'s str,
    src: &'s str,
    line: usize,
    column: usize,
    byte: usize,
}

impl Parser<'_> {
    fn pos(&self) -> Pos {
        Pos::new(self.line, self.column, self.byte)
    }

    fn peek(&self) -> Option<char> {
        self.src[self.byte..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.byte += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(ch) if ch.is_whitespace() => {
                    self.bump();
                }
                Some('#') => self.skip_line(),
                Some('/') if self.src[self.byte..].starts_with("//") => self.skip_line(),
                _ => break,
            }
        }
    }

    fn skip_line(&mut self) {
        while let Some(ch) = self.bump() {
            if ch == '\n' {
                break;
            }
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            filename: self.filename.to_owned(),
            line: self.line,
            column: self.column,
            message: message.into(),
        }
    }

    /// Parses attributes and blocks until EOF, or until the enclosing
    /// block's `}` when `nested`. The closing brace is left unconsumed.
    fn parse_body(&mut self, nested: bool) -> Result<RawBody, ParseError> {
        let mut body = RawBody::default();
        loop {
            self.skip_trivia();
            match self.peek() {
                None => {
                    if nested {
                        return Err(self.error("unexpected end of file inside a block"));
                    }
                    return Ok(body);
                }
                Some('}') if nested => return Ok(body),
                Some(ch) if is_ident_start(ch) => {
                    let (name, name_range) = self.parse_ident();
                    self.skip_trivia();
                    match self.peek() {
                        Some('=') => {
                            self.bump();
                            body.attributes.push(self.parse_attribute(name, name_range)?);
                        }
                        Some('"' | '{') => {
                            body.blocks.push(self.parse_block(name, name_range)?);
                        }
                        _ => {
                            return Err(self.error(format!(
                                "expected '=', '{{', or a label after '{name}'"
                            )));
                        }
                    }
                }
                Some(ch) => return Err(self.error(format!("unexpected character '{ch}'"))),
            }
        }
    }

    fn parse_ident(&mut self) -> (String, Range) {
        let start = self.pos();
        let mut name = String::new();
        while let Some(ch) = self.peek() {
            if !is_ident_continue(ch) {
                break;
            }
            name.push(ch);
            self.bump();
        }
        (name, Range::new(self.filename, start, self.pos()))
    }

    fn parse_attribute(
        &mut self,
        name: String,
        name_range: Range,
    ) -> Result<RawAttribute, ParseError> {
        self.skip_trivia();
        let (expr, end) = self.parse_expression()?;
        let range = Range::new(self.filename, name_range.start, end);
        Ok(RawAttribute {
            name,
            expr,
            range,
            name_range,
        })
    }

    fn parse_expression(&mut self) -> Result<(Expression, Pos), ParseError> {
        if self.peek() == Some('"') {
            let (text, range) = self.parse_string()?;
            return Ok((Expression::Literal(Value::String(text)), range.end));
        }

        // Everything else is one token running to the end of the line,
        // stopping at an enclosing block's `}`. Bracketed sub-expressions
        // keep their own braces.
        let mut depth = 0u32;
        let mut text = String::new();
        let mut end = self.pos();
        loop {
            match self.peek() {
                None | Some('\n') => break,
                Some('}') if depth == 0 => break,
                Some(ch) => {
                    match ch {
                        '[' | '{' | '(' => depth += 1,
                        ']' | '}' | ')' => depth = depth.saturating_sub(1),
                        _ => {}
                    }
                    self.bump();
                    text.push(ch);
                    if !ch.is_whitespace() {
                        end = self.pos();
                    }
                }
            }
        }
        let text = text.trim_end();
        if text.is_empty() {
            return Err(self.error("expected an expression"));
        }

        let expr = match text {
            "true" => Expression::Literal(Value::Bool(true)),
            "false" => Expression::Literal(Value::Bool(false)),
            other => match serde_json::from_str::<Value>(other) {
                Ok(number @ Value::Number(_)) => Expression::Literal(number),
                _ => Expression::Raw(other.to_owned()),
            },
        };
        Ok((expr, end))
    }

    /// Parses a quoted string. The returned range includes the quotes.
    fn parse_string(&mut self) -> Result<(String, Range), ParseError> {
        let start = self.pos();
        self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some('"') => break,
                Some('\\') => match self.bump() {
                    None => return Err(self.error("unterminated string")),
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('"') => text.push('"'),
                    Some('\\') => text.push('\\'),
                    Some(other) => {
                        text.push('\\');
                        text.push(other);
                    }
                },
                Some(ch) => text.push(ch),
            }
        }
        Ok((text, Range::new(self.filename, start, self.pos())))
    }

    fn parse_block(
        &mut self,
        block_type: String,
        type_range: Range,
    ) -> Result<RawBlock, ParseError> {
        let mut labels = Vec::new();
        let mut label_ranges = Vec::new();
        let mut def_end = type_range.end;
        loop {
            self.skip_trivia();
            match self.peek() {
                Some('"') => {
                    let (label, range) = self.parse_string()?;
                    def_end = range.end;
                    labels.push(label);
                    label_ranges.push(range);
                }
                Some('{') => {
                    self.bump();
                    break;
                }
                _ => return Err(self.error("expected a label or '{'")),
            }
        }

        let body = self.parse_body(true)?;
        match self.peek() {
            Some('}') => {
                self.bump();
            }
            _ => return Err(self.error("expected '}'")),
        }

        Ok(RawBlock {
            block_type,
            labels,
            body,
            def_range: Range::new(self.filename, type_range.start, def_end),
            type_range,
            label_ranges,
        })
    }
}
