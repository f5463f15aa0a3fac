//! The hand-written lexer.
//!
//! Produces the whole token sequence up-front; the parser works over the
//! in-memory slice. Whitespace within a line is insignificant; newlines
//! (and `;`) are separators; `//` starts a line comment.

use tir_common::Span;

use crate::error::LexicalError;
use crate::token::{Token, TokenKind};

/// Attributes the lexer accepts after `!`.
const KNOWN_ATTRIBUTES: &[&str] = &["inline"];

pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source,
            bytes: source.as_bytes(),
            pos: 0,
        }
    }

    /// Tokenise the whole input.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexicalError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(start as u32, self.pos as u32)
    }

    fn next_token(&mut self) -> Result<Option<Token>, LexicalError> {
        loop {
            match self.peek() {
                None => return Ok(None),
                Some(b' ') | Some(b'\t') | Some(b'\r') => {
                    self.pos += 1;
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                Some(_) => break,
            }
        }

        let start = self.pos;
        let b = self.bump().expect("peeked");
        let kind = match b {
            b'\n' | b';' => TokenKind::Newline,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b'<' => TokenKind::LAngle,
            b'>' => TokenKind::RAngle,
            b',' => TokenKind::Comma,
            b':' => TokenKind::Colon,
            b'=' => TokenKind::Equal,
            b'*' => TokenKind::Star,
            b'-' => match self.peek() {
                Some(b'>') => {
                    self.pos += 1;
                    TokenKind::Arrow
                }
                Some(d) if d.is_ascii_digit() => self.lex_number(start, true)?,
                _ => return Err(LexicalError::UnexpectedToken(self.span_from(start))),
            },
            b'0'..=b'9' => {
                self.pos = start;
                self.lex_number(start, false)?
            }
            b'"' => self.lex_string(start)?,
            b'@' => self.lex_prefixed(start, Prefix::Global)?,
            b'%' => self.lex_prefixed(start, Prefix::Local)?,
            b'\'' => self.lex_prefixed(start, Prefix::Block)?,
            b'$' => self.lex_prefixed(start, Prefix::Type)?,
            b'#' => self.lex_prefixed(start, Prefix::Field)?,
            b'?' => self.lex_prefixed(start, Prefix::Case)?,
            b'!' => self.lex_prefixed(start, Prefix::Attribute)?,
            b if is_identifier_start(b) => {
                self.pos = start;
                TokenKind::Word(self.lex_identifier())
            }
            _ => return Err(LexicalError::UnexpectedToken(self.span_from(start))),
        };
        Ok(Some(Token::new(kind, self.span_from(start))))
    }

    fn lex_identifier(&mut self) -> String {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_identifier_continue(b) {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.source[start..self.pos].to_string()
    }

    fn lex_digits(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_digit() {
                self.pos += 1;
            } else {
                break;
            }
        }
        &self.source[start..self.pos]
    }

    /// Numbers: decimal integers, floats with a decimal point, or a
    /// dimensions run like `2x3`. A leading `-` is allowed (consumed by
    /// the caller for the negative case).
    fn lex_number(&mut self, start: usize, negative: bool) -> Result<TokenKind, LexicalError> {
        if !negative {
            self.pos = start;
        }
        let digits_start = self.pos;
        self.lex_digits();
        if self.pos == digits_start {
            return Err(LexicalError::IllegalNumber(self.span_from(start)));
        }

        match self.peek() {
            Some(b'.') if self.peek_at(1).is_some_and(|b| b.is_ascii_digit()) => {
                self.pos += 1;
                self.lex_digits();
                if self.peek() == Some(b'.') || self.peek().is_some_and(is_identifier_start) {
                    return Err(LexicalError::IllegalNumber(self.span_from(start)));
                }
                let text = &self.source[start..self.pos];
                let value: f64 = text
                    .parse()
                    .map_err(|_| LexicalError::IllegalNumber(self.span_from(start)))?;
                Ok(TokenKind::Float(value))
            }
            Some(b'x') if !negative && self.peek_at(1).is_some_and(|b| b.is_ascii_digit()) => {
                let mut dims = vec![self.parse_dim(digits_start, self.pos, start)?];
                while self.peek() == Some(b'x')
                    && self.peek_at(1).is_some_and(|b| b.is_ascii_digit())
                {
                    self.pos += 1;
                    let dim_start = self.pos;
                    self.lex_digits();
                    dims.push(self.parse_dim(dim_start, self.pos, start)?);
                }
                if self.peek().is_some_and(is_identifier_start) {
                    return Err(LexicalError::IllegalNumber(self.span_from(start)));
                }
                Ok(TokenKind::Dimensions(dims))
            }
            Some(b) if is_identifier_start(b) => {
                Err(LexicalError::IllegalNumber(self.span_from(start)))
            }
            _ => {
                let text = &self.source[start..self.pos];
                let value: i64 = text
                    .parse()
                    .map_err(|_| LexicalError::IllegalNumber(self.span_from(start)))?;
                Ok(TokenKind::Integer(value))
            }
        }
    }

    fn parse_dim(&self, from: usize, to: usize, start: usize) -> Result<usize, LexicalError> {
        self.source[from..to]
            .parse()
            .map_err(|_| LexicalError::IllegalNumber(Span::new(start as u32, to as u32)))
    }

    fn lex_string(&mut self, start: usize) -> Result<TokenKind, LexicalError> {
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(LexicalError::UnclosedStringLiteral(self.span_from(start))),
                Some(b'\n') => {
                    return Err(LexicalError::UnclosedStringLiteral(self.span_from(start)));
                }
                Some(b'"') => return Ok(TokenKind::Str(value)),
                Some(b'\\') => match self.bump() {
                    Some(b'"') => value.push('"'),
                    Some(b'\\') => value.push('\\'),
                    Some(b'n') => value.push('\n'),
                    Some(b't') => value.push('\t'),
                    Some(b'r') => value.push('\r'),
                    _ => return Err(LexicalError::InvalidEscapeCharacter(self.span_from(start))),
                },
                Some(b) => {
                    // Continue through multi-byte UTF-8 sequences verbatim.
                    let char_start = self.pos - 1;
                    let mut end = self.pos;
                    while end < self.bytes.len() && (self.bytes[end] & 0xC0) == 0x80 {
                        end += 1;
                    }
                    self.pos = end;
                    let _ = b;
                    value.push_str(&self.source[char_start..end]);
                }
            }
        }
    }

    fn lex_prefixed(&mut self, start: usize, prefix: Prefix) -> Result<TokenKind, LexicalError> {
        match self.peek() {
            Some(d) if d.is_ascii_digit() => self.lex_anonymous(start, prefix),
            Some(b) if is_identifier_start(b) => {
                let name = self.lex_identifier();
                Ok(match prefix {
                    Prefix::Global => TokenKind::Global(name),
                    Prefix::Local => TokenKind::Local(name),
                    Prefix::Block => TokenKind::Block(name),
                    Prefix::Type => TokenKind::TypeName(name),
                    Prefix::Field => TokenKind::Field(name),
                    Prefix::Case => TokenKind::Case(name),
                    Prefix::Attribute => {
                        if !KNOWN_ATTRIBUTES.contains(&name.as_str()) {
                            return Err(LexicalError::UnknownAttribute(self.span_from(start)));
                        }
                        TokenKind::Attribute(name)
                    }
                })
            }
            _ => Err(LexicalError::ExpectingIdentifierName(self.span_from(start))),
        }
    }

    /// Anonymous identifier forms: `@N`, `'N`, `%B.I`, `%B^I`.
    fn lex_anonymous(&mut self, start: usize, prefix: Prefix) -> Result<TokenKind, LexicalError> {
        let first = self.lex_index(start, prefix)?;
        match prefix {
            Prefix::Global => {
                self.reject_identifier_tail(start, prefix)?;
                Ok(TokenKind::GlobalIndex(first))
            }
            Prefix::Block => {
                self.reject_identifier_tail(start, prefix)?;
                Ok(TokenKind::BlockIndex(first))
            }
            Prefix::Local => match self.peek() {
                Some(b'.') if self.peek_at(1).is_some_and(|b| b.is_ascii_digit()) => {
                    self.pos += 1;
                    let inst = self.lex_index(start, prefix)?;
                    self.reject_identifier_tail(start, prefix)?;
                    Ok(TokenKind::InstRef { block: first, inst })
                }
                Some(b'^') if self.peek_at(1).is_some_and(|b| b.is_ascii_digit()) => {
                    self.pos += 1;
                    let arg = self.lex_index(start, prefix)?;
                    self.reject_identifier_tail(start, prefix)?;
                    Ok(TokenKind::ArgRef { block: first, arg })
                }
                _ => Err(LexicalError::InvalidAnonymousLocalIdentifier(
                    self.span_from(start),
                )),
            },
            _ => Err(LexicalError::ExpectingIdentifierName(self.span_from(start))),
        }
    }

    fn lex_index(&mut self, start: usize, prefix: Prefix) -> Result<usize, LexicalError> {
        let digits_start = self.pos;
        self.lex_digits();
        self.source[digits_start..self.pos]
            .parse()
            .map_err(|_| self.bad_index_error(start, prefix))
    }

    fn reject_identifier_tail(&self, start: usize, prefix: Prefix) -> Result<(), LexicalError> {
        if self.peek().is_some_and(is_identifier_continue) {
            Err(self.bad_index_error(start, prefix))
        } else {
            Ok(())
        }
    }

    fn bad_index_error(&self, start: usize, prefix: Prefix) -> LexicalError {
        match prefix {
            Prefix::Block => LexicalError::InvalidBasicBlockIndex(self.span_from(start)),
            _ => LexicalError::InvalidAnonymousIdentifierIndex(self.span_from(start)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Prefix {
    Global,
    Local,
    Block,
    Type,
    Field,
    Case,
    Attribute,
}

/// Identifier names match `[A-Za-z_][A-Za-z0-9_.]*`.
fn is_identifier_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_identifier_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_prefixed_identifiers() {
        assert_eq!(
            kinds("@f %x 'entry $T #field ?case !inline"),
            vec![
                TokenKind::Global("f".into()),
                TokenKind::Local("x".into()),
                TokenKind::Block("entry".into()),
                TokenKind::TypeName("T".into()),
                TokenKind::Field("field".into()),
                TokenKind::Case("case".into()),
                TokenKind::Attribute("inline".into()),
            ]
        );
    }

    #[test]
    fn lexes_anonymous_forms() {
        assert_eq!(
            kinds("@2 '0 %1.3 %0^2"),
            vec![
                TokenKind::GlobalIndex(2),
                TokenKind::BlockIndex(0),
                TokenKind::InstRef { block: 1, inst: 3 },
                TokenKind::ArgRef { block: 0, arg: 2 },
            ]
        );
    }

    #[test]
    fn lexes_numbers_and_dimensions() {
        assert_eq!(
            kinds("42 -7 1.5 -2.25 2x3x4"),
            vec![
                TokenKind::Integer(42),
                TokenKind::Integer(-7),
                TokenKind::Float(1.5),
                TokenKind::Float(-2.25),
                TokenKind::Dimensions(vec![2, 3, 4]),
            ]
        );
    }

    #[test]
    fn semicolon_is_a_separator() {
        assert_eq!(
            kinds("a ; b"),
            vec![
                TokenKind::Word("a".into()),
                TokenKind::Newline,
                TokenKind::Word("b".into()),
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            kinds(r#""a\"b\\c\n""#),
            vec![TokenKind::Str("a\"b\\c\n".into())]
        );
        assert!(matches!(
            Lexer::new("\"abc").tokenize(),
            Err(LexicalError::UnclosedStringLiteral(_))
        ));
        assert!(matches!(
            Lexer::new(r#""\q""#).tokenize(),
            Err(LexicalError::InvalidEscapeCharacter(_))
        ));
    }

    #[test]
    fn rejects_malformed_numbers_and_identifiers() {
        assert!(matches!(
            Lexer::new("1.2.3").tokenize(),
            Err(LexicalError::IllegalNumber(_))
        ));
        assert!(matches!(
            Lexer::new("%3").tokenize(),
            Err(LexicalError::InvalidAnonymousLocalIdentifier(_))
        ));
        assert!(matches!(
            Lexer::new("!fast").tokenize(),
            Err(LexicalError::UnknownAttribute(_))
        ));
        assert!(matches!(
            Lexer::new("@ x").tokenize(),
            Err(LexicalError::ExpectingIdentifierName(_))
        ));
    }

    #[test]
    fn comments_run_to_end_of_line() {
        assert_eq!(
            kinds("a // comment\nb"),
            vec![
                TokenKind::Word("a".into()),
                TokenKind::Newline,
                TokenKind::Word("b".into()),
            ]
        );
    }
}
