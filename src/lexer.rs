//! A straightforward hand-written lexer producing the token contract in
//! [`crate::token`]. Deliberately unsophisticated: scanning is an external
//! collaborator per spec.md §1, so this is plumbing, not a component the
//! rest of the crate is designed around.

use crate::diagnostics::SourceLocation;
use crate::token::{Keyword, Literal, Token, TokenKind};
use std::path::PathBuf;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub location: SourceLocation,
    pub message: String,
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

impl std::error::Error for LexError {}

pub struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    line: usize,
    col: usize,
    file: Rc<PathBuf>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, file: PathBuf) -> Self {
        Lexer {
            source: source.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
            file: Rc::new(file),
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let loc = self.loc();
            let Some(c) = self.peek() else {
                tokens.push(Token::new(TokenKind::Eof, "", loc));
                break;
            };

            if c.is_ascii_digit() {
                tokens.push(self.lex_number()?);
                continue;
            }
            if c.is_ascii_alphabetic() || c == b'_' {
                tokens.push(self.lex_identifier_or_keyword());
                continue;
            }

            let tok = self.lex_punctuation()?;
            tokens.push(tok);
        }
        Ok(tokens)
    }

    fn loc(&self) -> SourceLocation {
        SourceLocation::new(Rc::clone(&self.file), self.line, self.col)
    }

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_whitespace() => {
                    self.advance();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while !matches!(self.peek(), None | Some(b'\n')) {
                        self.advance();
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    self.advance();
                    self.advance();
                    while !(self.peek() == Some(b'*') && self.peek_at(1) == Some(b'/')) {
                        if self.advance().is_none() {
                            break;
                        }
                    }
                    self.advance();
                    self.advance();
                }
                _ => break,
            }
        }
    }

    fn lex_number(&mut self) -> Result<Token, LexError> {
        let loc = self.loc();
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        let mut is_double = false;
        if self.peek() == Some(b'.') {
            is_double = true;
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            is_double = true;
            self.advance();
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.advance();
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let mut is_unsigned = false;
        let mut is_long = false;
        loop {
            match self.peek() {
                Some(b'u') | Some(b'U') if !is_double => {
                    is_unsigned = true;
                    self.advance();
                }
                Some(b'l') | Some(b'L') if !is_double => {
                    is_long = true;
                    self.advance();
                }
                _ => break,
            }
        }

        let lexeme = std::str::from_utf8(&self.source[start..self.pos])
            .unwrap()
            .to_string();
        let digits = lexeme.trim_end_matches(['u', 'U', 'l', 'L']);

        if is_double {
            let value: f64 = digits
                .parse()
                .map_err(|_| LexError {
                    location: loc.clone(),
                    message: format!("invalid floating constant '{lexeme}'"),
                })?;
            return Ok(Token::new(TokenKind::DoubleConstant, lexeme, loc)
                .with_literal(Literal::Double(value)));
        }

        if is_unsigned {
            let value: u64 = digits.parse().map_err(|_| LexError {
                location: loc.clone(),
                message: format!("invalid integer constant '{lexeme}'"),
            })?;
            return if is_long || value > u32::MAX as u64 {
                Ok(Token::new(TokenKind::ULongConstant, lexeme, loc)
                    .with_literal(Literal::ULong(value)))
            } else {
                Ok(Token::new(TokenKind::UIntConstant, lexeme, loc)
                    .with_literal(Literal::UInt(value)))
            };
        }

        let value: i64 = digits.parse().map_err(|_| LexError {
            location: loc.clone(),
            message: format!("invalid integer constant '{lexeme}'"),
        })?;
        if is_long || value > i32::MAX as i64 || value < i32::MIN as i64 {
            Ok(Token::new(TokenKind::LongConstant, lexeme, loc).with_literal(Literal::Long(value)))
        } else {
            Ok(Token::new(TokenKind::IntConstant, lexeme, loc).with_literal(Literal::Int(value)))
        }
    }

    fn lex_identifier_or_keyword(&mut self) -> Token {
        let loc = self.loc();
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_')
        {
            self.advance();
        }
        let text = std::str::from_utf8(&self.source[start..self.pos])
            .unwrap()
            .to_string();
        match Keyword::from_str(&text) {
            Some(kw) => Token::new(TokenKind::Keyword(kw), text, loc),
            None => Token::new(TokenKind::Identifier, text, loc),
        }
    }

    fn lex_punctuation(&mut self) -> Result<Token, LexError> {
        let loc = self.loc();
        let c = self.advance().unwrap();
        macro_rules! two {
            ($second:expr, $two_kind:expr, $one_kind:expr) => {{
                if self.peek() == Some($second) {
                    self.advance();
                    let lexeme = format!("{}{}", c as char, $second as char);
                    Ok(Token::new($two_kind, lexeme, loc))
                } else {
                    Ok(Token::new($one_kind, (c as char).to_string(), loc))
                }
            }};
        }
        match c {
            b'(' => Ok(Token::new(TokenKind::OpenParen, "(", loc)),
            b')' => Ok(Token::new(TokenKind::CloseParen, ")", loc)),
            b'{' => Ok(Token::new(TokenKind::OpenBrace, "{", loc)),
            b'}' => Ok(Token::new(TokenKind::CloseBrace, "}", loc)),
            b';' => Ok(Token::new(TokenKind::Semicolon, ";", loc)),
            b',' => Ok(Token::new(TokenKind::Comma, ",", loc)),
            b'~' => Ok(Token::new(TokenKind::Tilde, "~", loc)),
            b'+' => Ok(Token::new(TokenKind::Plus, "+", loc)),
            b'*' => Ok(Token::new(TokenKind::Star, "*", loc)),
            b'/' => Ok(Token::new(TokenKind::Slash, "/", loc)),
            b'%' => Ok(Token::new(TokenKind::Percent, "%", loc)),
            b'?' => Ok(Token::new(TokenKind::Question, "?", loc)),
            b':' => Ok(Token::new(TokenKind::Colon, ":", loc)),
            b'-' => {
                if self.peek() == Some(b'-') {
                    self.advance();
                    Ok(Token::new(TokenKind::MinusMinus, "--", loc))
                } else {
                    Ok(Token::new(TokenKind::Minus, "-", loc))
                }
            }
            b'!' => two!(b'=', TokenKind::BangEqual, TokenKind::Bang),
            b'=' => two!(b'=', TokenKind::EqualEqual, TokenKind::Equal),
            b'<' => two!(b'=', TokenKind::LessEqual, TokenKind::Less),
            b'>' => two!(b'=', TokenKind::GreaterEqual, TokenKind::Greater),
            b'&' if self.peek() == Some(b'&') => {
                self.advance();
                Ok(Token::new(TokenKind::AmpAmp, "&&", loc))
            }
            b'|' if self.peek() == Some(b'|') => {
                self.advance();
                Ok(Token::new(TokenKind::PipePipe, "||", loc))
            }
            other => Err(LexError {
                location: loc,
                message: format!("no matching token for '{}'", other as char),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src, PathBuf::from("t.c"))
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_main_return_two() {
        let ks = kinds("int main(void) { return 2; }");
        assert_eq!(
            ks,
            vec![
                TokenKind::Keyword(Keyword::Int),
                TokenKind::Identifier,
                TokenKind::OpenParen,
                TokenKind::Keyword(Keyword::Void),
                TokenKind::CloseParen,
                TokenKind::OpenBrace,
                TokenKind::Keyword(Keyword::Return),
                TokenKind::IntConstant,
                TokenKind::Semicolon,
                TokenKind::CloseBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn distinguishes_double_equal_and_assign() {
        assert_eq!(
            kinds("a == b = c"),
            vec![
                TokenKind::Identifier,
                TokenKind::EqualEqual,
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn rejects_unknown_character() {
        let err = Lexer::new("int x = `;", PathBuf::from("t.c")).tokenize();
        assert!(err.is_err());
    }

    #[test]
    fn long_suffix_forces_long_constant() {
        let toks = Lexer::new("5L", PathBuf::from("t.c")).tokenize().unwrap();
        assert_eq!(toks[0].kind, TokenKind::LongConstant);
    }
}
