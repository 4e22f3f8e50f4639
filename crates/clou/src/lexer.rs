//! Converts source text into a terminal-`Eof`-terminated token stream (§4.1).

use std::rc::Rc;

use crate::error::LexError;
use crate::token::{Literal, Token, TokenKind};

pub struct Lexer<'a> {
    source: &'a [u8],
    start: usize,
    current: usize,
    line: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source: source.as_bytes(),
            start: 0,
            current: 0,
            line: 1,
        }
    }

    /// Scans the whole source, returning the token stream or the first lex error.
    pub fn scan_tokens(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.start = self.current;
            let Some(c) = self.advance() else {
                tokens.push(Token::new(TokenKind::Eof, "", None, self.line));
                return Ok(tokens);
            };
            if let Some(token) = self.scan_token(c)? {
                tokens.push(token);
            }
        }
    }

    fn scan_token(&mut self, c: u8) -> Result<Option<Token>, LexError> {
        use TokenKind::*;
        let token = match c {
            b'(' => self.make(LeftParen),
            b')' => self.make(RightParen),
            b'{' => self.make(LeftBrace),
            b'}' => self.make(RightBrace),
            b'[' => self.make(LeftBracket),
            b']' => self.make(RightBracket),
            b',' => self.make(Comma),
            b':' => self.make(Colon),
            b';' => self.make(Semicolon),
            b'+' => self.make(Plus),
            b'-' => self.make(Minus),
            b'*' => self.make(Star),
            b'%' => self.make(Percent),
            b'^' => self.make(Caret),
            b'.' => {
                if self.peek() == b'.' && self.peek_next() == b'.' {
                    self.advance();
                    self.advance();
                    self.make(Spread)
                } else {
                    self.make(Dot)
                }
            }
            b'!' => {
                let kind = if self.matches(b'=') { BangEqual } else { Bang };
                self.make(kind)
            }
            b'=' => {
                let kind = if self.matches(b'=') { EqualEqual } else { Equal };
                self.make(kind)
            }
            b'<' => {
                let kind = if self.matches(b'=') { LessEqual } else { Less };
                self.make(kind)
            }
            b'>' => {
                let kind = if self.matches(b'=') { GreaterEqual } else { Greater };
                self.make(kind)
            }
            b'/' => {
                if self.matches(b'/') {
                    while self.peek() != b'\n' && !self.is_at_end() {
                        self.advance();
                    }
                    return Ok(None);
                } else if self.matches(b'*') {
                    self.skip_block_comment();
                    return Ok(None);
                }
                self.make(Slash)
            }
            b' ' | b'\r' | b'\t' => return Ok(None),
            b'\n' => {
                self.line += 1;
                return Ok(None);
            }
            b'"' | b'\'' => return self.scan_string(c).map(Some),
            b'0'..=b'9' => Some(self.scan_number()),
            c if is_alpha(c) => Some(self.scan_identifier()),
            other => return Err(LexError::UnexpectedCharacter { ch: other as char, line: self.line }),
        };
        Ok(token)
    }

    fn skip_block_comment(&mut self) {
        let mut depth = 1usize;
        while depth > 0 && !self.is_at_end() {
            match self.advance() {
                Some(b'\n') => self.line += 1,
                Some(b'*') if self.peek() == b'/' => {
                    self.advance();
                    depth -= 1;
                }
                Some(b'/') if self.peek() == b'*' => {
                    self.advance();
                    depth += 1;
                }
                Some(_) => {}
                None => break,
            }
        }
    }

    fn scan_string(&mut self, quote: u8) -> Result<Token, LexError> {
        let content_start = self.current;
        while self.peek() != quote && !self.is_at_end() {
            if self.peek() == b'\n' {
                self.line += 1;
            }
            if self.peek() == b'\\' {
                // The escape and the character it guards are both kept verbatim;
                // interpreting escapes is explicitly not the lexer's job (§4.1).
                self.advance();
                if self.is_at_end() {
                    break;
                }
            }
            self.advance();
        }
        if self.is_at_end() {
            return Err(LexError::UnterminatedString { line: self.line });
        }
        let content_end = self.current;
        self.advance(); // closing quote
        let text: Rc<str> = Rc::from(std::str::from_utf8(&self.source[content_start..content_end]).unwrap());
        let lexeme = std::str::from_utf8(&self.source[self.start..self.current]).unwrap();
        Ok(Token::new(
            TokenKind::String,
            lexeme,
            Some(Literal::String(text)),
            self.line,
        ))
    }

    fn scan_number(&mut self) -> Token {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        let text = std::str::from_utf8(&self.source[self.start..self.current]).unwrap();
        let value: f64 = text.parse().expect("lexed number text must parse as f64");
        Token::new(TokenKind::Number, text, Some(Literal::Number(value)), self.line)
    }

    fn scan_identifier(&mut self) -> Token {
        while is_alphanumeric(self.peek()) {
            self.advance();
        }
        let text = std::str::from_utf8(&self.source[self.start..self.current]).unwrap();
        let kind = Token::keyword(text).unwrap_or(TokenKind::Identifier);
        Token::new(kind, text, None, self.line)
    }

    fn make(&self, kind: TokenKind) -> Option<Token> {
        let text = std::str::from_utf8(&self.source[self.start..self.current]).unwrap();
        Some(Token::new(kind, text, None, self.line))
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn advance(&mut self) -> Option<u8> {
        if self.is_at_end() {
            return None;
        }
        let c = self.source[self.current];
        self.current += 1;
        Some(c)
    }

    fn matches(&mut self, expected: u8) -> bool {
        if self.is_at_end() || self.source[self.current] != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn peek(&self) -> u8 {
        if self.is_at_end() {
            b'\0'
        } else {
            self.source[self.current]
        }
    }

    fn peek_next(&self) -> u8 {
        self.source.get(self.current + 1).copied().unwrap_or(b'\0')
    }
}

fn is_alpha(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_alphanumeric(c: u8) -> bool {
    is_alpha(c) || c.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src).scan_tokens().unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn skips_whitespace_and_comments() {
        let tokens = kinds("  // comment\n /* block \n comment */ let x = 1;");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Let,
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::Number,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn spread_is_three_dots_dot_is_one() {
        assert_eq!(kinds("...").first(), Some(&TokenKind::Spread));
        assert_eq!(kinds(".").first(), Some(&TokenKind::Dot));
    }

    #[test]
    fn unterminated_string_reports_line() {
        let err = Lexer::new("\"abc").scan_tokens().unwrap_err();
        assert!(matches!(err, LexError::UnterminatedString { line: 1 }));
    }

    #[test]
    fn string_literal_keeps_escapes_verbatim() {
        let tokens = Lexer::new(r#"'a\'b'"#).scan_tokens().unwrap();
        match &tokens[0].literal {
            Some(Literal::String(s)) => assert_eq!(&**s, r"a\'b"),
            other => panic!("expected string literal, got {other:?}"),
        }
    }

    #[test]
    fn unexpected_character_errors() {
        let err = Lexer::new("let x = @;").scan_tokens().unwrap_err();
        assert!(matches!(err, LexError::UnexpectedCharacter { ch: '@', .. }));
    }
}
