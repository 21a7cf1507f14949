// lungo-core - Tokenizer for Lungo source
// Copyright (c) 2026 Tom Waddington. MIT licensed.

//! The tokenizer.
//!
//! Source is a byte stream. Token classes, in matching order: parens,
//! whitespace and `;` line comments (skipped), double-quoted strings,
//! numbers (a digit run; containing a dot makes it a double), and
//! identifier characters; keywords are classified out of a finished
//! identifier, which gives them the required non-identifier boundary.
//! Any other byte is an error that consumes exactly one byte.
//!
//! Identifiers may start with `A-Z a-z < > = + - * /` and continue with
//! digits as well, so `-1` is the identifier `-1`, not a negative
//! literal; arithmetic operators resolve through the globals map.
//!
//! The lexer carries a two-token pushback buffer so the code generator
//! can peek ahead.

use std::fmt;

/// A token's class and payload.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    LeftParen,
    RightParen,
    Do,
    Def,
    Let,
    If,
    Fn,
    True,
    False,
    Nil,
    Integer(i64),
    Double(f64),
    Str(String),
    Identifier(String),
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LeftParen => write!(f, "("),
            TokenKind::RightParen => write!(f, ")"),
            TokenKind::Do => write!(f, "do"),
            TokenKind::Def => write!(f, "def"),
            TokenKind::Let => write!(f, "let"),
            TokenKind::If => write!(f, "if"),
            TokenKind::Fn => write!(f, "fn"),
            TokenKind::True => write!(f, "true"),
            TokenKind::False => write!(f, "false"),
            TokenKind::Nil => write!(f, "nil"),
            TokenKind::Integer(n) => write!(f, "{}", n),
            TokenKind::Double(d) => write!(f, "{}", d),
            TokenKind::Str(s) => write!(f, "\"{}\"", s),
            TokenKind::Identifier(name) => write!(f, "{}", name),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

/// A token with its source position (1-indexed).
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

/// A tokenizer error with position information.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}:{}", self.message, self.line, self.column)
    }
}

impl std::error::Error for LexError {}

fn is_identifier_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || matches!(byte, b'<' | b'>' | b'=' | b'+' | b'-' | b'*' | b'/')
}

fn is_identifier_continue(byte: u8) -> bool {
    is_identifier_start(byte) || byte.is_ascii_digit()
}

/// The tokenizer.
pub struct Lexer {
    source: Vec<u8>,
    index: usize,
    line: usize,
    column: usize,
    pushback: Vec<Token>,
}

impl Lexer {
    pub fn new(source: Vec<u8>) -> Self {
        Self {
            source,
            index: 0,
            line: 1,
            column: 1,
            pushback: Vec::with_capacity(2),
        }
    }

    /// Push a token back. At most two tokens may be buffered.
    pub fn put_back(&mut self, token: Token) {
        debug_assert!(self.pushback.len() < 2, "token pushback buffer is full");
        self.pushback.push(token);
    }

    /// Take the next token, draining the pushback buffer first.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        if let Some(token) = self.pushback.pop() {
            return Ok(token);
        }
        self.skip_whitespace_and_comments();

        let line = self.line;
        let column = self.column;
        let byte = match self.peek() {
            Some(byte) => byte,
            None => return Ok(self.token(TokenKind::Eof, line, column)),
        };

        match byte {
            b'(' => {
                self.advance();
                Ok(self.token(TokenKind::LeftParen, line, column))
            }
            b')' => {
                self.advance();
                Ok(self.token(TokenKind::RightParen, line, column))
            }
            b'"' => self.read_string(line, column),
            b'0'..=b'9' => self.read_number(line, column),
            _ if is_identifier_start(byte) => Ok(self.read_identifier(line, column)),
            other => {
                // last-resort class: consume one byte so the lexer always
                // makes progress
                self.advance();
                Err(LexError {
                    message: format!("Unexpected character '{}'", other as char),
                    line,
                    column,
                })
            }
        }
    }

    fn token(&self, kind: TokenKind, line: usize, column: usize) -> Token {
        Token { kind, line, column }
    }

    fn peek(&self) -> Option<u8> {
        self.source.get(self.index).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.index += 1;
        if byte == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(byte)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(byte) = self.peek() {
            match byte {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.advance();
                }
                b';' => {
                    while let Some(byte) = self.peek() {
                        if byte == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn read_string(&mut self, line: usize, column: usize) -> Result<Token, LexError> {
        self.advance(); // opening quote
        let mut text = Vec::new();
        loop {
            match self.advance() {
                Some(b'"') => break,
                Some(byte) => text.push(byte),
                None => {
                    return Err(LexError {
                        message: "Unterminated string".to_string(),
                        line,
                        column,
                    });
                }
            }
        }
        Ok(self.token(
            TokenKind::Str(String::from_utf8_lossy(&text).into_owned()),
            line,
            column,
        ))
    }

    fn read_number(&mut self, line: usize, column: usize) -> Result<Token, LexError> {
        let mut text = String::new();
        let mut saw_dot = false;
        while let Some(byte) = self.peek() {
            if byte.is_ascii_digit() {
                text.push(byte as char);
                self.advance();
            } else if byte == b'.' && !saw_dot {
                saw_dot = true;
                text.push('.');
                self.advance();
            } else {
                break;
            }
        }
        if saw_dot {
            match text.parse::<f64>() {
                Ok(value) => Ok(self.token(TokenKind::Double(value), line, column)),
                Err(_) => Err(LexError {
                    message: format!("Invalid double literal '{}'", text),
                    line,
                    column,
                }),
            }
        } else {
            match text.parse::<i64>() {
                Ok(value) => Ok(self.token(TokenKind::Integer(value), line, column)),
                Err(_) => Err(LexError {
                    message: format!("Integer literal '{}' out of range", text),
                    line,
                    column,
                }),
            }
        }
    }

    fn read_identifier(&mut self, line: usize, column: usize) -> Token {
        let mut text = String::new();
        while let Some(byte) = self.peek() {
            if is_identifier_continue(byte) {
                text.push(byte as char);
                self.advance();
            } else {
                break;
            }
        }
        let kind = match text.as_str() {
            "do" => TokenKind::Do,
            "def" => TokenKind::Def,
            "let" => TokenKind::Let,
            "if" => TokenKind::If,
            "fn" => TokenKind::Fn,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "nil" => TokenKind::Nil,
            _ => TokenKind::Identifier(text),
        };
        self.token(kind, line, column)
    }
}
