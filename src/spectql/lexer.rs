use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use super::error::SyntaxError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Names
    Identifier(String),
    /// Identifier written directly against `(`, e.g. `avg(`.
    Function(String),

    // Literals
    String(String),
    Number(f64),

    // Operators
    EqEq,
    NotEq,
    Gt,
    Lt,
    Amp,

    // Punctuation
    Slash,
    LBrace,
    RBrace,
    Comma,
    LParen,
    RParen,
    Star,
    Question,
    Colon,

    // Special
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Identifier(name) => write!(f, "identifier '{}'", name),
            TokenKind::Function(name) => write!(f, "function '{}'", name),
            TokenKind::String(s) => write!(f, "string '{}'", s),
            TokenKind::Number(n) => write!(f, "number {}", n),
            TokenKind::EqEq => f.write_str("'=='"),
            TokenKind::NotEq => f.write_str("'!='"),
            TokenKind::Gt => f.write_str("'>'"),
            TokenKind::Lt => f.write_str("'<'"),
            TokenKind::Amp => f.write_str("'&'"),
            TokenKind::Slash => f.write_str("'/'"),
            TokenKind::LBrace => f.write_str("'{'"),
            TokenKind::RBrace => f.write_str("'}'"),
            TokenKind::Comma => f.write_str("','"),
            TokenKind::LParen => f.write_str("'('"),
            TokenKind::RParen => f.write_str("')'"),
            TokenKind::Star => f.write_str("'*'"),
            TokenKind::Question => f.write_str("'?'"),
            TokenKind::Colon => f.write_str("':'"),
            TokenKind::Eof => f.write_str("end of query"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

impl Token {
    pub fn new(kind: TokenKind, position: usize) -> Self {
        Self { kind, position }
    }
}

/// Lexer over a query string. Positions are character offsets.
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            position: 0,
        }
    }

    /// Lexes the whole input; the last token is always `Eof`.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, SyntaxError> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token, SyntaxError> {
        self.skip_whitespace();

        let position = self.position;

        let c = match self.peek() {
            None => return Ok(Token::new(TokenKind::Eof, position)),
            Some(c) => c,
        };

        let single = match c {
            '/' => Some(TokenKind::Slash),
            '{' => Some(TokenKind::LBrace),
            '}' => Some(TokenKind::RBrace),
            ',' => Some(TokenKind::Comma),
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            '*' => Some(TokenKind::Star),
            '?' => Some(TokenKind::Question),
            '&' => Some(TokenKind::Amp),
            ':' => Some(TokenKind::Colon),
            '>' => Some(TokenKind::Gt),
            '<' => Some(TokenKind::Lt),
            _ => None,
        };
        if let Some(kind) = single {
            self.advance();
            return Ok(Token::new(kind, position));
        }

        match c {
            '=' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    Ok(Token::new(TokenKind::EqEq, position))
                } else {
                    Err(SyntaxError::new(position, "Expected '==' but found a single '='"))
                }
            }
            '!' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    Ok(Token::new(TokenKind::NotEq, position))
                } else {
                    Err(SyntaxError::new(position, "Unexpected character '!'"))
                }
            }
            '\'' => self.read_string(),
            '-' => self.read_number(),
            c if c.is_ascii_digit() => self.read_number(),
            c if c.is_alphabetic() || c == '_' => Ok(self.read_identifier()),
            c => Err(SyntaxError::new(
                position,
                format!("Unexpected character '{}'", c),
            )),
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c.is_some() {
            self.position += 1;
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_string(&mut self) -> Result<Token, SyntaxError> {
        let position = self.position;
        self.advance(); // consume opening quote
        let mut value = String::new();

        loop {
            match self.advance() {
                None => return Err(SyntaxError::new(position, "Unterminated string literal")),
                Some('\'') => {
                    // Doubled quote is an escaped quote
                    if self.peek() == Some('\'') {
                        value.push('\'');
                        self.advance();
                    } else {
                        break;
                    }
                }
                Some('\\') => match self.peek() {
                    Some(escaped @ ('\'' | '\\')) => {
                        value.push(escaped);
                        self.advance();
                    }
                    _ => value.push('\\'),
                },
                Some(c) => value.push(c),
            }
        }

        Ok(Token::new(TokenKind::String(value), position))
    }

    fn read_number(&mut self) -> Result<Token, SyntaxError> {
        let position = self.position;
        let mut text = String::new();

        if self.peek() == Some('-') {
            text.push('-');
            self.advance();
        }

        let mut digits = 0;
        let mut has_dot = false;
        let mut fraction_digits = 0;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                if has_dot {
                    fraction_digits += 1;
                } else {
                    digits += 1;
                }
                text.push(c);
                self.advance();
            } else if c == '.' && !has_dot {
                has_dot = true;
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 || (has_dot && fraction_digits == 0) {
            return Err(SyntaxError::new(
                position,
                format!("Invalid number literal '{}'", text),
            ));
        }

        text.parse::<f64>()
            .map(|n| Token::new(TokenKind::Number(n), position))
            .map_err(|_| SyntaxError::new(position, format!("Invalid number literal '{}'", text)))
    }

    fn read_identifier(&mut self) -> Token {
        let position = self.position;
        let mut value = String::new();

        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                value.push(c);
                self.advance();
            } else {
                break;
            }
        }

        if self.peek() == Some('(') {
            Token::new(TokenKind::Function(value), position)
        } else {
            Token::new(TokenKind::Identifier(value), position)
        }
    }
}
