//! Lexer (tokenizer) for the power-tree DSL.

use crate::error::{PowerTreeError, Result};

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The token's text
    pub text: String,
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
}

/// Token types in the DSL.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// An identifier (component name, rail name, keyword, etc.)
    Identifier,
    /// A number (integer or floating point, possibly with suffix)
    Number,
    /// A directive (starts with '.')
    Directive,
    /// Open parenthesis '('
    OpenParen,
    /// Close parenthesis ')'
    CloseParen,
    /// Equals sign '='
    Equals,
    /// Newline
    Newline,
    /// End of file
    Eof,
}

/// Lexer for tokenizing netlist input.
pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input.
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    /// Get the next token.
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace_and_comments();

        let line = self.line;
        let column = self.column;
        let token = |kind: TokenKind, text: String| Token {
            kind,
            text,
            line,
            column,
        };

        let ch = match self.chars.peek().copied() {
            Some(ch) => ch,
            None => return Ok(token(TokenKind::Eof, String::new())),
        };

        let tok = match ch {
            '\n' => {
                self.advance();
                token(TokenKind::Newline, "\n".to_string())
            }
            '.' => {
                self.advance();
                match self.chars.peek() {
                    Some(c) if c.is_alphabetic() => {
                        let text = self.read_word();
                        token(TokenKind::Directive, format!(".{}", text))
                    }
                    _ => {
                        let text = format!(".{}", self.read_word());
                        self.classify(text, line, column)?
                    }
                }
            }
            '(' => {
                self.advance();
                token(TokenKind::OpenParen, "(".to_string())
            }
            ')' => {
                self.advance();
                token(TokenKind::CloseParen, ")".to_string())
            }
            '=' => {
                self.advance();
                token(TokenKind::Equals, "=".to_string())
            }
            '-' | '+' => {
                self.advance();
                let text = format!("{}{}", ch, self.read_word());
                if parse_value(&text).is_none() {
                    return Err(PowerTreeError::lexer(
                        line,
                        column,
                        format!("invalid number '{}'", text),
                    ));
                }
                token(TokenKind::Number, text)
            }
            _ if ch.is_alphanumeric() || ch == '_' => {
                let text = self.read_word();
                self.classify(text, line, column)?
            }
            _ => {
                return Err(PowerTreeError::lexer(
                    line,
                    column,
                    format!("unexpected character '{}'", ch),
                ));
            }
        };

        Ok(tok)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(&ch) = self.chars.peek() {
            if ch == ' ' || ch == '\t' || ch == '\r' || ch == ',' {
                self.advance();
            } else if ch == '#' || ch == ';' {
                while let Some(&c) = self.chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    /// Read a word of letters, digits, '_' and '.', plus an exponent sign
    /// directly after `e`/`E`.
    fn read_word(&mut self) -> String {
        let mut text = String::new();
        while let Some(&ch) = self.chars.peek() {
            let exponent_sign = (ch == '-' || ch == '+')
                && text.ends_with(['e', 'E'])
                && text.starts_with(|c: char| c.is_ascii_digit() || c == '.');
            if ch.is_alphanumeric() || ch == '_' || ch == '.' || exponent_sign {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        text
    }

    fn classify(&self, text: String, line: usize, column: usize) -> Result<Token> {
        let starts_numeric = text.starts_with(|c: char| c.is_ascii_digit() || c == '.');
        let kind = if starts_numeric && parse_value(&text).is_some() {
            TokenKind::Number
        } else {
            TokenKind::Identifier
        };
        Ok(Token {
            kind,
            text,
            line,
            column,
        })
    }
}

/// Parse a number string with optional unit suffix.
pub fn parse_value(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let (num_str, multiplier) = if let Some(last) = text.chars().last() {
        let mult = match last {
            'p' => 1e-12,
            'n' => 1e-9,
            'u' | 'µ' => 1e-6,
            'm' => 1e-3,
            'k' | 'K' => 1e3,
            'M' => 1e6,
            'G' => 1e9,
            _ => 1.0,
        };
        if mult != 1.0 {
            (&text[..text.len() - last.len_utf8()], mult)
        } else {
            (text, 1.0)
        }
    } else {
        (text, 1.0)
    };

    num_str
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v * multiplier)
}
