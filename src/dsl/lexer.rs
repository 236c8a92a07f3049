//! Tokenizer for netlist files.
//!
//! Commas and horizontal whitespace separate tokens; newlines are tokens of
//! their own because every element or directive occupies one line.

use crate::error::{Result, SimError};

/// One lexeme with its 1-based source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Element name, node label, model name or keyword.
    Identifier,
    /// Numeric literal, scale suffix included (`4.7u`, `1meg`).
    Number,
    /// `.tran`, `.model`, ...
    Directive,
    OpenParen,
    CloseParen,
    Equals,
    Newline,
    Eof,
}

/// Streams tokens out of a netlist source.
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
                let text = self.read_identifier();
                if text.is_empty() {
                    return Err(SimError::lexer(line, column, "expected directive name after '.'"));
                }
                token(TokenKind::Directive, format!(".{}", text))
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
            '-' | '+' | '0'..='9' => {
                let text = self.read_number();
                if !text.chars().any(|c| c.is_ascii_digit()) {
                    let message = format!("malformed number '{}'", text);
                    return Err(SimError::lexer(line, column, message));
                }
                token(TokenKind::Number, text)
            }
            _ if ch.is_alphabetic() || ch == '_' => {
                token(TokenKind::Identifier, self.read_identifier())
            }
            _ => {
                return Err(SimError::lexer(line, column, format!("unexpected character '{}'", ch)));
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
            let starts_comment = ch == '#' || ch == ';' || (ch == '*' && self.column == 1);
            if ch == ' ' || ch == '\t' || ch == '\r' || ch == ',' {
                self.advance();
            } else if starts_comment {
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

    fn read_while(&mut self, text: &mut String, accept: impl Fn(char) -> bool) {
        while let Some(&ch) = self.chars.peek() {
            if !accept(ch) {
                break;
            }
            text.push(ch);
            self.advance();
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut text = String::new();
        self.read_while(&mut text, |ch| ch.is_alphanumeric() || ch == '_');
        text
    }

    fn read_number(&mut self) -> String {
        let mut text = String::new();

        if let Some(&sign) = self.chars.peek() {
            if sign == '-' || sign == '+' {
                text.push(sign);
                self.advance();
            }
        }

        self.read_while(&mut text, |ch| ch.is_ascii_digit());

        if self.chars.peek() == Some(&'.') {
            text.push('.');
            self.advance();
            self.read_while(&mut text, |ch| ch.is_ascii_digit());
        }

        if let Some(&e) = self.chars.peek() {
            if e == 'e' || e == 'E' {
                text.push(e);
                self.advance();
                if let Some(&sign) = self.chars.peek() {
                    if sign == '-' || sign == '+' {
                        text.push(sign);
                        self.advance();
                    }
                }
                self.read_while(&mut text, |ch| ch.is_ascii_digit());
            }
        }

        // Unit suffix and trailing unit letters ("10k", "4.7uF", "1meg")
        self.read_while(&mut text, |ch| ch.is_alphabetic());

        text
    }
}

/// Parse a number string with optional unit suffix.
///
/// Suffixes are case-sensitive: `m` is milli and `M` (or `meg`) is mega.
/// Letters after the scale suffix are treated as a unit and ignored.
pub fn parse_value(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let split = text
        .char_indices()
        .find(|(i, c)| c.is_alphabetic() && !is_exponent(text, *i))
        .map_or(text.len(), |(i, _)| i);
    let (num_str, suffix) = text.split_at(split);

    let multiplier = if suffix.len() >= 3 && suffix[..3].eq_ignore_ascii_case("meg") {
        1e6
    } else {
        match suffix.chars().next() {
            Some('f') => 1e-15,
            Some('p') => 1e-12,
            Some('n') => 1e-9,
            Some('u') | Some('µ') => 1e-6,
            Some('m') => 1e-3,
            Some('k') | Some('K') => 1e3,
            Some('M') => 1e6,
            Some('G') => 1e9,
            _ => 1.0,
        }
    };

    num_str.parse::<f64>().ok().map(|v| v * multiplier)
}

/// Whether the letter at `i` is the `e` of an exponent (followed by a digit or sign and digit).
fn is_exponent(text: &str, i: usize) -> bool {
    let bytes = text.as_bytes();
    if !matches!(bytes[i], b'e' | b'E') || i == 0 {
        return false;
    }
    if !bytes[i - 1].is_ascii_digit() && bytes[i - 1] != b'.' {
        return false;
    }
    match bytes.get(i + 1) {
        Some(b'-') | Some(b'+') => bytes.get(i + 2).map_or(false, u8::is_ascii_digit),
        Some(b) => b.is_ascii_digit(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_value() {
        assert_relative_eq!(parse_value("10k").unwrap(), 10_000.0);
        assert_relative_eq!(parse_value("100n").unwrap(), 100e-9);
        assert_relative_eq!(parse_value("4.7u").unwrap(), 4.7e-6);
        assert_relative_eq!(parse_value("1M").unwrap(), 1_000_000.0);
        assert_relative_eq!(parse_value("1meg").unwrap(), 1_000_000.0);
        assert_relative_eq!(parse_value("2.2").unwrap(), 2.2);
        assert_relative_eq!(parse_value("1e-9").unwrap(), 1e-9);
        assert_relative_eq!(parse_value("2.5e3k").unwrap(), 2.5e6);
        assert_relative_eq!(parse_value("10uF").unwrap(), 10e-6);
        assert_relative_eq!(parse_value("5V").unwrap(), 5.0);
        assert!(parse_value("abc").is_none());
    }

    #[test]
    fn test_lexer_basic() {
        let mut lexer = Lexer::new("R1 in out 10k");

        let tok = lexer.next_token().unwrap();
        assert_eq!(tok.kind, TokenKind::Identifier);
        assert_eq!(tok.text, "R1");

        let tok = lexer.next_token().unwrap();
        assert_eq!(tok.kind, TokenKind::Identifier);
        assert_eq!(tok.text, "in");

        lexer.next_token().unwrap();
        let tok = lexer.next_token().unwrap();
        assert_eq!(tok.kind, TokenKind::Number);
        assert_eq!(tok.text, "10k");
        assert_eq!(tok.column, 11);
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn test_lexer_directive_and_parens() {
        let mut lexer = Lexer::new(".model T1 IGBT (ron=1m)");
        let kinds: Vec<_> = std::iter::from_fn(|| {
            let tok = lexer.next_token().unwrap();
            (tok.kind != TokenKind::Eof).then_some(tok.kind)
        })
        .collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Directive,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::OpenParen,
                TokenKind::Identifier,
                TokenKind::Equals,
                TokenKind::Number,
                TokenKind::CloseParen,
            ]
        );
    }

    #[test]
    fn test_comments_and_lines() {
        let mut lexer = Lexer::new("* title\nR1 a b 1 ; note\n");
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Newline);
        let tok = lexer.next_token().unwrap();
        assert_eq!((tok.text.as_str(), tok.line), ("R1", 2));
    }

    #[test]
    fn test_unexpected_character() {
        let mut lexer = Lexer::new("R1 a $");
        lexer.next_token().unwrap();
        lexer.next_token().unwrap();
        assert!(matches!(
            lexer.next_token(),
            Err(SimError::LexerError { line: 1, column: 6, .. })
        ));
    }
}
