//! Byte-driven C lexer.
//!
//! Produces tokens with exact byte spans in one registered source file.
//! Comments and whitespace are skipped; backslash-newline splices are
//! treated as plain whitespace so that continued `#define` lines stay on
//! one logical line (the continuation tokens are not marked `starts_line`).

use crate::common::error::{AnalysisError, Result};
use crate::common::source::{SourceLocation, Span};

use super::token::{Token, TokenKind};

pub struct Lexer<'a> {
    bytes: &'a [u8],
    pos: usize,
    file_id: u32,
    at_line_start: bool,
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_cont(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

impl<'a> Lexer<'a> {
    pub fn new(content: &'a str, file_id: u32) -> Self {
        Self { bytes: content.as_bytes(), pos: 0, file_id, at_line_start: true }
    }

    /// Lex the whole file into a token vector (no Eof token appended; the
    /// preprocessor works on plain vectors).
    pub fn lex(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            if self.pos >= self.bytes.len() {
                return Ok(tokens);
            }
            let starts_line = self.at_line_start;
            self.at_line_start = false;
            let start = self.pos;
            let kind = self.next_kind()?;
            let span = Span::new(start as u32, self.pos as u32, self.file_id);
            tokens.push(Token::new(kind, span, starts_line));
        }
    }

    fn skip_trivia(&mut self) {
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            match b {
                b'\n' => {
                    self.pos += 1;
                    self.at_line_start = true;
                }
                b' ' | b'\t' | b'\r' => self.pos += 1,
                b'\\' if self.peek(1) == Some(b'\n') => {
                    // Line splice: swallow without opening a new line.
                    self.pos += 2;
                }
                b'\\' if self.peek(1) == Some(b'\r') && self.peek(2) == Some(b'\n') => {
                    self.pos += 3;
                }
                b'/' if self.peek(1) == Some(b'/') => {
                    while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
                        self.pos += 1;
                    }
                }
                b'/' if self.peek(1) == Some(b'*') => {
                    self.pos += 2;
                    while self.pos + 1 < self.bytes.len()
                        && !(self.bytes[self.pos] == b'*' && self.bytes[self.pos + 1] == b'/')
                    {
                        self.pos += 1;
                    }
                    self.pos = (self.pos + 2).min(self.bytes.len());
                }
                _ => return,
            }
        }
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn error(&self, message: &str) -> AnalysisError {
        // Line/column resolution happens later in the driver; here only the
        // offset is known.
        AnalysisError::Lex {
            loc: SourceLocation {
                file: format!("<file {}>", self.file_id),
                line: 0,
                column: self.pos as u32,
            },
            message: message.to_string(),
        }
    }

    fn next_kind(&mut self) -> Result<TokenKind> {
        let b = self.bytes[self.pos];

        if is_ident_start(b) {
            let start = self.pos;
            while self.pos < self.bytes.len() && is_ident_cont(self.bytes[self.pos]) {
                self.pos += 1;
            }
            let text = std::str::from_utf8(&self.bytes[start..self.pos])
                .map_err(|_| self.error("identifier is not valid UTF-8"))?;
            return Ok(TokenKind::Identifier(text.to_string()));
        }

        if b.is_ascii_digit() || (b == b'.' && self.peek(1).is_some_and(|c| c.is_ascii_digit())) {
            return self.lex_number();
        }

        if b == b'"' {
            return self.lex_string();
        }
        if b == b'\'' {
            return self.lex_char();
        }

        self.lex_punct()
    }

    fn lex_number(&mut self) -> Result<TokenKind> {
        let start = self.pos;
        let bytes = self.bytes;
        let mut is_float = false;

        if bytes[self.pos] == b'0'
            && matches!(self.peek(1), Some(b'x') | Some(b'X'))
        {
            self.pos += 2;
            while self.pos < bytes.len() && bytes[self.pos].is_ascii_hexdigit() {
                self.pos += 1;
            }
            let digits = std::str::from_utf8(&bytes[start + 2..self.pos])
                .map_err(|_| self.error("bad hex literal"))?;
            let value = u64::from_str_radix(digits, 16)
                .map_err(|_| self.error("hex literal out of range"))?;
            let unsigned = self.consume_int_suffix();
            return Ok(if unsigned || value > i64::MAX as u64 {
                TokenKind::UIntLiteral(value)
            } else {
                TokenKind::IntLiteral(value as i64)
            });
        }

        while self.pos < bytes.len() && bytes[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        if self.pos < bytes.len() && bytes[self.pos] == b'.' {
            is_float = true;
            self.pos += 1;
            while self.pos < bytes.len() && bytes[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
        }
        if self.pos < bytes.len() && matches!(bytes[self.pos], b'e' | b'E') {
            is_float = true;
            self.pos += 1;
            if self.pos < bytes.len() && matches!(bytes[self.pos], b'+' | b'-') {
                self.pos += 1;
            }
            while self.pos < bytes.len() && bytes[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
        }

        let text = std::str::from_utf8(&bytes[start..self.pos])
            .map_err(|_| self.error("bad numeric literal"))?
            .to_string();

        if is_float {
            // Float suffixes carry no semantic weight here.
            if self.pos < bytes.len() && matches!(bytes[self.pos], b'f' | b'F' | b'l' | b'L') {
                self.pos += 1;
            }
            let value: f64 = text.parse().map_err(|_| self.error("bad float literal"))?;
            return Ok(TokenKind::FloatLiteral(value));
        }

        // Octal when it starts with 0 and has more digits.
        let value = if text.len() > 1 && text.starts_with('0') {
            u64::from_str_radix(&text[1..], 8).map_err(|_| self.error("bad octal literal"))?
        } else {
            text.parse::<u64>().map_err(|_| self.error("integer literal out of range"))?
        };
        let unsigned = self.consume_int_suffix();
        Ok(if unsigned || value > i64::MAX as u64 {
            TokenKind::UIntLiteral(value)
        } else {
            TokenKind::IntLiteral(value as i64)
        })
    }

    /// Consume `u`/`l` suffix runs; returns true when an unsigned suffix
    /// was present.
    fn consume_int_suffix(&mut self) -> bool {
        let mut unsigned = false;
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'u' | b'U' => {
                    unsigned = true;
                    self.pos += 1;
                }
                b'l' | b'L' => self.pos += 1,
                _ => break,
            }
        }
        unsigned
    }

    fn lex_escape(&mut self) -> Result<char> {
        // Caller consumed the backslash.
        let b = self
            .bytes
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.error("unterminated escape sequence"))?;
        self.pos += 1;
        Ok(match b {
            b'n' => '\n',
            b't' => '\t',
            b'r' => '\r',
            b'0' => '\0',
            b'a' => '\x07',
            b'b' => '\x08',
            b'f' => '\x0c',
            b'v' => '\x0b',
            b'\\' => '\\',
            b'\'' => '\'',
            b'"' => '"',
            b'x' => {
                let mut value: u32 = 0;
                while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_hexdigit() {
                    let d = (self.bytes[self.pos] as char).to_digit(16).unwrap_or(0);
                    value = value.wrapping_mul(16).wrapping_add(d);
                    self.pos += 1;
                }
                char::from_u32(value & 0xff).unwrap_or('\0')
            }
            other => other as char,
        })
    }

    fn lex_string(&mut self) -> Result<TokenKind> {
        self.pos += 1; // opening quote
        let mut value = String::new();
        loop {
            let b = self
                .bytes
                .get(self.pos)
                .copied()
                .ok_or_else(|| self.error("unterminated string literal"))?;
            match b {
                b'"' => {
                    self.pos += 1;
                    return Ok(TokenKind::StringLiteral(value));
                }
                b'\\' => {
                    self.pos += 1;
                    value.push(self.lex_escape()?);
                }
                b'\n' => return Err(self.error("unterminated string literal")),
                _ => {
                    value.push(b as char);
                    self.pos += 1;
                }
            }
        }
    }

    fn lex_char(&mut self) -> Result<TokenKind> {
        self.pos += 1; // opening quote
        let b = self
            .bytes
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.error("unterminated character literal"))?;
        let value = if b == b'\\' {
            self.pos += 1;
            self.lex_escape()?
        } else {
            self.pos += 1;
            b as char
        };
        if self.bytes.get(self.pos) != Some(&b'\'') {
            return Err(self.error("unterminated character literal"));
        }
        self.pos += 1;
        Ok(TokenKind::CharLiteral(value))
    }

    fn lex_punct(&mut self) -> Result<TokenKind> {
        use TokenKind::*;
        let bytes = self.bytes;
        let b = bytes[self.pos];
        let two = self.peek(1);
        let three = self.peek(2);

        // Longest match first.
        let (kind, len) = match (b, two, three) {
            (b'.', Some(b'.'), Some(b'.')) => (Ellipsis, 3),
            (b'<', Some(b'<'), Some(b'=')) => (LessLessAssign, 3),
            (b'>', Some(b'>'), Some(b'=')) => (GreaterGreaterAssign, 3),
            (b'-', Some(b'>'), _) => (Arrow, 2),
            (b'+', Some(b'+'), _) => (PlusPlus, 2),
            (b'-', Some(b'-'), _) => (MinusMinus, 2),
            (b'+', Some(b'='), _) => (PlusAssign, 2),
            (b'-', Some(b'='), _) => (MinusAssign, 2),
            (b'*', Some(b'='), _) => (StarAssign, 2),
            (b'/', Some(b'='), _) => (SlashAssign, 2),
            (b'%', Some(b'='), _) => (PercentAssign, 2),
            (b'&', Some(b'='), _) => (AmpAssign, 2),
            (b'|', Some(b'='), _) => (PipeAssign, 2),
            (b'^', Some(b'='), _) => (CaretAssign, 2),
            (b'<', Some(b'<'), _) => (LessLess, 2),
            (b'>', Some(b'>'), _) => (GreaterGreater, 2),
            (b'=', Some(b'='), _) => (EqualEqual, 2),
            (b'!', Some(b'='), _) => (BangEqual, 2),
            (b'<', Some(b'='), _) => (LessEqual, 2),
            (b'>', Some(b'='), _) => (GreaterEqual, 2),
            (b'&', Some(b'&'), _) => (AmpAmp, 2),
            (b'|', Some(b'|'), _) => (PipePipe, 2),
            (b'#', Some(b'#'), _) => (HashHash, 2),
            (b'(', ..) => (LParen, 1),
            (b')', ..) => (RParen, 1),
            (b'{', ..) => (LBrace, 1),
            (b'}', ..) => (RBrace, 1),
            (b'[', ..) => (LBracket, 1),
            (b']', ..) => (RBracket, 1),
            (b';', ..) => (Semicolon, 1),
            (b',', ..) => (Comma, 1),
            (b'.', ..) => (Dot, 1),
            (b'+', ..) => (Plus, 1),
            (b'-', ..) => (Minus, 1),
            (b'*', ..) => (Star, 1),
            (b'/', ..) => (Slash, 1),
            (b'%', ..) => (Percent, 1),
            (b'&', ..) => (Amp, 1),
            (b'|', ..) => (Pipe, 1),
            (b'^', ..) => (Caret, 1),
            (b'~', ..) => (Tilde, 1),
            (b'!', ..) => (Bang, 1),
            (b'=', ..) => (Assign, 1),
            (b'<', ..) => (Less, 1),
            (b'>', ..) => (Greater, 1),
            (b'?', ..) => (Question, 1),
            (b':', ..) => (Colon, 1),
            (b'#', ..) => (Hash, 1),
            _ => return Err(self.error(&format!("unexpected character '{}'", b as char))),
        };
        self.pos += len;
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<Token> {
        Lexer::new(src, 0).lex().unwrap()
    }

    #[test]
    fn spans_cover_exact_text() {
        let toks = lex("int x = 42;");
        let texts: Vec<&str> = toks.iter().map(|t| &"int x = 42;"[t.span.start as usize..t.span.end as usize]).collect();
        assert_eq!(texts, vec!["int", "x", "=", "42", ";"]);
        assert!(toks[0].starts_line);
        assert!(!toks[1].starts_line);
    }

    #[test]
    fn line_splice_does_not_open_a_line() {
        let toks = lex("#define A \\\n 1\nint x;");
        // The `1` continues the #define line.
        let one = toks.iter().find(|t| matches!(t.kind, TokenKind::IntLiteral(1))).unwrap();
        assert!(!one.starts_line);
        let int_kw = toks.iter().find(|t| t.ident() == Some("int")).unwrap();
        assert!(int_kw.starts_line);
    }

    #[test]
    fn literal_forms() {
        let toks = lex("0x10 010 1u 1.5 'a' \"hi\\n\"");
        assert!(matches!(toks[0].kind, TokenKind::IntLiteral(16)));
        assert!(matches!(toks[1].kind, TokenKind::IntLiteral(8)));
        assert!(matches!(toks[2].kind, TokenKind::UIntLiteral(1)));
        assert!(matches!(toks[3].kind, TokenKind::FloatLiteral(v) if (v - 1.5).abs() < 1e-9));
        assert!(matches!(toks[4].kind, TokenKind::CharLiteral('a')));
        assert!(matches!(toks[5].kind, TokenKind::StringLiteral(ref s) if s == "hi\n"));
    }

    #[test]
    fn keywords_stay_identifiers_until_parse() {
        let toks = lex("while");
        assert!(matches!(toks[0].kind, TokenKind::Identifier(ref s) if s == "while"));
    }
}
