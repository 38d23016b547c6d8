use crate::script::ScriptError;

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    Punct(&'static str),
    Eof,
}

#[derive(Clone, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: usize,
    pub newline_before: bool,
}

// Longest first so that greedy matching picks `>>>=` over `>>`.
const PUNCTUATORS: &[&str] = &[
    ">>>=", "===", "!==", ">>>", "<<=", ">>=", "==", "!=", "<=", ">=", "&&", "||", "++", "--", "+=", "-=", "*=",
    "/=", "%=", "&=", "|=", "^=", "<<", ">>", "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-", "*",
    "/", "%", "&", "|", "^", "!", "~", "?", ":", "=", ".",
];

struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, ScriptError> {
    let mut lexer = Lexer { chars: source.chars().collect(), pos: 0 };
    let mut tokens = Vec::new();
    loop {
        let newline_before = lexer.skip_trivia()?;
        let pos = lexer.pos;
        let kind = lexer.next_kind()?;
        let done = kind == TokenKind::Eof;
        tokens.push(Token { kind, pos, newline_before });
        if done {
            return Ok(tokens);
        }
    }
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn error(&self, message: impl Into<String>) -> ScriptError {
        ScriptError::Syntax { pos: self.pos, message: message.into() }
    }

    /// Skips whitespace and comments, reporting whether a line break was crossed.
    fn skip_trivia(&mut self) -> Result<bool, ScriptError> {
        let mut newline = false;
        while let Some(c) = self.peek() {
            match c {
                '\n' | '\r' | '\u{2028}' | '\u{2029}' => {
                    newline = true;
                    self.pos += 1;
                }
                c if c.is_whitespace() || c == '\u{feff}' => self.pos += 1,
                '/' if self.peek_at(1) == Some('/') => {
                    while !matches!(self.peek(), None | Some('\n') | Some('\r')) {
                        self.pos += 1;
                    }
                }
                '/' if self.peek_at(1) == Some('*') => {
                    self.pos += 2;
                    loop {
                        match self.peek() {
                            None => return Err(self.error("Unterminated comment")),
                            Some('*') if self.peek_at(1) == Some('/') => {
                                self.pos += 2;
                                break;
                            }
                            Some(c) => {
                                newline |= c == '\n';
                                self.pos += 1;
                            }
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(newline)
    }

    fn next_kind(&mut self) -> Result<TokenKind, ScriptError> {
        let c = match self.peek() {
            None => return Ok(TokenKind::Eof),
            Some(c) => c,
        };
        if c.is_ascii_digit() || (c == '.' && self.peek_at(1).map_or(false, |d| d.is_ascii_digit())) {
            return self.number();
        }
        if c == '"' || c == '\'' {
            return self.string(c);
        }
        if is_ident_start(c) {
            let start = self.pos;
            while self.peek().map_or(false, is_ident_part) {
                self.pos += 1;
            }
            return Ok(TokenKind::Ident(self.chars[start..self.pos].iter().collect()));
        }
        for punct in PUNCTUATORS {
            if punct.chars().enumerate().all(|(i, p)| self.peek_at(i) == Some(p)) {
                self.pos += punct.chars().count();
                return Ok(TokenKind::Punct(*punct));
            }
        }
        Err(self.error(format!("Unexpected character {:?}", c)))
    }

    fn number(&mut self) -> Result<TokenKind, ScriptError> {
        let start = self.pos;
        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X')) {
            self.pos += 2;
            let mut value = 0f64;
            let mut digits = 0;
            while let Some(d) = self.peek().and_then(|c| c.to_digit(16)) {
                value = value * 16.0 + f64::from(d);
                digits += 1;
                self.pos += 1;
            }
            if digits == 0 {
                return Err(self.error("Missing hexadecimal digits"));
            }
            return Ok(TokenKind::Number(value));
        }
        while self.peek().map_or(false, |c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some('.') {
            self.pos += 1;
            while self.peek().map_or(false, |c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let sign = usize::from(matches!(self.peek_at(1), Some('+') | Some('-')));
            if self.peek_at(1 + sign).map_or(false, |c| c.is_ascii_digit()) {
                self.pos += 1 + sign;
                while self.peek().map_or(false, |c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f64>().map(TokenKind::Number).map_err(|_| self.error(format!("Invalid number {:?}", text)))
    }

    fn hex_escape(&mut self, len: usize) -> Result<char, ScriptError> {
        let mut code = 0u32;
        for _ in 0..len {
            let digit = self.peek().and_then(|c| c.to_digit(16)).ok_or_else(|| self.error("Invalid escape"))?;
            code = code * 16 + digit;
            self.pos += 1;
        }
        Ok(char::from_u32(code).unwrap_or('\u{fffd}'))
    }

    fn string(&mut self, quote: char) -> Result<TokenKind, ScriptError> {
        self.pos += 1;
        let mut text = String::new();
        loop {
            let c = self.peek().ok_or_else(|| self.error("Unterminated string"))?;
            self.pos += 1;
            match c {
                c if c == quote => return Ok(TokenKind::Str(text)),
                '\n' | '\r' => return Err(self.error("Unterminated string")),
                '\\' => {
                    let escaped = self.peek().ok_or_else(|| self.error("Unterminated string"))?;
                    self.pos += 1;
                    match escaped {
                        'n' => text.push('\n'),
                        't' => text.push('\t'),
                        'r' => text.push('\r'),
                        'b' => text.push('\u{8}'),
                        'f' => text.push('\u{c}'),
                        'v' => text.push('\u{b}'),
                        '0' if !self.peek().map_or(false, |c| c.is_ascii_digit()) => text.push('\0'),
                        'x' => text.push(self.hex_escape(2)?),
                        'u' => text.push(self.hex_escape(4)?),
                        '\r' => {
                            if self.peek() == Some('\n') {
                                self.pos += 1;
                            }
                        }
                        '\n' => {}
                        other => text.push(other),
                    }
                }
                c => text.push(c),
            }
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphabetic()
}

fn is_ident_part(c: char) -> bool {
    is_ident_start(c) || c.is_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_tokenize_numbers_and_operators() {
        assert_eq!(
            kinds("oo[qo]>>>=0x1f;"),
            vec![
                TokenKind::Ident("oo".into()),
                TokenKind::Punct("["),
                TokenKind::Ident("qo".into()),
                TokenKind::Punct("]"),
                TokenKind::Punct(">>>="),
                TokenKind::Number(31.0),
                TokenKind::Punct(";"),
                TokenKind::Eof,
            ]
        );
        assert_eq!(kinds("1.5e2 .25"), vec![TokenKind::Number(150.0), TokenKind::Number(0.25), TokenKind::Eof]);
    }

    #[test]
    fn test_tokenize_string_escapes() {
        assert_eq!(
            kinds(r#"'a\'b' "\x41B\n""#),
            vec![TokenKind::Str("a'b".into()), TokenKind::Str("AB\n".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_tokenize_tracks_newlines_and_skips_comments() {
        let tokens = tokenize("a // note\n/* block */ b").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::Ident("b".into()));
        assert!(tokens[1].newline_before);
        assert!(!tokens[0].newline_before);
    }

    #[test]
    fn test_tokenize_rejects_unterminated_string() {
        assert!(matches!(tokenize("'abc"), Err(ScriptError::Syntax { .. })));
    }
}
