use super::token::{Pos, Token, TokenKind};
use std::iter::Peekable;
use std::str::CharIndices;

/// Tokenize text spanning several lines; `first_line` is the number of its first line.
pub fn tokenize(text: &str, first_line: usize) -> Vec<Token> {
    let mut tokens = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        tokens.extend(LineLexer::new(line, first_line + idx, 1).parse());
    }
    tokens
}

pub struct LineLexer<'a> {
    iter: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
}

impl<'a> LineLexer<'a> {
    /// `column` is the column of the first character of `text`.
    pub fn new(text: &'a str, line: usize, column: usize) -> Self {
        Self {
            iter: text.char_indices().peekable(),
            line,
            column,
        }
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

impl<'a> LineLexer<'a> {
    fn peek_nth(&self, n: usize) -> Option<(usize, char)> {
        self.iter.clone().nth(n)
    }
    fn consume(&mut self) -> Option<(usize, char)> {
        self.iter.next()
    }
    fn take_while(&mut self, lexeme: &mut String, cond: impl Fn(char) -> bool) {
        while let Some((_, ch)) = self.iter.next_if(|(_, ch)| cond(*ch)) {
            lexeme.push(ch);
        }
    }
}

// ----------------------------------------------------------------------------
// Lexer
// ----------------------------------------------------------------------------

impl<'a> LineLexer<'a> {
    pub fn parse(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some((idx, ch0)) = self.peek_nth(0) {
            // 0. Skip whitespaces
            if ch0.is_whitespace() {
                self.consume();
                continue;
            }

            let pos = Pos::new(self.line, self.column + idx);

            // 1. Double character token
            if let Some((_, ch1)) = self.peek_nth(1) {
                // Comment
                if ch0 == '/' && ch1 == '/' {
                    self.consume();
                    self.consume();
                    let comment = self.iter.map(|(_, ch)| ch).collect::<String>();
                    tokens.push(Token::new(TokenKind::Comment(comment.trim().to_string()), pos));
                    break;
                }

                if let Some(kind) = double_char_token(ch0, ch1) {
                    self.consume();
                    self.consume();
                    tokens.push(Token::new(kind, pos));
                    continue;
                }
            }

            // 2. Single character token
            if let Some(kind) = single_char_token(ch0) {
                self.consume();
                tokens.push(Token::new(kind, pos));
                continue;
            }

            // 3. Number literal
            if ch0.is_ascii_digit() {
                tokens.push(Token::new(self.parse_number(), pos));
                continue;
            }

            // 4. String literal
            if ch0 == '"' {
                tokens.push(Token::new(self.parse_text(), pos));
                continue;
            }

            // 5. Identifier or keyword
            if ch0.is_alphabetic() || ch0 == '_' || ch0 == '$' {
                tokens.push(Token::new(self.parse_ident(), pos));
                continue;
            }

            // Error
            self.consume();
            tokens.push(Token::new(TokenKind::Error(format!("{ch0}")), pos));
        }
        tokens
    }

    fn parse_ident(&mut self) -> TokenKind {
        let mut lexeme = String::new();
        self.take_while(&mut lexeme, |ch| {
            ch.is_alphanumeric() || ch == '_' || ch == '$'
        });
        match keyword(&lexeme) {
            Some(kind) => kind,
            None => TokenKind::Ident(lexeme),
        }
    }

    // Text: "hoge\nfuga"
    fn parse_text(&mut self) -> TokenKind {
        self.consume();

        let mut lexeme = String::new();
        let mut escape = false;
        loop {
            let Some((_, ch)) = self.consume() else {
                return TokenKind::Error(format!("\"{lexeme}"));
            };
            if escape {
                match ch {
                    '\\' => lexeme.push('\\'),
                    '"' => lexeme.push('"'),
                    '\'' => lexeme.push('\''),
                    'n' => lexeme.push('\n'),
                    't' => lexeme.push('\t'),
                    'r' => lexeme.push('\r'),
                    '0' => lexeme.push('\0'),
                    ch => return TokenKind::Error(format!("\\{ch}")),
                }
                escape = false;
            } else {
                match ch {
                    '"' => break,
                    '\\' => escape = true,
                    ch => lexeme.push(ch),
                }
            }
        }
        TokenKind::Text(lexeme)
    }

    fn parse_number(&mut self) -> TokenKind {
        let mut lexeme = String::new();
        if let (Some((_, '0')), Some((_, ch1))) = (self.peek_nth(0), self.peek_nth(1)) {
            let radix = match ch1 {
                'x' | 'X' => 16,
                'b' | 'B' => 2,
                _ => 0,
            };
            if radix != 0 {
                self.consume();
                self.consume();
                lexeme.push('0');
                lexeme.push(ch1);
                self.take_while(&mut lexeme, |ch| ch == '_' || ch.is_digit(radix));
                self.long_suffix(&mut lexeme);
                return radix_number(lexeme, 2, radix);
            }
        }

        self.take_while(&mut lexeme, |ch| ch == '_' || ch.is_ascii_digit());

        let mut real = false;
        if let (Some((_, '.')), Some((_, ch1))) = (self.peek_nth(0), self.peek_nth(1)) {
            if ch1.is_ascii_digit() {
                self.consume();
                lexeme.push('.');
                self.take_while(&mut lexeme, |ch| ch.is_ascii_digit());
                real = true;
            }
        }
        if let Some((_, 'e' | 'E')) = self.peek_nth(0) {
            let signed = matches!(self.peek_nth(1), Some((_, '+' | '-')));
            let digit_at = if signed { 2 } else { 1 };
            if let Some((_, d)) = self.peek_nth(digit_at) {
                if d.is_ascii_digit() {
                    for _ in 0..digit_at {
                        if let Some((_, ch)) = self.consume() {
                            lexeme.push(ch);
                        }
                    }
                    self.take_while(&mut lexeme, |ch| ch.is_ascii_digit());
                    real = true;
                }
            }
        }
        if let Some((_, ch @ ('f' | 'F' | 'd' | 'D'))) = self.peek_nth(0) {
            self.consume();
            lexeme.push(ch);
            real = true;
        }

        if real {
            let body = lexeme.trim_end_matches(&['f', 'F', 'd', 'D'][..]).replace('_', "");
            return match body.parse::<f64>() {
                Ok(num) => TokenKind::Real(lexeme, num),
                Err(_) => TokenKind::Error(lexeme),
            };
        }

        self.long_suffix(&mut lexeme);
        let body = lexeme.trim_end_matches(&['l', 'L'][..]);
        if body.len() > 1 && body.starts_with('0') {
            radix_number(lexeme, 1, 8)
        } else {
            radix_number(lexeme, 0, 10)
        }
    }

    fn long_suffix(&mut self, lexeme: &mut String) {
        if let Some((_, ch @ ('l' | 'L'))) = self.peek_nth(0) {
            self.consume();
            lexeme.push(ch);
        }
    }
}

fn radix_number(lexeme: String, skip: usize, radix: u32) -> TokenKind {
    let digits = lexeme[skip..]
        .trim_end_matches(&['l', 'L'][..])
        .replace('_', "");
    if digits.is_empty() {
        return TokenKind::Error(lexeme);
    }
    // decimal literals must fit i64; others may use all 64 bits
    let parsed = if radix == 10 {
        digits.parse::<i64>().ok()
    } else {
        u64::from_str_radix(&digits, radix).ok().map(|n| n as i64)
    };
    match parsed {
        Some(num) => TokenKind::Integer(lexeme, num),
        None => TokenKind::Error(lexeme),
    }
}

fn double_char_token(ch0: char, ch1: char) -> Option<TokenKind> {
    match (ch0, ch1) {
        ('=', '=') => Some(TokenKind::EqualEqual),
        ('!', '=') => Some(TokenKind::ExclEqual),
        ('<', '=') => Some(TokenKind::LAngleEqual),
        ('>', '=') => Some(TokenKind::RAngleEqual),
        ('<', '<') => Some(TokenKind::LAngleLAngle),
        ('>', '>') => Some(TokenKind::RAngleRAngle),
        ('&', '&') => Some(TokenKind::AmpAmp),
        ('|', '|') => Some(TokenKind::PipePipe),
        _ => None,
    }
}

fn single_char_token(ch: char) -> Option<TokenKind> {
    match ch {
        '=' => Some(TokenKind::Equal),
        '+' => Some(TokenKind::Plus),
        '-' => Some(TokenKind::Minus),
        '*' => Some(TokenKind::Star),
        '/' => Some(TokenKind::Slash),
        '%' => Some(TokenKind::Percent),
        '#' => Some(TokenKind::Hash),
        '&' => Some(TokenKind::Ampasand),
        '|' => Some(TokenKind::Pipe),
        '^' => Some(TokenKind::Caret),
        '!' => Some(TokenKind::Excl),
        '?' => Some(TokenKind::Question),
        ':' => Some(TokenKind::Colon),
        ';' => Some(TokenKind::Semicolon),
        ',' => Some(TokenKind::Comma),
        '.' => Some(TokenKind::Period),
        '(' => Some(TokenKind::LParen),
        ')' => Some(TokenKind::RParen),
        '[' => Some(TokenKind::LBracket),
        ']' => Some(TokenKind::RBracket),
        '{' => Some(TokenKind::LCurly),
        '}' => Some(TokenKind::RCurly),
        '<' => Some(TokenKind::LAngle),
        '>' => Some(TokenKind::RAngle),
        _ => None,
    }
}

fn keyword(s: &str) -> Option<TokenKind> {
    match s {
        "macro" => Some(TokenKind::KwMacro),
        "var" => Some(TokenKind::KwVar),
        "if" => Some(TokenKind::KwIf),
        "else" => Some(TokenKind::KwElse),
        "while" => Some(TokenKind::KwWhile),
        "for" => Some(TokenKind::KwFor),
        "to" => Some(TokenKind::KwTo),
        "step" => Some(TokenKind::KwStep),
        "emit" => Some(TokenKind::KwEmit),
        "error" => Some(TokenKind::KwError),
        "break" => Some(TokenKind::KwBreak),
        "continue" => Some(TokenKind::KwContinue),
        "exit" => Some(TokenKind::KwExit),
        "true" => Some(TokenKind::KwTrue),
        "false" => Some(TokenKind::KwFalse),
        _ => None,
    }
}
