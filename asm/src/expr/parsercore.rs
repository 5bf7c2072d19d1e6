use super::token::{Pos, Token, TokenKind};
use crate::error::{Error, Located};
use std::iter::Peekable;

pub struct Parser<I: Iterator<Item = Token>> {
    tokens: Peekable<I>,
    last: Pos,
}

impl<I: Iterator<Item = Token>> Parser<I> {
    pub fn new(tokens: I) -> Self {
        Parser {
            tokens: tokens.peekable(),
            last: Pos::default(),
        }
    }

    /// Position of the last consumed token
    pub fn pos(&self) -> Pos {
        self.last
    }
}

impl<I: Iterator<Item = Token>> Parser<I> {
    /// Skip comments
    fn skip(&mut self) {
        while let Some(token) = self.tokens.peek() {
            match &token.kind {
                TokenKind::Comment(_) => self.tokens.next(),
                _ => break,
            };
        }
    }

    /// Peek : Watch next token without consuming it
    pub fn peek(&mut self) -> Option<&Token> {
        self.skip();
        self.tokens.peek()
    }

    /// Next : Consume next token and return it
    pub fn next(&mut self) -> Option<Token> {
        self.skip();
        let token = self.tokens.next();
        if let Some(token) = &token {
            self.last = token.pos;
        }
        token
    }

    /// Peek and check next token is match with condition
    pub fn check_if<F: Fn(&Token) -> bool>(&mut self, cond: F) -> bool {
        self.skip();
        match self.tokens.peek() {
            Some(token) => cond(token),
            None => false,
        }
    }

    /// Consume if next token is match with condition
    pub fn consume_if<F: Fn(&Token) -> bool>(&mut self, cond: F) -> Option<Token> {
        self.skip();
        let token = self.tokens.next_if(|token| cond(token));
        if let Some(token) = &token {
            self.last = token.pos;
        }
        token
    }

    /// Next token must be match with condition
    pub fn expect_tobe<F: Fn(&Token) -> bool>(&mut self, cond: F) -> Result<Token, Located> {
        self.skip();
        match self.tokens.peek().cloned() {
            Some(token) if cond(&token) => {
                self.next();
                Ok(token)
            }
            Some(token) => Err(unexpected(&token)),
            None => Err(Error::UnexpectedEOF.at(self.last)),
        }
    }

    /// Error for whatever comes next
    pub fn unexpected(&mut self) -> Located {
        match self.peek() {
            Some(token) => unexpected(token),
            None => Error::UnexpectedEOF.at(self.last),
        }
    }

    pub fn at_end(&mut self) -> bool {
        self.peek().is_none()
    }
}

fn unexpected(token: &Token) -> Located {
    match &token.kind {
        TokenKind::Error(s) => Error::InvalidLiteral(s.clone()).at(token.pos),
        kind => Error::UnexpectedToken(kind.to_string()).at(token.pos),
    }
}

#[macro_export]
macro_rules! check {
    ($parser:expr, $kind:pat) => {
        $parser.check_if(|token| matches!(&token.kind, $kind))
    };
}

#[macro_export]
macro_rules! expect {
    ($parser:expr, $kind:pat) => {
        $parser.expect_tobe(|token| matches!(&token.kind, $kind))
    };
}

#[macro_export]
macro_rules! optional {
    ($parser:expr, $trigger:pat, $following:expr) => {
        if $crate::check!($parser, $trigger) {
            $crate::expect!($parser, $trigger)?;
            Some($following)
        } else {
            None
        }
    };
    ($parser:expr, $trigger:pat) => {
        $parser.consume_if(|token| matches!(&token.kind, $trigger))
    };
}

/// Parse repeated elements with optional delimiters
/// 3 args: { element } terminal (no delimiter)
/// 4 args: [ element { delimiter element } ] terminal (with delimiter)
#[macro_export]
macro_rules! repeat {
    ($parser:expr, $elem:expr, $terminal:pat) => {{
        let mut items = Vec::new();
        while !$crate::check!($parser, $terminal) {
            if $parser.at_end() {
                return Err($parser.unexpected());
            }
            items.push($elem?);
        }
        items
    }};

    ($parser:expr, $elem:expr, $delimiter:pat, $terminal:pat) => {{
        let mut items = Vec::new();
        if !$crate::check!($parser, $terminal) {
            items.push($elem?);
            while $crate::check!($parser, $delimiter) {
                $crate::expect!($parser, $delimiter)?;
                items.push($elem?);
            }
        }
        items
    }};
}
