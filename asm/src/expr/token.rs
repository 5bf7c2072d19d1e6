use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
}

impl Token {
    pub fn new(kind: TokenKind, pos: Pos) -> Self {
        Token { kind, pos }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Double character tokens
    EqualEqual,   // '=='
    ExclEqual,    // '!='
    RAngleEqual,  // '>='
    LAngleEqual,  // '<='
    LAngleLAngle, // '<<'
    RAngleRAngle, // '>>'
    AmpAmp,       // '&&'
    PipePipe,     // '||'

    // Single character tokens
    Equal,     // '='
    Plus,      // '+'
    Minus,     // '-'
    Star,      // '*'
    Slash,     // '/'
    Percent,   // '%'
    Hash,      // '#'
    Ampasand,  // '&'
    Pipe,      // '|'
    Caret,     // '^'
    Excl,      // '!'
    Question,  // '?'
    Colon,     // ':'
    Semicolon, // ';'
    Comma,     // ','
    Period,    // '.'
    LParen,    // '('
    RParen,    // ')'
    LBracket,  // '['
    RBracket,  // ']'
    LCurly,    // '{'
    RCurly,    // '}'
    LAngle,    // '<'
    RAngle,    // '>'

    // Keywords
    KwMacro,    // "macro"
    KwVar,      // "var"
    KwIf,       // "if"
    KwElse,     // "else"
    KwWhile,    // "while"
    KwFor,      // "for"
    KwTo,       // "to"
    KwStep,     // "step"
    KwEmit,     // "emit"
    KwError,    // "error"
    KwBreak,    // "break"
    KwContinue, // "continue"
    KwExit,     // "exit"
    KwTrue,     // "true"
    KwFalse,    // "false"

    // Identifier
    Ident(String),

    // Literals
    Integer(String, i64),
    Real(String, f64),
    Text(String),

    // Special
    Comment(String),
    Error(String),
}

/// Width suffix written on a numeric literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suffix {
    Long,
    Float,
    Double,
}

impl TokenKind {
    pub fn suffix(&self) -> Option<Suffix> {
        match self {
            TokenKind::Integer(s, _) if s.ends_with(['l', 'L']) => Some(Suffix::Long),
            TokenKind::Real(s, _) if s.ends_with(['f', 'F']) => Some(Suffix::Float),
            TokenKind::Real(s, _) if s.ends_with(['d', 'D']) => Some(Suffix::Double),
            _ => None,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenKind::*;
        let s = match self {
            EqualEqual => "==",
            ExclEqual => "!=",
            RAngleEqual => ">=",
            LAngleEqual => "<=",
            LAngleLAngle => "<<",
            RAngleRAngle => ">>",
            AmpAmp => "&&",
            PipePipe => "||",
            Equal => "=",
            Plus => "+",
            Minus => "-",
            Star => "*",
            Slash => "/",
            Percent => "%",
            Hash => "#",
            Ampasand => "&",
            Pipe => "|",
            Caret => "^",
            Excl => "!",
            Question => "?",
            Colon => ":",
            Semicolon => ";",
            Comma => ",",
            Period => ".",
            LParen => "(",
            RParen => ")",
            LBracket => "[",
            RBracket => "]",
            LCurly => "{",
            RCurly => "}",
            LAngle => "<",
            RAngle => ">",
            KwMacro => "macro",
            KwVar => "var",
            KwIf => "if",
            KwElse => "else",
            KwWhile => "while",
            KwFor => "for",
            KwTo => "to",
            KwStep => "step",
            KwEmit => "emit",
            KwError => "error",
            KwBreak => "break",
            KwContinue => "continue",
            KwExit => "exit",
            KwTrue => "true",
            KwFalse => "false",
            Ident(s) | Integer(s, _) | Real(s, _) | Comment(s) | Error(s) => s,
            Text(s) => return write!(f, "\"{s}\""),
        };
        write!(f, "{s}")
    }
}

/// 1-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

impl Pos {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}
