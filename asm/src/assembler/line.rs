//! Splitting a source line into `[name | label:] [command] [operands]`.

/// A piece of the line with its 1-based column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub text: String,
    pub column: usize,
}

impl Word {
    pub fn new(text: &str, column: usize) -> Self {
        Self {
            text: text.to_string(),
            column,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    pub label: Option<Word>,
    pub name: Option<Word>,
    /// Directive (with its leading `.`), mnemonic or macro name
    pub command: Option<Word>,
    pub operands: Option<Word>,
}

impl Line {
    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.name.is_none() && self.command.is_none() && self.operands.is_none()
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

/// Text before a `//` comment that is not inside a string literal.
pub fn strip_comment(raw: &str) -> &str {
    let mut in_str = false;
    let mut escaped = false;
    let mut prev_slash = false;
    for (idx, c) in raw.char_indices() {
        if in_str {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_str = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => {
                in_str = true;
                prev_slash = false;
            }
            '/' if prev_slash => return &raw[..idx - 1],
            '/' => prev_slash = true,
            _ => prev_slash = false,
        }
    }
    raw
}

/// Byte offset to 1-based column.
fn column(raw: &str, byte: usize) -> usize {
    raw[..byte].chars().count() + 1
}

fn ident_end(s: &str, from: usize) -> usize {
    s[from..]
        .char_indices()
        .find(|(_, c)| !is_ident_char(*c))
        .map(|(i, _)| from + i)
        .unwrap_or(s.len())
}

fn skip_ws(s: &str, from: usize) -> usize {
    s[from..]
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map(|(i, _)| from + i)
        .unwrap_or(s.len())
}

pub fn parse(raw: &str) -> Line {
    let text = strip_comment(raw).trim_end();
    let mut line = Line::default();
    let mut pos = 0;

    // name in the first column, or a label anywhere before the command
    let start = skip_ws(text, 0);
    if text[start..].starts_with(is_ident_start) {
        let end = ident_end(text, start);
        let after = &text[end..];
        if after.starts_with(':') && !after.starts_with("::") {
            line.label = Some(Word::new(&text[start..end], column(text, start)));
            pos = end + 1;
        } else if start == 0 && text[skip_ws(text, end)..].starts_with('.') {
            line.name = Some(Word::new(&text[..end], 1));
            pos = end;
        }
    }

    pos = skip_ws(text, pos);
    if pos >= text.len() {
        return line;
    }
    let rest = &text[pos..];
    let word_end = if let Some(body) = rest.strip_prefix('.') {
        if body.starts_with(is_ident_start) {
            ident_end(text, pos + 1)
        } else {
            pos
        }
    } else if rest.starts_with(is_ident_start) {
        ident_end(text, pos)
    } else {
        pos
    };
    let follows_ws = text[word_end..]
        .chars()
        .next()
        .map(|c| c.is_whitespace())
        .unwrap_or(true);
    if word_end > pos && follows_ws {
        line.command = Some(Word::new(&text[pos..word_end], column(text, pos)));
        pos = skip_ws(text, word_end);
    }
    if pos < text.len() {
        line.operands = Some(Word::new(&text[pos..], column(text, pos)));
    }
    line
}

/// Split operand text at top-level commas.
pub fn split_args(operands: &Word) -> Vec<Word> {
    let text = &operands.text;
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut in_str = false;
    let mut escaped = false;
    let mut start = 0;
    let push = |from: usize, to: usize, out: &mut Vec<Word>| {
        let piece = &text[from..to];
        let lead = piece.len() - piece.trim_start().len();
        out.push(Word::new(
            piece.trim(),
            operands.column + column(text, from + lead) - 1,
        ));
    };
    for (idx, c) in text.char_indices() {
        if in_str {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_str = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_str = true,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            ',' if depth == 0 => {
                push(start, idx, &mut out);
                start = idx + 1;
            }
            _ => {}
        }
    }
    if !text.trim().is_empty() || !out.is_empty() {
        push(start, text.len(), &mut out);
    }
    out
}
