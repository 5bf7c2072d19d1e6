use crate::error::Error;
use std::io::BufRead;
use std::iter::Peekable;
use std::str::Lines;

/// Pull interface over source text.
pub trait LineSource {
    fn next_line(&mut self) -> Result<Option<String>, Error>;
    fn end_of_input(&mut self) -> bool;
}

pub struct StrSource<'a> {
    lines: Peekable<Lines<'a>>,
}

impl<'a> StrSource<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().peekable(),
        }
    }
}

impl<'a> LineSource for StrSource<'a> {
    fn next_line(&mut self) -> Result<Option<String>, Error> {
        Ok(self.lines.next().map(|l| l.to_string()))
    }

    fn end_of_input(&mut self) -> bool {
        self.lines.peek().is_none()
    }
}

pub struct ReaderSource<R: BufRead> {
    reader: R,
}

impl<R: BufRead> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> LineSource for ReaderSource<R> {
    fn next_line(&mut self) -> Result<Option<String>, Error> {
        let mut buf = String::new();
        let n = self.reader.read_line(&mut buf).map_err(Error::FileRead)?;
        if n == 0 {
            return Ok(None);
        }
        while buf.ends_with('\n') || buf.ends_with('\r') {
            buf.pop();
        }
        Ok(Some(buf))
    }

    fn end_of_input(&mut self) -> bool {
        self.reader.fill_buf().map(|b| b.is_empty()).unwrap_or(true)
    }
}
