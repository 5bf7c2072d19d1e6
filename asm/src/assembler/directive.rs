use super::line::Word;
use crate::error::Error;
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Directive {
    Package,
    Import,
    Class,
    Interface,
    Field,
    Method,
    Parameter,
    Var,
    Stack,
    Line,
    Begin,
    Vartable,
    Version,
    Source,
    Try,
    Catch,
    Endtry,
    Default,
    End,
}

/// Whether the line must carry a name in the first column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Naming {
    Required,
    Forbidden,
    Optional,
}

impl Directive {
    pub fn parse(word: &str) -> Result<Self, Error> {
        word.strip_prefix('.')
            .and_then(|w| w.parse::<Self>().ok())
            .ok_or_else(|| Error::UnknownDirective(word.to_string()))
    }

    pub fn naming(&self) -> Naming {
        use Directive::*;
        match self {
            Class | Interface | Field | Method | Parameter | Var => Naming::Required,
            End => Naming::Optional,
            Package | Import | Stack | Line | Begin | Vartable | Version | Source | Try | Catch
            | Endtry | Default => Naming::Forbidden,
        }
    }
}

// ----------------------------------------------------------------------------
// Operand forms

/// `mods [extends T, ...] [implements I, ...]`, modifiers may appear anywhere.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassHeader {
    pub modifiers: Vec<String>,
    pub extends: Vec<String>,
    pub implements: Vec<String>,
}

fn tokens(text: &str) -> Vec<String> {
    text.replace(',', " , ")
        .split_whitespace()
        .map(|s| s.to_string())
        .collect()
}

pub fn class_header(text: &str) -> Result<ClassHeader, Error> {
    let mut header = ClassHeader::default();
    let mut iter = tokens(text).into_iter().peekable();
    while let Some(tok) = iter.next() {
        let list = match tok.as_str() {
            "extends" => &mut header.extends,
            "implements" => &mut header.implements,
            "," => return Err(Error::UnexpectedToken(tok)),
            _ => {
                header.modifiers.push(tok);
                continue;
            }
        };
        loop {
            match iter.next() {
                Some(ty) if ty != "," && ty != "extends" && ty != "implements" => list.push(ty),
                Some(t) => return Err(Error::UnexpectedToken(t)),
                None => return Err(Error::MissingOperand(format!("type after `{tok}`"))),
            }
            if iter.peek().map(|t| t == ",").unwrap_or(false) {
                iter.next();
            } else {
                break;
            }
        }
    }
    Ok(header)
}

/// `.version 1.N` or `.version N`; returns `(major, minor)`.
pub fn class_version(text: &str) -> Result<(u16, u16), Error> {
    let range = || Error::ValueOutOfRange(text.to_string(), ".version".to_string());
    let release: u16 = match text.split_once('.') {
        Some(("1", n)) => n.parse().ok().filter(|n| (1..=8).contains(n)).ok_or_else(range)?,
        Some(_) => return Err(range()),
        None => text.parse().ok().filter(|n| (8..=21).contains(n)).ok_or_else(range)?,
    };
    Ok(match release {
        1 => (45, 3),
        n => (44 + n, 0),
    })
}

/// `type mods [= value]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub ty: String,
    pub modifiers: Vec<String>,
    pub value: Option<Word>,
}

fn split_initializer(operands: &Word) -> (&str, Option<Word>) {
    let text = operands.text.as_str();
    let mut in_str = false;
    for (idx, c) in text.char_indices() {
        match c {
            '"' => in_str = !in_str,
            '=' if !in_str => {
                let value = &text[idx + 1..];
                let lead = value.len() - value.trim_start().len();
                let column = operands.column + text[..idx + 1 + lead].chars().count();
                return (&text[..idx], Some(Word::new(value.trim(), column)));
            }
            _ => {}
        }
    }
    (text, None)
}

pub fn declaration(operands: Option<&Word>) -> Result<Declaration, Error> {
    let operands = operands.ok_or_else(|| Error::MissingOperand("type".to_string()))?;
    let (head, value) = split_initializer(operands);
    let mut words = head.split_whitespace();
    let ty = words
        .next()
        .ok_or_else(|| Error::MissingOperand("type".to_string()))?
        .to_string();
    if let Some(v) = &value {
        if v.text.is_empty() {
            return Err(Error::MissingOperand("initial value".to_string()));
        }
    }
    Ok(Declaration {
        ty,
        modifiers: words.map(|w| w.to_string()).collect(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives() {
        assert_eq!(Directive::parse(".class").unwrap(), Directive::Class);
        assert_eq!(Directive::parse(".endtry").unwrap(), Directive::Endtry);
        assert!(matches!(
            Directive::parse(".mend"),
            Err(Error::UnknownDirective(_))
        ));
        assert_eq!(Directive::End.naming(), Naming::Optional);
        assert_eq!(Directive::Stack.naming(), Naming::Forbidden);
        assert_eq!(Directive::parse(".vartable").unwrap(), Directive::Vartable);
        assert_eq!(Directive::Begin.naming(), Naming::Forbidden);
    }

    #[test]
    fn versions() {
        assert_eq!(class_version("1.1").unwrap(), (45, 3));
        assert_eq!(class_version("1.5").unwrap(), (49, 0));
        assert_eq!(class_version("1.8").unwrap(), (52, 0));
        assert_eq!(class_version("11").unwrap(), (55, 0));
        for bad in ["1.9", "2.0", "7", "22", "x"] {
            assert!(
                matches!(class_version(bad), Err(Error::ValueOutOfRange(..))),
                "{bad}"
            );
        }
    }

    #[test]
    fn headers() {
        let h = class_header("public extends java.lang.Throwable final").unwrap();
        assert_eq!(h.modifiers, vec!["public", "final"]);
        assert_eq!(h.extends, vec!["java.lang.Throwable"]);

        let h = class_header(
            "public abstract extends Throwable implements java.lang.AutoCloseable, Cloneable",
        )
        .unwrap();
        assert_eq!(h.implements, vec!["java.lang.AutoCloseable", "Cloneable"]);
        assert_eq!(h.modifiers, vec!["public", "abstract"]);

        assert!(class_header("public extends").is_err());
        assert!(class_header("implements A,").is_err());
        assert!(class_header("public, final").is_err());
    }

    #[test]
    fn declarations() {
        let ops = Word::new("int public static final = 6 * 7", 10);
        let d = declaration(Some(&ops)).unwrap();
        assert_eq!(d.ty, "int");
        assert_eq!(d.modifiers, vec!["public", "static", "final"]);
        assert_eq!(d.value, Some(Word::new("6 * 7", 36)));

        let ops = Word::new("String static final = \"a=b\"", 1);
        let d = declaration(Some(&ops)).unwrap();
        assert_eq!(d.value.unwrap().text, "\"a=b\"");

        assert!(declaration(None).is_err());
        assert!(declaration(Some(&Word::new("int static final =", 1))).is_err());
    }
}
