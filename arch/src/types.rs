use crate::op::ArrayType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JavaType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
    Object(String), // internal name: java/lang/String
    Array(Box<JavaType>),
}

impl JavaType {
    pub fn primitive(name: &str) -> Option<Self> {
        Some(match name {
            "boolean" => JavaType::Boolean,
            "byte" => JavaType::Byte,
            "char" => JavaType::Char,
            "short" => JavaType::Short,
            "int" => JavaType::Int,
            "long" => JavaType::Long,
            "float" => JavaType::Float,
            "double" => JavaType::Double,
            "void" => JavaType::Void,
            _ => return None,
        })
    }

    pub fn object(qualified: &str) -> Self {
        JavaType::Object(qualified.replace('.', "/"))
    }

    pub fn array_of(self, dims: usize) -> Self {
        (0..dims).fold(self, |ty, _| JavaType::Array(Box::new(ty)))
    }

    pub fn descriptor(&self) -> String {
        match self {
            JavaType::Boolean => "Z".to_string(),
            JavaType::Byte => "B".to_string(),
            JavaType::Char => "C".to_string(),
            JavaType::Short => "S".to_string(),
            JavaType::Int => "I".to_string(),
            JavaType::Long => "J".to_string(),
            JavaType::Float => "F".to_string(),
            JavaType::Double => "D".to_string(),
            JavaType::Void => "V".to_string(),
            JavaType::Object(name) => format!("L{name};"),
            JavaType::Array(elem) => format!("[{}", elem.descriptor()),
        }
    }

    /// Name used in a Class constant: internal name for objects, descriptor for arrays.
    pub fn class_name(&self) -> Option<String> {
        match self {
            JavaType::Object(name) => Some(name.clone()),
            JavaType::Array(_) => Some(self.descriptor()),
            _ => None,
        }
    }

    /// Local-variable and operand-stack slots.
    pub fn slots(&self) -> u16 {
        match self {
            JavaType::Void => 0,
            JavaType::Long | JavaType::Double => 2,
            _ => 1,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, JavaType::Object(_) | JavaType::Array(_))
    }

    pub fn dimensions(&self) -> usize {
        match self {
            JavaType::Array(elem) => 1 + elem.dimensions(),
            _ => 0,
        }
    }

    pub fn array_type(&self) -> Option<ArrayType> {
        Some(match self {
            JavaType::Boolean => ArrayType::Boolean,
            JavaType::Char => ArrayType::Char,
            JavaType::Float => ArrayType::Float,
            JavaType::Double => ArrayType::Double,
            JavaType::Byte => ArrayType::Byte,
            JavaType::Short => ArrayType::Short,
            JavaType::Int => ArrayType::Int,
            JavaType::Long => ArrayType::Long,
            _ => return None,
        })
    }

    pub fn parse_descriptor(s: &str) -> Result<Self, String> {
        let mut iter = s.chars().peekable();
        let ty = parse_one(&mut iter, s)?;
        match iter.next() {
            None => Ok(ty),
            Some(_) => Err(format!("Trailing characters in descriptor `{s}`")),
        }
    }
}

fn parse_one(iter: &mut Peekable<Chars>, src: &str) -> Result<JavaType, String> {
    let bad = || format!("Invalid descriptor `{src}`");
    let ch = iter.next().ok_or_else(bad)?;
    Ok(match ch {
        'Z' => JavaType::Boolean,
        'B' => JavaType::Byte,
        'C' => JavaType::Char,
        'S' => JavaType::Short,
        'I' => JavaType::Int,
        'J' => JavaType::Long,
        'F' => JavaType::Float,
        'D' => JavaType::Double,
        'V' => JavaType::Void,
        '[' => JavaType::Array(Box::new(parse_one(iter, src)?)),
        'L' => {
            let mut name = String::new();
            loop {
                match iter.next() {
                    Some(';') => break,
                    Some(c) => name.push(c),
                    None => return Err(bad()),
                }
            }
            if name.is_empty() {
                return Err(bad());
            }
            JavaType::Object(name)
        }
        _ => return Err(bad()),
    })
}

impl fmt::Display for JavaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JavaType::Boolean => write!(f, "boolean"),
            JavaType::Byte => write!(f, "byte"),
            JavaType::Char => write!(f, "char"),
            JavaType::Short => write!(f, "short"),
            JavaType::Int => write!(f, "int"),
            JavaType::Long => write!(f, "long"),
            JavaType::Float => write!(f, "float"),
            JavaType::Double => write!(f, "double"),
            JavaType::Void => write!(f, "void"),
            JavaType::Object(name) => write!(f, "{}", name.replace('/', ".")),
            JavaType::Array(elem) => write!(f, "{elem}[]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub params: Vec<JavaType>,
    pub ret: JavaType,
}

impl MethodDescriptor {
    pub fn new(params: Vec<JavaType>, ret: JavaType) -> Self {
        Self { params, ret }
    }

    /// `(I[Ljava/lang/String;)V`
    pub fn parse(s: &str) -> Result<Self, String> {
        let mut iter = s.chars().peekable();
        if iter.next() != Some('(') {
            return Err(format!("Invalid method descriptor `{s}`"));
        }
        let mut params = Vec::new();
        while iter.peek() != Some(&')') {
            if iter.peek().is_none() {
                return Err(format!("Invalid method descriptor `{s}`"));
            }
            let ty = parse_one(&mut iter, s)?;
            if ty == JavaType::Void {
                return Err(format!("Parameter of type void in `{s}`"));
            }
            params.push(ty);
        }
        iter.next();
        let ret = parse_one(&mut iter, s)?;
        if iter.next().is_some() {
            return Err(format!("Trailing characters in descriptor `{s}`"));
        }
        Ok(Self { params, ret })
    }

    pub fn descriptor(&self) -> String {
        let params: String = self.params.iter().map(|p| p.descriptor()).collect();
        format!("({params}){}", self.ret.descriptor())
    }

    /// Argument slots, not counting the receiver.
    pub fn arg_slots(&self) -> u16 {
        self.params.iter().map(|p| p.slots()).sum()
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.descriptor())
    }
}
