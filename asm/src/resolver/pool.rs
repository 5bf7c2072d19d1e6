use crate::error::Error;
use crate::module::writer::modified_utf8_len;
use arch::cp::Tag;
use bimap::BiMap;

/// One constant-pool entry. Floats are stored by bit pattern so entries can be hashed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    Utf8(String),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class(u16),
    String(u16),
    Fieldref(u16, u16),
    Methodref(u16, u16),
    InterfaceMethodref(u16, u16),
    NameAndType(u16, u16),
}

impl Constant {
    pub fn tag(&self) -> Tag {
        match self {
            Constant::Utf8(_) => Tag::Utf8,
            Constant::Integer(_) => Tag::Integer,
            Constant::Float(_) => Tag::Float,
            Constant::Long(_) => Tag::Long,
            Constant::Double(_) => Tag::Double,
            Constant::Class(_) => Tag::Class,
            Constant::String(_) => Tag::String,
            Constant::Fieldref(_, _) => Tag::Fieldref,
            Constant::Methodref(_, _) => Tag::Methodref,
            Constant::InterfaceMethodref(_, _) => Tag::InterfaceMethodref,
            Constant::NameAndType(_, _) => Tag::NameAndType,
        }
    }
}

/// Deduplicated constant pool. Index 0 is reserved; Long and Double take two slots.
#[derive(Debug, Clone)]
pub struct ConstantPool {
    entries: BiMap<Constant, u16>,
    next: u16,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self {
            entries: BiMap::new(),
            next: 1,
        }
    }
}

impl PartialEq for ConstantPool {
    fn eq(&self, other: &Self) -> bool {
        self.next == other.next && self.entries == other.entries
    }
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, constant: Constant) -> Result<u16, Error> {
        if let Some(idx) = self.entries.get_by_left(&constant) {
            return Ok(*idx);
        }
        let slots = constant.tag().slots();
        if self.next as u32 + slots as u32 > u16::MAX as u32 {
            return Err(Error::ConstantPoolOverflow);
        }
        let idx = self.next;
        self.entries.insert(constant, idx);
        self.next += slots;
        Ok(idx)
    }

    pub fn get(&self, idx: u16) -> Option<&Constant> {
        self.entries.get_by_right(&idx)
    }

    pub fn index_of(&self, constant: &Constant) -> Option<u16> {
        self.entries.get_by_left(constant).copied()
    }

    /// Value of the `constant_pool_count` header field.
    pub fn count(&self) -> u16 {
        self.next
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in index order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant)> {
        (1..self.next).filter_map(move |idx| self.get(idx).map(|c| (idx, c)))
    }

    // ------------------------------------------------------------------------
    // Helpers

    /// Rejects text whose encoded form does not fit the u2 length field.
    pub fn utf8(&mut self, s: &str) -> Result<u16, Error> {
        let len = modified_utf8_len(s);
        if len > u16::MAX as usize {
            return Err(Error::ConstantTooLong(len));
        }
        self.intern(Constant::Utf8(s.to_string()))
    }

    pub fn integer(&mut self, n: i32) -> Result<u16, Error> {
        self.intern(Constant::Integer(n))
    }

    pub fn float(&mut self, f: f32) -> Result<u16, Error> {
        self.intern(Constant::Float(f.to_bits()))
    }

    pub fn long(&mut self, n: i64) -> Result<u16, Error> {
        self.intern(Constant::Long(n))
    }

    pub fn double(&mut self, d: f64) -> Result<u16, Error> {
        self.intern(Constant::Double(d.to_bits()))
    }

    /// `internal` is `java/lang/String` or an array descriptor.
    pub fn class(&mut self, internal: &str) -> Result<u16, Error> {
        let name = self.utf8(internal)?;
        self.intern(Constant::Class(name))
    }

    pub fn string(&mut self, s: &str) -> Result<u16, Error> {
        let utf8 = self.utf8(s)?;
        self.intern(Constant::String(utf8))
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16, Error> {
        let name = self.utf8(name)?;
        let descriptor = self.utf8(descriptor)?;
        self.intern(Constant::NameAndType(name, descriptor))
    }

    pub fn fieldref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16, Error> {
        let class = self.class(owner)?;
        let nat = self.name_and_type(name, descriptor)?;
        self.intern(Constant::Fieldref(class, nat))
    }

    pub fn methodref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16, Error> {
        let class = self.class(owner)?;
        let nat = self.name_and_type(name, descriptor)?;
        self.intern(Constant::Methodref(class, nat))
    }

    pub fn interface_methodref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<u16, Error> {
        let class = self.class(owner)?;
        let nat = self.name_and_type(name, descriptor)?;
        self.intern(Constant::InterfaceMethodref(class, nat))
    }

    // ------------------------------------------------------------------------
    // Lookups for listings

    pub fn utf8_at(&self, idx: u16) -> Option<&str> {
        match self.get(idx)? {
            Constant::Utf8(s) => Some(s),
            _ => None,
        }
    }

    pub fn class_name(&self, idx: u16) -> Option<&str> {
        match self.get(idx)? {
            Constant::Class(name) => self.utf8_at(*name),
            _ => None,
        }
    }

    /// Human-readable rendering of the entry at `idx`.
    pub fn describe(&self, idx: u16) -> String {
        let Some(constant) = self.get(idx) else {
            return format!("#{idx}?");
        };
        match constant {
            Constant::Utf8(s) => s.clone(),
            Constant::Integer(n) => n.to_string(),
            Constant::Float(bits) => format!("{}f", f32::from_bits(*bits)),
            Constant::Long(n) => format!("{n}L"),
            Constant::Double(bits) => format!("{}d", f64::from_bits(*bits)),
            Constant::Class(name) => self.describe(*name),
            Constant::String(s) => format!("{:?}", self.describe(*s)),
            Constant::NameAndType(name, desc) => {
                format!("{}:{}", self.describe(*name), self.describe(*desc))
            }
            Constant::Fieldref(class, nat)
            | Constant::Methodref(class, nat)
            | Constant::InterfaceMethodref(class, nat) => {
                format!("{}.{}", self.describe(*class), self.describe(*nat))
            }
        }
    }
}
