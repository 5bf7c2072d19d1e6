use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Tag byte preceding every constant-pool entry.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    TryFromPrimitive,
    IntoPrimitive,
    EnumString,
    Display,
)]
#[repr(u8)]
pub enum Tag {
    Utf8 = 1,
    Integer = 3,
    Float = 4,
    Long = 5,
    Double = 6,
    Class = 7,
    String = 8,
    Fieldref = 9,
    Methodref = 10,
    InterfaceMethodref = 11,
    NameAndType = 12,
}

impl Tag {
    /// Long and Double take two pool slots.
    pub fn slots(&self) -> u16 {
        match self {
            Tag::Long | Tag::Double => 2,
            _ => 1,
        }
    }
}

pub const MAGIC: u32 = 0xCAFE_BABE;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags() {
        assert_eq!(Tag::try_from(7u8), Ok(Tag::Class));
        assert!(Tag::try_from(2u8).is_err());
        assert_eq!(Tag::Long.slots(), 2);
        assert_eq!(Tag::Utf8.slots(), 1);
    }
}
