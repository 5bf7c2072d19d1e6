use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_PROTECTED: u16 = 0x0004;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SUPER: u16 = 0x0020;
pub const ACC_SYNCHRONIZED: u16 = 0x0020;
pub const ACC_VOLATILE: u16 = 0x0040;
pub const ACC_TRANSIENT: u16 = 0x0080;
pub const ACC_NATIVE: u16 = 0x0100;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_STRICT: u16 = 0x0800;
pub const ACC_SYNTHETIC: u16 = 0x1000;

/// Modifier keywords accepted after `.class`, `.field` and `.method`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, EnumIter, Display,
)]
#[strum(serialize_all = "lowercase")]
pub enum Modifier {
    Public,
    Private,
    Protected,
    Static,
    Final,
    Synchronized,
    Volatile,
    Transient,
    Native,
    Abstract,
    Strictfp,
    Synthetic,
}

impl Modifier {
    pub fn parse(s: &str) -> Option<Self> {
        s.parse::<Self>().ok()
    }

    pub fn flag(&self) -> u16 {
        match self {
            Modifier::Public => ACC_PUBLIC,
            Modifier::Private => ACC_PRIVATE,
            Modifier::Protected => ACC_PROTECTED,
            Modifier::Static => ACC_STATIC,
            Modifier::Final => ACC_FINAL,
            Modifier::Synchronized => ACC_SYNCHRONIZED,
            Modifier::Volatile => ACC_VOLATILE,
            Modifier::Transient => ACC_TRANSIENT,
            Modifier::Native => ACC_NATIVE,
            Modifier::Abstract => ACC_ABSTRACT,
            Modifier::Strictfp => ACC_STRICT,
            Modifier::Synthetic => ACC_SYNTHETIC,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Target {
    #[strum(serialize = "class")]
    Class,
    #[strum(serialize = "interface")]
    Interface,
    #[strum(serialize = "field")]
    Field,
    #[strum(serialize = "method")]
    Method,
}

impl Target {
    fn allows(&self, m: Modifier) -> bool {
        use Modifier::*;
        match self {
            Target::Class => matches!(m, Public | Final | Abstract | Synthetic),
            Target::Interface => matches!(m, Public | Abstract | Synthetic),
            Target::Field => matches!(
                m,
                Public | Private | Protected | Static | Final | Volatile | Transient | Synthetic
            ),
            Target::Method => !matches!(m, Volatile | Transient),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessFlags(pub u16);

impl AccessFlags {
    pub fn contains(&self, flag: u16) -> bool {
        self.0 & flag == flag
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    /// Build flags from modifier keywords, rejecting illegal combinations.
    pub fn parse<'a>(
        words: impl IntoIterator<Item = &'a str>,
        target: Target,
    ) -> Result<Self, String> {
        let mut bits = 0u16;
        for word in words {
            let m = Modifier::parse(word).ok_or_else(|| format!("Unknown modifier `{word}`"))?;
            if !target.allows(m) {
                return Err(format!("Modifier `{m}` is not allowed for {target}"));
            }
            if bits & m.flag() != 0 {
                return Err(format!("Duplicate modifier `{m}`"));
            }
            bits |= m.flag();
        }
        match target {
            Target::Class => bits |= ACC_SUPER,
            Target::Interface => bits |= ACC_INTERFACE | ACC_ABSTRACT,
            _ => {}
        }
        let flags = AccessFlags(bits);
        flags.check(target)?;
        Ok(flags)
    }

    fn check(&self, target: Target) -> Result<(), String> {
        let visibility = [ACC_PUBLIC, ACC_PRIVATE, ACC_PROTECTED]
            .iter()
            .filter(|f| self.contains(**f))
            .count();
        if visibility > 1 {
            return Err("Conflicting visibility modifiers".to_string());
        }
        match target {
            Target::Class if self.contains(ACC_ABSTRACT) && self.contains(ACC_FINAL) => {
                Err("Class cannot be both abstract and final".to_string())
            }
            Target::Field if self.contains(ACC_FINAL) && self.contains(ACC_VOLATILE) => {
                Err("Field cannot be both final and volatile".to_string())
            }
            Target::Method if self.contains(ACC_ABSTRACT) => {
                let forbidden = ACC_PRIVATE
                    | ACC_STATIC
                    | ACC_FINAL
                    | ACC_SYNCHRONIZED
                    | ACC_NATIVE
                    | ACC_STRICT;
                if self.0 & forbidden != 0 {
                    Err("Abstract method cannot be private, static, final, synchronized, native or strictfp".to_string())
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    /// Keyword form, for listings.
    pub fn keywords(&self, target: Target) -> Vec<&'static str> {
        use strum::IntoEnumIterator;
        let mut words = Vec::new();
        for m in Modifier::iter() {
            if !target.allows(m) || !self.contains(m.flag()) {
                continue;
            }
            // interfaces are implicitly abstract
            if target == Target::Interface && m == Modifier::Abstract {
                continue;
            }
            words.push(match m {
                Modifier::Public => "public",
                Modifier::Private => "private",
                Modifier::Protected => "protected",
                Modifier::Static => "static",
                Modifier::Final => "final",
                Modifier::Synchronized => "synchronized",
                Modifier::Volatile => "volatile",
                Modifier::Transient => "transient",
                Modifier::Native => "native",
                Modifier::Abstract => "abstract",
                Modifier::Strictfp => "strictfp",
                Modifier::Synthetic => "synthetic",
            });
        }
        words
    }
}
