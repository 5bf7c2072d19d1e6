//! Name resolution: type names, class names and member references.

pub mod pool;
pub mod provider;
pub mod symbols;

pub use pool::{Constant, ConstantPool};
pub use provider::{ClassDescriptor, DescriptorProvider, Member, MetadataTable};
pub use symbols::SymbolTable;

use crate::error::Error;
use arch::types::{JavaType, MethodDescriptor};
use indexmap::IndexMap;

/// The class being assembled, as far as resolution is concerned.
#[derive(Debug, Clone)]
pub struct ThisClass {
    pub short: String,
    pub qualified: String,
}

impl ThisClass {
    pub fn internal(&self) -> String {
        self.qualified.replace('.', "/")
    }
}

/// Owner of a referenced member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    This,
    /// Qualified name of a class known to the provider
    External(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    pub owner: Owner,
    pub name: String,
    pub descriptor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRef {
    pub owner: Owner,
    pub name: String,
    pub descriptor: MethodDescriptor,
}

#[derive(Clone)]
pub struct Resolver<'p> {
    provider: &'p dyn DescriptorProvider,
    package: Option<String>,
    imports: IndexMap<String, String>,
    this: Option<ThisClass>,
}

impl<'p> Resolver<'p> {
    pub fn new(provider: &'p dyn DescriptorProvider) -> Self {
        Self {
            provider,
            package: None,
            imports: IndexMap::new(),
            this: None,
        }
    }

    pub fn provider(&self) -> &'p dyn DescriptorProvider {
        self.provider
    }

    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    pub fn this(&self) -> Option<&ThisClass> {
        self.this.as_ref()
    }

    pub fn set_package(&mut self, name: &str) -> Result<(), Error> {
        if self.package.is_some() {
            return Err(Error::Misplaced(".package".to_string()));
        }
        if !is_qualified_name(name) {
            return Err(Error::InvalidType(name.to_string()));
        }
        self.package = Some(name.to_string());
        Ok(())
    }

    pub fn import(&mut self, qualified: &str) -> Result<(), Error> {
        if !is_qualified_name(qualified) || self.provider.describe(qualified).is_none() {
            return Err(Error::UnknownClass(qualified.to_string()));
        }
        let short = simple_name(qualified).to_string();
        self.imports.insert(short, qualified.to_string());
        Ok(())
    }

    pub fn enter_class(&mut self, short: &str) -> Result<&ThisClass, Error> {
        if !is_identifier(short) {
            return Err(Error::InvalidType(short.to_string()));
        }
        let qualified = match &self.package {
            Some(pkg) => format!("{pkg}.{short}"),
            None => short.to_string(),
        };
        Ok(&*self.this.insert(ThisClass {
            short: short.to_string(),
            qualified,
        }))
    }

    fn is_this(&self, name: &str) -> bool {
        self.this
            .as_ref()
            .map(|t| t.short == name || t.qualified == name)
            .unwrap_or(false)
    }

    /// Qualified name of a class written in source as short or qualified name.
    pub fn qualify(&self, name: &str) -> Result<String, Error> {
        if let Some(this) = self.this.as_ref().filter(|_| self.is_this(name)) {
            return Ok(this.qualified.clone());
        }
        if let Some(q) = self.imports.get(name) {
            return Ok(q.clone());
        }
        if name.contains('.') {
            if self.provider.describe(name).is_some() {
                return Ok(name.to_string());
            }
        } else if is_identifier(name) {
            let lang = format!("java.lang.{name}");
            if self.provider.describe(&lang).is_some() {
                return Ok(lang);
            }
        }
        Err(Error::UnknownClass(name.to_string()))
    }

    /// Descriptor of an existing class, or `None` for the class being assembled.
    pub fn describe(&self, qualified: &str) -> Option<&'p ClassDescriptor> {
        if self.is_this(qualified) {
            return None;
        }
        self.provider.describe(qualified)
    }

    /// Source-form type: `int`, `String[]`, `java.lang.Object[][]`.
    pub fn resolve_type(&self, text: &str) -> Result<JavaType, Error> {
        let text = text.trim();
        let mut base = text;
        let mut dims = 0;
        while let Some(rest) = base.strip_suffix("[]") {
            base = rest.trim_end();
            dims += 1;
        }
        if base.is_empty() || base.contains(&['[', ']'][..]) {
            return Err(Error::InvalidType(text.to_string()));
        }
        let ty = match JavaType::primitive(base) {
            Some(JavaType::Void) if dims > 0 => return Err(Error::InvalidType(text.to_string())),
            Some(ty) => ty,
            None => JavaType::object(&self.qualify(base)?),
        };
        Ok(ty.array_of(dims))
    }

    /// Type in source form or as a JVM descriptor (`I`, `[Ljava/lang/String;`).
    pub fn resolve_descriptor(&self, text: &str) -> Result<JavaType, Error> {
        match JavaType::parse_descriptor(text) {
            Ok(ty) => Ok(ty),
            Err(_) => self.resolve_type(text),
        }
    }

    /// Name stored in a Class constant: internal name, or descriptor for arrays.
    pub fn resolve_class(&self, text: &str) -> Result<String, Error> {
        self.resolve_type(text)?
            .class_name()
            .ok_or_else(|| Error::InvalidType(text.to_string()))
    }

    fn owner(&self, text: &str) -> Result<Owner, Error> {
        let qualified = self.qualify(text)?;
        if self.is_this(&qualified) {
            Ok(Owner::This)
        } else {
            Ok(Owner::External(qualified))
        }
    }

    /// `[Owner.]name[:descriptor]`
    pub fn field_ref(&self, text: &str) -> Result<FieldRef, Error> {
        let (head, desc) = match text.split_once(':') {
            Some((h, d)) => (h.trim(), Some(d.trim())),
            None => (text.trim(), None),
        };
        let (owner, name) = match head.rsplit_once('.') {
            Some((o, n)) => (self.owner(o)?, n),
            None => (Owner::This, head),
        };
        if !is_identifier(name) {
            return Err(Error::UnknownField(text.to_string()));
        }
        let descriptor = match desc {
            Some(d) => Some(self.resolve_descriptor(d)?.descriptor()),
            None => None,
        };
        let descriptor = match &owner {
            Owner::This => descriptor,
            Owner::External(q) => {
                let (_, member) = self
                    .provider
                    .find_field(q, name)
                    .ok_or_else(|| Error::UnknownField(format!("{q}.{name}")))?;
                match descriptor {
                    Some(d) if d != member.descriptor => {
                        return Err(Error::UnknownField(format!("{q}.{name}:{d}")))
                    }
                    _ => Some(member.descriptor.clone()),
                }
            }
        };
        Ok(FieldRef {
            owner,
            name: name.to_string(),
            descriptor,
        })
    }

    /// `[Owner.]name(descriptor)return` or `[Owner.]name` when the name has one overload.
    /// A name equal to the owner's simple name denotes the constructor.
    pub fn method_ref(&self, text: &str) -> Result<MethodRef, Error> {
        let text = text.trim();
        let (head, desc) = match text.find('(') {
            Some(idx) => (&text[..idx], Some(&text[idx..])),
            None => (text, None),
        };
        let (owner, name) = match head.rsplit_once('.') {
            Some((o, n)) => (self.owner(o)?, n),
            None => (Owner::This, head),
        };
        let owner_short = match &owner {
            Owner::This => self.this.as_ref().map(|t| t.short.as_str()).unwrap_or(""),
            Owner::External(q) => simple_name(q),
        };
        let name = if name == owner_short || name == "<init>" {
            "<init>".to_string()
        } else if is_identifier(name) || name == "<clinit>" {
            name.to_string()
        } else {
            return Err(Error::UnknownMethod(text.to_string()));
        };
        let descriptor = match desc {
            Some(d) => Some(
                MethodDescriptor::parse(d).map_err(|_| Error::InvalidType(d.to_string()))?,
            ),
            None => None,
        };
        let descriptor = match (&owner, descriptor) {
            (Owner::This, Some(d)) => d,
            (Owner::This, None) => return Err(Error::UnknownMethod(text.to_string())),
            (Owner::External(q), d) => {
                let overloads = self.provider.find_methods(q, &name);
                let found = match &d {
                    Some(d) => {
                        let wanted = d.descriptor();
                        overloads.into_iter().find(|m| m.descriptor == wanted)
                    }
                    None if overloads.len() == 1 => overloads.into_iter().next(),
                    None => None,
                };
                let member = found.ok_or_else(|| Error::UnknownMethod(text.to_string()))?;
                MethodDescriptor::parse(&member.descriptor)
                    .map_err(|_| Error::InvalidType(member.descriptor.clone()))?
            }
        };
        Ok(MethodRef {
            owner,
            name,
            descriptor,
        })
    }

    /// Internal name of an owner.
    pub fn owner_internal(&self, owner: &Owner) -> String {
        match owner {
            Owner::This => self.this.as_ref().map(|t| t.internal()).unwrap_or_default(),
            Owner::External(q) => q.replace('.', "/"),
        }
    }
}

pub fn simple_name(qualified: &str) -> &str {
    qualified.rsplit('.').next().unwrap_or(qualified)
}

pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

pub fn is_qualified_name(s: &str) -> bool {
    s.split('.').all(is_identifier)
}
