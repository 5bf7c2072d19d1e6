use super::directive::{ClassHeader, Declaration};
use super::line::Word;
use super::method::MethodBuilder;
use crate::config::Config;
use crate::error::{Error, Located};
use crate::expr::token::Pos;
use crate::expr::{eval_const, Value};
use crate::module::{Attribute, FieldInfo, Module};
use crate::resolver::{ConstantPool, Resolver};
use arch::access::{
    AccessFlags, Target, ACC_ABSTRACT, ACC_FINAL, ACC_PUBLIC, ACC_STATIC,
};
use arch::types::JavaType;
use indexmap::IndexMap;

const OBJECT: &str = "java.lang.Object";

/// The class or interface between `.class` and its `.end`.
#[derive(Debug, Clone)]
pub struct ClassBuilder {
    pub short: String,
    pub qualified: String,
    pub access: AccessFlags,
    pub pos: Pos,
    super_name: String,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    /// name to descriptor, for operand lookup
    field_types: IndexMap<String, String>,
    fields: Vec<FieldInfo>,
    /// Closed methods, encoded once the class ends
    methods: Vec<MethodBuilder>,
    signatures: IndexMap<String, Pos>,
}

fn modifiers(words: &[String], target: Target) -> Result<AccessFlags, Error> {
    AccessFlags::parse(words.iter().map(|s| s.as_str()), target).map_err(Error::InvalidModifier)
}

impl ClassBuilder {
    pub fn open(
        resolver: &mut Resolver,
        pool: &mut ConstantPool,
        name: &str,
        interface: bool,
        header: ClassHeader,
        pos: Pos,
    ) -> Result<Self, Error> {
        let target = if interface { Target::Interface } else { Target::Class };
        let access = modifiers(&header.modifiers, target)?;
        let this = resolver.enter_class(name)?.clone();

        let (super_name, interface_names) = if interface {
            if let Some(extra) = header.implements.first() {
                return Err(Error::UnexpectedToken(format!("implements {extra}")));
            }
            (OBJECT.to_string(), header.extends)
        } else {
            if let Some(extra) = header.extends.get(1) {
                return Err(Error::UnexpectedToken(extra.clone()));
            }
            let super_name = match header.extends.first() {
                Some(s) => resolver.qualify(s)?,
                None => OBJECT.to_string(),
            };
            let desc = resolver
                .describe(&super_name)
                .ok_or_else(|| Error::UnknownClass(super_name.clone()))?;
            if desc.interface || desc.is_final {
                return Err(Error::InvalidType(super_name));
            }
            (super_name, header.implements)
        };

        let this_class = pool.class(&this.internal())?;
        let super_class = pool.class(&super_name.replace('.', "/"))?;
        let mut interfaces = Vec::new();
        for name in &interface_names {
            let qualified = resolver.qualify(name)?;
            match resolver.describe(&qualified) {
                Some(d) if d.interface => {}
                _ => return Err(Error::InvalidType(qualified)),
            }
            interfaces.push(pool.class(&qualified.replace('.', "/"))?);
        }

        Ok(Self {
            short: this.short,
            qualified: this.qualified,
            access,
            pos,
            super_name,
            this_class,
            super_class,
            interfaces,
            field_types: IndexMap::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            signatures: IndexMap::new(),
        })
    }

    pub fn is_interface(&self) -> bool {
        self.access.contains(arch::access::ACC_INTERFACE)
    }

    pub fn field_types(&self) -> &IndexMap<String, String> {
        &self.field_types
    }

    fn this_type(&self) -> JavaType {
        JavaType::object(&self.qualified)
    }

    // ------------------------------------------------------------------------
    // Fields

    pub fn add_field(
        &mut self,
        resolver: &Resolver,
        pool: &mut ConstantPool,
        name: &str,
        decl: Declaration,
        line: usize,
    ) -> Result<(), Located> {
        let at = |e: Error| e.at(Pos::new(line, 1));
        let ty = resolver.resolve_type(&decl.ty).map_err(at)?;
        if ty == JavaType::Void {
            return Err(at(Error::InvalidType(decl.ty)));
        }
        let mut access = modifiers(&decl.modifiers, Target::Field).map_err(at)?;
        if self.is_interface() {
            access.0 |= ACC_PUBLIC | ACC_STATIC | ACC_FINAL;
        }
        if self.field_types.contains_key(name) {
            return Err(at(Error::DuplicateMember(name.to_string())));
        }

        let descriptor = ty.descriptor();
        let mut attributes = Vec::new();
        if let Some(value) = &decl.value {
            if !access.contains(ACC_STATIC | ACC_FINAL) {
                return Err(at(Error::InvalidInitializer(name.to_string())));
            }
            let idx = constant_value(pool, &ty, value, line)?;
            attributes.push(Attribute::ConstantValue {
                name: pool.utf8("ConstantValue").map_err(at)?,
                value: idx,
            });
        }
        let info = FieldInfo {
            access,
            name: pool.utf8(name).map_err(at)?,
            descriptor: pool.utf8(&descriptor).map_err(at)?,
            attributes,
        };
        self.field_types.insert(name.to_string(), descriptor);
        self.fields.push(info);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Methods

    /// `name .method type mods`; a name equal to the class name declares a constructor.
    pub fn begin_method(
        &self,
        resolver: &Resolver,
        name: &str,
        decl: Declaration,
        pos: Pos,
    ) -> Result<MethodBuilder, Error> {
        if let Some(value) = decl.value {
            return Err(Error::UnexpectedToken(format!("= {}", value.text)));
        }
        let ret = resolver.resolve_type(&decl.ty)?;
        let jvm_name = if name == self.short { "<init>" } else { name };
        if jvm_name == "<init>" && ret != JavaType::Void {
            return Err(Error::InvalidType(decl.ty));
        }
        let mut access = modifiers(&decl.modifiers, Target::Method)?;
        if self.is_interface() && !access.contains(ACC_STATIC) {
            access.0 |= ACC_PUBLIC | ACC_ABSTRACT;
        }
        if access.contains(ACC_ABSTRACT) && !self.access.contains(ACC_ABSTRACT) {
            return Err(Error::InvalidModifier(format!(
                "abstract method `{name}` in non-abstract class `{}`",
                self.short
            )));
        }
        Ok(MethodBuilder::new(
            name,
            jvm_name,
            access,
            ret,
            self.this_type(),
            pos,
        ))
    }

    pub fn end_method(&mut self, method: MethodBuilder) -> Result<(), Vec<Located>> {
        method.close()?;
        let signature = method.signature();
        if self.signatures.contains_key(&signature) {
            return Err(vec![Error::DuplicateMember(method.name).at(method.pos)]);
        }
        self.signatures.insert(signature, method.pos);
        self.methods.push(method);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Close

    /// Bind own-field references, encode every method and build the module.
    pub fn finish(
        mut self,
        resolver: &Resolver,
        mut pool: ConstantPool,
        config: &Config,
        source_name: Option<&str>,
    ) -> Result<Module, Vec<Located>> {
        let mut errors = Vec::new();
        let internal = self.qualified.replace('.', "/");
        let mut methods = Vec::with_capacity(self.methods.len());
        for mut method in std::mem::take(&mut self.methods) {
            let found = method.bind_fields(|name, descriptor, line| {
                let declared = self.field_types.get(name).map(|d| d.as_str());
                let descriptor = match (descriptor, declared) {
                    (Some(d), _) | (None, Some(d)) => d.to_string(),
                    (None, None) => resolver
                        .provider()
                        .find_field(&self.super_name, name)
                        .map(|(_, m)| m.descriptor.clone())
                        .ok_or_else(|| Error::UnresolvedSymbol(name.to_string(), line))?,
                };
                let idx = pool.fieldref(&internal, name, &descriptor)?;
                Ok((idx, descriptor))
            });
            if !found.is_empty() {
                errors.extend(found);
                continue;
            }
            match method.encode(&mut pool, config) {
                Ok(info) => methods.push(info),
                Err(found) => errors.extend(found),
            }
        }

        let mut attributes = Vec::new();
        if let (true, Some(file)) = (config.source_file, source_name) {
            let at = |e: Error| vec![e.at(self.pos)];
            attributes.push(Attribute::SourceFile {
                name: pool.utf8("SourceFile").map_err(at)?,
                file: pool.utf8(file).map_err(at)?,
            });
        }
        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(Module {
            minor_version: config.minor_version,
            major_version: config.major_version,
            pool,
            access: self.access,
            this_class: self.this_class,
            super_class: self.super_class,
            interfaces: self.interfaces,
            fields: self.fields,
            methods,
            attributes,
        })
    }
}

/// Pool entry for a `ConstantValue` of type `ty`.
fn constant_value(
    pool: &mut ConstantPool,
    ty: &JavaType,
    value: &Word,
    line: usize,
) -> Result<u16, Located> {
    let pos = Pos::new(line, value.column);
    let at = |e: Error| e.at(pos);
    let v = eval_const(&value.text, pos)?;
    let out_of_range = |n: i64| at(Error::ValueOutOfRange(n.to_string(), ty.to_string()));
    let mismatch = |v: &Value| at(Error::mismatch(ty, v.ty()));
    let idx = match (ty, &v) {
        (JavaType::Boolean, Value::Bool(b)) => pool.integer(*b as i32),
        (JavaType::Byte, Value::Int(n)) => {
            pool.integer(i8::try_from(*n).map_err(|_| out_of_range(*n))? as i32)
        }
        (JavaType::Short, Value::Int(n)) => {
            pool.integer(i16::try_from(*n).map_err(|_| out_of_range(*n))? as i32)
        }
        (JavaType::Char, Value::Int(n)) => {
            pool.integer(u16::try_from(*n).map_err(|_| out_of_range(*n))? as i32)
        }
        (JavaType::Int, Value::Int(n)) => {
            pool.integer(i32::try_from(*n).map_err(|_| out_of_range(*n))?)
        }
        (JavaType::Long, Value::Int(n)) => pool.long(*n),
        (JavaType::Float, Value::Int(n)) => pool.float(*n as f32),
        (JavaType::Float, Value::Real(r)) => pool.float(*r as f32),
        (JavaType::Double, Value::Int(n)) => pool.double(*n as f64),
        (JavaType::Double, Value::Real(r)) => pool.double(*r),
        (JavaType::Object(name), Value::Str(s)) if name == "java/lang/String" => pool.string(s),
        _ => return Err(mismatch(&v)),
    };
    idx.map_err(at)
}
