use crate::error::Error;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    /// JVM descriptor: `I`, `Ljava/io/PrintStream;`, `(I)V`
    pub descriptor: String,
    #[serde(default, rename = "static")]
    pub is_static: bool,
}

/// What the assembler needs to know about a class it does not assemble.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDescriptor {
    /// Qualified name: `java.lang.String`
    pub name: String,
    #[serde(default)]
    pub interface: bool,
    #[serde(default, rename = "final")]
    pub is_final: bool,
    #[serde(default, rename = "super")]
    pub super_class: Option<String>,
    #[serde(default)]
    pub fields: Vec<Member>,
    #[serde(default)]
    pub methods: Vec<Member>,
}

/// Source of class metadata for imports and member references.
pub trait DescriptorProvider {
    fn describe(&self, qualified: &str) -> Option<&ClassDescriptor>;

    /// Field `name` of `class` or of one of its superclasses, with the declaring class.
    fn find_field(&self, class: &str, name: &str) -> Option<(&ClassDescriptor, &Member)> {
        let mut current = self.describe(class);
        while let Some(desc) = current {
            if let Some(m) = desc.fields.iter().find(|m| m.name == name) {
                return Some((desc, m));
            }
            current = desc.super_class.as_deref().and_then(|s| self.describe(s));
        }
        None
    }

    /// Every overload of `name` visible through `class` and its superclasses.
    fn find_methods(&self, class: &str, name: &str) -> Vec<&Member> {
        let mut found: Vec<&Member> = Vec::new();
        let mut current = self.describe(class);
        while let Some(desc) = current {
            for m in desc.methods.iter().filter(|m| m.name == name) {
                if !found.iter().any(|f| f.descriptor == m.descriptor) {
                    found.push(m);
                }
            }
            // constructors are not inherited
            if name == "<init>" {
                break;
            }
            current = match &desc.super_class {
                Some(s) => self.describe(s),
                None if desc.interface => self.describe("java.lang.Object"),
                None => None,
            };
        }
        found
    }
}

/// Static descriptor table, seeded with common `java.lang` and `java.io` classes.
#[derive(Debug, Clone, Default)]
pub struct MetadataTable {
    classes: IndexMap<String, ClassDescriptor>,
}

impl DescriptorProvider for MetadataTable {
    fn describe(&self, qualified: &str) -> Option<&ClassDescriptor> {
        self.classes.get(qualified)
    }
}

impl MetadataTable {
    pub fn new() -> Self {
        let mut table = Self::empty();
        for desc in BUILTINS.iter() {
            table.insert(desc.clone());
        }
        table
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, desc: ClassDescriptor) {
        self.classes.insert(desc.name.clone(), desc);
    }

    /// Add descriptors from a YAML list, replacing classes of the same name.
    pub fn load(&mut self, path: &str) -> Result<(), Error> {
        let file = File::open(path).map_err(|e| Error::FileOpen(path.to_string(), e))?;
        let list: Vec<ClassDescriptor> = serde_yaml::from_reader(BufReader::new(file))
            .map_err(|e| Error::Yaml(path.to_string(), e))?;
        for desc in list {
            self.insert(desc);
        }
        Ok(())
    }

    pub fn extend_yaml(&mut self, text: &str) -> Result<(), Error> {
        let list: Vec<ClassDescriptor> =
            serde_yaml::from_str(text).map_err(|e| Error::Yaml("<inline>".to_string(), e))?;
        for desc in list {
            self.insert(desc);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Built-in classes

fn member(entry: &(&str, &str, bool)) -> Member {
    Member {
        name: entry.0.to_string(),
        descriptor: entry.1.to_string(),
        is_static: entry.2,
    }
}

fn class(
    name: &str,
    super_class: Option<&str>,
    fields: &[(&str, &str, bool)],
    methods: &[(&str, &str, bool)],
) -> ClassDescriptor {
    ClassDescriptor {
        name: name.to_string(),
        interface: false,
        is_final: false,
        super_class: super_class.map(|s| s.to_string()),
        fields: fields.iter().map(member).collect(),
        methods: methods.iter().map(member).collect(),
    }
}

fn interface(name: &str, methods: &[(&str, &str, bool)]) -> ClassDescriptor {
    ClassDescriptor {
        interface: true,
        ..class(name, None, &[], methods)
    }
}

fn sealed(desc: ClassDescriptor) -> ClassDescriptor {
    ClassDescriptor {
        is_final: true,
        ..desc
    }
}

fn throwable(name: &str, super_class: &str) -> ClassDescriptor {
    class(
        name,
        Some(super_class),
        &[],
        &[
            ("<init>", "()V", false),
            ("<init>", "(Ljava/lang/String;)V", false),
        ],
    )
}

const OBJECT: &str = "java.lang.Object";

static BUILTINS: Lazy<Vec<ClassDescriptor>> = Lazy::new(|| {
    vec![
        class(
            OBJECT,
            None,
            &[],
            &[
                ("<init>", "()V", false),
                ("toString", "()Ljava/lang/String;", false),
                ("equals", "(Ljava/lang/Object;)Z", false),
                ("hashCode", "()I", false),
                ("getClass", "()Ljava/lang/Class;", false),
                ("clone", "()Ljava/lang/Object;", false),
                ("notify", "()V", false),
                ("notifyAll", "()V", false),
                ("wait", "()V", false),
            ],
        ),
        sealed(class(
            "java.lang.Class",
            Some(OBJECT),
            &[],
            &[("getName", "()Ljava/lang/String;", false)],
        )),
        sealed(class(
            "java.lang.String",
            Some(OBJECT),
            &[],
            &[
                ("<init>", "()V", false),
                ("<init>", "(Ljava/lang/String;)V", false),
                ("<init>", "([C)V", false),
                ("length", "()I", false),
                ("isEmpty", "()Z", false),
                ("charAt", "(I)C", false),
                ("concat", "(Ljava/lang/String;)Ljava/lang/String;", false),
                ("indexOf", "(I)I", false),
                ("indexOf", "(Ljava/lang/String;)I", false),
                ("substring", "(I)Ljava/lang/String;", false),
                ("substring", "(II)Ljava/lang/String;", false),
                ("compareTo", "(Ljava/lang/String;)I", false),
                ("toCharArray", "()[C", false),
                ("trim", "()Ljava/lang/String;", false),
                ("toUpperCase", "()Ljava/lang/String;", false),
                ("toLowerCase", "()Ljava/lang/String;", false),
                ("valueOf", "(I)Ljava/lang/String;", true),
                ("valueOf", "(J)Ljava/lang/String;", true),
                ("valueOf", "(F)Ljava/lang/String;", true),
                ("valueOf", "(D)Ljava/lang/String;", true),
                ("valueOf", "(Z)Ljava/lang/String;", true),
                ("valueOf", "(C)Ljava/lang/String;", true),
                ("valueOf", "(Ljava/lang/Object;)Ljava/lang/String;", true),
            ],
        )),
        sealed(class(
            "java.lang.StringBuilder",
            Some(OBJECT),
            &[],
            &[
                ("<init>", "()V", false),
                ("<init>", "(Ljava/lang/String;)V", false),
                ("append", "(I)Ljava/lang/StringBuilder;", false),
                ("append", "(J)Ljava/lang/StringBuilder;", false),
                ("append", "(F)Ljava/lang/StringBuilder;", false),
                ("append", "(D)Ljava/lang/StringBuilder;", false),
                ("append", "(Z)Ljava/lang/StringBuilder;", false),
                ("append", "(C)Ljava/lang/StringBuilder;", false),
                ("append", "(Ljava/lang/String;)Ljava/lang/StringBuilder;", false),
                ("append", "(Ljava/lang/Object;)Ljava/lang/StringBuilder;", false),
                ("length", "()I", false),
            ],
        )),
        sealed(class(
            "java.lang.Integer",
            Some("java.lang.Number"),
            &[("MAX_VALUE", "I", true), ("MIN_VALUE", "I", true)],
            &[
                ("<init>", "(I)V", false),
                ("intValue", "()I", false),
                ("valueOf", "(I)Ljava/lang/Integer;", true),
                ("parseInt", "(Ljava/lang/String;)I", true),
                ("toString", "(I)Ljava/lang/String;", true),
            ],
        )),
        sealed(class(
            "java.lang.Long",
            Some("java.lang.Number"),
            &[("MAX_VALUE", "J", true), ("MIN_VALUE", "J", true)],
            &[
                ("<init>", "(J)V", false),
                ("longValue", "()J", false),
                ("valueOf", "(J)Ljava/lang/Long;", true),
                ("parseLong", "(Ljava/lang/String;)J", true),
            ],
        )),
        class(
            "java.lang.Number",
            Some(OBJECT),
            &[],
            &[
                ("intValue", "()I", false),
                ("longValue", "()J", false),
                ("floatValue", "()F", false),
                ("doubleValue", "()D", false),
            ],
        ),
        sealed(class(
            "java.lang.Math",
            Some(OBJECT),
            &[("PI", "D", true), ("E", "D", true)],
            &[
                ("abs", "(I)I", true),
                ("abs", "(J)J", true),
                ("abs", "(D)D", true),
                ("max", "(II)I", true),
                ("min", "(II)I", true),
                ("sqrt", "(D)D", true),
            ],
        )),
        sealed(class(
            "java.lang.System",
            Some(OBJECT),
            &[
                ("out", "Ljava/io/PrintStream;", true),
                ("err", "Ljava/io/PrintStream;", true),
                ("in", "Ljava/io/InputStream;", true),
            ],
            &[
                ("currentTimeMillis", "()J", true),
                ("nanoTime", "()J", true),
                ("exit", "(I)V", true),
                (
                    "arraycopy",
                    "(Ljava/lang/Object;ILjava/lang/Object;II)V",
                    true,
                ),
            ],
        )),
        class(
            "java.lang.Thread",
            Some(OBJECT),
            &[],
            &[
                ("<init>", "()V", false),
                ("<init>", "(Ljava/lang/Runnable;)V", false),
                ("start", "()V", false),
                ("join", "()V", false),
                ("sleep", "(J)V", true),
                ("currentThread", "()Ljava/lang/Thread;", true),
            ],
        ),
        class(
            "java.lang.Throwable",
            Some(OBJECT),
            &[],
            &[
                ("<init>", "()V", false),
                ("<init>", "(Ljava/lang/String;)V", false),
                ("getMessage", "()Ljava/lang/String;", false),
                ("printStackTrace", "()V", false),
            ],
        ),
        throwable("java.lang.Exception", "java.lang.Throwable"),
        throwable("java.lang.Error", "java.lang.Throwable"),
        throwable("java.lang.RuntimeException", "java.lang.Exception"),
        throwable("java.lang.ArithmeticException", "java.lang.RuntimeException"),
        throwable(
            "java.lang.IllegalArgumentException",
            "java.lang.RuntimeException",
        ),
        throwable("java.lang.IllegalStateException", "java.lang.RuntimeException"),
        throwable("java.lang.NullPointerException", "java.lang.RuntimeException"),
        throwable("java.io.IOException", "java.lang.Exception"),
        interface("java.lang.Runnable", &[("run", "()V", false)]),
        interface("java.lang.AutoCloseable", &[("close", "()V", false)]),
        interface("java.lang.Cloneable", &[]),
        interface(
            "java.lang.Comparable",
            &[("compareTo", "(Ljava/lang/Object;)I", false)],
        ),
        interface("java.lang.CharSequence", &[("length", "()I", false)]),
        class(
            "java.io.InputStream",
            Some(OBJECT),
            &[],
            &[("read", "()I", false), ("close", "()V", false)],
        ),
        class(
            "java.io.PrintStream",
            Some(OBJECT),
            &[],
            &[
                ("println", "()V", false),
                ("println", "(I)V", false),
                ("println", "(J)V", false),
                ("println", "(F)V", false),
                ("println", "(D)V", false),
                ("println", "(Z)V", false),
                ("println", "(C)V", false),
                ("println", "(Ljava/lang/String;)V", false),
                ("println", "(Ljava/lang/Object;)V", false),
                ("print", "(I)V", false),
                ("print", "(J)V", false),
                ("print", "(F)V", false),
                ("print", "(D)V", false),
                ("print", "(Z)V", false),
                ("print", "(C)V", false),
                ("print", "(Ljava/lang/String;)V", false),
                ("print", "(Ljava/lang/Object;)V", false),
                ("flush", "()V", false),
            ],
        ),
    ]
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins() {
        let table = MetadataTable::new();
        assert!(table.describe("java.lang.String").unwrap().is_final);
        assert!(table.describe("java.lang.Runnable").unwrap().interface);
        assert!(table.describe("java.util.List").is_none());
    }

    #[test]
    fn inherited_members() {
        let table = MetadataTable::new();
        let (owner, field) = table.find_field("java.lang.System", "out").unwrap();
        assert_eq!(owner.name, "java.lang.System");
        assert_eq!(field.descriptor, "Ljava/io/PrintStream;");

        let methods = table.find_methods("java.lang.RuntimeException", "getMessage");
        assert_eq!(methods.len(), 1);
        // constructors stay with their class
        assert_eq!(table.find_methods("java.lang.Exception", "<init>").len(), 2);
        assert_eq!(table.find_methods("java.io.PrintStream", "println").len(), 9);
        assert_eq!(table.find_methods("java.lang.Runnable", "hashCode").len(), 1);
    }

    #[test]
    fn yaml_extension() {
        let mut table = MetadataTable::new();
        table
            .extend_yaml(
                r#"
- name: com.example.Greeter
  interface: true
  methods:
    - name: greet
      descriptor: (Ljava/lang/String;)V
- name: com.example.Counter
  super: java.lang.Object
  fields:
    - { name: COUNT, descriptor: I, static: true }
"#,
            )
            .unwrap();
        assert!(table.describe("com.example.Greeter").unwrap().interface);
        let (_, count) = table.find_field("com.example.Counter", "COUNT").unwrap();
        assert!(count.is_static);
        assert_eq!(
            table.find_methods("com.example.Counter", "toString").len(),
            1
        );
    }
}
