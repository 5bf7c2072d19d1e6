use super::ast::Value;
use crate::error::Error;
use indexmap::IndexMap;

/// Variables visible to an evaluation, plus the unique-number counters.
#[derive(Debug, Default)]
pub struct Env {
    vars: IndexMap<String, Value>,
    unique_g: i64,
    unique_l: i64,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment of one macro invocation; `id` is the value of `uniqueG()`.
    pub fn for_invocation(id: i64) -> Self {
        Self {
            unique_g: id,
            ..Self::default()
        }
    }

    pub fn declare(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Result<&Value, Error> {
        self.vars
            .get(name)
            .ok_or_else(|| Error::UnboundSymbol(name.to_string()))
    }

    /// Store into an existing slot; the slot keeps its type.
    pub fn set(&mut self, name: &str, value: Value) -> Result<Value, Error> {
        let slot = self
            .vars
            .get_mut(name)
            .ok_or_else(|| Error::UnboundSymbol(name.to_string()))?;
        let ty = slot.ty();
        let found = value.ty();
        let value = value.coerce(ty).ok_or_else(|| Error::mismatch(ty, found))?;
        *slot = value.clone();
        Ok(value)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn unique_global(&self) -> i64 {
        self.unique_g
    }

    pub fn unique_local(&mut self) -> i64 {
        self.unique_l += 1;
        self.unique_l
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_keeps_slot_type() {
        let mut env = Env::new();
        env.declare("r", Value::Real(0.5));
        assert_eq!(env.set("r", Value::Int(2)).unwrap(), Value::Real(2.0));
        assert!(matches!(
            env.set("r", Value::Str("x".into())),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            env.set("nope", Value::Int(1)),
            Err(Error::UnboundSymbol(_))
        ));
    }

    #[test]
    fn unique_counters() {
        let mut env = Env::for_invocation(7);
        assert_eq!(env.unique_global(), 7);
        assert_eq!(env.unique_global(), 7);
        assert_eq!(env.unique_local(), 1);
        assert_eq!(env.unique_local(), 2);
    }
}
