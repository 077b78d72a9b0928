//! Declared parameter sets and sanitization.
//!
//! A [`ParamSpec`] is built once per node kind's factory (the Rust
//! equivalent of "once per class" given there's no open class hierarchy to
//! hang a class-level cache off of: here the factory closure itself is the
//! unit of reuse, and it closes over one `Arc<ParamSpec>` shared by every
//! instance it stamps out). `sanitize` runs once when the factory is built,
//! filling in defaults and rejecting unknown/contradictory parameters before
//! any instance exists.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{arg_err, SchemaResult};
use crate::evaluator::Expr;
use crate::value::Value;

/// Raw, unsanitized parameters as given by schema-authoring code.
pub type Params = BTreeMap<String, Expr>;

/// Parameters after [`ParamSpec::sanitize`] has validated and defaulted
/// them; cheap to clone since construction shares the backing map.
#[derive(Clone)]
pub struct SanitizedParams(Arc<BTreeMap<String, Expr>>);

impl SanitizedParams {
    pub fn get(&self, name: &str) -> Option<&Expr> {
        self.0.get(name)
    }

    pub fn get_literal(&self, name: &str) -> Option<&Value> {
        match self.get(name)? {
            Expr::Literal(v) => Some(v),
            _ => None,
        }
    }
}

/// Declares which named parameters a node kind accepts: which are required,
/// which have defaults, which are optional with no default, and which pairs
/// can't both be set.
#[derive(Default, Clone)]
pub struct ParamSpec {
    mandatory: Vec<&'static str>,
    defaults: BTreeMap<&'static str, Value>,
    optional: Vec<&'static str>,
    mutually_exclusive: Vec<(&'static str, &'static str)>,
}

impl ParamSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mandatory(mut self, name: &'static str) -> Self {
        self.mandatory.push(name);
        self
    }

    pub fn default_value(mut self, name: &'static str, value: impl Into<Value>) -> Self {
        self.defaults.insert(name, value.into());
        self
    }

    pub fn optional(mut self, name: &'static str) -> Self {
        self.optional.push(name);
        self
    }

    pub fn mutually_exclusive(mut self, a: &'static str, b: &'static str) -> Self {
        self.mutually_exclusive.push((a, b));
        self
    }

    fn known_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.mandatory.clone();
        names.extend(self.defaults.keys().copied());
        names.extend(self.optional.iter().copied());
        names
    }

    /// Validates `raw` against the declared parameter sets and fills in
    /// defaults, producing a value the factory closure can cheaply clone
    /// for every instance it creates.
    pub fn sanitize(&self, context: &'static str, mut raw: Params) -> SchemaResult<SanitizedParams> {
        let known = self.known_names();
        for key in raw.keys() {
            if !known.contains(&key.as_str()) {
                return Err(arg_err(context, format!("unknown parameter `{key}`")));
            }
        }

        for name in &self.mandatory {
            if !raw.contains_key(*name) {
                return Err(arg_err(context, format!("missing mandatory parameter `{name}`")));
            }
        }

        for (a, b) in &self.mutually_exclusive {
            if raw.contains_key(*a) && raw.contains_key(*b) {
                return Err(arg_err(context, format!("`{a}` and `{b}` are mutually exclusive")));
            }
        }

        for (name, value) in &self.defaults {
            raw.entry((*name).to_owned()).or_insert_with(|| Expr::Literal(value.clone()));
        }

        Ok(SanitizedParams(Arc::new(raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_in_defaults_and_keeps_given_values() {
        let spec = ParamSpec::new().mandatory("length").default_value("pad_byte", 0u64);
        let mut raw = Params::new();
        raw.insert("length".into(), Expr::literal(4u64));
        let sanitized = spec.sanitize("test", raw).unwrap();
        assert_eq!(sanitized.get_literal("length"), Some(&Value::UInt(4)));
        assert_eq!(sanitized.get_literal("pad_byte"), Some(&Value::UInt(0)));
    }

    #[test]
    fn rejects_unknown_parameter() {
        let spec = ParamSpec::new().mandatory("length");
        let mut raw = Params::new();
        raw.insert("length".into(), Expr::literal(4u64));
        raw.insert("bogus".into(), Expr::literal(1u64));
        assert!(spec.sanitize("test", raw).is_err());
    }

    #[test]
    fn rejects_missing_mandatory() {
        let spec = ParamSpec::new().mandatory("length");
        assert!(spec.sanitize("test", Params::new()).is_err());
    }

    #[test]
    fn rejects_mutually_exclusive_pair() {
        let spec = ParamSpec::new()
            .optional("read_until")
            .optional("read_until_eof")
            .mutually_exclusive("read_until", "read_until_eof");
        let mut raw = Params::new();
        raw.insert("read_until".into(), Expr::literal(true));
        raw.insert("read_until_eof".into(), Expr::literal(true));
        assert!(spec.sanitize("test", raw).is_err());
    }
}
