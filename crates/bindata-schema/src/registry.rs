//! Name -> factory lookup, grounded on the decoder-dispatch-by-discriminant
//! pattern common to PDU parsers but keyed by a user-chosen name instead of
//! a wire discriminant, since schema authors name their own record types.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::sync::Arc;

use bindata_core::Endian;

use crate::error::{arg_err, SchemaResult};
use crate::node::Node;
use crate::paramspec::Params;
use crate::value::NodeRef;

pub type Factory = Arc<dyn Fn(Params) -> SchemaResult<NodeRef> + Send + Sync>;

#[derive(Clone, PartialEq, Eq, Hash)]
struct Key {
    name: String,
    endian: Option<EndianKey>,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum EndianKey {
    Big,
    Little,
}

impl From<Endian> for EndianKey {
    fn from(e: Endian) -> Self {
        match e {
            Endian::Big => EndianKey::Big,
            Endian::Little => EndianKey::Little,
        }
    }
}

/// Rewrites a registered type name to the engine's canonical `snake_case`
/// form, the way schema authors write field types (`uint32be`, not
/// `Uint32Be`).
pub fn normalize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 4);
    for (i, ch) in raw.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i != 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Process-wide name -> factory table: a single well-known dispatch point,
/// generalized to a runtime-extensible map since schema authors register
/// their own record types at startup rather than the set being closed at
/// compile time.
pub struct Registry {
    factories: Mutex<HashMap<Key, Factory>>,
}

impl Registry {
    fn new() -> Self {
        Self {
            factories: Mutex::new(HashMap::new()),
        }
    }

    pub fn global() -> &'static Registry {
        static INSTANCE: OnceLock<Registry> = OnceLock::new();
        INSTANCE.get_or_init(Registry::new)
    }

    /// Registers `factory` under `name` (optionally endian-specific).
    /// Re-registering the same key is allowed but logged, matching the
    /// spec's "last registration for a name wins, with a warning".
    pub fn register(&self, name: impl Into<String>, endian: Option<Endian>, factory: Factory) {
        let name = normalize_name(&name.into());
        let key = Key {
            name: name.clone(),
            endian: endian.map(EndianKey::from),
        };
        let mut factories = self.factories.lock().expect("registry mutex poisoned");
        if factories.contains_key(&key) {
            tracing::warn!(name = %name, "overriding existing registration");
        }
        factories.insert(key, factory);
    }

    /// Looks up a factory by name, preferring an endian-specific
    /// registration over an endian-agnostic one when both exist.
    pub fn lookup(&self, name: &str, endian: Option<Endian>) -> SchemaResult<Factory> {
        let name = normalize_name(name);
        let factories = self.factories.lock().expect("registry mutex poisoned");

        if let Some(endian) = endian {
            if let Some(f) = factories.get(&Key {
                name: name.clone(),
                endian: Some(EndianKey::from(endian)),
            }) {
                return Ok(f.clone());
            }
        }

        factories
            .get(&Key { name: name.clone(), endian: None })
            .cloned()
            .ok_or_else(|| crate::error::SchemaError::new(
                "Registry::lookup",
                crate::error::SchemaErrorKind::UnRegisteredType { name },
            ))
    }
}

bindata_core::assert_obj_safe!(Node);

pub(crate) fn require_known(context: &'static str, name: &str) -> SchemaResult<()> {
    if name.is_empty() {
        return Err(arg_err(context, "empty type name"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::new_node_ref;
    use crate::primitive::Integer;

    #[test]
    fn normalizes_camel_case_to_snake_case() {
        assert_eq!(normalize_name("Uint32Be"), "uint32_be");
        assert_eq!(normalize_name("uint8"), "uint8");
    }

    #[test]
    fn lookup_fails_for_unregistered_name() {
        let registry = Registry::new();
        assert!(registry.lookup("does_not_exist", None).is_err());
    }

    #[test]
    fn endian_specific_registration_wins_over_agnostic() {
        let registry = Registry::new();
        registry.register(
            "probe",
            None,
            Arc::new(|_params| Ok(new_node_ref(Integer::u8()))),
        );
        registry.register(
            "probe",
            Some(Endian::Little),
            Arc::new(|_params| Ok(new_node_ref(Integer::u16(Endian::Little)))),
        );
        let factory = registry.lookup("probe", Some(Endian::Little)).unwrap();
        let node = factory(Params::new()).unwrap();
        let scope = crate::evaluator::Scope::from_node(node.clone());
        assert_eq!(node.borrow().num_bytes(&scope).unwrap(), 2);
    }
}
