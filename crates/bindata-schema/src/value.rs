//! Snapshot/assign value type shared by [`crate::node::Node`]'s universal
//! operations and the evaluator's scope lookup.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::cell::RefCell;

use crate::node::Node;

/// A live handle to a node in the schema tree. Shared so siblings, parents
/// and evaluator closures can all hold a reference to the same instance.
pub type NodeRef = Rc<RefCell<dyn Node>>;
pub type WeakNodeRef = std::rc::Weak<RefCell<dyn Node>>;

/// A structural snapshot (or assignment payload) of a node's contents.
///
/// Scalars flatten primitives; `Map`/`List` mirror `Struct`/`Array`; `Node`
/// carries a live handle rather than a flattened copy, which is what lets an
/// expression closure call methods (`is_clear`, `evaluated_value`, ...) on a
/// sibling field instead of only seeing its current scalar value.
pub enum Value {
    Unset,
    Bool(bool),
    Int(i128),
    UInt(u128),
    Float(f64),
    Bytes(Vec<u8>),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Node(NodeRef),
}

impl Clone for Value {
    fn clone(&self) -> Self {
        match self {
            Value::Unset => Value::Unset,
            Value::Bool(b) => Value::Bool(*b),
            Value::Int(v) => Value::Int(*v),
            Value::UInt(v) => Value::UInt(*v),
            Value::Float(v) => Value::Float(*v),
            Value::Bytes(b) => Value::Bytes(b.clone()),
            Value::Str(s) => Value::Str(s.clone()),
            Value::List(items) => Value::List(items.clone()),
            Value::Map(m) => Value::Map(m.clone()),
            Value::Node(n) => Value::Node(n.clone()),
        }
    }
}

impl Value {
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => i128::try_from(*v).ok(),
            Value::Bool(b) => Some(*b as i128),
            _ => None,
        }
    }

    pub fn as_u128(&self) -> Option<u128> {
        match self {
            Value::UInt(v) => Some(*v),
            Value::Int(v) if *v >= 0 => Some(*v as u128),
            Value::Bool(b) => Some(*b as u128),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_u128().and_then(|v| u64::try_from(v).ok())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(v) => Some(*v != 0),
            Value::UInt(v) => Some(*v != 0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&NodeRef> {
        match self {
            Value::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Value::Unset)
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Unset => write!(f, "Unset"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(v) => write!(f, "Int({v})"),
            Value::UInt(v) => write!(f, "UInt({v})"),
            Value::Float(v) => write!(f, "Float({v})"),
            Value::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::List(items) => write!(f, "List({} items)", items.len()),
            Value::Map(m) => write!(f, "Map({} keys)", m.len()),
            Value::Node(_) => write!(f, "Node(..)"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unset, Value::Unset) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Int(a), Value::UInt(b)) | (Value::UInt(b), Value::Int(a)) => i128::try_from(*b).ok() == Some(*a),
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v as i128)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v as u128)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}
