//! The universal node contract every concrete kind implements.

use std::cell::RefCell;
use std::rc::Rc;

use bindata_core::{AsAny, DynReader, DynWriter, VecSink};

use crate::error::SchemaResult;
use crate::evaluator::Scope;
use crate::paramspec::SanitizedParams;
use crate::value::{NodeRef, Value, WeakNodeRef};

/// Operations every schema node supports, regardless of concrete kind.
///
/// `read`/`write` move the node between "clear" and "populated"; the rest
/// are the universal introspection/mutation operations every kind exposes
/// (snapshot and assign for copying data in and out, the tree-navigation
/// pair for the evaluator's scope walk, and `field`/`param` for named
/// lookups within a single scope frame).
///
/// `scope` is built by the caller (the parent aggregate, or the top-level
/// entry point for the root) from the `NodeRef` it already holds for this
/// node — a node can't build its own `Scope` from `&mut self` since that
/// requires the `Rc<RefCell<..>>` handle, not a plain reference.
pub trait Node: AsAny {
    fn read(&mut self, io: &mut dyn DynReader, scope: &Scope) -> SchemaResult<()>;

    fn write(&self, io: &mut dyn DynWriter, scope: &Scope) -> SchemaResult<()>;

    /// Encoded size in bytes, without touching any stream.
    fn num_bytes(&self, scope: &Scope) -> SchemaResult<u64>;

    /// A structural copy of the node's current contents (spec: "snapshot").
    fn snapshot(&self) -> Value;

    /// Resets the node to its pre-read state (spec: "clear").
    fn clear(&mut self);

    /// `true` if the node has never been read, written or assigned since
    /// construction or the last [`Node::clear`].
    fn is_clear(&self) -> bool;

    /// Overwrites the node's contents from a [`Value`] (spec: "assign").
    fn assign(&mut self, value: Value) -> SchemaResult<()>;

    fn parent(&self) -> Option<NodeRef>;

    fn set_parent(&mut self, parent: WeakNodeRef);

    /// This node's position among its parent's children, if any (an array
    /// index or a struct field position); used for `:index` lookups.
    fn child_index(&self) -> Option<usize>;

    fn set_child_index(&mut self, index: Option<usize>);

    /// A named child's externally-visible value, for `Struct`/`Choice`
    /// fields and named-array access. Returns `None` for kinds with no
    /// named children (e.g. `Primitive`).
    fn field(&self, _name: &str) -> Option<Value> {
        None
    }

    /// A live handle to a named child, when the evaluator needs more than
    /// its flattened value (e.g. calling `.is_clear()` on a sibling).
    fn field_node(&self, _name: &str) -> Option<NodeRef> {
        None
    }

    /// This node's own externally-visible value: for primitives, the
    /// dual-value (raw-during-read vs. computed `:value`) reading; for
    /// aggregates, equivalent to [`Node::snapshot`].
    fn evaluated_value(&self, _scope: &Scope) -> SchemaResult<Value> {
        Ok(self.snapshot())
    }

    /// Absolute offset of the start of this node from the root stream,
    /// default implementation available once a node tracks it during read;
    /// concrete kinds that don't track offsets return `None`.
    fn abs_offset(&self) -> Option<u64> {
        None
    }

    /// This node's offset relative to its parent's own start. `None` if
    /// either this node or its parent never tracked an absolute offset.
    fn rel_offset(&self) -> Option<u64> {
        let abs = self.abs_offset()?;
        match self.parent() {
            Some(parent) => parent.borrow().abs_offset().map(|p| abs.saturating_sub(p)),
            None => Some(abs),
        }
    }

    /// Toggles the dual-value "currently being read" flag. An enclosing
    /// aggregate keeps this set across its own whole read, not just this
    /// node's own byte consumption, so a sibling field evaluated partway
    /// through still observes the raw value rather than a computed
    /// `:value`. Only `Integer` overrides this; everything else ignores it.
    fn set_reading(&mut self, _reading: bool) {}

    /// Sanitized parameters this node was instantiated with, when built
    /// through the two-phase sanitize-then-instantiate registry path.
    /// `None` for node kinds built directly rather than via a `Factory`.
    fn params(&self) -> Option<SanitizedParams> {
        None
    }

    /// This node's direct children, in field/element order. Aggregates
    /// (`Struct`, `Array`, `Choice`, ...) override this; leaves keep the
    /// empty default.
    fn children(&self) -> Vec<NodeRef> {
        Vec::new()
    }

    /// Stashes a weak handle to this node's own `Rc`, set once by
    /// [`finalize_tree`]. Only aggregates that grow children *during* a
    /// read (`Array`'s `read_until`, `Choice`'s `copy_on_change`) need this,
    /// to wire the new child's parent pointer themselves; everything else
    /// keeps the no-op default.
    fn set_self_ref(&mut self, _self_ref: WeakNodeRef) {}
}

bindata_core::assert_obj_safe!(Node);

/// Fields every concrete node kind embeds by composition (Rust has no
/// struct inheritance), covering the tree-navigation half of the contract.
#[derive(Default)]
pub struct NodeCommon {
    parent: Option<WeakNodeRef>,
    child_index: Option<usize>,
    abs_offset: Option<u64>,
}

impl NodeCommon {
    pub fn parent(&self) -> Option<NodeRef> {
        self.parent.as_ref().and_then(|w| w.upgrade())
    }

    pub fn set_parent(&mut self, parent: WeakNodeRef) {
        self.parent = Some(parent);
    }

    pub fn child_index(&self) -> Option<usize> {
        self.child_index
    }

    pub fn set_child_index(&mut self, index: Option<usize>) {
        self.child_index = index;
    }

    pub fn abs_offset(&self) -> Option<u64> {
        self.abs_offset
    }

    pub fn set_abs_offset(&mut self, offset: Option<u64>) {
        self.abs_offset = offset;
    }
}

/// Encodes `node` into a fresh buffer and returns its length — the fallback
/// `num_bytes` implementation for kinds without a cheaper closed form.
pub fn num_bytes_by_encoding(node: &dyn Node, scope: &Scope) -> SchemaResult<u64> {
    let mut writer = bindata_core::BitWriter::new(VecSink::new());
    node.write(&mut writer, scope)?;
    writer.flush().map_err(|e| e.into_other_kind())?;
    Ok(writer.into_inner().into_inner().len() as u64)
}

pub fn new_node_ref<N: Node + 'static>(node: N) -> NodeRef {
    Rc::new(RefCell::new(node))
}

/// Walks `root`'s subtree wiring each child's parent pointer and index,
/// recursively. Every aggregate constructor must call this once on the
/// `NodeRef` it hands back, since a node can't set its own parent pointer
/// from `&mut self`. Parent/index bookkeeping happens once, at
/// construction, rather than being recomputed on every scope walk.
pub fn finalize_tree(root: &NodeRef) {
    root.borrow_mut().set_self_ref(Rc::downgrade(root));
    let children = root.borrow().children();
    for (index, child) in children.into_iter().enumerate() {
        child.borrow_mut().set_parent(Rc::downgrade(root));
        child.borrow_mut().set_child_index(Some(index));
        finalize_tree(&child);
    }
}

/// Recursively toggles [`Node::set_reading`] across `root`'s subtree. An
/// aggregate calls this with `true` before reading its own fields/elements
/// and `false` once its whole read is done, so a field's raw dual-value
/// state stays visible to its siblings for the full duration of the
/// enclosing read rather than clearing the instant the field's own `read`
/// returns.
pub fn set_reading_recursive(root: &NodeRef, reading: bool) {
    root.borrow_mut().set_reading(reading);
    let children = root.borrow().children();
    for child in children {
        set_reading_recursive(&child, reading);
    }
}
