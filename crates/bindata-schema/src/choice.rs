//! `Choice`: a selector-keyed union where exactly one child is active at a
//! time. Most `Node` operations delegate to the active child so a `Choice`
//! can largely be used as if it *were* that child.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

use bindata_core::{AsAny, DynReader, DynWriter};

use crate::error::{SchemaError, SchemaErrorKind, SchemaResult};
use crate::evaluator::{Expr, Scope};
use crate::node::{Node, NodeCommon};
use crate::value::{NodeRef, Value, WeakNodeRef};

/// A selector value reduced to something orderable/hashable, since `Value`
/// itself (carrying `f64`/`NodeRef` variants) isn't.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChoiceKey {
    Int(i128),
    Str(String),
    Bool(bool),
}

impl ChoiceKey {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(ChoiceKey::Bool(*b)),
            Value::Int(_) | Value::UInt(_) => value.as_i128().map(ChoiceKey::Int),
            Value::Str(s) => Some(ChoiceKey::Str(s.clone())),
            _ => None,
        }
    }
}

type ChildFactory = Arc<dyn Fn() -> NodeRef>;

pub struct ChoiceNode {
    common: NodeCommon,
    self_ref: Option<WeakNodeRef>,
    selector: Expr,
    children: BTreeMap<ChoiceKey, ChildFactory>,
    default: Option<ChildFactory>,
    copy_on_change: bool,
    active_key: Option<ChoiceKey>,
    active: Option<NodeRef>,
}

impl ChoiceNode {
    pub fn new(selector: Expr) -> Self {
        Self {
            common: NodeCommon::default(),
            self_ref: None,
            selector,
            children: BTreeMap::new(),
            default: None,
            copy_on_change: false,
            active_key: None,
            active: None,
        }
    }

    pub fn with_child(mut self, key: ChoiceKey, factory: ChildFactory) -> Self {
        self.children.insert(key, factory);
        self
    }

    pub fn with_default(mut self, factory: ChildFactory) -> Self {
        self.default = Some(factory);
        self
    }

    pub fn with_copy_on_change(mut self) -> Self {
        self.copy_on_change = true;
        self
    }

    pub fn active_child(&self) -> Option<NodeRef> {
        self.active.clone()
    }

    fn select(&self, scope: &Scope) -> SchemaResult<(ChoiceKey, ChildFactory)> {
        let selected = self.selector.eval(scope)?;
        let key = ChoiceKey::from_value(&selected)
            .ok_or_else(|| SchemaError::new("ChoiceNode::select", SchemaErrorKind::UnexpectedChoiceKey { key: format!("{selected:?}") }))?;

        if let Some(factory) = self.children.get(&key) {
            return Ok((key, factory.clone()));
        }
        if let Some(factory) = &self.default {
            return Ok((key, factory.clone()));
        }
        Err(SchemaError::new(
            "ChoiceNode::select",
            SchemaErrorKind::UnexpectedChoiceKey { key: format!("{key:?}") },
        ))
    }

    fn instantiate(&self, factory: &ChildFactory) -> NodeRef {
        let child = factory();
        if let Some(self_rc) = self.self_ref.as_ref().and_then(WeakNodeRef::upgrade) {
            child.borrow_mut().set_parent(Rc::downgrade(&self_rc));
        }
        crate::node::finalize_tree(&child);
        child
    }

    fn activate(&mut self, key: ChoiceKey, factory: ChildFactory) {
        let previous = self.active.take();
        let child = self.instantiate(&factory);

        if self.copy_on_change {
            if let Some(previous) = previous {
                if self.active_key.as_ref() != Some(&key) {
                    let _ = child.borrow_mut().assign(previous.borrow().snapshot());
                }
            }
        }

        self.active = Some(child);
        self.active_key = Some(key);
    }
}

impl AsAny for ChoiceNode {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl Node for ChoiceNode {
    fn read(&mut self, io: &mut dyn DynReader, scope: &Scope) -> SchemaResult<()> {
        self.common.set_abs_offset(Some(io.offset()));
        let (key, factory) = self.select(scope)?;
        self.activate(key, factory);
        let active = self.active.clone().expect("just activated");
        crate::node::set_reading_recursive(&active, true);
        let child_scope = Scope::from_node(active.clone());
        let result = active.borrow_mut().read(io, &child_scope);
        crate::node::set_reading_recursive(&active, false);
        result
    }

    fn write(&self, io: &mut dyn DynWriter, _scope: &Scope) -> SchemaResult<()> {
        let active = self.active.as_ref().ok_or_else(|| {
            SchemaError::new("ChoiceNode::write", SchemaErrorKind::SyntaxError { reason: "no active child".into() })
        })?;
        let child_scope = Scope::from_node(active.clone());
        active.borrow().write(io, &child_scope)
    }

    fn num_bytes(&self, _scope: &Scope) -> SchemaResult<u64> {
        match &self.active {
            Some(active) => {
                let child_scope = Scope::from_node(active.clone());
                active.borrow().num_bytes(&child_scope)
            }
            None => Ok(0),
        }
    }

    fn snapshot(&self) -> Value {
        self.active.as_ref().map(|a| a.borrow().snapshot()).unwrap_or(Value::Unset)
    }

    fn clear(&mut self) {
        self.active = None;
        self.active_key = None;
    }

    fn is_clear(&self) -> bool {
        self.active.is_none()
    }

    fn assign(&mut self, value: Value) -> SchemaResult<()> {
        match &self.active {
            Some(active) => active.borrow_mut().assign(value),
            None => Err(SchemaError::new(
                "ChoiceNode::assign",
                SchemaErrorKind::SyntaxError { reason: "no active child to assign into".into() },
            )),
        }
    }

    fn parent(&self) -> Option<NodeRef> {
        self.common.parent()
    }

    fn set_parent(&mut self, parent: WeakNodeRef) {
        self.common.set_parent(parent);
    }

    fn child_index(&self) -> Option<usize> {
        self.common.child_index()
    }

    fn set_child_index(&mut self, index: Option<usize>) {
        self.common.set_child_index(index);
    }

    fn field(&self, name: &str) -> Option<Value> {
        self.active.as_ref().and_then(|a| a.borrow().field(name))
    }

    fn field_node(&self, name: &str) -> Option<NodeRef> {
        self.active.as_ref().and_then(|a| a.borrow().field_node(name))
    }

    fn children(&self) -> Vec<NodeRef> {
        self.active.iter().cloned().collect()
    }

    fn set_self_ref(&mut self, self_ref: WeakNodeRef) {
        self.self_ref = Some(self_ref);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::new_node_ref;
    use crate::primitive::Integer;
    use bindata_core::{BitReader, Endian, SliceSource};

    #[test]
    fn selects_child_by_key_and_falls_back_to_default() {
        let selector = Expr::reference("selector_value");
        let root = new_node_ref(
            ChoiceNode::new(selector)
                .with_child(ChoiceKey::Int(1), Arc::new(|| new_node_ref(Integer::u8())))
                .with_child(ChoiceKey::Int(2), Arc::new(|| new_node_ref(Integer::u16(Endian::Big))))
                .with_default(Arc::new(|| new_node_ref(Integer::u8()))),
        );
        crate::node::finalize_tree(&root);

        let scope = Scope::new(vec![
            crate::evaluator::Frame::new(root.clone()).with_local("selector_value", Value::Int(2)),
        ]);
        let mut r = BitReader::new(SliceSource::new(&[0x01, 0x02]));
        root.borrow_mut().read(&mut r, &scope).unwrap();
        assert_eq!(root.borrow().snapshot(), Value::UInt(0x0102));
    }

    #[test]
    fn copy_on_change_carries_the_previous_snapshot_into_the_freshly_activated_child() {
        let root = new_node_ref(
            ChoiceNode::new(Expr::reference("selector_value"))
                .with_child(ChoiceKey::Int(0), Arc::new(|| new_node_ref(Integer::u16(Endian::Big))))
                .with_child(ChoiceKey::Int(1), Arc::new(|| new_node_ref(Integer::u32(Endian::Big))))
                .with_copy_on_change(),
        );
        crate::node::finalize_tree(&root);

        {
            let mut choice_ref = root.borrow_mut();
            let choice = choice_ref.as_any_mut().downcast_mut::<ChoiceNode>().unwrap();
            choice.activate(ChoiceKey::Int(0), Arc::new(|| new_node_ref(Integer::u16(Endian::Big))));
            choice.active_child().unwrap().borrow_mut().assign(Value::UInt(0x1234)).unwrap();
        }
        assert_eq!(root.borrow().snapshot(), Value::UInt(0x1234));

        {
            let mut choice_ref = root.borrow_mut();
            let choice = choice_ref.as_any_mut().downcast_mut::<ChoiceNode>().unwrap();
            choice.activate(ChoiceKey::Int(1), Arc::new(|| new_node_ref(Integer::u32(Endian::Big))));
        }
        assert_eq!(root.borrow().snapshot(), Value::UInt(0x1234));
    }

    #[test]
    fn unknown_key_without_default_errors() {
        let selector = Expr::reference("selector_value");
        let root = new_node_ref(ChoiceNode::new(selector).with_child(ChoiceKey::Int(1), Arc::new(|| new_node_ref(Integer::u8()))));
        crate::node::finalize_tree(&root);
        let scope = Scope::new(vec![
            crate::evaluator::Frame::new(root.clone()).with_local("selector_value", Value::Int(99)),
        ]);
        let mut r = BitReader::new(SliceSource::new(&[0x01]));
        assert!(root.borrow_mut().read(&mut r, &scope).is_err());
    }
}
