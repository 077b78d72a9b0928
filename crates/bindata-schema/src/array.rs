//! `Array`: a homogeneous, growable sequence of elements.

use std::rc::Rc;
use std::sync::Arc;

use bindata_core::{AsAny, DynReader, DynWriter};

use crate::error::{validity_err, SchemaResult};
use crate::evaluator::{Expr, Frame, Scope};
use crate::node::{Node, NodeCommon};
use crate::value::{NodeRef, Value, WeakNodeRef};

/// How many elements an [`ArrayNode`] reads from the stream.
pub enum LengthMode {
    /// Read exactly this many elements.
    Fixed(Expr),
    /// Read one element at a time, stopping once `predicate` evaluates
    /// true for the element just read (locals `index`/`element`/`array` are
    /// injected into its scope).
    ReadUntil(Expr),
    /// Read elements until the stream is exhausted.
    ReadUntilEof,
    /// Never populated by `read` — built purely by `push`/`concat`/`assign`.
    Unbounded,
}

type ElementFactory = Arc<dyn Fn() -> NodeRef>;

pub struct ArrayNode {
    common: NodeCommon,
    self_ref: Option<WeakNodeRef>,
    element_factory: ElementFactory,
    length_mode: LengthMode,
    elements: Vec<NodeRef>,
}

impl ArrayNode {
    pub fn new(element_factory: ElementFactory, length_mode: LengthMode) -> Self {
        Self {
            common: NodeCommon::default(),
            self_ref: None,
            element_factory,
            length_mode,
            elements: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<NodeRef> {
        self.elements.get(index).cloned()
    }

    /// Resolves a possibly-negative index the way the evaluator's array
    /// accessors do (`-1` is the last element).
    pub fn resolve_index(&self, index: i64) -> Option<usize> {
        if index >= 0 {
            let i = index as usize;
            (i < self.elements.len()).then_some(i)
        } else {
            let from_end = (-index) as usize;
            self.elements.len().checked_sub(from_end)
        }
    }

    fn new_element(&self) -> NodeRef {
        let element = (self.element_factory)();
        if let Some(self_rc) = self.self_ref.as_ref().and_then(WeakNodeRef::upgrade) {
            element.borrow_mut().set_parent(Rc::downgrade(&self_rc));
        }
        // Wires the element's own self-reference and (if it's itself an
        // aggregate) its children's parent pointers; doesn't touch the
        // parent pointer just set above.
        crate::node::finalize_tree(&element);
        element
    }

    fn push_new(&mut self) -> NodeRef {
        let element = self.new_element();
        element.borrow_mut().set_child_index(Some(self.elements.len()));
        self.elements.push(element.clone());
        element
    }

    pub fn push(&mut self, value: Value) -> SchemaResult<()> {
        let element = self.push_new();
        element.borrow_mut().assign(value)
    }

    pub fn insert(&mut self, index: usize, value: Value) -> SchemaResult<()> {
        let element = self.new_element();
        element.borrow_mut().assign(value)?;
        self.elements.insert(index.min(self.elements.len()), element);
        self.reindex();
        Ok(())
    }

    pub fn unshift(&mut self, value: Value) -> SchemaResult<()> {
        self.insert(0, value)
    }

    pub fn concat(&mut self, values: Vec<Value>) -> SchemaResult<()> {
        for value in values {
            self.push(value)?;
        }
        Ok(())
    }

    fn reindex(&mut self) {
        for (i, element) in self.elements.iter().enumerate() {
            element.borrow_mut().set_child_index(Some(i));
        }
    }

    /// Grows the array with freshly-constructed default elements up to
    /// `index` (inclusive) if it doesn't exist yet, then assigns `value`
    /// there.
    pub fn assign_at(&mut self, index: usize, value: Value) -> SchemaResult<()> {
        while self.elements.len() <= index {
            self.push_new();
        }
        self.elements[index].borrow_mut().assign(value)
    }

    fn element_scope(&self, scope: &Scope, index: usize) -> Scope {
        let element = self.elements[index].clone();
        let mut frame = Frame::new(element);
        frame = frame.with_local("index", Value::UInt(index as u128));
        frame = frame.with_local("element", self.elements[index].borrow().snapshot());
        if let Some(self_rc) = self.self_ref.as_ref().and_then(WeakNodeRef::upgrade) {
            frame = frame.with_local("array", Value::Node(self_rc));
        }
        let mut frames = vec![frame];
        frames.extend(scope.clone().into_frames());
        Scope::new(frames)
    }

    /// The body of `read`: populates `self.elements` according to the
    /// length mode. Each element's reading flag is set right before its
    /// own read and left set (not cleared per element) so a later sibling
    /// element's predicate/value expression can still observe an earlier
    /// element's raw read state; `read` clears the whole batch once this
    /// returns, successfully or not.
    fn read_elements(&mut self, io: &mut dyn DynReader, scope: &Scope) -> SchemaResult<()> {
        match &self.length_mode {
            LengthMode::Fixed(expr) => {
                let n = expr.eval(scope)?.as_u64().unwrap_or(0);
                for _ in 0..n {
                    let element = self.push_new();
                    crate::node::set_reading_recursive(&element, true);
                    let index = element.borrow().child_index().unwrap_or(0);
                    let child_scope = self.element_scope(scope, index);
                    element.borrow_mut().read(io, &child_scope)?;
                }
            }
            LengthMode::ReadUntil(predicate) => loop {
                let element = self.push_new();
                crate::node::set_reading_recursive(&element, true);
                let index = element.borrow().child_index().unwrap_or(0);
                let child_scope = self.element_scope(scope, index);
                element.borrow_mut().read(io, &child_scope)?;
                let stop_scope = self.element_scope(scope, index);
                if predicate.eval(&stop_scope)?.as_bool().unwrap_or(false) {
                    break;
                }
            },
            LengthMode::ReadUntilEof => loop {
                if io.num_bytes_remaining().map_err(|e| e.into_other_kind())? == 0 {
                    break;
                }
                let element = self.push_new();
                crate::node::set_reading_recursive(&element, true);
                let index = element.borrow().child_index().unwrap_or(0);
                let child_scope = self.element_scope(scope, index);
                element.borrow_mut().read(io, &child_scope)?;
            },
            LengthMode::Unbounded => {}
        }
        Ok(())
    }
}

impl AsAny for ArrayNode {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl Node for ArrayNode {
    fn read(&mut self, io: &mut dyn DynReader, scope: &Scope) -> SchemaResult<()> {
        self.common.set_abs_offset(Some(io.offset()));
        self.elements.clear();
        let outcome = self.read_elements(io, scope);
        for element in &self.elements {
            crate::node::set_reading_recursive(element, false);
        }
        outcome
    }

    fn write(&self, io: &mut dyn DynWriter, scope: &Scope) -> SchemaResult<()> {
        for (index, element) in self.elements.iter().enumerate() {
            let child_scope = self.element_scope(scope, index);
            element.borrow().write(io, &child_scope)?;
        }
        Ok(())
    }

    fn num_bytes(&self, scope: &Scope) -> SchemaResult<u64> {
        let mut total = 0u64;
        for (index, element) in self.elements.iter().enumerate() {
            let child_scope = self.element_scope(scope, index);
            total += element.borrow().num_bytes(&child_scope)?;
        }
        Ok(total)
    }

    fn snapshot(&self) -> Value {
        Value::List(self.elements.iter().map(|e| e.borrow().snapshot()).collect())
    }

    fn clear(&mut self) {
        self.elements.clear();
    }

    fn is_clear(&self) -> bool {
        self.elements.is_empty()
    }

    fn assign(&mut self, value: Value) -> SchemaResult<()> {
        let items = match value {
            Value::List(items) => items,
            _ => return Err(validity_err("ArrayNode::assign", "expected a list")),
        };
        self.elements.clear();
        for item in items {
            self.push(item)?;
        }
        Ok(())
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

    fn abs_offset(&self) -> Option<u64> {
        self.common.abs_offset()
    }

    fn children(&self) -> Vec<NodeRef> {
        self.elements.clone()
    }

    fn set_self_ref(&mut self, self_ref: WeakNodeRef) {
        self.self_ref = Some(self_ref);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{finalize_tree, new_node_ref};
    use crate::primitive::Integer;
    use bindata_core::{BitReader, SliceSource};

    fn u8_array(mode: LengthMode) -> NodeRef {
        new_node_ref(ArrayNode::new(Arc::new(|| new_node_ref(Integer::u8())), mode))
    }

    #[test]
    fn fixed_length_reads_n_elements() {
        let root = u8_array(LengthMode::Fixed(Expr::literal(3u64)));
        finalize_tree(&root);
        let mut r = BitReader::new(SliceSource::new(&[1, 2, 3, 99]));
        let scope = Scope::from_node(root.clone());
        root.borrow_mut().read(&mut r, &scope).unwrap();
        assert_eq!(r.offset(), 3);
        match root.borrow().snapshot() {
            Value::List(items) => assert_eq!(items.len(), 3),
            _ => panic!("expected a list"),
        }
    }

    #[test]
    fn read_until_stops_after_sentinel_element() {
        let root = u8_array(LengthMode::ReadUntil(Expr::closure(|scope| scope.resolve("element"))));
        finalize_tree(&root);
        // Sentinel: stop once the element read is non-zero.
        let mut r = BitReader::new(SliceSource::new(&[0, 0, 5, 9]));
        let scope = Scope::from_node(root.clone());
        root.borrow_mut().read(&mut r, &scope).unwrap();
        assert_eq!(r.offset(), 3);
    }

    #[test]
    fn read_until_eof_consumes_everything() {
        let root = u8_array(LengthMode::ReadUntilEof);
        finalize_tree(&root);
        let mut r = BitReader::new(SliceSource::new(&[1, 2, 3]));
        let scope = Scope::from_node(root.clone());
        root.borrow_mut().read(&mut r, &scope).unwrap();
        assert_eq!(r.offset(), 3);
    }

    #[test]
    fn negative_index_resolves_from_the_end() {
        let root = u8_array(LengthMode::Unbounded);
        finalize_tree(&root);
        if let Some(array) = root.borrow_mut().as_any_mut().downcast_mut::<ArrayNode>() {
            array.push(Value::UInt(1)).unwrap();
            array.push(Value::UInt(2)).unwrap();
            array.push(Value::UInt(3)).unwrap();
            assert_eq!(array.resolve_index(-1), Some(2));
            assert_eq!(array.resolve_index(0), Some(0));
        } else {
            panic!("expected ArrayNode");
        }
    }

    #[test]
    fn assign_at_grows_array_with_defaults() {
        let root = u8_array(LengthMode::Unbounded);
        finalize_tree(&root);
        if let Some(array) = root.borrow_mut().as_any_mut().downcast_mut::<ArrayNode>() {
            array.assign_at(2, Value::UInt(7)).unwrap();
            assert_eq!(array.len(), 3);
            assert_eq!(array.get(2).unwrap().borrow().snapshot(), Value::UInt(7));
        } else {
            panic!("expected ArrayNode");
        }
    }
}
