//! `Buffer`, `DelayedIo` and `Section`: the stream-boundary node kinds.
//! All three wrap one inner node but change how bytes reach it — a bounded
//! in-memory window, an explicitly-triggered absolute seek, and a
//! transform-decoded sub-stream, respectively.

use bindata_core::{AsAny, BitReader, BitWriter, DynReader, DynWriter, IdentityTransform, SliceSource, Transform, VecSink};

use crate::error::{validity_err, SchemaResult};
use crate::evaluator::{Expr, Scope};
use crate::node::{Node, NodeCommon};
use crate::value::{NodeRef, Value, WeakNodeRef};

/// Reads exactly `length` bytes into memory, then parses `inner` from that
/// bounded window — `inner` can never read past the buffer's end even if
/// its own declared size is larger or unbounded (e.g. a trailing `Rest`).
pub struct Buffer {
    common: NodeCommon,
    length: Expr,
    inner: NodeRef,
}

impl Buffer {
    pub fn new(length: Expr, inner: NodeRef) -> Self {
        Self {
            common: NodeCommon::default(),
            length,
            inner,
        }
    }
}

impl AsAny for Buffer {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl Node for Buffer {
    fn read(&mut self, io: &mut dyn DynReader, scope: &Scope) -> SchemaResult<()> {
        self.common.set_abs_offset(Some(io.offset()));
        let len = self.length.eval(scope)?.as_u64().unwrap_or(0) as usize;
        let bytes = io.read_bytes(len).map_err(|e| e.into_other_kind())?;
        let mut inner_reader = BitReader::new(SliceSource::new(&bytes));
        let inner_scope = Scope::from_node(self.inner.clone());
        self.inner.borrow_mut().read(&mut inner_reader, &inner_scope)
    }

    fn write(&self, io: &mut dyn DynWriter, scope: &Scope) -> SchemaResult<()> {
        let len = self.length.eval(scope)?.as_u64().unwrap_or(0) as usize;
        let mut inner_writer = BitWriter::new(VecSink::new());
        let inner_scope = Scope::from_node(self.inner.clone());
        self.inner.borrow().write(&mut inner_writer, &inner_scope)?;
        inner_writer.flush().map_err(|e| e.into_other_kind())?;
        let mut bytes = inner_writer.into_inner().into_inner();
        if bytes.len() > len {
            return Err(validity_err("Buffer::write", format!("inner value is {} bytes, buffer is {len}", bytes.len())));
        }
        bytes.resize(len, 0);
        io.write_bytes(&bytes).map_err(|e| e.into_other_kind())
    }

    fn num_bytes(&self, scope: &Scope) -> SchemaResult<u64> {
        Ok(self.length.eval(scope)?.as_u64().unwrap_or(0))
    }

    fn snapshot(&self) -> Value {
        self.inner.borrow().snapshot()
    }

    fn clear(&mut self) {
        self.inner.borrow_mut().clear();
    }

    fn is_clear(&self) -> bool {
        self.inner.borrow().is_clear()
    }

    fn assign(&mut self, value: Value) -> SchemaResult<()> {
        self.inner.borrow_mut().assign(value)
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

    fn field(&self, name: &str) -> Option<Value> {
        self.inner.borrow().field(name)
    }

    fn field_node(&self, name: &str) -> Option<NodeRef> {
        self.inner.borrow().field_node(name)
    }

    fn children(&self) -> Vec<NodeRef> {
        vec![self.inner.clone()]
    }
}

/// Reads `inner` at an explicit absolute offset only when [`DelayedIo::read_now`]
/// is called; [`Node::read`] just records the target offset and otherwise
/// leaves the stream position untouched.
pub struct DelayedIo {
    common: NodeCommon,
    offset: Expr,
    inner: NodeRef,
    triggered: bool,
}

impl DelayedIo {
    pub fn new(offset: Expr, inner: NodeRef) -> Self {
        Self {
            common: NodeCommon::default(),
            offset,
            inner,
            triggered: false,
        }
    }

    pub fn read_now(&mut self, io: &mut dyn DynReader, scope: &Scope) -> SchemaResult<()> {
        let target = self.offset.eval(scope)?.as_u64().unwrap_or(0);
        let resume_at = io.offset();
        self.common.set_abs_offset(Some(target));
        io.seek_to_abs_offset(target).map_err(|e| e.into_other_kind())?;
        let inner_scope = Scope::from_node(self.inner.clone());
        let result = self.inner.borrow_mut().read(io, &inner_scope);
        io.seek_to_abs_offset(resume_at).map_err(|e| e.into_other_kind())?;
        self.triggered = true;
        result
    }
}

impl AsAny for DelayedIo {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl Node for DelayedIo {
    fn read(&mut self, _io: &mut dyn DynReader, _scope: &Scope) -> SchemaResult<()> {
        self.triggered = false;
        Ok(())
    }

    fn write(&self, _io: &mut dyn DynWriter, _scope: &Scope) -> SchemaResult<()> {
        Ok(())
    }

    fn num_bytes(&self, _scope: &Scope) -> SchemaResult<u64> {
        Ok(0)
    }

    fn snapshot(&self) -> Value {
        self.inner.borrow().snapshot()
    }

    fn clear(&mut self) {
        self.triggered = false;
        self.inner.borrow_mut().clear();
    }

    fn is_clear(&self) -> bool {
        !self.triggered && self.inner.borrow().is_clear()
    }

    fn assign(&mut self, value: Value) -> SchemaResult<()> {
        self.inner.borrow_mut().assign(value)
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
        vec![self.inner.clone()]
    }
}

/// Reads `length` raw bytes, decodes them through `transform`, then parses
/// `inner` from the decoded bytes — the hook a compression codec would
/// plug into.
pub struct Section {
    common: NodeCommon,
    length: Expr,
    transform: Box<dyn Transform>,
    inner: NodeRef,
}

impl Section {
    pub fn new(length: Expr, inner: NodeRef) -> Self {
        Self::with_transform(length, Box::new(IdentityTransform), inner)
    }

    pub fn with_transform(length: Expr, transform: Box<dyn Transform>, inner: NodeRef) -> Self {
        Self {
            common: NodeCommon::default(),
            length,
            transform,
            inner,
        }
    }
}

impl AsAny for Section {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl Node for Section {
    fn read(&mut self, io: &mut dyn DynReader, scope: &Scope) -> SchemaResult<()> {
        self.common.set_abs_offset(Some(io.offset()));
        let len = self.length.eval(scope)?.as_u64().unwrap_or(0) as usize;
        let raw = io.read_bytes(len).map_err(|e| e.into_other_kind())?;
        let decoded = self.transform.decode(&raw);
        let mut inner_reader = BitReader::new(SliceSource::new(&decoded));
        let inner_scope = Scope::from_node(self.inner.clone());
        self.inner.borrow_mut().read(&mut inner_reader, &inner_scope)
    }

    fn write(&self, io: &mut dyn DynWriter, scope: &Scope) -> SchemaResult<()> {
        let mut inner_writer = BitWriter::new(VecSink::new());
        let inner_scope = Scope::from_node(self.inner.clone());
        self.inner.borrow().write(&mut inner_writer, &inner_scope)?;
        inner_writer.flush().map_err(|e| e.into_other_kind())?;
        let plain = inner_writer.into_inner().into_inner();
        let encoded = self.transform.encode(&plain);
        io.write_bytes(&encoded).map_err(|e| e.into_other_kind())
    }

    fn num_bytes(&self, scope: &Scope) -> SchemaResult<u64> {
        if self.transform.preserves_length() {
            let inner_scope = Scope::from_node(self.inner.clone());
            self.inner.borrow().num_bytes(&inner_scope)
        } else {
            self.length.eval(scope).map(|v| v.as_u64().unwrap_or(0))
        }
    }

    fn snapshot(&self) -> Value {
        self.inner.borrow().snapshot()
    }

    fn clear(&mut self) {
        self.inner.borrow_mut().clear();
    }

    fn is_clear(&self) -> bool {
        self.inner.borrow().is_clear()
    }

    fn assign(&mut self, value: Value) -> SchemaResult<()> {
        self.inner.borrow_mut().assign(value)
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
        vec![self.inner.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{finalize_tree, new_node_ref};
    use crate::primitive::{Integer, Rest};

    #[test]
    fn buffer_bounds_inner_rest_to_the_declared_length() {
        let inner = new_node_ref(Rest::new());
        let root = new_node_ref(Buffer::new(Expr::literal(3u64), inner.clone()));
        finalize_tree(&root);
        let mut r = BitReader::new(SliceSource::new(&[1, 2, 3, 4, 5]));
        let scope = Scope::from_node(root.clone());
        root.borrow_mut().read(&mut r, &scope).unwrap();
        assert_eq!(r.offset(), 3);
        assert_eq!(inner.borrow().snapshot(), Value::Bytes(vec![1, 2, 3]));
    }

    #[test]
    fn delayed_io_does_not_move_the_stream_until_triggered() {
        let inner = new_node_ref(Integer::u8());
        let root = new_node_ref(DelayedIo::new(Expr::literal(4u64), inner.clone()));
        finalize_tree(&root);
        let mut r = BitReader::new(SliceSource::new(&[0xAA, 0xBB, 0xCC, 0xDD, 0xEE]));
        let scope = Scope::from_node(root.clone());
        root.borrow_mut().read(&mut r, &scope).unwrap();
        assert_eq!(r.offset(), 0);

        if let Some(delayed) = root.borrow_mut().as_any_mut().downcast_mut::<DelayedIo>() {
            delayed.read_now(&mut r, &scope).unwrap();
        } else {
            panic!("expected DelayedIo");
        }
        assert_eq!(r.offset(), 0);
        assert_eq!(inner.borrow().snapshot(), Value::UInt(0xEE));
    }

    #[test]
    fn section_round_trips_through_identity_transform() {
        let inner = new_node_ref(Integer::u16(bindata_core::Endian::Big));
        let root = new_node_ref(Section::new(Expr::literal(2u64), inner.clone()));
        finalize_tree(&root);
        let mut r = BitReader::new(SliceSource::new(&[0x01, 0x02]));
        let scope = Scope::from_node(root.clone());
        root.borrow_mut().read(&mut r, &scope).unwrap();
        assert_eq!(inner.borrow().snapshot(), Value::UInt(0x0102));
    }
}
