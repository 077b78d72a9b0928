use bindata_core::{AsAny, DynReader, DynWriter};

use crate::error::SchemaResult;
use crate::evaluator::Scope;
use crate::node::{Node, NodeCommon};
use crate::value::{NodeRef, Value, WeakNodeRef};

/// Records how many bytes are left in the stream without consuming any of
/// them — typically read just before a trailing `Rest` or `Array` whose
/// length depends on it.
pub struct CountBytesRemaining {
    common: NodeCommon,
    current: Option<u64>,
}

impl CountBytesRemaining {
    pub fn new() -> Self {
        Self {
            common: NodeCommon::default(),
            current: None,
        }
    }

    pub fn get(&self) -> Option<u64> {
        self.current
    }
}

impl Default for CountBytesRemaining {
    fn default() -> Self {
        Self::new()
    }
}

impl AsAny for CountBytesRemaining {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl Node for CountBytesRemaining {
    fn read(&mut self, io: &mut dyn DynReader, _scope: &Scope) -> SchemaResult<()> {
        self.common.set_abs_offset(Some(io.offset()));
        self.current = Some(io.num_bytes_remaining().map_err(|e| e.into_other_kind())?);
        Ok(())
    }

    fn write(&self, _io: &mut dyn DynWriter, _scope: &Scope) -> SchemaResult<()> {
        Ok(())
    }

    fn num_bytes(&self, _scope: &Scope) -> SchemaResult<u64> {
        Ok(0)
    }

    fn snapshot(&self) -> Value {
        self.current.map(Value::from).unwrap_or(Value::Unset)
    }

    fn clear(&mut self) {
        self.current = None;
    }

    fn is_clear(&self) -> bool {
        self.current.is_none()
    }

    fn assign(&mut self, value: Value) -> SchemaResult<()> {
        self.current = value.as_u64();
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::new_node_ref;
    use bindata_core::{BitReader, SliceSource};

    #[test]
    fn counts_without_consuming() {
        let mut c = CountBytesRemaining::new();
        let node = new_node_ref(CountBytesRemaining::new());
        let scope = Scope::from_node(node);
        let mut r = BitReader::new(SliceSource::new(b"12345"));
        r.read_bytes(2).unwrap();
        c.read(&mut r, &scope).unwrap();
        assert_eq!(c.get(), Some(3));
        assert_eq!(r.offset(), 2);
    }
}
