use bindata_core::{AsAny, DynReader, DynWriter};

use crate::error::SchemaResult;
use crate::evaluator::Scope;
use crate::node::{Node, NodeCommon};
use crate::value::{NodeRef, Value, WeakNodeRef};

/// Consumes every byte left in the stream.
pub struct Rest {
    common: NodeCommon,
    current: Option<Vec<u8>>,
}

impl Rest {
    pub fn new() -> Self {
        Self {
            common: NodeCommon::default(),
            current: None,
        }
    }

    pub fn get(&self) -> Option<&[u8]> {
        self.current.as_deref()
    }
}

impl Default for Rest {
    fn default() -> Self {
        Self::new()
    }
}

impl AsAny for Rest {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl Node for Rest {
    fn read(&mut self, io: &mut dyn DynReader, _scope: &Scope) -> SchemaResult<()> {
        self.common.set_abs_offset(Some(io.offset()));
        let remaining = io.num_bytes_remaining().map_err(|e| e.into_other_kind())?;
        self.current = Some(io.read_bytes(remaining as usize).map_err(|e| e.into_other_kind())?);
        Ok(())
    }

    fn write(&self, io: &mut dyn DynWriter, _scope: &Scope) -> SchemaResult<()> {
        io.write_bytes(self.current.as_deref().unwrap_or(&[])).map_err(|e| e.into_other_kind())
    }

    fn num_bytes(&self, _scope: &Scope) -> SchemaResult<u64> {
        Ok(self.current.as_ref().map(|v| v.len()).unwrap_or(0) as u64)
    }

    fn snapshot(&self) -> Value {
        self.current.clone().map(Value::Bytes).unwrap_or(Value::Unset)
    }

    fn clear(&mut self) {
        self.current = None;
    }

    fn is_clear(&self) -> bool {
        self.current.is_none()
    }

    fn assign(&mut self, value: Value) -> SchemaResult<()> {
        self.current = value.as_bytes().map(|b| b.to_vec());
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
    fn consumes_everything_left() {
        let mut rest = Rest::new();
        let node = new_node_ref(Rest::new());
        let scope = Scope::from_node(node);
        let mut r = BitReader::new(SliceSource::new(b"tail bytes"));
        r.read_bytes(5).unwrap();
        rest.read(&mut r, &scope).unwrap();
        assert_eq!(rest.get(), Some(&b"bytes"[..]));
    }
}
