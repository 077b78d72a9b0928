use bindata_core::{AsAny, DynReader, DynWriter};

use crate::error::{validity_err, SchemaResult};
use crate::evaluator::{Expr, Scope};
use crate::node::{Node, NodeCommon};
use crate::value::{NodeRef, Value, WeakNodeRef};

/// A fixed-length byte string, right-padded with `pad_byte` on write and
/// right-trimmed of trailing `pad_byte`s on read.
pub struct FixedString {
    common: NodeCommon,
    length: Expr,
    pad_byte: u8,
    current: Option<Vec<u8>>,
}

impl FixedString {
    pub fn new(length: Expr, pad_byte: u8) -> Self {
        Self {
            common: NodeCommon::default(),
            length,
            pad_byte,
            current: None,
        }
    }

    pub fn get(&self) -> Option<&[u8]> {
        self.current.as_deref()
    }

    fn declared_length(&self, scope: &Scope) -> SchemaResult<usize> {
        let v = self.length.eval(scope)?;
        Ok(v.as_u64().unwrap_or(0) as usize)
    }
}

impl AsAny for FixedString {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl Node for FixedString {
    fn read(&mut self, io: &mut dyn DynReader, scope: &Scope) -> SchemaResult<()> {
        self.common.set_abs_offset(Some(io.offset()));
        let len = self.declared_length(scope)?;
        let raw = io.read_bytes(len).map_err(|e| e.into_other_kind())?;
        let trimmed_len = raw.iter().rposition(|&b| b != self.pad_byte).map(|i| i + 1).unwrap_or(0);
        self.current = Some(raw[..trimmed_len].to_vec());
        Ok(())
    }

    fn write(&self, io: &mut dyn DynWriter, scope: &Scope) -> SchemaResult<()> {
        let len = self.declared_length(scope)?;
        let mut buf = self.current.clone().unwrap_or_default();
        if buf.len() > len {
            return Err(validity_err("FixedString::write", format!("value is {} bytes, field is {len}", buf.len())));
        }
        buf.resize(len, self.pad_byte);
        io.write_bytes(&buf).map_err(|e| e.into_other_kind())
    }

    fn num_bytes(&self, scope: &Scope) -> SchemaResult<u64> {
        Ok(self.declared_length(scope)? as u64)
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
        self.current = Some(match value {
            Value::Bytes(b) => b,
            Value::Str(s) => s.into_bytes(),
            _ => return Err(validity_err("FixedString::assign", "expected bytes or string")),
        });
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

/// A NUL-terminated string, optionally bounded by `max_length`. On write,
/// a terminating zero byte is always appended.
pub struct ZString {
    common: NodeCommon,
    max_length: Option<Expr>,
    current: Option<Vec<u8>>,
}

impl ZString {
    pub fn new() -> Self {
        Self {
            common: NodeCommon::default(),
            max_length: None,
            current: None,
        }
    }

    pub fn with_max_length(mut self, expr: Expr) -> Self {
        self.max_length = Some(expr);
        self
    }

    pub fn get(&self) -> Option<&[u8]> {
        self.current.as_deref()
    }
}

impl Default for ZString {
    fn default() -> Self {
        Self::new()
    }
}

impl AsAny for ZString {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl Node for ZString {
    fn read(&mut self, io: &mut dyn DynReader, scope: &Scope) -> SchemaResult<()> {
        self.common.set_abs_offset(Some(io.offset()));
        let cap = match &self.max_length {
            Some(expr) => Some(expr.eval(scope)?.as_u64().unwrap_or(u64::MAX) as usize),
            None => None,
        };
        let mut out = Vec::new();
        loop {
            if let Some(cap) = cap {
                if out.len() >= cap {
                    break;
                }
            }
            let byte = io.read_bytes(1).map_err(|e| e.into_other_kind())?;
            if byte[0] == 0 {
                break;
            }
            out.push(byte[0]);
        }
        self.current = Some(out);
        Ok(())
    }

    fn write(&self, io: &mut dyn DynWriter, _scope: &Scope) -> SchemaResult<()> {
        let mut buf = self.current.clone().unwrap_or_default();
        buf.push(0);
        io.write_bytes(&buf).map_err(|e| e.into_other_kind())
    }

    fn num_bytes(&self, _scope: &Scope) -> SchemaResult<u64> {
        Ok(self.current.as_ref().map(|v| v.len()).unwrap_or(0) as u64 + 1)
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
        self.current = Some(match value {
            Value::Bytes(b) => b,
            Value::Str(s) => s.into_bytes(),
            _ => return Err(validity_err("ZString::assign", "expected bytes or string")),
        });
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
    use bindata_core::{BitReader, BitWriter, SliceSource, VecSink};

    #[test]
    fn fixed_string_trims_trailing_pad_on_read() {
        let mut s = FixedString::new(Expr::literal(8u64), 0);
        let node = new_node_ref(FixedString::new(Expr::literal(8u64), 0));
        let scope = Scope::from_node(node);
        let mut r = BitReader::new(SliceSource::new(b"hello\0\0\0"));
        s.read(&mut r, &scope).unwrap();
        assert_eq!(s.get(), Some(&b"hello"[..]));
    }

    #[test]
    fn fixed_string_pads_on_write() {
        let mut s = FixedString::new(Expr::literal(8u64), 0);
        let node = new_node_ref(FixedString::new(Expr::literal(8u64), 0));
        let scope = Scope::from_node(node);
        s.assign(Value::from("hi")).unwrap();
        let mut w = BitWriter::new(VecSink::new());
        s.write(&mut w, &scope).unwrap();
        w.flush().unwrap();
        assert_eq!(w.into_inner().into_inner(), b"hi\0\0\0\0\0\0".to_vec());
    }

    #[test]
    fn zstring_reads_up_to_terminator() {
        let mut s = ZString::new();
        let node = new_node_ref(ZString::new());
        let scope = Scope::from_node(node);
        let mut r = BitReader::new(SliceSource::new(b"pascal\0trailing"));
        s.read(&mut r, &scope).unwrap();
        assert_eq!(s.get(), Some(&b"pascal"[..]));
        assert_eq!(r.offset(), 7);
    }
}
