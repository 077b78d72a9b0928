use bindata_core::{AsAny, DynReader, DynWriter, Endian};

use crate::error::SchemaResult;
use crate::evaluator::{Expr, Scope};
use crate::node::{Node, NodeCommon};
use crate::value::{NodeRef, Value, WeakNodeRef};

/// A 32- or 64-bit IEEE-754 float field.
pub struct FloatNode {
    common: NodeCommon,
    double_precision: bool,
    endian: Endian,
    value_expr: Option<Expr>,
    current: Option<f64>,
}

impl FloatNode {
    pub fn f32(endian: Endian) -> Self {
        Self {
            common: NodeCommon::default(),
            double_precision: false,
            endian,
            value_expr: None,
            current: None,
        }
    }

    pub fn f64(endian: Endian) -> Self {
        Self {
            common: NodeCommon::default(),
            double_precision: true,
            endian,
            value_expr: None,
            current: None,
        }
    }

    pub fn with_value(mut self, expr: Expr) -> Self {
        self.value_expr = Some(expr);
        self
    }

    pub fn get(&self) -> Option<f64> {
        self.current
    }

    fn current_or_default(&self, scope: &Scope) -> SchemaResult<f64> {
        if let Some(expr) = &self.value_expr {
            let evaluated = expr.eval(scope)?;
            return Ok(match evaluated {
                Value::Float(f) => f,
                other => other.as_i128().map(|v| v as f64).unwrap_or(0.0),
            });
        }
        Ok(self.current.unwrap_or(0.0))
    }
}

impl AsAny for FloatNode {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl Node for FloatNode {
    fn read(&mut self, io: &mut dyn DynReader, _scope: &Scope) -> SchemaResult<()> {
        self.common.set_abs_offset(Some(io.offset()));
        let len = if self.double_precision { 8 } else { 4 };
        let bytes = io.read_bytes(len).map_err(|e| e.into_other_kind())?;
        let value = if self.double_precision {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes);
            match self.endian {
                Endian::Big => f64::from_be_bytes(buf),
                Endian::Little => f64::from_le_bytes(buf),
            }
        } else {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(&bytes);
            match self.endian {
                Endian::Big => f32::from_be_bytes(buf) as f64,
                Endian::Little => f32::from_le_bytes(buf) as f64,
            }
        };
        self.current = Some(value);
        Ok(())
    }

    fn write(&self, io: &mut dyn DynWriter, scope: &Scope) -> SchemaResult<()> {
        let value = self.current_or_default(scope)?;
        let bytes: Vec<u8> = if self.double_precision {
            match self.endian {
                Endian::Big => value.to_be_bytes().to_vec(),
                Endian::Little => value.to_le_bytes().to_vec(),
            }
        } else {
            let v = value as f32;
            match self.endian {
                Endian::Big => v.to_be_bytes().to_vec(),
                Endian::Little => v.to_le_bytes().to_vec(),
            }
        };
        io.write_bytes(&bytes).map_err(|e| e.into_other_kind())
    }

    fn num_bytes(&self, _scope: &Scope) -> SchemaResult<u64> {
        Ok(if self.double_precision { 8 } else { 4 })
    }

    fn snapshot(&self) -> Value {
        self.current.map(Value::Float).unwrap_or(Value::Unset)
    }

    fn clear(&mut self) {
        self.current = None;
    }

    fn is_clear(&self) -> bool {
        self.current.is_none()
    }

    fn assign(&mut self, value: Value) -> SchemaResult<()> {
        self.current = match value {
            Value::Float(f) => Some(f),
            other => other.as_i128().map(|v| v as f64),
        };
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
    fn round_trips_f32_big_endian() {
        let mut f = FloatNode::f32(Endian::Big);
        let node = new_node_ref(FloatNode::f32(Endian::Big));
        let scope = Scope::from_node(node);
        f.assign(Value::Float(1.5)).unwrap();
        let mut w = BitWriter::new(VecSink::new());
        f.write(&mut w, &scope).unwrap();
        w.flush().unwrap();
        let bytes = w.into_inner().into_inner();

        let mut readback = FloatNode::f32(Endian::Big);
        let mut r = BitReader::new(SliceSource::new(&bytes));
        readback.read(&mut r, &scope).unwrap();
        assert_eq!(readback.get(), Some(1.5));
    }
}
