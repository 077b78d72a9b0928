use std::sync::Arc;

use bindata_core::{AsAny, DynReader, DynWriter};

use crate::error::{arg_err, SchemaResult};
use crate::evaluator::{Expr, Scope};
use crate::node::{Node, NodeCommon};
use crate::value::{NodeRef, Value, WeakNodeRef};

/// How a [`Skip`] field decides how far to move.
#[derive(Clone)]
pub enum SkipMode {
    /// Skip exactly `length` bytes forward.
    Length(Expr),
    /// Seek to this absolute offset from the start of the stream.
    ToAbsOffset(Expr),
    /// Advance one byte at a time until a probe type can read successfully
    /// starting there, then rewind to that offset without consuming it.
    UntilValid { probe: Arc<dyn Fn() -> NodeRef + Send + Sync> },
}

/// Moves the stream position without producing a value of its own.
pub struct Skip {
    common: NodeCommon,
    mode: SkipMode,
    landed_at: Option<u64>,
}

impl Skip {
    pub fn new(mode: SkipMode) -> Self {
        Self {
            common: NodeCommon::default(),
            mode,
            landed_at: None,
        }
    }
}

impl AsAny for Skip {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl Node for Skip {
    fn read(&mut self, io: &mut dyn DynReader, scope: &Scope) -> SchemaResult<()> {
        self.common.set_abs_offset(Some(io.offset()));
        match &self.mode {
            SkipMode::Length(expr) => {
                let n = expr.eval(scope)?.as_u64().unwrap_or(0);
                io.skip(n as i64).map_err(|e| e.into_other_kind())?;
            }
            SkipMode::ToAbsOffset(expr) => {
                let offset = expr.eval(scope)?.as_u64().unwrap_or(0);
                io.seek_to_abs_offset(offset).map_err(|e| e.into_other_kind())?;
            }
            SkipMode::UntilValid { probe } => {
                let start = io.offset();
                let remaining = io.num_bytes_remaining().map_err(|e| e.into_other_kind())?;
                let mut found = false;
                for delta in 0..=remaining {
                    io.seek_to_abs_offset(start + delta).map_err(|e| e.into_other_kind())?;
                    let candidate = probe();
                    let ok = candidate.borrow_mut().read(io, scope).is_ok();
                    io.seek_to_abs_offset(start + delta).map_err(|e| e.into_other_kind())?;
                    if ok {
                        found = true;
                        break;
                    }
                }
                if !found {
                    return Err(arg_err("Skip::read", "no offset produced a valid probe read"));
                }
            }
        }
        self.landed_at = Some(io.offset());
        Ok(())
    }

    fn write(&self, _io: &mut dyn DynWriter, _scope: &Scope) -> SchemaResult<()> {
        Ok(())
    }

    fn num_bytes(&self, _scope: &Scope) -> SchemaResult<u64> {
        Ok(0)
    }

    fn snapshot(&self) -> Value {
        self.landed_at.map(Value::from).unwrap_or(Value::Unset)
    }

    fn clear(&mut self) {
        self.landed_at = None;
    }

    fn is_clear(&self) -> bool {
        self.landed_at.is_none()
    }

    fn assign(&mut self, _value: Value) -> SchemaResult<()> {
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
    use crate::primitive::Integer;
    use bindata_core::{BitReader, SliceSource};

    #[test]
    fn skips_fixed_length() {
        let mut skip = Skip::new(SkipMode::Length(Expr::literal(3u64)));
        let node = new_node_ref(Skip::new(SkipMode::Length(Expr::literal(3u64))));
        let scope = Scope::from_node(node);
        let mut r = BitReader::new(SliceSource::new(b"abcdef"));
        skip.read(&mut r, &scope).unwrap();
        assert_eq!(r.offset(), 3);
    }

    #[test]
    fn until_valid_lands_on_first_byte_that_parses() {
        // A u8 probe always "parses" as long as one byte remains, so this
        // degenerates to landing on the starting offset — exercised mainly
        // to pin down the seek/rewind bookkeeping.
        let mode = SkipMode::UntilValid {
            probe: Arc::new(|| new_node_ref(Integer::u8())),
        };
        let mut skip = Skip::new(mode.clone());
        let node = new_node_ref(Skip::new(mode));
        let scope = Scope::from_node(node);
        let mut r = BitReader::new(SliceSource::new(b"xyz"));
        skip.read(&mut r, &scope).unwrap();
        assert_eq!(r.offset(), 0);
    }
}
