use bindata_core::{AsAny, DynReader, DynWriter, Endian};

use crate::error::{validity_err, SchemaResult};
use crate::evaluator::{Expr, Scope};
use crate::node::{Node, NodeCommon};
use crate::value::{NodeRef, Value, WeakNodeRef};

use super::clamp_to_range;

fn bytes_to_u128(bytes: &[u8], endian: Endian) -> u128 {
    let mut v: u128 = 0;
    match endian {
        Endian::Big => {
            for b in bytes {
                v = (v << 8) | u128::from(*b);
            }
        }
        Endian::Little => {
            for (i, b) in bytes.iter().enumerate() {
                v |= u128::from(*b) << (8 * i);
            }
        }
    }
    v
}

fn u128_to_bytes(v: u128, len: usize, endian: Endian) -> Vec<u8> {
    let mut out = vec![0u8; len];
    match endian {
        Endian::Big => {
            for i in 0..len {
                out[len - 1 - i] = ((v >> (8 * i)) & 0xFF) as u8;
            }
        }
        Endian::Little => {
            for (i, slot) in out.iter_mut().enumerate() {
                *slot = ((v >> (8 * i)) & 0xFF) as u8;
            }
        }
    }
    out
}

fn sign_extend(raw: u128, bits: u32) -> i128 {
    if bits >= 128 {
        return raw as i128;
    }
    let sign_bit = 1u128 << (bits - 1);
    if raw & sign_bit != 0 {
        (raw as i128) - (1i128 << bits)
    } else {
        raw as i128
    }
}

/// A fixed-width integer field, byte- or bit-aligned. Both share one
/// implementation: the only difference is how the raw bits are pulled off
/// the stream.
pub struct Integer {
    common: NodeCommon,
    bits: u32,
    byte_aligned: bool,
    signed: bool,
    endian: Endian,
    initial_value: Option<Expr>,
    value_expr: Option<Expr>,
    check_value: Option<Expr>,
    current: Option<i128>,
    reading: bool,
}

impl Integer {
    pub fn new(bits: u32, byte_aligned: bool, signed: bool, endian: Endian) -> Self {
        assert!(bits >= 1 && bits <= 128, "integer width out of range: {bits}");
        if byte_aligned {
            assert!(bits % 8 == 0, "byte-aligned integer width must be a multiple of 8");
        } else {
            assert!(bits <= 64, "bit-aligned integer width must be <= 64");
        }
        Self {
            common: NodeCommon::default(),
            bits,
            byte_aligned,
            signed,
            endian,
            initial_value: None,
            value_expr: None,
            check_value: None,
            current: None,
            reading: false,
        }
    }

    pub fn u8() -> Self {
        Self::new(8, true, false, Endian::Big)
    }

    pub fn u16(endian: Endian) -> Self {
        Self::new(16, true, false, endian)
    }

    pub fn u32(endian: Endian) -> Self {
        Self::new(32, true, false, endian)
    }

    pub fn u64(endian: Endian) -> Self {
        Self::new(64, true, false, endian)
    }

    pub fn bit(bits: u32, endian: Endian) -> Self {
        Self::new(bits, false, false, endian)
    }

    pub fn with_initial_value(mut self, expr: Expr) -> Self {
        self.initial_value = Some(expr);
        self
    }

    pub fn with_value(mut self, expr: Expr) -> Self {
        self.value_expr = Some(expr);
        self
    }

    pub fn with_check_value(mut self, expr: Expr) -> Self {
        self.check_value = Some(expr);
        self
    }

    fn byte_len(&self) -> usize {
        (self.bits / 8) as usize
    }

    pub fn get(&self) -> Option<i128> {
        self.current
    }

    fn clamp(&self, value: i128) -> i128 {
        clamp_to_range(value, self.bits, self.signed)
    }

    fn value_for_write(&self, scope: &Scope) -> SchemaResult<i128> {
        if let Some(expr) = &self.value_expr {
            let v = expr.eval(scope)?;
            Ok(self.clamp(v.as_i128().unwrap_or(0)))
        } else if let Some(current) = self.current {
            Ok(current)
        } else if let Some(expr) = &self.initial_value {
            let v = expr.eval(scope)?;
            Ok(self.clamp(v.as_i128().unwrap_or(0)))
        } else {
            Ok(0)
        }
    }
}

impl AsAny for Integer {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl Node for Integer {
    fn read(&mut self, io: &mut dyn DynReader, scope: &Scope) -> SchemaResult<()> {
        self.common.set_abs_offset(Some(io.offset()));
        self.reading = true;
        let raw_unsigned: u128 = if self.byte_aligned {
            let bytes = io.read_bytes(self.byte_len()).map_err(|e| e.into_other_kind())?;
            bytes_to_u128(&bytes, self.endian)
        } else {
            u128::from(io.read_bits(self.bits, self.endian).map_err(|e| e.into_other_kind())?)
        };
        let value = if self.signed { sign_extend(raw_unsigned, self.bits) } else { raw_unsigned as i128 };
        self.current = Some(value);

        if let Some(check) = &self.check_value {
            let expected = check.eval(scope)?;
            if expected.as_i128() != Some(value) {
                return Err(validity_err(
                    "Integer::read",
                    format!("expected {expected:?}, got {value}"),
                ));
            }
        }
        Ok(())
    }

    fn write(&self, io: &mut dyn DynWriter, scope: &Scope) -> SchemaResult<()> {
        let value = self.value_for_write(scope)?;
        let unsigned = (value as u128) & super::clamp_mask(self.bits);
        if self.byte_aligned {
            let bytes = u128_to_bytes(unsigned, self.byte_len(), self.endian);
            io.write_bytes(&bytes).map_err(|e| e.into_other_kind())
        } else {
            io.write_bits(unsigned as u64, self.bits, self.endian).map_err(|e| e.into_other_kind())
        }
    }

    fn num_bytes(&self, _scope: &Scope) -> SchemaResult<u64> {
        Ok(u64::from(self.bits).div_ceil(8))
    }

    fn snapshot(&self) -> Value {
        match self.current {
            Some(v) if self.signed => Value::Int(v),
            Some(v) => Value::UInt(v as u128),
            None => Value::Unset,
        }
    }

    fn clear(&mut self) {
        self.current = None;
        self.reading = false;
    }

    fn is_clear(&self) -> bool {
        self.current.is_none()
    }

    fn assign(&mut self, value: Value) -> SchemaResult<()> {
        let raw = value.as_i128().unwrap_or(0);
        self.current = Some(self.clamp(raw));
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

    fn set_reading(&mut self, reading: bool) {
        self.reading = reading;
    }

    fn evaluated_value(&self, scope: &Scope) -> SchemaResult<Value> {
        if self.reading {
            return Ok(match self.current {
                Some(v) if self.signed => Value::Int(v),
                Some(v) => Value::UInt(v as u128),
                None => Value::Unset,
            });
        }
        if let Some(expr) = &self.value_expr {
            let node_id = self as *const Self as usize;
            return crate::evaluator::guard_value_eval(node_id, "Integer::evaluated_value", || expr.eval(scope));
        }
        Ok(self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::new_node_ref;
    use bindata_core::{BitReader, BitWriter, SliceSource, VecSink};

    #[test]
    fn reads_big_endian_u16() {
        let mut int = Integer::u16(Endian::Big);
        let node = new_node_ref(Integer::u16(Endian::Big));
        let scope = Scope::from_node(node);
        let mut r = BitReader::new(SliceSource::new(&[0x01, 0x02]));
        int.read(&mut r, &scope).unwrap();
        assert_eq!(int.get(), Some(0x0102));
    }

    #[test]
    fn clamps_out_of_range_assignment_instead_of_wrapping() {
        let mut int = Integer::u8();
        let node = new_node_ref(Integer::u8());
        let scope = Scope::from_node(node);
        int.assign(Value::UInt(999)).unwrap();
        let mut w = BitWriter::new(VecSink::new());
        int.write(&mut w, &scope).unwrap();
        w.flush().unwrap();
        assert_eq!(w.into_inner().into_inner(), vec![0xFF]);
    }

    #[test]
    fn signed_byte_round_trips_negative_value() {
        let mut int = Integer::new(8, true, true, Endian::Big);
        int.assign(Value::Int(-5)).unwrap();
        let node = new_node_ref(Integer::new(8, true, true, Endian::Big));
        let scope = Scope::from_node(node);
        let mut w = BitWriter::new(VecSink::new());
        int.write(&mut w, &scope).unwrap();
        w.flush().unwrap();
        let bytes = w.into_inner().into_inner();

        let mut readback = Integer::new(8, true, true, Endian::Big);
        let mut r = BitReader::new(SliceSource::new(&bytes));
        readback.read(&mut r, &scope).unwrap();
        assert_eq!(readback.get(), Some(-5));
    }
}
