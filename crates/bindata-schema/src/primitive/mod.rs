//! Leaf node kinds that consume bytes or bits directly from the stream.

mod count_remaining;
mod float;
mod integer;
mod rest;
mod skip;
mod string;

pub use count_remaining::CountBytesRemaining;
pub use float::FloatNode;
pub use integer::Integer;
pub use rest::Rest;
pub use skip::{Skip, SkipMode};
pub use string::{FixedString, ZString};

/// Low `bits` bits set, used to truncate a two's-complement bit pattern to
/// its wire width after clamping.
pub(crate) fn clamp_mask(bits: u32) -> u128 {
    if bits >= 128 {
        u128::MAX
    } else {
        (1u128 << bits) - 1
    }
}

/// Clamps `value` into the representable range of a `bits`-wide integer
/// instead of wrapping. Bit-aligned fields get the same clamp-not-wrap
/// behavior as byte-aligned ones.
pub(crate) fn clamp_to_range(value: i128, bits: u32, signed: bool) -> i128 {
    if signed {
        let max = (1i128 << (bits - 1)) - 1;
        let min = -(1i128 << (bits - 1));
        num_traits::clamp(value, min, max)
    } else {
        let max = if bits >= 127 { i128::MAX } else { (1i128 << bits) - 1 };
        num_traits::clamp(value, 0, max)
    }
}
