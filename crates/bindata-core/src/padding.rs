//! Zero-padding helpers used by `Buffer`, `Skip` and fixed-length strings.
//!
//! Kept intentionally thin: padding math, not a hard engineering problem.

use crate::bitio::{BitReader, BitWriter};
use crate::cursor::{ByteSink, ByteSource};
use crate::error::IoResult;

/// Writes `n` zero bytes, using as few `write_bytes` calls as possible.
pub fn write_zero_padding<S: ByteSink>(w: &mut BitWriter<S>, mut n: usize) -> IoResult<()> {
    const CHUNK: [u8; 64] = [0u8; 64];
    while n > 0 {
        let take = n.min(CHUNK.len());
        w.write_bytes(&CHUNK[..take])?;
        n -= take;
    }
    Ok(())
}

/// Advances the reader past `n` padding bytes, discarding them.
pub fn skip_padding<S: ByteSource>(r: &mut BitReader<S>, n: usize) -> IoResult<()> {
    r.read_bytes(n)?;
    Ok(())
}
