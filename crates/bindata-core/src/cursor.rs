//! Byte-level stream primitives underlying [`crate::bitio`].
//!
//! Splits seekable from non-seekable backends: a [`ByteSource`] reports
//! whether it supports [`ByteSource::seek_to`] and [`ByteSource::len`];
//! callers that need `num_bytes_remaining` or backward seeks must go
//! through a seekable backend.

use crate::error::{end_of_stream, seek_error, IoResult};

/// A source of bytes a [`crate::bitio::BitReader`] pulls from.
pub trait ByteSource {
    /// Reads exactly `buf.len()` bytes, or fails with `EndOfStream`.
    fn read_exact(&mut self, buf: &mut [u8]) -> IoResult<()>;

    /// Bytes consumed so far from the start of the stream.
    fn position(&self) -> u64;

    /// `true` if [`Self::seek_to`] and [`Self::len`] are supported.
    fn is_seekable(&self) -> bool;

    /// Absolute seek. Implementations that are not seekable must still
    /// support forward seeks relative to the current position by
    /// discarding bytes (this is what `skip` with a non-negative amount
    /// reduces to); only a backward `seek_to` is disallowed there.
    fn seek_to(&mut self, pos: u64) -> IoResult<()>;

    /// Total stream length, when known (seekable backends only).
    fn len(&self) -> Option<u64>;
}

/// A [`ByteSource`] backed by an in-memory byte slice. Always seekable.
#[derive(Clone, Debug)]
pub struct SliceSource<'a> {
    inner: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { inner: bytes, pos: 0 }
    }

    pub fn remaining_slice(&self) -> &'a [u8] {
        &self.inner[self.pos.min(self.inner.len())..]
    }
}

impl ByteSource for SliceSource<'_> {
    fn read_exact(&mut self, buf: &mut [u8]) -> IoResult<()> {
        let expected = buf.len();
        let received = self.inner.len().saturating_sub(self.pos);
        if received < expected {
            return Err(end_of_stream("ByteSource::read_exact", received, expected));
        }
        buf.copy_from_slice(&self.inner[self.pos..self.pos + expected]);
        self.pos += expected;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.pos as u64
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn seek_to(&mut self, pos: u64) -> IoResult<()> {
        let pos = usize::try_from(pos).map_err(|_| seek_error("ByteSource::seek_to", "offset overflows usize"))?;
        if pos > self.inner.len() {
            return Err(seek_error("ByteSource::seek_to", "seek past end of stream"));
        }
        self.pos = pos;
        Ok(())
    }

    fn len(&self) -> Option<u64> {
        Some(self.inner.len() as u64)
    }
}

/// A [`ByteSource`] backed by any `std::io::Read`. Seekable only when `R`
/// also implements `std::io::Seek`; use [`IoSource::seekable`] for that case.
pub struct IoSource<R> {
    inner: R,
    pos: u64,
    seekable: bool,
}

impl<R: std::io::Read> IoSource<R> {
    /// Wraps a non-seekable reader. Forward-only; `seek_to` always fails.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pos: 0,
            seekable: false,
        }
    }
}

impl<R: std::io::Read + std::io::Seek> IoSource<R> {
    /// Wraps a reader that also supports seeking.
    pub fn seekable(inner: R) -> Self {
        Self {
            inner,
            pos: 0,
            seekable: true,
        }
    }

    fn stream_len(&mut self) -> IoResult<u64> {
        let current = self
            .inner
            .stream_position()
            .map_err(|_| seek_error("IoSource::len", "failed to query stream position"))?;
        let end = self
            .inner
            .seek(std::io::SeekFrom::End(0))
            .map_err(|_| seek_error("IoSource::len", "failed to seek to end"))?;
        self.inner
            .seek(std::io::SeekFrom::Start(current))
            .map_err(|_| seek_error("IoSource::len", "failed to restore position"))?;
        Ok(end)
    }
}

impl<R: std::io::Read> ByteSource for IoSource<R> {
    fn read_exact(&mut self, buf: &mut [u8]) -> IoResult<()> {
        let mut received = 0;
        while received < buf.len() {
            match self.inner.read(&mut buf[received..]) {
                Ok(0) => break,
                Ok(n) => received += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        if received < buf.len() {
            return Err(end_of_stream("ByteSource::read_exact", received, buf.len()));
        }
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn is_seekable(&self) -> bool {
        self.seekable
    }

    fn seek_to(&mut self, pos: u64) -> IoResult<()> {
        // The `ByteSource` trait is object-safe and carries no `Seek` bound,
        // so a trait-object caller only ever gets the forward-skip behavior
        // here, even for a backend built via `seekable()`. Callers that
        // statically know `R: Seek` should prefer `seek_to_checked` below.
        if pos < self.pos {
            return Err(seek_error("ByteSource::seek_to", "backward seek on unseekable stream"));
        }
        let mut remaining = pos - self.pos;
        let mut scratch = [0u8; 4096];
        while remaining > 0 {
            let n = remaining.min(scratch.len() as u64) as usize;
            self.read_exact(&mut scratch[..n])?;
            remaining -= n as u64;
        }
        Ok(())
    }

    fn len(&self) -> Option<u64> {
        None
    }
}

impl<R: std::io::Read + std::io::Seek> IoSource<R> {
    /// True backward-capable seek, available only when `R: Seek` is known
    /// statically (the blanket `ByteSource` impl above can only skip forward).
    pub fn seek_to_checked(&mut self, pos: u64) -> IoResult<()> {
        self.inner
            .seek(std::io::SeekFrom::Start(pos))
            .map_err(|_| seek_error("IoSource::seek_to_checked", "underlying seek failed"))?;
        self.pos = pos;
        Ok(())
    }

    /// `num_bytes_remaining` for a statically-known-seekable backend.
    pub fn bytes_remaining(&mut self) -> IoResult<u64> {
        let len = self.stream_len()?;
        Ok(len.saturating_sub(self.pos))
    }
}

/// A sink of bytes a [`crate::bitio::BitWriter`] pushes into.
pub trait ByteSink {
    fn write_all(&mut self, buf: &[u8]) -> IoResult<()>;
    fn position(&self) -> u64;
}

/// A growable in-memory [`ByteSink`].
#[derive(Default, Debug, Clone)]
pub struct VecSink {
    inner: Vec<u8>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.inner
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.inner
    }
}

impl ByteSink for VecSink {
    fn write_all(&mut self, buf: &[u8]) -> IoResult<()> {
        self.inner.extend_from_slice(buf);
        Ok(())
    }

    fn position(&self) -> u64 {
        self.inner.len() as u64
    }
}

/// A [`ByteSink`] backed by any `std::io::Write`.
pub struct IoSink<W> {
    inner: W,
    pos: u64,
}

impl<W: std::io::Write> IoSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, pos: 0 }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: std::io::Write> ByteSink for IoSink<W> {
    fn write_all(&mut self, buf: &[u8]) -> IoResult<()> {
        self.inner
            .write_all(buf)
            .map_err(|_| end_of_stream("ByteSink::write_all", 0, buf.len()))?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_source_reads_and_fails_on_short_read() {
        let mut src = SliceSource::new(&[1, 2, 3]);
        let mut buf = [0u8; 2];
        src.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [1, 2]);
        assert_eq!(src.position(), 2);

        let mut buf3 = [0u8; 3];
        assert!(src.read_exact(&mut buf3).is_err());
    }

    #[test]
    fn slice_source_seeks_both_directions() {
        let mut src = SliceSource::new(&[1, 2, 3, 4]);
        src.seek_to(3).unwrap();
        assert_eq!(src.position(), 3);
        src.seek_to(0).unwrap();
        assert_eq!(src.position(), 0);
        assert!(src.seek_to(5).is_err());
    }

    #[test]
    fn vec_sink_accumulates_writes() {
        let mut sink = VecSink::new();
        sink.write_all(&[1, 2]).unwrap();
        sink.write_all(&[3]).unwrap();
        assert_eq!(sink.into_inner(), vec![1, 2, 3]);
    }
}
