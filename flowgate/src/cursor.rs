use thiserror::Error;

/// A read would cross the end of the packet buffer.
///
/// Always recovered locally: the parser converts it to a malformed-packet
/// classification at its boundary, and it never propagates further.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("read past end of packet buffer")]
pub struct OutOfBounds;

/// A type decodable from a fixed-length run of wire bytes.
pub trait FromWire: Sized {
    /// Exact number of bytes one value occupies on the wire.
    const WIRE_LEN: usize;

    /// Decode from `bytes`. The cursor guarantees `bytes.len() == WIRE_LEN`.
    fn from_wire(bytes: &[u8]) -> Self;
}

/// Bounds-safe sequential reader over one packet buffer.
///
/// Every read re-derives `offset + WIRE_LEN <= buffer length` before any
/// byte is touched -- the same per-header guard an in-kernel filter performs
/// against `data_end` ahead of each access. A failed check leaves the cursor
/// where it was and touches no memory beyond the checked region. The buffer
/// is immutable for the lifetime of the cursor, so the bound cannot move
/// under a decision in progress.
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current offset from the start of the buffer.
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Bytes left between the cursor and the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Decode a `T` at the cursor and advance past it.
    pub fn read<T: FromWire>(&mut self) -> Result<T, OutOfBounds> {
        let end = self.pos.checked_add(T::WIRE_LEN).ok_or(OutOfBounds)?;
        if end > self.buf.len() {
            return Err(OutOfBounds);
        }
        let value = T::from_wire(&self.buf[self.pos..end]);
        self.pos = end;
        Ok(value)
    }
}
