//! Flat, native-layout encoding for plugin state.
//!
//! Values are written back to back with no tags or padding, in the host's
//! native byte order. Serialized engines are therefore only portable between
//! platforms with the same integer representation.

use bytemuck::Pod;

/// Write cursor over a host-provided buffer
pub struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Panics if the buffer cannot hold the value.
    pub fn write<T: Pod>(&mut self, value: T) {
        let bytes = bytemuck::bytes_of(&value);
        let end = self.pos + bytes.len();
        assert!(
            end <= self.buf.len(),
            "serialization buffer too small: need {} bytes, have {}",
            end,
            self.buf.len()
        );
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
    }

    pub fn written(&self) -> usize {
        self.pos
    }
}

/// Read cursor over serialized plugin state
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Panics if fewer than `size_of::<T>()` bytes remain.
    pub fn read<T: Pod>(&mut self) -> T {
        let end = self.pos + std::mem::size_of::<T>();
        assert!(
            end <= self.buf.len(),
            "truncated plugin data: need {} bytes, have {}",
            end,
            self.buf.len()
        );
        let value = bytemuck::pod_read_unaligned(&self.buf[self.pos..end]);
        self.pos = end;
        value
    }

    pub fn consumed(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}
