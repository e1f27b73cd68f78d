//! Binary Library Codec
//!
//! Library files are flat buffers made of a fixed-order section table followed
//! by the sections it describes. Numbers are written in the platform's native
//! representation; a library built on one architecture is only guaranteed to
//! load on an architecture with the same endianness.
//!
//! [`ByteWriter`] and [`ByteReader`] are the cursor helpers every payload codec
//! is written against. The reader never panics on short input: every read is
//! bounds-checked and reports a [`CorruptDataError`] tagged with the resource
//! type being decoded.

use bytemuck::Pod;

use crate::errors::CorruptDataError;
use crate::resources::ResourceType;

/// Largest element count a section length can record.
pub const MAX_SECTION_LEN: usize = u32::MAX as usize;

/// Round-trip conversion between a payload and its library buffer.
pub trait BinaryCodec: Sized {
    fn serialize(&self) -> Vec<u8>;

    fn deserialize(bytes: &[u8]) -> Result<Self, CorruptDataError>;
}

/// Append-only buffer builder.
#[derive(Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_ne_bytes());
    }

    pub fn u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_ne_bytes());
    }

    pub fn f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_ne_bytes());
    }

    pub fn f32s(&mut self, values: &[f32]) {
        for v in values {
            self.f32(*v);
        }
    }

    /// Writes a section length. Callers reject payloads with sections over
    /// [`MAX_SECTION_LEN`] before serializing.
    pub fn count(&mut self, len: usize) {
        debug_assert!(len <= MAX_SECTION_LEN, "section of {len} elements");
        self.u32(len as u32);
    }

    pub fn pod_slice<T: Pod>(&mut self, values: &[T]) {
        self.buf.extend_from_slice(bytemuck::cast_slice(values));
    }

    pub fn bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Bounds-checked cursor over a library buffer.
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    cursor: usize,
    kind: ResourceType,
}

impl<'a> ByteReader<'a> {
    #[must_use]
    pub fn new(bytes: &'a [u8], kind: ResourceType) -> Self {
        Self {
            bytes,
            cursor: 0,
            kind,
        }
    }

    pub fn corrupt(&self, reason: impl Into<String>) -> CorruptDataError {
        CorruptDataError::new(self.kind, reason)
    }

    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.cursor
    }

    /// Takes the next `len` bytes.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8], CorruptDataError> {
        if len > self.remaining() {
            return Err(self.corrupt(format!(
                "section of {len} bytes at offset {} exceeds buffer of {} bytes",
                self.cursor,
                self.bytes.len()
            )));
        }
        let slice = &self.bytes[self.cursor..self.cursor + len];
        self.cursor += len;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CorruptDataError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u32(&mut self) -> Result<u32, CorruptDataError> {
        self.array().map(u32::from_ne_bytes)
    }

    pub fn u64(&mut self) -> Result<u64, CorruptDataError> {
        self.array().map(u64::from_ne_bytes)
    }

    pub fn f32(&mut self) -> Result<f32, CorruptDataError> {
        self.array().map(f32::from_ne_bytes)
    }

    pub fn f32_array<const N: usize>(&mut self) -> Result<[f32; N], CorruptDataError> {
        let mut out = [0.0; N];
        for v in &mut out {
            *v = self.f32()?;
        }
        Ok(out)
    }

    pub fn count(&mut self) -> Result<usize, CorruptDataError> {
        self.u32().map(|n| n as usize)
    }

    /// Reads `count` tightly packed `T`s. The buffer carries no alignment
    /// guarantee, so elements are copied out one by one.
    pub fn pod_vec<T: Pod>(&mut self, count: usize) -> Result<Vec<T>, CorruptDataError> {
        let size = std::mem::size_of::<T>();
        let total = count
            .checked_mul(size)
            .ok_or_else(|| self.corrupt(format!("section of {count} elements overflows")))?;
        let bytes = self.take(total)?;
        Ok(bytes
            .chunks_exact(size)
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }

    pub fn string(&mut self, len: usize) -> Result<String, CorruptDataError> {
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| self.corrupt(format!("invalid UTF-8: {e}")))
    }

    /// Rejects buffers that carry bytes past the last declared section.
    pub fn finish(self) -> Result<(), CorruptDataError> {
        if self.remaining() != 0 {
            return Err(self.corrupt(format!(
                "{} trailing bytes after last section",
                self.remaining()
            )));
        }
        Ok(())
    }
}
