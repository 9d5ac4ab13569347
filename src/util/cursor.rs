//! Little-endian byte cursor primitives.
//!
//! All record codecs parse from and serialize into flat byte buffers;
//! `Reader` and `Writer` are the only things that touch raw bytes. Every
//! short read surfaces as [`Error::TruncatedRecord`] instead of a panic.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use glam::{Quat, Vec2, Vec3};

use super::{Error, Result};

/// Bounded little-endian reader over a byte slice.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Create a reader at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current offset from the start of the buffer.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of unread bytes.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// True once every byte has been consumed.
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.pos == self.data.len()
    }

    /// Rewind to the start of the buffer.
    pub fn reset(&mut self) {
        self.pos = 0;
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(Error::TruncatedRecord {
                needed: len,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Skip `len` bytes without interpreting them.
    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    /// Read `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(LittleEndian::read_i16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    /// Read `count` consecutive f32 values.
    pub fn read_f32_vec(&mut self, count: usize) -> Result<Vec<f32>> {
        let bytes = self.take(count * 4)?;
        let mut out = vec![0.0f32; count];
        LittleEndian::read_f32_into(bytes, &mut out);
        Ok(out)
    }

    /// Read `count` consecutive u16 values.
    pub fn read_u16_vec(&mut self, count: usize) -> Result<Vec<u16>> {
        let bytes = self.take(count * 2)?;
        let mut out = vec![0u16; count];
        LittleEndian::read_u16_into(bytes, &mut out);
        Ok(out)
    }

    /// Read an xyz triple.
    pub fn read_vec3(&mut self) -> Result<Vec3> {
        let x = self.read_f32()?;
        let y = self.read_f32()?;
        let z = self.read_f32()?;
        Ok(Vec3::new(x, y, z))
    }

    /// Read a uv pair.
    pub fn read_vec2(&mut self) -> Result<Vec2> {
        let u = self.read_f32()?;
        let v = self.read_f32()?;
        Ok(Vec2::new(u, v))
    }

    /// Read a quaternion stored on disk as (w, x, y, z).
    pub fn read_quat_wxyz(&mut self) -> Result<Quat> {
        let w = self.read_f32()?;
        let x = self.read_f32()?;
        let y = self.read_f32()?;
        let z = self.read_f32()?;
        Ok(Quat::from_xyzw(x, y, z, w))
    }
}

/// Little-endian writer accumulating into a `Vec<u8>`.
#[derive(Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with reserved capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: Vec::with_capacity(capacity) }
    }

    /// Number of bytes written so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing has been written.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the writer and return the accumulated bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        // Vec<u8> never fails to grow
        let _ = self.buf.write_u16::<LittleEndian>(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        let _ = self.buf.write_i16::<LittleEndian>(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        let _ = self.buf.write_u32::<LittleEndian>(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        let _ = self.buf.write_i32::<LittleEndian>(value);
    }

    pub fn write_f32(&mut self, value: f32) {
        let _ = self.buf.write_f32::<LittleEndian>(value);
    }

    /// Write consecutive f32 values.
    pub fn write_f32_slice(&mut self, values: &[f32]) {
        for &v in values {
            self.write_f32(v);
        }
    }

    /// Write consecutive u16 values.
    pub fn write_u16_slice(&mut self, values: &[u16]) {
        for &v in values {
            self.write_u16(v);
        }
    }

    /// Write an xyz triple.
    pub fn write_vec3(&mut self, v: Vec3) {
        self.write_f32(v.x);
        self.write_f32(v.y);
        self.write_f32(v.z);
    }

    /// Write a uv pair.
    pub fn write_vec2(&mut self, v: Vec2) {
        self.write_f32(v.x);
        self.write_f32(v.y);
    }

    /// Write a quaternion in on-disk (w, x, y, z) order.
    pub fn write_quat_wxyz(&mut self, q: Quat) {
        self.write_f32(q.w);
        self.write_f32(q.x);
        self.write_f32(q.y);
        self.write_f32(q.z);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_roundtrip() {
        let mut w = Writer::new();
        w.write_u32(0xDEAD_BEEF);
        w.write_i32(-7);
        w.write_u16(0x0102);
        w.write_f32(1.5);
        let bytes = w.into_bytes();

        let mut r = Reader::new(&bytes);
        assert_eq!(r.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(r.read_i32().unwrap(), -7);
        assert_eq!(r.read_u16().unwrap(), 0x0102);
        assert_eq!(r.read_f32().unwrap(), 1.5);
        assert!(r.is_eof());
    }

    #[test]
    fn test_truncated() {
        let mut r = Reader::new(&[1, 2, 3]);
        let err = r.read_u32().unwrap_err();
        assert!(matches!(
            err,
            Error::TruncatedRecord { needed: 4, available: 3 }
        ));
        // position unchanged after a failed read
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn test_quat_disk_order() {
        let mut w = Writer::new();
        w.write_quat_wxyz(Quat::from_xyzw(0.1, 0.2, 0.3, 0.9));
        let bytes = w.into_bytes();

        // w comes first on disk
        assert_eq!(LittleEndian::read_f32(&bytes[0..4]), 0.9);

        let mut r = Reader::new(&bytes);
        let q = r.read_quat_wxyz().unwrap();
        assert_eq!(q.x, 0.1);
        assert_eq!(q.w, 0.9);
    }
}
