//! Bounds-checked little-endian reader over an immutable byte buffer

use std::io::{self, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use glam::{Quat, Vec2, Vec3, Vec4};

use crate::common::Matrix3x4;
use crate::error::{Result, StudioError};
use crate::limits::ParseLimits;

/// A saved cursor position, see [`Cursor::mark`] and [`Cursor::restore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark(u64);

impl Mark {
    pub fn position(self) -> u64 {
        self.0
    }
}

/// Reader over a fixed input buffer.
///
/// Every parse owns its own cursor, so independent parses of the same bytes
/// never share state.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    inner: io::Cursor<&'a [u8]>,
    limits: ParseLimits,
}

impl<'a> Cursor<'a> {
    /// Create a cursor positioned at the start of `data` with default limits
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_limits(data, ParseLimits::default())
    }

    /// Create a cursor with caller-supplied limits
    pub fn with_limits(data: &'a [u8], limits: ParseLimits) -> Self {
        Self {
            inner: io::Cursor::new(data),
            limits,
        }
    }

    pub fn limits(&self) -> &ParseLimits {
        &self.limits
    }

    /// The whole underlying buffer
    pub fn data(&self) -> &'a [u8] {
        self.inner.get_ref()
    }

    pub fn len(&self) -> u64 {
        self.data().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }

    pub fn position(&self) -> u64 {
        self.inner.position()
    }

    /// Bytes left between the current position and the end of the buffer
    pub fn remaining(&self) -> u64 {
        self.len().saturating_sub(self.position())
    }

    /// Seek to an absolute position. Seeking to exactly the end is allowed.
    pub fn seek(&mut self, position: u64) -> Result<()> {
        if position > self.len() {
            return Err(StudioError::OffsetOutOfRange {
                structure: "cursor",
                field: "seek",
                offset: position as i64,
                len: self.len(),
            });
        }
        self.inner.set_position(position);
        Ok(())
    }

    /// Seek relative to the current position
    pub fn seek_relative(&mut self, delta: i64) -> Result<()> {
        let target = self.position() as i64 + delta;
        if target < 0 {
            return Err(StudioError::OffsetOutOfRange {
                structure: "cursor",
                field: "seek",
                offset: target,
                len: self.len(),
            });
        }
        self.seek(target as u64)
    }

    /// Skip a reserved region of `count` bytes
    pub fn skip(&mut self, count: usize) -> Result<()> {
        if count as u64 > self.remaining() {
            return Err(self.truncated(count));
        }
        self.inner.set_position(self.position() + count as u64);
        Ok(())
    }

    pub fn mark(&self) -> Mark {
        Mark(self.position())
    }

    pub fn restore(&mut self, mark: Mark) {
        self.inner.set_position(mark.0);
    }

    /// Resolve `origin + relative` into an absolute offset inside the buffer
    pub fn resolve(
        &self,
        origin: u64,
        relative: i64,
        structure: &'static str,
        field: &'static str,
    ) -> Result<u64> {
        let absolute = origin as i64 + relative;
        if absolute < 0 || absolute as u64 >= self.len() {
            return Err(StudioError::OffsetOutOfRange {
                structure,
                field,
                offset: absolute,
                len: self.len(),
            });
        }
        Ok(absolute as u64)
    }

    fn truncated(&self, needed: usize) -> StudioError {
        StudioError::TruncatedBuffer {
            structure: None,
            offset: self.position(),
            needed,
            len: self.len(),
        }
    }

    fn read_with<T>(
        &mut self,
        needed: usize,
        read: impl FnOnce(&mut io::Cursor<&'a [u8]>) -> io::Result<T>,
    ) -> Result<T> {
        if needed as u64 > self.remaining() {
            return Err(self.truncated(needed));
        }
        read(&mut self.inner).map_err(|_| self.truncated(needed))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_with(1, |r| r.read_u8())
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        self.read_with(1, |r| r.read_i8())
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_with(2, |r| r.read_u16::<LittleEndian>())
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.read_with(2, |r| r.read_i16::<LittleEndian>())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_with(4, |r| r.read_u32::<LittleEndian>())
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_with(4, |r| r.read_i32::<LittleEndian>())
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.read_with(4, |r| r.read_f32::<LittleEndian>())
    }

    /// Read `N` raw bytes
    pub fn read_bytes<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.read_with(N, |r| {
            let mut buf = [0u8; N];
            r.read_exact(&mut buf)?;
            Ok(buf)
        })
    }

    pub fn read_vec2(&mut self) -> Result<Vec2> {
        Ok(Vec2::new(self.read_f32()?, self.read_f32()?))
    }

    pub fn read_vec3(&mut self) -> Result<Vec3> {
        Ok(Vec3::new(self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    pub fn read_vec4(&mut self) -> Result<Vec4> {
        Ok(Vec4::new(
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
        ))
    }

    /// Read a quaternion stored as x, y, z, w
    pub fn read_quat(&mut self) -> Result<Quat> {
        let v = self.read_vec4()?;
        Ok(Quat::from_xyzw(v.x, v.y, v.z, v.w))
    }

    /// Read a row-major 3x4 matrix
    pub fn read_matrix3x4(&mut self) -> Result<Matrix3x4> {
        let mut rows = [[0.0f32; 4]; 3];
        for row in &mut rows {
            for value in row.iter_mut() {
                *value = self.read_f32()?;
            }
        }
        Ok(Matrix3x4(rows))
    }

    /// Read a fixed-width string field, dropping everything from the first NUL
    pub fn read_fixed_string(&mut self, len: usize) -> Result<String> {
        let start = self.position() as usize;
        self.skip(len)?;
        let bytes = &self.data()[start..start + len];
        let end = memchr::memchr(0, bytes).unwrap_or(len);
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    /// Read a NUL-terminated string at an absolute offset without moving the cursor
    pub fn read_string_at(&mut self, offset: u64) -> Result<String> {
        let mark = self.mark();
        self.seek(offset)?;
        let result = self.read_terminated();
        self.restore(mark);
        result
    }

    /// Read a string whose offset is stored relative to `origin`.
    ///
    /// A relative offset of zero means the string is absent.
    pub fn read_string_rel(
        &mut self,
        origin: u64,
        relative: i32,
        structure: &'static str,
        field: &'static str,
    ) -> Result<String> {
        if relative == 0 {
            return Ok(String::new());
        }
        let offset = self.resolve(origin, relative as i64, structure, field)?;
        self.read_string_at(offset)
    }

    /// Borrow `len` bytes at an absolute offset without moving the cursor
    pub fn slice_at(&self, offset: u64, len: usize) -> Result<&'a [u8]> {
        let data = self.data();
        let end = offset.checked_add(len as u64).filter(|&end| end <= self.len());
        match end {
            Some(end) => Ok(&data[offset as usize..end as usize]),
            None => Err(StudioError::TruncatedBuffer {
                structure: None,
                offset,
                needed: len,
                len: self.len(),
            }),
        }
    }

    /// Read a text block of known size stored relative to `origin`.
    ///
    /// Used for key-value blocks, which may be longer than the string limit.
    pub fn read_text_rel(
        &mut self,
        origin: u64,
        relative: i32,
        size: i32,
        structure: &'static str,
        field: &'static str,
    ) -> Result<String> {
        if relative == 0 || size <= 0 {
            return Ok(String::new());
        }
        let offset = self.resolve(origin, relative as i64, structure, field)?;
        let bytes = self.slice_at(offset, size as usize)?;
        let end = memchr::memchr(0, bytes).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    fn read_terminated(&mut self) -> Result<String> {
        let start = self.position() as usize;
        let max = self.limits.max_string_len;
        let tail = &self.data()[start..];
        let window = &tail[..tail.len().min(max + 1)];
        match memchr::memchr(0, window) {
            Some(end) => Ok(String::from_utf8_lossy(&window[..end]).into_owned()),
            None if window.len() > max => Err(StudioError::LimitExceeded {
                structure: "string",
                field: "length",
                value: window.len() as u64,
                limit: max as u64,
            }),
            None => Err(StudioError::TruncatedBuffer {
                structure: Some("string"),
                offset: start as u64,
                needed: window.len() + 1,
                len: self.len(),
            }),
        }
    }
}
