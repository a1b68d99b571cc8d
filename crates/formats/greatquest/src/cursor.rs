use crate::error::{Error, Result};

/// Byte that ends a fixed-width string before its padding starts.
pub const STRING_TERMINATOR: u8 = 0x00;

/// Read cursor over a byte slice. All reads are little-endian.
///
/// Offsets reported in errors are relative to `base`, so a cursor over one
/// chunk's payload still points at the right byte of the original file.
#[derive(Clone)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            base: 0,
        }
    }

    /// Cursor over `data`, which starts at `base` in the enclosing file.
    pub fn with_base(data: &'a [u8], base: usize) -> Self {
        Self { data, pos: 0, base }
    }

    /// Current byte position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Current position in the enclosing file.
    pub fn file_offset(&self) -> usize {
        self.base + self.pos
    }

    /// Total length of underlying data.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether we've reached the end.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Remaining bytes from current position.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Seek to an absolute position.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(Error::OutOfBounds {
                offset: self.base + pos,
                need: 0,
                have: 0,
            });
        }
        self.pos = pos;
        Ok(())
    }

    /// Skip `n` bytes forward.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.ensure(n)?;
        self.pos += n;
        Ok(())
    }

    /// Jump to `offset`, run `f`, then return to the current position.
    ///
    /// The position is restored even when `f` fails.
    pub fn peek_at<T>(&mut self, offset: usize, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = self.pos;
        let result = self.seek(offset).and_then(|()| f(self));
        self.pos = saved;
        result
    }

    /// Read a slice of `n` bytes without copying.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.ensure(n)?;
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Read everything up to the end of the buffer.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let slice = &self.data[self.pos.min(self.data.len())..];
        self.pos = self.data.len();
        slice
    }

    /// Read a 4-byte magic/tag.
    pub fn read_magic(&mut self) -> Result<[u8; 4]> {
        self.read_array()
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        let v = self.data[self.pos];
        self.pos += 1;
        Ok(v)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    /// Read a fixed-width string: text, a null terminator, then padding up to `width`.
    ///
    /// The padding byte is not checked; writers always emit their configured one.
    pub fn read_fixed_string(&mut self, width: usize) -> Result<String> {
        let offset = self.file_offset();
        let bytes = self.read_bytes(width)?;
        let end = bytes
            .iter()
            .position(|&b| b == STRING_TERMINATOR)
            .ok_or(Error::MalformedString { offset, width })?;
        Ok(bytes[..end].iter().map(|&b| b as char).collect())
    }

    /// Read `count` items with `f`.
    pub fn read_vec<T>(&mut self, count: usize, mut f: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        // Guard against absurd counts before allocating.
        let mut items = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            items.push(f(self)?);
        }
        Ok(items)
    }

    /// Read a fixed array of `N` u32 words.
    pub fn read_u32_array<const N: usize>(&mut self) -> Result<[u32; N]> {
        let mut out = [0u32; N];
        for slot in &mut out {
            *slot = self.read_u32()?;
        }
        Ok(out)
    }

    /// Read a fixed array of `N` f32 values.
    pub fn read_f32_array<const N: usize>(&mut self) -> Result<[f32; N]> {
        let mut out = [0f32; N];
        for slot in &mut out {
            *slot = self.read_f32()?;
        }
        Ok(out)
    }

    /// Read `slots` u32 words and keep the first `count`; the rest must equal `pad`.
    pub fn read_padded_u32s(&mut self, count: usize, slots: usize, pad: u32) -> Result<Vec<u32>> {
        let offset = self.file_offset();
        if count > slots {
            return Err(Error::SizeMismatch {
                context: "padded vector",
                offset,
                declared: slots,
                actual: count,
            });
        }
        let values = self.read_vec(slots, |c| c.read_u32())?;
        if let Some(i) = values[count..].iter().position(|&v| v != pad) {
            return Err(Error::Parse {
                context: "padded vector",
                message: format!("slot {} at offset {:#x} is not padding", count + i, offset + (count + i) * 4),
            });
        }
        Ok(values[..count].to_vec())
    }

    /// Access the full underlying data.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    fn ensure(&self, n: usize) -> Result<()> {
        if self.pos + n > self.data.len() {
            return Err(Error::OutOfBounds {
                offset: self.file_offset(),
                need: n,
                have: self.remaining(),
            });
        }
        Ok(())
    }
}

/// Writer that builds a byte buffer. All writes are little-endian.
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
        }
    }

    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_magic(&mut self, magic: &[u8; 4]) {
        self.buf.extend_from_slice(magic);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u32_slice(&mut self, values: &[u32]) {
        for &v in values {
            self.write_u32(v);
        }
    }

    pub fn write_f32_slice(&mut self, values: &[f32]) {
        for &v in values {
            self.write_f32(v);
        }
    }

    /// Write a fixed-width string: text, terminator, then `padding` up to `width`.
    ///
    /// Characters are stored as single bytes, matching `Cursor::read_fixed_string`.
    pub fn write_fixed_string(&mut self, s: &str, width: usize, padding: u8) -> Result<()> {
        let bytes: Option<Vec<u8>> = s.chars().map(|ch| u8::try_from(ch).ok()).collect();
        let bytes = match bytes {
            Some(bytes) if bytes.len() < width && !bytes.contains(&STRING_TERMINATOR) => bytes,
            _ => {
                return Err(Error::StringTooLong {
                    text: s.to_string(),
                    width,
                })
            }
        };
        self.buf.extend_from_slice(&bytes);
        self.buf.push(STRING_TERMINATOR);
        self.write_padding(width - bytes.len() - 1, padding);
        Ok(())
    }

    /// Write `values` into `slots` u32 words, filling the rest with `pad`.
    pub fn write_padded_u32s(&mut self, values: &[u32], slots: usize, pad: u32) -> Result<()> {
        if values.len() > slots {
            return Err(Error::Parse {
                context: "padded vector",
                message: format!("{} values do not fit {} slots", values.len(), slots),
            });
        }
        self.write_u32_slice(values);
        for _ in values.len()..slots {
            self.write_u32(pad);
        }
        Ok(())
    }

    pub fn write_padding(&mut self, n: usize, byte: u8) {
        self.buf.resize(self.buf.len() + n, byte);
    }

    /// Patch a u32 at a specific position (for backpatching sizes).
    pub fn patch_u32(&mut self, pos: usize, v: u32) {
        let bytes = v.to_le_bytes();
        self.buf[pos..pos + 4].copy_from_slice(&bytes);
    }

    /// Pad with `byte` until the length is a multiple of `align`.
    pub fn align(&mut self, align: usize, byte: u8) {
        while !self.buf.len().is_multiple_of(align) {
            self.buf.push(byte);
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}
