//! Low-level encoding primitives shared by the container reader and writer.

use std::io::{self, Read, Write};

use crate::error::{AssetError, AssetResult};

/// Longest 7-bit encoded `u32` in bytes.
const MAX_7BIT_BYTES: usize = 5;

pub(crate) fn write_i32<W: Write>(w: &mut W, value: i32) -> io::Result<()> {
    w.write_all(&value.to_le_bytes())
}

pub(crate) fn read_i32<R: Read>(r: &mut R) -> AssetResult<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

/// Read an `i32` that must not be negative (counts, lengths, offsets).
pub(crate) fn read_len<R: Read>(r: &mut R, what: &str) -> AssetResult<usize> {
    let value = read_i32(r)?;
    usize::try_from(value).map_err(|_| AssetError::decode(format!("negative {}: {}", what, value)))
}

/// Convert an in-memory length to its on-disk `i32` form.
pub(crate) fn to_i32(value: usize, what: &str) -> AssetResult<i32> {
    i32::try_from(value).map_err(|_| AssetError::decode(format!("{} too large: {}", what, value)))
}

fn write_7bit<W: Write>(w: &mut W, mut value: u32) -> io::Result<()> {
    while value >= 0x80 {
        w.write_all(&[(value as u8) | 0x80])?;
        value >>= 7;
    }
    w.write_all(&[value as u8])
}

fn read_7bit<R: Read>(r: &mut R) -> AssetResult<u32> {
    let mut result = 0u32;
    for i in 0..MAX_7BIT_BYTES {
        let mut byte = [0u8; 1];
        r.read_exact(&mut byte)?;
        let byte = byte[0];

        // The fifth byte may only carry the top four bits of a u32.
        if i == MAX_7BIT_BYTES - 1 && byte > 0x0F {
            return Err(AssetError::decode("7-bit encoded length overflows"));
        }

        result |= u32::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(result);
        }
    }
    Err(AssetError::decode("7-bit encoded length is too long"))
}

fn len_7bit(mut value: u32) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Write a string as a 7-bit encoded byte length followed by its UTF-8 bytes.
pub(crate) fn write_prefixed_string<W: Write>(w: &mut W, value: &str) -> AssetResult<()> {
    let len = u32::try_from(to_i32(value.len(), "string length")?)
        .map_err(|_| AssetError::decode("string length overflows"))?;
    write_7bit(w, len)?;
    w.write_all(value.as_bytes())?;
    Ok(())
}

pub(crate) fn read_prefixed_string<R: Read>(r: &mut R) -> AssetResult<String> {
    let len = read_7bit(r)?;
    if len > i32::MAX as u32 {
        return Err(AssetError::decode(format!("negative string length: {}", len as i32)));
    }
    read_utf8(r, len as usize)
}

/// Number of bytes [`write_prefixed_string`] produces for `value`.
pub(crate) fn prefixed_string_len(value: &str) -> usize {
    len_7bit(value.len() as u32) + value.len()
}

pub(crate) fn read_utf8<R: Read>(r: &mut R, len: usize) -> AssetResult<String> {
    let mut bytes = Vec::new();
    r.take(len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != len {
        return Err(AssetError::decode("unexpected end of stream"));
    }
    String::from_utf8(bytes).map_err(|e| AssetError::decode(format!("invalid UTF-8: {}", e)))
}

/// A reader that tracks how many bytes it has handed out.
///
/// Forward-only streams cannot report their position, so the container reader counts
/// bytes itself to map property offsets onto the stream.
pub(crate) struct CountingReader<R> {
    inner: R,
    position: u64,
}

impl<R: Read> CountingReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self { inner, position: 0 }
    }

    pub(crate) fn position(&self) -> u64 {
        self.position
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }
}
