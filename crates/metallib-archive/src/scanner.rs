//! Bounds-checked cursor over an immutable byte buffer.
//!
//! All reads validate the remaining length before touching the buffer, so a
//! failed read never yields partial data and never allocates based on an
//! untrusted length.

use crate::error::ScanError;
use crate::fourcc::FourCC;
use crate::tag::{Tag, TagLengthWidth};

/// Sequential/random-access reader used by the archive decoder.
#[derive(Debug, Clone)]
pub struct ByteScanner<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteScanner<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        ByteScanner { bytes, offset: 0 }
    }

    /// Current cursor position, in bytes from the start of the buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes left between the cursor and the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.offset)
    }

    /// Moves the cursor to `offset`. Seeking to the end of the buffer is allowed.
    pub fn seek(&mut self, offset: usize) -> Result<(), ScanError> {
        if offset > self.bytes.len() {
            return Err(ScanError::IndexOutOfBounds {
                offset,
                needed: 0,
                len: self.bytes.len(),
            });
        }
        self.offset = offset;
        Ok(())
    }

    /// Reads exactly `byte_count` bytes.
    pub fn scan_data(&mut self, byte_count: usize) -> Result<&'a [u8], ScanError> {
        let out_of_bounds = ScanError::IndexOutOfBounds {
            offset: self.offset,
            needed: byte_count,
            len: self.bytes.len(),
        };
        let end = self.offset.checked_add(byte_count).ok_or(out_of_bounds.clone())?;
        let slice = self.bytes.get(self.offset..end).ok_or(out_of_bounds)?;
        self.offset = end;
        Ok(slice)
    }

    /// Reads everything from the cursor to the end of the buffer.
    ///
    /// Fails if the cursor is already at the end.
    pub fn scan_data_to_end(&mut self) -> Result<&'a [u8], ScanError> {
        if self.remaining() == 0 {
            return Err(ScanError::IndexOutOfBounds {
                offset: self.offset,
                needed: 1,
                len: self.bytes.len(),
            });
        }
        let slice = &self.bytes[self.offset..];
        self.offset = self.bytes.len();
        Ok(slice)
    }

    /// Reads a 4-byte ASCII code.
    pub fn scan_four_char_code(&mut self) -> Result<FourCC, ScanError> {
        let start = self.offset;
        let bytes = self.scan_array::<4>()?;
        if !bytes.is_ascii() {
            self.offset = start;
            return Err(ScanError::InvalidStringData { offset: start });
        }
        Ok(FourCC(bytes))
    }

    /// Reads a NUL-terminated UTF-8 string. The NUL is consumed but not returned.
    pub fn scan_cstring(&mut self) -> Result<&'a str, ScanError> {
        let start = self.offset;
        let invalid = ScanError::InvalidStringData { offset: start };
        let tail = self.bytes.get(start..).ok_or(invalid.clone())?;
        let nul = tail.iter().position(|&b| b == 0).ok_or(invalid.clone())?;
        let s = core::str::from_utf8(&tail[..nul]).map_err(|_| invalid)?;
        self.offset = start + nul + 1;
        Ok(s)
    }

    pub fn scan_u8(&mut self) -> Result<u8, ScanError> {
        Ok(self.scan_array::<1>()?[0])
    }

    pub fn scan_u16(&mut self) -> Result<u16, ScanError> {
        Ok(u16::from_le_bytes(self.scan_array()?))
    }

    pub fn scan_u32(&mut self) -> Result<u32, ScanError> {
        Ok(u32::from_le_bytes(self.scan_array()?))
    }

    pub fn scan_u64(&mut self) -> Result<u64, ScanError> {
        Ok(u64::from_le_bytes(self.scan_array()?))
    }

    /// Reads tags until the `ENDT` sentinel.
    ///
    /// Each tag is `{name: 4 bytes, length: width, content: length bytes}`. The
    /// sentinel has no length field; it is consumed and not returned.
    pub fn scan_tags(&mut self, width: TagLengthWidth) -> Result<Vec<Tag>, ScanError> {
        let mut tags = Vec::new();
        loop {
            let name = self.scan_four_char_code()?;
            if name == FourCC::ENDT {
                break;
            }
            let content_len = match width {
                TagLengthWidth::U16 => usize::from(self.scan_u16()?),
                TagLengthWidth::U32 => to_usize(u64::from(self.scan_u32()?), self.offset)?,
            };
            let content = self.scan_data(content_len)?;
            tags.push(Tag::new(name, content));
        }
        Ok(tags)
    }

    fn scan_array<const N: usize>(&mut self) -> Result<[u8; N], ScanError> {
        let slice = self.scan_data(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }
}

/// Converts an on-disk 64-bit size or offset to `usize`.
///
/// `at` is the position reported if the value does not fit the host.
pub(crate) fn to_usize(value: u64, at: usize) -> Result<usize, ScanError> {
    usize::try_from(value).map_err(|_| ScanError::IndexOutOfBounds {
        offset: at,
        needed: usize::MAX,
        len: usize::MAX,
    })
}
