/*!
The `vlq` module implements the MIDI variable-length quantity: an unsigned
integer expressed in base-128 groups, most-significant group first, with the
high bit of every group except the last set. The SMF specification caps a
quantity at four bytes, i.e. a maximum value of `0x0FFF_FFFF`.
!*/

use crate::error::LibResult;
use crate::source::ByteSource;
use snafu::ResultExt;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

/// 0x7f, 127: the largest 7-bit number.
const MAX_7BIT: u8 = 0b0111_1111;

/// 0x80, 128: the continuation bit. Set on every byte except the last.
pub(crate) const CONTINUE: u8 = 0b1000_0000;

#[derive(Debug, PartialEq)]
pub enum VlqError {
    /// The last byte of the input still had the continuation bit set.
    IncompleteNumber,
    /// More than four bytes were used for a single quantity.
    Overlong,
}

impl Display for VlqError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

impl Error for VlqError {}

/// Encodes `value` as a variable-length quantity. Zero encodes to a single
/// zero byte.
pub fn write_varlen(mut value: u32) -> Vec<u8> {
    if value == 0 {
        return vec![0];
    }
    let mut groups = Vec::new();
    while value > 0 {
        groups.push((value & MAX_7BIT as u32) as u8);
        value >>= 7;
    }
    groups.reverse();
    let last = groups.len() - 1;
    for group in &mut groups[..last] {
        *group |= CONTINUE;
    }
    groups
}

/// Decodes one variable-length quantity from the front of a slice. Bytes
/// past the end of the quantity are ignored.
pub fn decode_slice(bytes: &[u8]) -> std::result::Result<u32, VlqError> {
    let mut decoder = VlqDecoder::new();
    for &b in bytes {
        if let Some((value, _count)) = decoder.push(b)? {
            return Ok(value);
        }
    }
    Err(VlqError::IncompleteNumber)
}

/// Incremental variable-length decoder. Bytes are fed one at a time with
/// [`VlqDecoder::push`]; the accumulated value and byte count are returned
/// when a byte without the continuation bit arrives. The decoder resets
/// itself after each completed quantity and after each error.
#[derive(Clone, Copy, Debug, Default)]
pub struct VlqDecoder {
    value: u32,
    count: usize,
}

impl VlqDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.value = 0;
        self.count = 0;
    }

    /// Feed one byte. Returns `Ok(Some((value, bytes_read)))` when the
    /// quantity is complete, `Ok(None)` when more bytes are needed.
    pub fn push(&mut self, byte: u8) -> std::result::Result<Option<(u32, usize)>, VlqError> {
        if self.count >= 4 {
            self.reset();
            return Err(VlqError::Overlong);
        }
        self.count += 1;
        self.value = (self.value << 7) | (byte & MAX_7BIT) as u32;
        if byte & CONTINUE == 0 {
            let done = (self.value, self.count);
            self.reset();
            Ok(Some(done))
        } else {
            Ok(None)
        }
    }
}

/// Reads one variable-length quantity from a byte source, one byte at a
/// time. Returns the value and the number of bytes consumed.
pub(crate) fn read_varlen_inner<S: ByteSource>(source: &mut S) -> LibResult<(u32, usize)> {
    let mut decoder = VlqDecoder::new();
    loop {
        let byte = source.read_byte().context(io!())?;
        match decoder.push(byte) {
            Ok(Some(done)) => return Ok(done),
            Ok(None) => {}
            Err(_) => return crate::error::OverlongVarlenSnafu { site: site!() }.fail(),
        }
    }
}

/// Reads one variable-length quantity from a byte source. See
/// [`read_varlen_inner`] for details.
pub fn read_varlen<S: ByteSource>(source: &mut S) -> crate::Result<(u32, usize)> {
    Ok(read_varlen_inner(source)?)
}
