//! The binary body encodings (little and big endian).
//!
//! Values are stored back to back without any separators. Since all result
//! and source buffers use the native byte order, data in the native order is
//! just copied and data in the other order is additionally swapped value by
//! value.

use std::{
    cmp::min,
    convert::TryFrom,
    io::Write,
    marker::PhantomData,
};

use byteorder::{ByteOrder, NativeEndian};
use num_traits::{NumCast, ToPrimitive};

use crate::{
    Error, PlyScalar, ScalarType,
    body::{Decoder, Encoder},
    parse::Input,
};


/// Values are copied in chunks of at most this many bytes. That way, a
/// bogus list length in a truncated file can't make us allocate gigabytes of
/// memory before noticing the end of the file.
const CHUNK_SIZE: usize = 64 * 1024;

/// Returns `true` if `B` is not the native byte order.
fn needs_swap<B: ByteOrder>() -> bool {
    B::read_u16(&[1, 0]) != NativeEndian::read_u16(&[1, 0])
}

/// Reverses the bytes of each `value_len` sized value in `data`.
fn swap_values(data: &mut [u8], value_len: usize) {
    if value_len > 1 {
        for value in data.chunks_exact_mut(value_len) {
            value.reverse();
        }
    }
}

fn byte_len(ty: ScalarType, n: usize, offset: usize) -> Result<usize, Error> {
    n.checked_mul(ty.len()).ok_or_else(|| Error::MalformedBody {
        offset,
        msg: format!("list of {} '{}' values is too large", n, ty),
    })
}

#[derive(Debug)]
pub(crate) struct BinaryDecoder<'a, I: Input, B: ByteOrder> {
    buf: &'a mut I,
    _order: PhantomData<B>,
}

impl<'a, I: Input, B: ByteOrder> BinaryDecoder<'a, I, B> {
    pub(crate) fn new(buf: &'a mut I) -> Self {
        Self {
            buf,
            _order: PhantomData,
        }
    }
}

impl<I: Input, B: ByteOrder> Decoder for BinaryDecoder<'_, I, B> {
    fn offset(&self) -> usize {
        self.buf.offset()
    }

    fn read_values(&mut self, ty: ScalarType, n: usize, out: &mut Vec<u8>) -> Result<(), Error> {
        let mut remaining = byte_len(ty, n, self.buf.offset())?;
        let start = out.len();

        while remaining > 0 {
            // Chunks are multiples of the value length, so the data stays
            // aligned to values.
            let chunk = min(remaining, CHUNK_SIZE);
            let old_len = out.len();
            out.resize(old_len + chunk, 0);
            self.buf.copy_to(&mut out[old_len..])?;
            remaining -= chunk;
        }

        if needs_swap::<B>() {
            swap_values(&mut out[start..], ty.len());
        }

        Ok(())
    }

    fn skip_values(&mut self, ty: ScalarType, n: usize) -> Result<(), Error> {
        let len = byte_len(ty, n, self.buf.offset())?;
        self.buf.skip(len)?;
        Ok(())
    }

    fn read_len(&mut self, ty: ScalarType) -> Result<u32, Error> {
        let offset = self.buf.offset();
        let len = self.buf.with_bytes(ty.len(), |sd| {
            Ok(with_scalar_type!(ty, |T| T::read::<B>(sd.data).to_i64()))
        })?;

        len.and_then(|len| u32::try_from(len).ok()).ok_or_else(|| Error::MalformedBody {
            offset,
            msg: "invalid list length".into(),
        })
    }
}


#[derive(Debug)]
pub(crate) struct BinaryEncoder<'a, W: Write, B: ByteOrder> {
    writer: &'a mut W,

    /// Used to swap values before writing them.
    scratch: Vec<u8>,
    _order: PhantomData<B>,
}

impl<'a, W: Write, B: ByteOrder> BinaryEncoder<'a, W, B> {
    pub(crate) fn new(writer: &'a mut W) -> Self {
        Self {
            writer,
            scratch: Vec::new(),
            _order: PhantomData,
        }
    }
}

impl<W: Write, B: ByteOrder> Encoder for BinaryEncoder<'_, W, B> {
    fn write_values(&mut self, ty: ScalarType, src: &[u8]) -> Result<(), Error> {
        if ty.len() == 1 || !needs_swap::<B>() {
            self.writer.write_all(src)?;
        } else {
            self.scratch.clear();
            self.scratch.extend_from_slice(src);
            swap_values(&mut self.scratch, ty.len());
            self.writer.write_all(&self.scratch)?;
        }

        Ok(())
    }

    fn write_len(&mut self, ty: ScalarType, len: usize) -> Result<(), Error> {
        let mut tmp = [0u8; 8];
        with_scalar_type!(ty, |T| {
            let v: T = NumCast::from(len).ok_or_else(|| {
                Error::InvalidBinding(format!("list length {} does not fit into '{}'", len, ty))
            })?;
            v.write::<B>(&mut tmp);
        });

        self.writer.write_all(&tmp[..ty.len()])?;
        Ok(())
    }

    fn end_row(&mut self) -> Result<(), Error> {
        Ok(())
    }
}
