//! The ASCII body encoding.
//!
//! Values are decimal literals separated by whitespace. Each row is written on
//! its own line, but the reader does not care about line structure at all: it
//! treats the whole body as a stream of whitespace separated tokens.

use std::{
    convert::TryFrom,
    io::Write,
};

use byteorder::NativeEndian;
use num_traits::ToPrimitive;

use crate::{
    Error, PlyScalar, ScalarType,
    body::{Decoder, Encoder},
    parse::{Input, debug_fmt_bytes},
};


fn is_whitespace(b: u8) -> bool {
    b == b' ' || b == b'\t' || b == b'\n' || b == b'\r'
}

#[derive(Debug)]
pub(crate) struct AsciiDecoder<'a, I: Input> {
    buf: &'a mut I,
}

impl<'a, I: Input> AsciiDecoder<'a, I> {
    pub(crate) fn new(buf: &'a mut I) -> Self {
        Self { buf }
    }

    /// Skips whitespace and makes sure that another token follows.
    fn start_token(&mut self) -> Result<(), Error> {
        self.buf.skip_until(|b| !is_whitespace(b))?;
        if self.buf.is_eof()? {
            return Err(Error::TruncatedBody { offset: self.buf.offset() });
        }

        Ok(())
    }

    /// Reads the next token and parses it as `T`.
    fn parse_token<T: PlyScalar>(&mut self) -> Result<T, Error> {
        self.start_token()?;
        let v = self.buf.take_until(is_whitespace, |sd| {
            sd.assert_ascii()?.parse::<T>().map_err(|_| {
                let len = sd.data.len().min(30);
                sd.error(format!(
                    "invalid '{}' literal: {}",
                    T::TYPE,
                    debug_fmt_bytes(&sd.data[..len]),
                ))
            })
        })?;

        Ok(v)
    }
}

impl<I: Input> Decoder for AsciiDecoder<'_, I> {
    fn offset(&self) -> usize {
        self.buf.offset()
    }

    fn read_values(&mut self, ty: ScalarType, n: usize, out: &mut Vec<u8>) -> Result<(), Error> {
        with_scalar_type!(ty, |T| {
            let mut tmp = [0u8; 8];
            for _ in 0..n {
                let v = self.parse_token::<T>()?;
                v.write::<NativeEndian>(&mut tmp);
                out.extend_from_slice(&tmp[..ty.len()]);
            }
        });

        Ok(())
    }

    fn skip_values(&mut self, _: ScalarType, n: usize) -> Result<(), Error> {
        for _ in 0..n {
            self.start_token()?;
            self.buf.skip_until(is_whitespace)?;
        }

        Ok(())
    }

    fn read_len(&mut self, ty: ScalarType) -> Result<u32, Error> {
        let offset = self.buf.offset();
        let len = with_scalar_type!(ty, |T| self.parse_token::<T>()?.to_i64());

        len.and_then(|len| u32::try_from(len).ok()).ok_or_else(|| Error::MalformedBody {
            offset,
            msg: "invalid list length".into(),
        })
    }
}


#[derive(Debug)]
pub(crate) struct AsciiEncoder<'a, W: Write> {
    writer: &'a mut W,
    at_start_of_line: bool,
}

impl<'a, W: Write> AsciiEncoder<'a, W> {
    pub(crate) fn new(writer: &'a mut W) -> Self {
        Self {
            writer,
            at_start_of_line: true,
        }
    }

    fn write_separator(&mut self) -> Result<(), Error> {
        if self.at_start_of_line {
            self.at_start_of_line = false;
        } else {
            self.writer.write_all(b" ")?;
        }

        Ok(())
    }
}

impl<W: Write> Encoder for AsciiEncoder<'_, W> {
    fn write_values(&mut self, ty: ScalarType, src: &[u8]) -> Result<(), Error> {
        with_scalar_type!(ty, |T| {
            for chunk in src.chunks_exact(ty.len()) {
                self.write_separator()?;
                write!(self.writer, "{}", T::read::<NativeEndian>(chunk))?;
            }
        });

        Ok(())
    }

    fn write_len(&mut self, _: ScalarType, len: usize) -> Result<(), Error> {
        self.write_separator()?;
        write!(self.writer, "{}", len)?;
        Ok(())
    }

    fn end_row(&mut self) -> Result<(), Error> {
        self.writer.write_all(b"\n")?;
        self.at_start_of_line = true;
        Ok(())
    }
}
