//! Low level parsing input used by the header parser and both body decoders.

use std::{
    cmp::min,
    fmt,
    io,
    mem,
    ops,
};

use failure::Fail;


pub(crate) mod buf;



/// A byte input that offers look-ahead via `Deref<Target = [u8]>`.
///
/// The slice returned by `deref` is the currently buffered data. `prepare`
/// makes sure that at least a number of bytes is buffered, `consume` drops
/// bytes from the front.
pub(crate) trait Input: ops::Deref<Target = [u8]> {
    /// Makes sure at least `num_bytes` are buffered. Returns
    /// `Error::UnexpectedEof` if the input ends before that.
    fn prepare(&mut self, num_bytes: usize) -> Result<(), Error>;

    /// Like `prepare`, but reaching EOF is not an error. After calling this,
    /// less than `num_bytes` might be buffered.
    fn saturating_prepare(&mut self, num_bytes: usize) -> Result<(), Error>;

    fn consume(&mut self, num_bytes: usize);

    /// Total number of bytes consumed since the start of the input.
    fn offset(&self) -> usize;

    fn is_eof(&mut self) -> Result<bool, Error> {
        self.saturating_prepare(1)?;
        Ok(self.len() == 0)
    }

    fn spanned_data(&self, num_bytes: usize) -> SpannedData<'_> {
        SpannedData {
            data: &self[..num_bytes],
            span: Span::new(self.offset(), self.offset() + num_bytes),
        }
    }

    /// Skips `num_bytes` bytes. Large skips are done piecewise so that the
    /// buffer does not need to hold all skipped bytes at once.
    fn skip(&mut self, mut num_bytes: usize) -> Result<(), Error> {
        while num_bytes > 0 {
            if self.len() == 0 {
                self.prepare(1)?;
            }

            let n = min(self.len(), num_bytes);
            self.consume(n);
            num_bytes -= n;
        }

        Ok(())
    }

    /// Skips bytes until `stopper` says stop or EOF is reached. The byte
    /// that stopped is not consumed.
    fn skip_until(&mut self, stopper: impl Stopper) -> Result<(), Error> {
        loop {
            if self.len() == 0 && self.is_eof()? {
                break;
            }

            if stopper.should_stop(self[0]) {
                break;
            }

            self.consume(1);
        }

        Ok(())
    }

    /// Copies exactly `out.len()` bytes into `out`, piecewise for the same
    /// reason as `skip`.
    fn copy_to(&mut self, mut out: &mut [u8]) -> Result<(), Error> {
        while !out.is_empty() {
            if self.len() == 0 {
                self.prepare(1)?;
            }

            let n = min(self.len(), out.len());
            let (head, tail) = mem::take(&mut out).split_at_mut(n);
            head.copy_from_slice(&self[..n]);
            self.consume(n);
            out = tail;
        }

        Ok(())
    }

    fn with_bytes<F, O>(&mut self, num_bytes: usize, func: F) -> Result<O, Error>
    where
        F: FnOnce(SpannedData) -> Result<O, Error>,
    {
        self.prepare(num_bytes)?;
        let out = func(self.spanned_data(num_bytes))?;
        self.consume(num_bytes);

        Ok(out)
    }

    /// Passes all bytes up to (excluding) the first byte the `stopper` stops
    /// at to `func` and consumes them. EOF also ends the data.
    fn take_until<F, O>(
        &mut self,
        stopper: impl Stopper,
        func: F,
    ) -> Result<O, Error>
    where
        F: FnOnce(SpannedData) -> Result<O, Error>
    {
        let mut pos = 0;
        loop {
            if self.len() <= pos {
                self.saturating_prepare(pos + 1)?;
                if self.len() <= pos {
                    break;
                }
            }

            if stopper.should_stop(self[pos]) {
                break;
            }

            pos += 1;
        }

        let out = func(self.spanned_data(pos))?;
        self.consume(pos);

        Ok(out)
    }

    fn is_next(&mut self, expected: &[u8]) -> Result<bool, Error> {
        self.saturating_prepare(expected.len())?;
        Ok(self.starts_with(expected))
    }
}

#[derive(Debug)]
pub struct SpannedData<'a> {
    pub data: &'a [u8],
    pub span: Span,
}

impl<'a> SpannedData<'a> {
    pub fn error(&self, msg: impl Into<String>) -> Error {
        Error::Custom(msg.into(), self.span)
    }

    pub fn assert_ascii(&self) -> Result<&'a str, Error> {
        if !self.data.is_ascii() {
            Err(Error::NotAscii(self.span))
        } else {
            std::str::from_utf8(self.data).map_err(|_| Error::NotAscii(self.span))
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    lo: usize,
    hi: usize,
}

impl Span {
    pub fn new(lo: usize, hi: usize) -> Self {
        Self { lo, hi }
    }

    pub fn lo(&self) -> usize {
        self.lo
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}..{}", self.lo, self.hi)
    }
}

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "IO error: {}", _0)]
    Io(io::Error),

    #[fail(display = "unexpected EOF while parsing (at {})", _0)]
    UnexpectedEof(usize),

    #[fail(display = "unexpected non-ASCII data at {}", _0)]
    NotAscii(Span),

    #[fail(
        display = "parsing lookahead got too big at {} (due to a really degenerated \
            file or a parser bug)",
        _0
    )]
    LookAheadTooBig(usize),

    #[fail(display = "{} (at {})", _0, _1)]
    Custom(String, Span)
}

impl From<io::Error> for Error {
    fn from(src: io::Error) -> Self {
        Error::Io(src)
    }
}

pub(crate) fn debug_fmt_bytes(data: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(data) {
        format!("{:?}", s)
    } else {
        format!("{:?}", data)
    }
}

pub(crate) trait Stopper {
    fn should_stop(&self, byte: u8) -> bool;
}

impl Stopper for u8 {
    fn should_stop(&self, byte: u8) -> bool {
        byte == *self
    }
}

impl<F: Fn(u8) -> bool> Stopper for F {
    fn should_stop(&self, byte: u8) -> bool {
        self(byte)
    }
}
