use std::{
    cmp::{max, min},
    fmt,
    io::{self, Read},
    ops,
};

use super::{Error, Input};


/// The initial size of the buffer in bytes.
pub(crate) const START_BUFFER_SIZE: usize = 8 * 1024;

/// The maximum size the internal buffer can grow to. This is just a security
/// mechanism: parsers never look at a huge chunk of data at once. Header lines
/// and ASCII tokens are small, and large binary lists are copied or skipped
/// piecewise. If a file contains a gigantic header line or token, we bail out
/// with an error instead of dying from OOM.
const MAX_BUFFER_SIZE: usize = 4 * 1024 * 1024;


pub(crate) struct Buffer<R: Read> {
    buf: Vec<u8>,
    reader: R,
    start: usize,
    end: usize,
    consumed_total: usize,
}

impl<R: Read> Buffer<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            buf: vec![0; START_BUFFER_SIZE],
            reader,
            start: 0,
            end: 0,
            consumed_total: 0,
        }
    }

    fn len(&self) -> usize {
        self.end - self.start
    }

    fn cap(&self) -> usize {
        self.buf.len()
    }

    /// Tries to read `additional` new bytes to the back of the buffer. If the
    /// reader is exhausted before that, fewer bytes are read. Returns the
    /// number of bytes actually read.
    fn fill_buf_by(&mut self, additional: usize) -> Result<usize, Error> {
        let space_after = self.cap() - self.end;
        let space_before = self.start;

        // If we still have enough buffer space left at the end, we can just
        // read new data. If that's not the case, we have to do some work to
        // get more space at the end.
        if space_after < additional {
            // We either move the data to the beginning of the buffer or grow
            // the buffer. Moving is only worth it if the data is less than
            // half the buffer: otherwise alternating reads of sizes `2` and
            // `bufsize - 1` would move `bufsize - 2` bytes every second read.
            if space_after + space_before >= additional && self.len() < self.cap() / 2 {
                self.buf.copy_within(self.start..self.end, 0);
            } else {
                if self.len() + additional > MAX_BUFFER_SIZE {
                    return Err(Error::LookAheadTooBig(self.consumed_total));
                }

                // The new buffer size will be at least our current length +
                // `additional`, but no less than twice the current buffer size
                // (otherwise, reallocations might be too frequent).
                let new_len = min(
                    max(self.len() + additional, self.buf.len() * 2),
                    MAX_BUFFER_SIZE,
                );

                // `Vec::resize` would copy all bytes anyway, so we use the
                // chance to move our data to the beginning of the new buffer.
                let mut new = Vec::with_capacity(new_len);
                new.extend_from_slice(&self.buf[self.start..self.end]);
                new.resize(new_len, 0);
                self.buf = new;
            }

            // In both cases, the data starts at the very beginning now.
            self.end -= self.start;
            self.start = 0;
        }

        // Read new data until we have read `additional` many bytes or the
        // reader is exhausted. We ignore `Interrupted` errors and just
        // continue.
        let mut bytes_read = 0;
        while bytes_read < additional {
            match self.reader.read(&mut self.buf[self.end + bytes_read..]) {
                Ok(0) => break,
                Ok(n) => bytes_read += n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        self.end += bytes_read;
        Ok(bytes_read)
    }
}

impl<R: Read> fmt::Debug for Buffer<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("buffered", &self.len())
            .field("capacity", &self.cap())
            .field("consumed_total", &self.consumed_total)
            .finish()
    }
}

impl<R: Read> ops::Deref for Buffer<R> {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.buf[self.start..self.end]
    }
}

impl<R: Read> Input for Buffer<R> {
    fn prepare(&mut self, num_bytes: usize) -> Result<(), Error> {
        self.saturating_prepare(num_bytes)?;
        if self.len() < num_bytes {
            return Err(Error::UnexpectedEof(self.consumed_total + self.len()));
        }

        Ok(())
    }

    fn saturating_prepare(&mut self, num_bytes: usize) -> Result<(), Error> {
        if self.len() < num_bytes {
            let diff = num_bytes - self.len();
            self.fill_buf_by(diff)?;
        }

        Ok(())
    }

    fn consume(&mut self, num_bytes: usize) {
        assert!(self.start + num_bytes <= self.end);

        self.start += num_bytes;
        self.consumed_total += num_bytes;

        // If we consumed all the data, we set both indices to 0.
        if self.start == self.end {
            self.start = 0;
            self.end = 0;
        }
    }

    fn offset(&self) -> usize {
        self.consumed_total
    }
}
