use std::io::{self, Read};

// Lookahead for long decimal literals requires this much buffered input; a
// smaller capacity request is rounded up.
pub(crate) const MIN_CAPACITY: usize = 8192;

/// A buffered reader with multi-byte lookahead.
///
/// Unlike [`std::io::BufReader`], this type exposes `peek`/`discard` so the
/// decoder can inspect upcoming bytes without consuming them, and can step
/// back over the single most recently read byte.
#[derive(Debug)]
pub(crate) struct PeekReader<R> {
    inner: R,
    buf: Box<[u8]>,
    pos: usize,
    filled: usize,
    eof: bool,
}

impl<R: Read> PeekReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self::with_capacity(MIN_CAPACITY, inner)
    }

    pub(crate) fn with_capacity(capacity: usize, inner: R) -> Self {
        let capacity = capacity.max(MIN_CAPACITY);
        PeekReader {
            inner,
            buf: vec![0; capacity].into_boxed_slice(),
            pos: 0,
            filled: 0,
            eof: false,
        }
    }

    /// Reads the next byte, or `None` at end of stream.
    pub(crate) fn read_byte(&mut self) -> io::Result<Option<u8>> {
        if self.pos == self.filled {
            self.fill(1)?;
            if self.pos == self.filled {
                return Ok(None);
            }
        }
        let byte = self.buf[self.pos];
        self.pos += 1;
        Ok(Some(byte))
    }

    /// Steps back over the byte most recently returned by `read_byte`.
    ///
    /// Only valid immediately after a successful `read_byte`; an intervening
    /// `peek` may slide the buffer window.
    pub(crate) fn unread_byte(&mut self) {
        debug_assert!(self.pos > 0, "unread_byte without a preceding read");
        self.pos = self.pos.saturating_sub(1);
    }

    /// Returns up to `n` upcoming bytes without consuming them. Fewer than
    /// `n` bytes are returned only at end of stream. `n` must not exceed the
    /// buffer capacity.
    pub(crate) fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        let n = n.min(self.buf.len());
        if self.filled - self.pos < n {
            self.fill(n)?;
        }
        let available = (self.filled - self.pos).min(n);
        Ok(&self.buf[self.pos..self.pos + available])
    }

    /// Consumes `n` bytes. `n` must not exceed the length returned by the
    /// last `peek`.
    pub(crate) fn discard(&mut self, n: usize) {
        debug_assert!(n <= self.filled - self.pos, "discard past peeked bytes");
        self.pos = (self.pos + n).min(self.filled);
    }

    // Buffers at least `n` unread bytes, short of end of stream.
    fn fill(&mut self, n: usize) -> io::Result<()> {
        if self.eof {
            return Ok(());
        }
        if self.buf.len() - self.pos < n {
            self.buf.copy_within(self.pos..self.filled, 0);
            self.filled -= self.pos;
            self.pos = 0;
        }
        while self.filled - self.pos < n {
            match self.inner.read(&mut self.buf[self.filled..]) {
                Ok(0) => {
                    self.eof = true;
                    break;
                }
                Ok(read) => self.filled += read,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_unread_read() {
        let mut reader = PeekReader::new(&b"ab"[..]);
        assert_eq!(reader.read_byte().unwrap(), Some(b'a'));
        reader.unread_byte();
        assert_eq!(reader.read_byte().unwrap(), Some(b'a'));
        assert_eq!(reader.read_byte().unwrap(), Some(b'b'));
        assert_eq!(reader.read_byte().unwrap(), None);
        assert_eq!(reader.read_byte().unwrap(), None);
    }

    #[test]
    fn peek_does_not_consume() {
        let mut reader = PeekReader::new(&b"hello"[..]);
        assert_eq!(reader.peek(3).unwrap(), b"hel");
        assert_eq!(reader.peek(5).unwrap(), b"hello");
        assert_eq!(reader.read_byte().unwrap(), Some(b'h'));
    }

    #[test]
    fn peek_short_at_eof() {
        let mut reader = PeekReader::new(&b"xy"[..]);
        assert_eq!(reader.peek(10).unwrap(), b"xy");
    }

    #[test]
    fn discard_advances() {
        let mut reader = PeekReader::new(&b"abcdef"[..]);
        assert_eq!(reader.peek(4).unwrap().len(), 4);
        reader.discard(4);
        assert_eq!(reader.read_byte().unwrap(), Some(b'e'));
    }

    #[test]
    fn peek_across_refills() {
        // A reader that trickles one byte per read call exercises the fill
        // loop.
        struct OneByte<'a>(&'a [u8]);
        impl Read for OneByte<'_> {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                match self.0.split_first() {
                    Some((&b, rest)) => {
                        self.0 = rest;
                        buf[0] = b;
                        Ok(1)
                    }
                    None => Ok(0),
                }
            }
        }
        let mut reader = PeekReader::new(OneByte(b"streaming"));
        assert_eq!(reader.peek(9).unwrap(), b"streaming");
        reader.discard(6);
        assert_eq!(reader.peek(9).unwrap(), b"ing");
    }

    #[test]
    fn capacity_is_rounded_up() {
        let reader = PeekReader::with_capacity(16, &b""[..]);
        assert!(reader.buf.len() >= MIN_CAPACITY);
    }
}
