//! Byte sources the matching engine reads from.
//!
//! The engine only needs four capabilities: seek to an absolute position,
//! read an exact number of bytes, and report the total and remaining length.
//! Two implementations cover the resources we identify:
//!
//! - [`RandomAccess`] wraps anything `Read + Seek` (files, memory maps via
//!   `Cursor<&[u8]>`) and knows the exact resource size.
//! - [`MarkReset`] wraps a forward-only `Read`. It marks the position it was
//!   created at and can only rewind to that mark, buffering up to a read
//!   limit. Its length is the number of bytes reachable from the mark within
//!   that limit, which is exact for short streams and a lower bound otherwise.

use std::io::{self, Read, Seek, SeekFrom};

use crate::error::{MagicError, Result};

/// Default read limit for [`MarkReset`] sources (1 MiB).
pub const DEFAULT_MARK_LIMIT: usize = 1024 * 1024;

/// Seek + read contract used by the matching engine.
pub trait ByteSource {
    /// Move to `position` bytes from the start of the resource.
    fn seek(&mut self, position: u64) -> Result<()>;

    /// Read exactly `n` bytes. Fails with [`MagicError::EndOfData`] when fewer
    /// remain.
    fn read_exact(&mut self, n: usize) -> Result<Vec<u8>>;

    /// Bytes left between the current position and the end.
    fn remaining_length(&mut self) -> Result<u64>;

    /// Size of the resource.
    fn total_length(&mut self) -> Result<u64>;

    fn read_byte(&mut self) -> Result<u8> {
        Ok(self.read_exact(1)?[0])
    }
}

/// Random-access source over any seekable reader.
#[derive(Debug)]
pub struct RandomAccess<R> {
    inner: R,
    len: u64,
    position: u64,
}

impl<R: Read + Seek> RandomAccess<R> {
    /// Wrap `inner`, measuring its length. Reading starts at offset 0.
    pub fn new(mut inner: R) -> io::Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self {
            inner,
            len,
            position: 0,
        })
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> ByteSource for RandomAccess<R> {
    fn seek(&mut self, position: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(position))?;
        self.position = position;
        Ok(())
    }

    fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let available = self.len.saturating_sub(self.position);
        if available < n as u64 {
            return Err(MagicError::end_of_data(n as u64, available));
        }
        let mut buf = vec![0u8; n];
        match self.inner.read_exact(&mut buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(MagicError::end_of_data(n as u64, available));
            }
            Err(e) => return Err(e.into()),
        }
        self.position += n as u64;
        Ok(buf)
    }

    fn remaining_length(&mut self) -> Result<u64> {
        Ok(self.len.saturating_sub(self.position))
    }

    fn total_length(&mut self) -> Result<u64> {
        Ok(self.len)
    }
}

/// Sequential source with a single rewind point.
///
/// `seek(0)` resets to the mark; `seek(n)` resets and skips `n` bytes. Bytes
/// are pulled from the inner reader on demand and kept so later rules can
/// rewind over them.
#[derive(Debug)]
pub struct MarkReset<R> {
    inner: R,
    buffer: Vec<u8>,
    position: usize,
    limit: usize,
    exhausted: bool,
}

impl<R: Read> MarkReset<R> {
    /// Mark the reader's current position, allowing rewinds over at most
    /// `limit` bytes.
    pub fn new(inner: R, limit: usize) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            position: 0,
            limit,
            exhausted: false,
        }
    }

    pub fn with_default_limit(inner: R) -> Self {
        Self::new(inner, DEFAULT_MARK_LIMIT)
    }

    /// Pull from the inner reader until `target` bytes are buffered, the
    /// stream ends or the limit is reached.
    fn fill_to(&mut self, target: usize) -> io::Result<()> {
        let target = target.min(self.limit);
        let mut chunk = [0u8; 8192];
        while !self.exhausted && self.buffer.len() < target {
            let want = (target - self.buffer.len()).min(chunk.len());
            match self.inner.read(&mut chunk[..want]) {
                Ok(0) => self.exhausted = true,
                Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl<R: Read> ByteSource for MarkReset<R> {
    fn seek(&mut self, position: u64) -> Result<()> {
        let target = usize::try_from(position).unwrap_or(usize::MAX);
        self.fill_to(target)?;
        // Skipping past the end leaves the stream at its end.
        self.position = target.min(self.buffer.len());
        Ok(())
    }

    fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let end = self.position.saturating_add(n);
        self.fill_to(end)?;
        if end > self.buffer.len() {
            let available = (self.buffer.len() - self.position) as u64;
            return Err(MagicError::end_of_data(n as u64, available));
        }
        let bytes = self.buffer[self.position..end].to_vec();
        self.position = end;
        Ok(bytes)
    }

    fn remaining_length(&mut self) -> Result<u64> {
        self.fill_to(self.limit)?;
        Ok((self.buffer.len() - self.position) as u64)
    }

    fn total_length(&mut self) -> Result<u64> {
        self.fill_to(self.limit)?;
        Ok(self.buffer.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Reader that hands out at most one byte per call.
    struct Trickle(Cursor<Vec<u8>>);

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(1);
            self.0.read(&mut buf[..n])
        }
    }

    #[test]
    fn test_random_access_lengths_and_reads() {
        let mut src = RandomAccess::new(Cursor::new(b"0123456789".to_vec())).unwrap();
        assert_eq!(src.total_length().unwrap(), 10);
        src.seek(6).unwrap();
        assert_eq!(src.remaining_length().unwrap(), 4);
        assert_eq!(src.read_exact(3).unwrap(), b"678");
        assert_eq!(src.read_byte().unwrap(), b'9');
        assert_eq!(src.remaining_length().unwrap(), 0);
    }

    #[test]
    fn test_random_access_short_read_is_end_of_data() {
        let mut src = RandomAccess::new(Cursor::new(b"abc".to_vec())).unwrap();
        src.seek(1).unwrap();
        let err = src.read_exact(4).unwrap_err();
        assert!(matches!(err, MagicError::EndOfData { needed: 4, available: 2 }));
    }

    #[test]
    fn test_random_access_backwards_seek() {
        let mut src = RandomAccess::new(Cursor::new(b"abcdef".to_vec())).unwrap();
        src.seek(4).unwrap();
        assert_eq!(src.read_exact(2).unwrap(), b"ef");
        src.seek(0).unwrap();
        assert_eq!(src.read_exact(2).unwrap(), b"ab");
    }

    #[test]
    fn test_mark_reset_rewinds_to_mark() {
        let mut reader = Cursor::new(b"HEADERpayload".to_vec());
        reader.set_position(6);
        let mut src = MarkReset::new(reader, 64);
        assert_eq!(src.read_exact(3).unwrap(), b"pay");
        src.seek(0).unwrap();
        assert_eq!(src.read_exact(7).unwrap(), b"payload");
        src.seek(3).unwrap();
        assert_eq!(src.read_exact(4).unwrap(), b"load");
    }

    #[test]
    fn test_mark_reset_length_from_mark() {
        let mut src = MarkReset::new(Trickle(Cursor::new(b"0123456789".to_vec())), 64);
        assert_eq!(src.total_length().unwrap(), 10);
        src.seek(8).unwrap();
        assert_eq!(src.remaining_length().unwrap(), 2);
    }

    #[test]
    fn test_mark_reset_limit_caps_reads() {
        let mut src = MarkReset::new(Cursor::new(vec![7u8; 100]), 16);
        assert_eq!(src.total_length().unwrap(), 16);
        src.seek(12).unwrap();
        assert!(src.read_exact(4).is_ok());
        src.seek(12).unwrap();
        assert!(src.read_exact(5).unwrap_err().is_end_of_data());
    }

    #[test]
    fn test_mark_reset_skip_past_end() {
        let mut src = MarkReset::new(Cursor::new(b"abc".to_vec()), 64);
        src.seek(10).unwrap();
        assert_eq!(src.remaining_length().unwrap(), 0);
        assert!(src.read_byte().unwrap_err().is_end_of_data());
    }
}
