//! Reader wrappers.

use std::io::{self, Cursor, Read};

/// A reader that refuses to expose `Seek`, standing in for a socket or pipe.
#[derive(Debug)]
pub struct ForwardOnly<R> {
    inner: R,
    bytes_read: usize,
}

impl<R: Read> ForwardOnly<R> {
    /// Wrap a reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            bytes_read: 0,
        }
    }

    /// Number of bytes handed out so far.
    pub fn bytes_read(&self) -> usize {
        self.bytes_read
    }
}

impl ForwardOnly<Cursor<Vec<u8>>> {
    /// Serve a buffer front to back.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::new(Cursor::new(bytes))
    }
}

impl<R: Read> Read for ForwardOnly<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.bytes_read += n;
        Ok(n)
    }
}
