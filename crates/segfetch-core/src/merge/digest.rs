//! SHA-256 of the merged artifact, computed while it is written.
//!
//! Reported to the operator only; nothing compares it against anything.

use sha2::{Digest, Sha256};
use std::io::{self, Write};

/// Writer that forwards to `inner` and hashes every byte accepted.
pub(super) struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
    written: u64,
}

impl<W: Write> HashingWriter<W> {
    pub(super) fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            written: 0,
        }
    }

    pub(super) fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Returns the inner writer and the lowercase hex digest.
    pub(super) fn finish(self) -> (W, String) {
        (self.inner, hex::encode(self.hasher.finalize()))
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
