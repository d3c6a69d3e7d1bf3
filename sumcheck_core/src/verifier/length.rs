//! Verifier that only counts bytes.

use super::Verify;
use std::io::{self, Write};

/// Verified when exactly `expected` bytes were written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthVerifier {
    expected: u64,
    written: u64,
}

impl LengthVerifier {
    pub fn new(expected: u64) -> Self {
        Self {
            expected,
            written: 0,
        }
    }

    pub fn expected(&self) -> u64 {
        self.expected
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl Write for LengthVerifier {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written = self.written.saturating_add(buf.len() as u64);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Verify for LengthVerifier {
    fn verified(&self) -> bool {
        self.written == self.expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_length() {
        let mut verifier = LengthVerifier::new(11);
        verifier.write_all(b"hello world").unwrap();
        assert!(verifier.verified());
        assert_eq!(verifier.written(), 11);
    }

    #[test]
    fn test_short_and_long() {
        let mut short = LengthVerifier::new(11);
        short.write_all(b"hello worl").unwrap();
        assert!(!short.verified());

        let mut long = LengthVerifier::new(11);
        long.write_all(b"hello world!").unwrap();
        assert!(!long.verified());
    }

    #[test]
    fn test_zero_length() {
        let mut verifier = LengthVerifier::new(0);
        assert!(verifier.verified());

        verifier.write_all(b"").unwrap();
        assert!(verifier.verified());

        verifier.write_all(b"x").unwrap();
        assert!(!verifier.verified());
    }

    #[test]
    fn test_byte_at_a_time() {
        let data = vec![0xabu8; 300];
        let mut verifier = LengthVerifier::new(data.len() as u64);
        for byte in &data {
            verifier.write_all(std::slice::from_ref(byte)).unwrap();
        }
        assert!(verifier.verified());
        assert_eq!(verifier.expected(), 300);
    }
}
