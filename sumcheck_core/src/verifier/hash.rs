//! Verifier backed by a direct hash function.

use super::Verify;
use crate::digest::Digest;
use crate::hash::{Algorithm, Hasher};
use std::io::{self, Write};

/// Feeds written bytes into a hasher and compares the resulting digest
/// with the expected one.
///
/// `verified` can be asked at any time; it reflects everything written so
/// far and later writes keep accumulating.
#[derive(Debug, Clone)]
pub struct HashVerifier {
    digest: Digest,
    hasher: Hasher,
}

impl HashVerifier {
    /// Create a verifier for a direct-hash digest.
    ///
    /// # Panics
    ///
    /// Panics if the digest's algorithm is not a supported hash algorithm.
    /// Digests are expected to have been validated with [`Digest::parse`].
    #[track_caller]
    pub fn new(digest: Digest) -> Self {
        let algorithm = match Algorithm::parse(digest.algorithm()) {
            Ok(algorithm) => algorithm,
            Err(err) => panic!("hash verifier for {}: {}", digest, err),
        };
        Self {
            hasher: algorithm.hasher(),
            digest,
        }
    }

    /// The digest being verified against.
    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    pub fn algorithm(&self) -> Algorithm {
        self.hasher.algorithm()
    }

    /// Digest of everything written so far.
    pub fn actual(&self) -> Digest {
        self.hasher.digest()
    }
}

impl Write for HashVerifier {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hasher.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Verify for HashVerifier {
    fn verified(&self) -> bool {
        // Compare complete digests rather than raw hash bytes.
        self.hasher.digest() == self.digest
    }
}
