//! Streaming verifiers.
//!
//! A verifier is written to like any [`std::io::Write`] sink and answers,
//! once all content went through, whether that content matches what was
//! expected:
//!
//! - [`HashVerifier`]: a direct hash digest (`sha256:...`, `md5:...`).
//! - [`TarSumVerifier`]: a tarsum digest (`tarsum.v1+sha256:...`).
//! - [`LengthVerifier`]: an exact byte count.
//!
//! [`Verifier`] wraps all three and is what callers normally hold.
//! Always [`Verify::close`] a verifier before reading [`Verify::verified`];
//! for tarsum digests the answer is not available earlier.

mod hash;
mod length;
mod pipe;
mod tarsum;

pub use hash::HashVerifier;
pub use length::LengthVerifier;
pub use tarsum::TarSumVerifier;

use crate::digest::Digest;
use crate::hash::Algorithm;
use std::fmt;
use std::io::{self, Read, Write};

/// Common capability of all verifiers.
pub trait Verify: Write {
    /// Whether the content written so far matches the expectation.
    ///
    /// Repeated calls without intervening writes give the same answer.
    fn verified(&self) -> bool;

    /// Signal that no more content follows and release any resources.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The kinds of verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifierKind {
    Hash,
    Length,
    TarSum,
}

impl fmt::Display for VerifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VerifierKind::Hash => "hash",
            VerifierKind::Length => "length",
            VerifierKind::TarSum => "tarsum",
        })
    }
}

/// Any verifier.
#[derive(Debug)]
pub enum Verifier {
    Hash(HashVerifier),
    Length(LengthVerifier),
    TarSum(TarSumVerifier),
}

impl Verifier {
    /// Pick the verifier for a digest.
    ///
    /// Direct hash algorithms get a [`HashVerifier`]; every other digest is
    /// taken to be a tarsum and gets a [`TarSumVerifier`].
    ///
    /// # Panics
    ///
    /// Panics if the digest is neither. Validate untrusted input with
    /// [`Digest::parse`] first; a [`Digest`] obtained that way never panics
    /// here.
    #[track_caller]
    pub fn for_digest(digest: &Digest) -> Self {
        if Algorithm::parse(digest.algorithm()).is_ok() {
            Verifier::Hash(HashVerifier::new(digest.clone()))
        } else {
            Verifier::TarSum(TarSumVerifier::new(digest.clone()))
        }
    }

    /// A verifier expecting exactly `expected` bytes.
    pub fn for_length(expected: u64) -> Self {
        Verifier::Length(LengthVerifier::new(expected))
    }

    pub fn kind(&self) -> VerifierKind {
        match self {
            Verifier::Hash(_) => VerifierKind::Hash,
            Verifier::Length(_) => VerifierKind::Length,
            Verifier::TarSum(_) => VerifierKind::TarSum,
        }
    }

    /// The digest computed from the content, where one exists.
    ///
    /// Tarsum verifiers only have one after a successful close.
    pub fn actual(&self) -> Option<Digest> {
        match self {
            Verifier::Hash(v) => Some(v.actual()),
            Verifier::Length(_) => None,
            Verifier::TarSum(v) => v.actual().cloned(),
        }
    }
}

impl Write for Verifier {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Verifier::Hash(v) => v.write(buf),
            Verifier::Length(v) => v.write(buf),
            Verifier::TarSum(v) => v.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Verifier::Hash(v) => v.flush(),
            Verifier::Length(v) => v.flush(),
            Verifier::TarSum(v) => v.flush(),
        }
    }
}

impl Verify for Verifier {
    fn verified(&self) -> bool {
        match self {
            Verifier::Hash(v) => v.verified(),
            Verifier::Length(v) => v.verified(),
            Verifier::TarSum(v) => v.verified(),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        match self {
            Verifier::Hash(v) => v.close(),
            Verifier::Length(v) => v.close(),
            Verifier::TarSum(v) => v.close(),
        }
    }
}

/// Stream `reader` through the verifier for `digest`.
///
/// The verifier is closed on every path. Read errors, and tarsum content
/// that is not a readable tar stream, are returned as errors.
pub fn verify_reader<R: Read>(digest: &Digest, mut reader: R) -> io::Result<bool> {
    let mut verifier = Verifier::for_digest(digest);
    io::copy(&mut reader, &mut verifier)?;
    verifier.close()?;
    Ok(verifier.verified())
}
