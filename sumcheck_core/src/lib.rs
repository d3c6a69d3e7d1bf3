//! # Sumcheck Core
//!
//! Streaming verification of content against an expected digest or length.
//!
//! Content is written to a verifier in chunks of any size, in order. Once
//! everything has been written and the verifier closed, it answers whether
//! the content matched.
//!
//! ## Features
//!
//! - Direct hash digests: md5, sha1, sha256, sha384, sha512 and blake3
//! - Tarsum digests (`tarsum`, `tarsum.v1`, `tarsum.dev`) over tar streams
//! - Exact byte-count verification
//! - A factory picking the right verifier from a digest
//!
//! ## Example
//!
//! ```
//! use sumcheck_core::{Digest, Verifier, Verify};
//! use std::io::Write;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let expected = Digest::parse(
//!     "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9",
//! )?;
//!
//! let mut verifier = Verifier::for_digest(&expected);
//! verifier.write_all(b"hello ")?;
//! verifier.write_all(b"world")?;
//! verifier.close()?;
//!
//! assert!(verifier.verified());
//! # Ok(())
//! # }
//! ```

mod digest;
mod error;
mod hash;
mod tarsum;
mod verifier;

pub use digest::Digest;
pub use error::{Error, Result};
pub use hash::{Algorithm, Hasher};
pub use tarsum::{FileSum, TarSum, TarSumInfo, Version};
pub use verifier::{
    HashVerifier, LengthVerifier, TarSumVerifier, Verifier, VerifierKind, Verify, verify_reader,
};
