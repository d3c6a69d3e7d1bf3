//! Error types for sumcheck_core.

use thiserror::Error;

/// Result type alias using sumcheck_core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing digests or summing content.
///
/// Writes into a verifier report failures as plain [`std::io::Error`]s, since
/// that is the contract of [`std::io::Write`].
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred while reading content.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Digest string is malformed.
    #[error("Invalid digest {digest:?}: {reason}")]
    InvalidDigest { digest: String, reason: String },

    /// Hash algorithm is not one we can compute.
    #[error("Unsupported algorithm: {algorithm}")]
    UnsupportedAlgorithm { algorithm: String },

    /// Tarsum version marker is not recognized.
    #[error("Unknown tarsum version: {version}")]
    UnknownTarSumVersion { version: String },
}

impl Error {
    /// Create an InvalidDigest error.
    pub fn invalid_digest(digest: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidDigest {
            digest: digest.into(),
            reason: reason.into(),
        }
    }

    /// Create an UnsupportedAlgorithm error.
    pub fn unsupported_algorithm(algorithm: impl Into<String>) -> Self {
        Error::UnsupportedAlgorithm {
            algorithm: algorithm.into(),
        }
    }

    /// Create an UnknownTarSumVersion error.
    pub fn unknown_tarsum_version(version: impl Into<String>) -> Self {
        Error::UnknownTarSumVersion {
            version: version.into(),
        }
    }
}
