//! Content identifiers of the form `<algorithm>:<hex>`.

use crate::error::{Error, Result};
use crate::hash::Algorithm;
use crate::tarsum::TarSumInfo;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::str::FromStr;

/// A validated content digest, e.g. `sha256:b94d27b9...` or
/// `tarsum.v1+sha256:e3b0c442...`.
///
/// Two digests are equal only if both the algorithm tag and the hex value
/// are identical.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest(String);

impl Digest {
    /// Parse and validate a digest string.
    pub fn parse(s: &str) -> Result<Self> {
        validate(s)?;
        Ok(Digest(s.to_string()))
    }

    /// Build a direct-hash digest from a raw hash value.
    pub fn new(algorithm: Algorithm, hash: &[u8]) -> Self {
        Digest(format!("{}:{}", algorithm.as_str(), hex::encode(hash)))
    }

    /// Wrap an already formatted digest produced by this crate.
    pub(crate) fn from_formatted(s: String) -> Self {
        Digest(s)
    }

    /// Canonical digest of a byte slice.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Algorithm::CANONICAL.hasher();
        hasher.update(data);
        hasher.digest()
    }

    /// Canonical digest of everything a reader yields.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut hasher = Algorithm::CANONICAL.hasher();
        std::io::copy(&mut reader, &mut hasher)?;
        Ok(hasher.digest())
    }

    /// The algorithm tag (everything before the first `:`).
    pub fn algorithm(&self) -> &str {
        self.split().0
    }

    /// The hex-encoded hash value (everything after the first `:`).
    pub fn hex(&self) -> &str {
        self.split().1
    }

    /// The full digest string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn split(&self) -> (&str, &str) {
        self.0.split_once(':').unwrap_or((self.0.as_str(), ""))
    }
}

/// Check the `<algorithm>:<hex>` shape and the hex length for the algorithm.
fn validate(s: &str) -> Result<()> {
    let Some((algorithm, hex)) = s.split_once(':') else {
        return Err(Error::invalid_digest(s, "missing ':' separator"));
    };
    if algorithm.is_empty() {
        return Err(Error::invalid_digest(s, "empty algorithm"));
    }
    if hex.is_empty() {
        return Err(Error::invalid_digest(s, "empty hash value"));
    }
    if !hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return Err(Error::invalid_digest(s, "hash value must be lowercase hex"));
    }

    let hash_algorithm = if algorithm.starts_with("tarsum") {
        TarSumInfo::parse_algorithm(algorithm)?.algorithm
    } else {
        Algorithm::parse(algorithm)?
    };

    if hex.len() != hash_algorithm.size() * 2 {
        return Err(Error::invalid_digest(
            s,
            format!(
                "expected {} hex characters for {}, got {}",
                hash_algorithm.size() * 2,
                hash_algorithm,
                hex.len()
            ),
        ));
    }

    Ok(())
}

impl FromStr for Digest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Digest::parse(s)
    }
}

impl TryFrom<String> for Digest {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        validate(&s)?;
        Ok(Digest(s))
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> Self {
        digest.0
    }
}

impl AsRef<str> for Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.0)
    }
}
