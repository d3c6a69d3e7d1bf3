//! Tarsum: a content sum over the entries of a tar stream.
//!
//! Every entry is hashed as its selected header fields followed by its
//! content. The per-entry hex sums are sorted and hashed again, which makes
//! the result independent of entry order:
//!
//! ```text
//! entry  = H(key1 value1 key2 value2 ... content)
//! tarsum = H(extra || sort(hex(entry_1), ..., hex(entry_n)))
//! ```
//!
//! [`TarSum`] walks the archive with the `tar` crate. [`TarSum::copy_to`]
//! hands every byte it reads on to a writer unchanged.

mod entry;
mod tee;

use crate::digest::Digest;
use crate::error::{Error, Result};
use crate::hash::Algorithm;
use entry::EntryMeta;
use std::fmt;
use std::io::{self, Read, Write};
use tar::Archive;
use tee::{Meter, Tee};

/// Upper bound on the PAX records and GNU long names of one entry.
const EXTENSION_LIMIT: u64 = 1 << 20;

/// Room for the header blocks and block padding around those records.
const HEADER_SLACK: u64 = 8 * 512;

/// Tarsum format versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    /// Original format; hashes mtime.
    V0,
    /// Drops mtime, adds extended attributes.
    V1,
    /// Development version, currently identical to V1.
    Dev,
}

impl Version {
    /// Version marker as used in digests.
    pub fn as_str(&self) -> &'static str {
        match self {
            Version::V0 => "tarsum",
            Version::V1 => "tarsum.v1",
            Version::Dev => "tarsum.dev",
        }
    }

    /// Parse a version marker.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "tarsum" => Ok(Version::V0),
            "tarsum.v1" => Ok(Version::V1),
            "tarsum.dev" => Ok(Version::Dev),
            _ => Err(Error::unknown_tarsum_version(s)),
        }
    }

    /// Version of a tarsum digest such as `tarsum.v1+sha256:...`.
    pub fn from_digest(digest: &Digest) -> Result<Self> {
        let tag = digest.algorithm();
        let marker = tag.split_once('+').map_or(tag, |(version, _)| version);
        Version::parse(marker)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Version and hash algorithm named by a tarsum digest tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TarSumInfo {
    pub version: Version,
    pub algorithm: Algorithm,
}

impl TarSumInfo {
    /// Interpret a digest as a tarsum digest.
    pub fn parse(digest: &Digest) -> Result<Self> {
        Self::parse_algorithm(digest.algorithm())
    }

    /// Interpret an algorithm tag such as `tarsum.v1+sha256`.
    pub fn parse_algorithm(tag: &str) -> Result<Self> {
        let (version, algorithm) = tag
            .split_once('+')
            .ok_or_else(|| Error::invalid_digest(tag, "expected <version>+<hash>"))?;
        Ok(TarSumInfo {
            version: Version::parse(version)?,
            algorithm: Algorithm::parse(algorithm)?,
        })
    }

    /// The algorithm tag, e.g. `tarsum.v1+sha256`.
    pub fn tag(&self) -> String {
        format!("{}+{}", self.version, self.algorithm)
    }
}

/// Sum of a single archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSum {
    /// Lexically cleaned entry path.
    pub name: String,
    /// Hex-encoded entry hash.
    pub sum: String,
    /// Position of the entry in the archive.
    pub position: usize,
}

/// Tarsum over an uncompressed tar stream.
pub struct TarSum<R> {
    source: R,
    version: Version,
    algorithm: Algorithm,
    sums: Vec<FileSum>,
    finished: bool,
}

impl<R: Read> TarSum<R> {
    /// Create a tarsum using SHA-256.
    pub fn new(source: R, version: Version) -> Self {
        Self::with_algorithm(source, version, Algorithm::Sha256)
    }

    /// Create a tarsum with an explicit hash algorithm.
    pub fn with_algorithm(source: R, version: Version, algorithm: Algorithm) -> Self {
        Self {
            source,
            version,
            algorithm,
            sums: Vec::new(),
            finished: false,
        }
    }

    /// Create a tarsum matching a parsed tarsum digest.
    pub fn for_info(source: R, info: TarSumInfo) -> Self {
        Self::with_algorithm(source, info.version, info.algorithm)
    }

    /// Read the stream to its end, writing every byte to `out` unchanged.
    ///
    /// Returns the number of bytes read. Bytes after the end-of-archive
    /// marker are passed on but not hashed. A truncated archive fails with
    /// `UnexpectedEof`, a malformed one with `InvalidData`.
    pub fn copy_to<W: Write>(&mut self, out: W) -> io::Result<u64> {
        if self.finished {
            return Ok(0);
        }

        let meter = Meter::default();
        let mut archive = Archive::new(Tee::new(&mut self.source, out, &meter));
        let walked = walk(
            &mut archive,
            &meter,
            self.version,
            self.algorithm,
            &mut self.sums,
        );
        let mut tee = archive.into_inner();
        if let Err(err) = walked {
            return Err(meter.classify(err));
        }

        io::copy(&mut tee, &mut io::sink())?;
        self.finished = true;
        Ok(tee.total())
    }

    /// Read the stream to its end, discarding the bytes.
    pub fn consume(&mut self) -> io::Result<u64> {
        self.copy_to(io::sink())
    }
}

/// Hash every entry of `archive` into `sums`.
fn walk<R: Read>(
    archive: &mut Archive<R>,
    meter: &Meter,
    version: Version,
    algorithm: Algorithm,
    sums: &mut Vec<FileSum>,
) -> io::Result<()> {
    let mut entries = archive.entries()?;
    loop {
        // Extension records are buffered by the reader while it advances.
        meter.limit(EXTENSION_LIMIT + HEADER_SLACK);
        let next = entries.next();
        meter.unlimit();

        let Some(entry) = next else {
            return Ok(());
        };
        let mut entry = entry?;

        if entry.header().entry_type().is_pax_global_extensions() {
            io::copy(&mut entry, &mut io::sink())?;
            continue;
        }

        let meta = EntryMeta::read(&mut entry)?;
        let mut hasher = algorithm.hasher();
        for (key, value) in meta.selectors(version) {
            hasher.update(key.as_bytes());
            hasher.update(&value);
        }

        let copied = io::copy(&mut entry, &mut hasher)?;
        if copied != meta.size && !entry.header().entry_type().is_gnu_sparse() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "tar stream ended inside entry data",
            ));
        }

        let position = sums.len();
        sums.push(FileSum {
            name: clean_path(&String::from_utf8_lossy(&meta.name)),
            sum: hasher.finalize_hex(),
            position,
        });
    }
}

impl<R> TarSum<R> {
    /// The tarsum version in use.
    pub fn version(&self) -> Version {
        self.version
    }

    /// The hash algorithm in use.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// True once the stream has been read to its end.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Per-entry sums in archive order.
    pub fn sums(&self) -> &[FileSum] {
        &self.sums
    }

    /// Format the tarsum, optionally seeding the final hash with `extra`.
    ///
    /// Only meaningful once [`TarSum::is_finished`] is true.
    pub fn sum(&self, extra: Option<&[u8]>) -> String {
        let mut sums: Vec<&str> = self.sums.iter().map(|f| f.sum.as_str()).collect();
        sums.sort_unstable();

        let mut hasher = self.algorithm.hasher();
        if let Some(extra) = extra {
            hasher.update(extra);
        }
        for sum in sums {
            hasher.update(sum.as_bytes());
        }

        format!(
            "{}+{}:{}",
            self.version,
            self.algorithm,
            hasher.finalize_hex()
        )
    }

    /// The tarsum as a digest.
    pub fn digest(&self) -> Digest {
        Digest::from_formatted(self.sum(None))
    }

    /// Give back the source reader.
    pub fn into_inner(self) -> R {
        self.source
    }
}

impl<R> fmt::Debug for TarSum<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TarSum")
            .field("version", &self.version)
            .field("algorithm", &self.algorithm)
            .field("entries", &self.sums.len())
            .field("finished", &self.finished)
            .finish()
    }
}

/// Lexical path cleanup (`./a//b/../c/` becomes `a/c`).
fn clean_path(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            _ => parts.push(part),
        }
    }

    let joined = parts.join("/");
    if rooted {
        format!("/{}", joined)
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}
