//! Verifier for tarsum digests.
//!
//! [`TarSum`] can only pull bytes from a reader, while verifiers are
//! written to. The two are joined by a synchronous [`pipe`]: writes go into
//! the pipe and a dedicated consumer thread drives the tarsum from the
//! pipe's reading end until the pipe is closed.
//!
//! **Close before asking.** The tarsum is only final once the writer has
//! been closed and the consumer has drained everything. [`Verify::close`]
//! does both, and [`Verify::verified`] answers `false` until it has run.

use super::Verify;
use super::pipe::{PipeWriter, pipe};
use crate::digest::Digest;
use crate::tarsum::{TarSum, TarSumInfo};
use std::io::{self, Write};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// How the consumer thread ended.
#[derive(Debug)]
enum Outcome {
    Summed(Digest),
    Failed { kind: io::ErrorKind, message: String },
}

impl Outcome {
    fn failed(err: &io::Error) -> Self {
        Outcome::Failed {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    fn error(&self) -> Option<io::Error> {
        match self {
            Outcome::Summed(_) => None,
            Outcome::Failed { kind, message } => Some(io::Error::new(*kind, message.clone())),
        }
    }
}

/// Streams written bytes through a tarsum computed on a background thread.
///
/// Writes block until the consumer has taken the bytes. Call
/// [`Verify::close`] once all content is written, then [`Verify::verified`].
/// Dropping the verifier closes it as well, so the consumer thread never
/// outlives its verifier.
#[derive(Debug)]
pub struct TarSumVerifier {
    digest: Digest,
    writer: PipeWriter,
    consumer: Option<JoinHandle<io::Result<Digest>>>,
    outcome: Option<Outcome>,
}

impl TarSumVerifier {
    /// Create a verifier for a tarsum digest and start its consumer.
    ///
    /// # Panics
    ///
    /// Panics if the digest is not a tarsum digest with a known version and
    /// hash algorithm. Digests are expected to have been validated with
    /// [`Digest::parse`].
    #[track_caller]
    pub fn new(digest: Digest) -> Self {
        let info = match TarSumInfo::parse(&digest) {
            Ok(info) => info,
            Err(err) => panic!("tarsum verifier for {}: {}", digest, err),
        };

        let (mut writer, reader) = pipe();
        let mut tarsum = TarSum::for_info(reader, info);

        let spawned = thread::Builder::new()
            .name("tarsum-consumer".to_string())
            .spawn(move || -> io::Result<Digest> {
                tarsum.consume()?;
                Ok(tarsum.digest())
            });

        match spawned {
            Ok(handle) => {
                debug!(digest = %digest, "started tarsum consumer");
                Self {
                    digest,
                    writer,
                    consumer: Some(handle),
                    outcome: None,
                }
            }
            Err(err) => {
                warn!(digest = %digest, error = %err, "failed to start tarsum consumer");
                writer.close();
                Self {
                    digest,
                    writer,
                    consumer: None,
                    outcome: Some(Outcome::failed(&err)),
                }
            }
        }
    }

    /// The digest being verified against.
    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    /// The computed tarsum, available after a successful close.
    pub fn actual(&self) -> Option<&Digest> {
        match &self.outcome {
            Some(Outcome::Summed(sum)) => Some(sum),
            _ => None,
        }
    }

    /// True once the writer is closed and the consumer has exited.
    pub fn is_closed(&self) -> bool {
        self.writer.is_closed() && self.consumer.is_none()
    }

    /// Wait for the consumer thread and record how it ended.
    fn reap(&mut self) {
        let Some(handle) = self.consumer.take() else {
            return;
        };

        let outcome = match handle.join() {
            Ok(Ok(sum)) => Outcome::Summed(sum),
            Ok(Err(err)) => {
                warn!(digest = %self.digest, error = %err, "tarsum consumer failed");
                Outcome::failed(&err)
            }
            Err(_) => {
                warn!(digest = %self.digest, "tarsum consumer panicked");
                Outcome::Failed {
                    kind: io::ErrorKind::Other,
                    message: "tarsum consumer panicked".to_string(),
                }
            }
        };
        self.outcome = Some(outcome);
    }
}

impl Write for TarSumVerifier {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(err) = self.outcome.as_ref().and_then(Outcome::error) {
            return Err(err);
        }

        match self.writer.write(buf) {
            Ok(n) => Ok(n),
            Err(err) if !self.writer.is_closed() => {
                // The consumer went away early; report why.
                self.reap();
                Err(self.outcome.as_ref().and_then(Outcome::error).unwrap_or(err))
            }
            Err(err) => Err(err),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Verify for TarSumVerifier {
    /// `false` until [`Verify::close`] has completed.
    fn verified(&self) -> bool {
        matches!(&self.outcome, Some(Outcome::Summed(sum)) if *sum == self.digest)
    }

    /// Close the writing end and wait for the consumer to finish.
    ///
    /// Returns the consumer's error if the content could not be summed.
    /// Safe to call more than once.
    fn close(&mut self) -> io::Result<()> {
        self.writer.close();
        if self.consumer.is_some() {
            self.reap();
            debug!(
                digest = %self.digest,
                verified = self.verified(),
                "closed tarsum verifier"
            );
        }

        match self.outcome.as_ref().and_then(Outcome::error) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for TarSumVerifier {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tarsum::Version;
    use std::io::Read;
    use std::sync::mpsc;
    use std::time::Duration;

    const EMPTY_TARSUM: &str =
        "tarsum.v1+sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    fn archive(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o600);
            header.set_mtime(1_500_000_000);
            header.set_entry_type(tar::EntryType::Regular);
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn tarsum_digest(data: &[u8], version: Version) -> Digest {
        let mut ts = TarSum::new(data, version);
        ts.consume().unwrap();
        ts.digest()
    }

    #[test]
    fn test_verifies_after_close() {
        let data = archive(&[("etc/hosts", b"127.0.0.1 localhost\n"), ("bin/true", b"")]);
        let mut verifier = TarSumVerifier::new(tarsum_digest(&data, Version::V1));

        verifier.write_all(&data).unwrap();
        verifier.close().unwrap();

        assert!(verifier.is_closed());
        assert!(verifier.verified());
        assert_eq!(verifier.actual(), Some(verifier.digest()));
    }

    #[test]
    fn test_not_verified_before_close() {
        let data = archive(&[("file", b"content")]);
        let mut verifier = TarSumVerifier::new(tarsum_digest(&data, Version::V1));

        verifier.write_all(&data).unwrap();
        assert!(!verifier.verified());
        assert!(verifier.actual().is_none());

        verifier.close().unwrap();
        assert!(verifier.verified());
    }

    #[test]
    fn test_rejects_corrupted_payload() {
        let data = archive(&[("file", b"original content")]);
        let digest = tarsum_digest(&data, Version::V1);

        let corrupted = archive(&[("file", b"0riginal content")]);
        assert_eq!(corrupted.len(), data.len());

        let mut verifier = TarSumVerifier::new(digest);
        verifier.write_all(&corrupted).unwrap();
        verifier.close().unwrap();
        assert!(!verifier.verified());
        assert!(verifier.actual().is_some());
    }

    #[test]
    fn test_byte_at_a_time() {
        let data = archive(&[("a", &[1u8; 1500]), ("b", b"bee")]);
        let mut verifier = TarSumVerifier::new(tarsum_digest(&data, Version::V0));

        for byte in &data {
            verifier.write_all(std::slice::from_ref(byte)).unwrap();
        }
        verifier.close().unwrap();
        assert!(verifier.verified());
    }

    #[test]
    fn test_zero_bytes_then_close() {
        let mut verifier = TarSumVerifier::new(Digest::parse(EMPTY_TARSUM).unwrap());
        verifier.close().unwrap();

        assert!(verifier.is_closed());
        assert!(verifier.verified());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut verifier = TarSumVerifier::new(Digest::parse(EMPTY_TARSUM).unwrap());
        verifier.close().unwrap();
        verifier.close().unwrap();
        assert!(verifier.verified());
    }

    #[test]
    fn test_write_after_close_fails() {
        let mut verifier = TarSumVerifier::new(Digest::parse(EMPTY_TARSUM).unwrap());
        verifier.close().unwrap();

        let err = verifier.write(b"late").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert!(verifier.verified());
    }

    #[test]
    fn test_close_after_partial_write_reaps_consumer() {
        let data = archive(&[("file", b"content")]);
        let mut verifier = TarSumVerifier::new(tarsum_digest(&data, Version::V1));
        verifier.write_all(&data[..700]).unwrap();
        assert!(!verifier.is_closed());

        let err = verifier.close().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(verifier.is_closed());
        assert!(!verifier.verified());
    }

    #[test]
    fn test_drop_without_close_returns() {
        let data = archive(&[("file", b"content")]);
        let digest = tarsum_digest(&data, Version::V1);
        let (done_tx, done_rx) = mpsc::channel();

        thread::spawn(move || {
            let mut verifier = TarSumVerifier::new(digest);
            verifier.write_all(&data[..700]).unwrap();
            drop(verifier);
            done_tx.send(()).unwrap();
        });

        done_rx
            .recv_timeout(Duration::from_secs(10))
            .expect("dropping a verifier mid-stream must not block");
    }

    #[test]
    fn test_invalid_archive_fails_writes() {
        let mut verifier = TarSumVerifier::new(Digest::parse(EMPTY_TARSUM).unwrap());
        let garbage = vec![b'z'; 1024];

        let err = loop {
            if let Err(err) = verifier.write(&garbage) {
                break err;
            }
        };
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let err = verifier.close().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(!verifier.verified());
    }

    #[test]
    fn test_truncated_archive_fails_close() {
        let data = archive(&[("file", &[5u8; 4096])]);
        let mut verifier = TarSumVerifier::new(tarsum_digest(&data, Version::V1));

        verifier.write_all(&data[..2048]).unwrap();
        let err = verifier.close().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(!verifier.verified());
    }

    #[test]
    fn test_reads_from_reader_in_chunks() {
        let data = archive(&[("x", &[3u8; 10_000])]);
        let mut verifier = TarSumVerifier::new(tarsum_digest(&data, Version::Dev));

        let mut reader = &data[..];
        let mut buf = [0u8; 333];
        loop {
            let n = reader.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            verifier.write_all(&buf[..n]).unwrap();
        }
        verifier.close().unwrap();
        assert!(verifier.verified());
    }

    #[test]
    #[should_panic(expected = "tarsum verifier")]
    fn test_direct_digest_panics() {
        TarSumVerifier::new(Digest::from_bytes(b"not a tarsum"));
    }
}
