//! Pass-through reader between the tar source and the archive parser.

use std::cell::Cell;
use std::io::{self, Read, Write};

/// Shared state between [`Tee`] and the walk that drives the parser.
#[derive(Debug, Default)]
pub(super) struct Meter {
    budget: Cell<Option<u64>>,
    eof: Cell<bool>,
    write_failed: Cell<bool>,
}

impl Meter {
    /// Allow at most `bytes` more bytes until [`Meter::unlimit`].
    pub fn limit(&self, bytes: u64) {
        self.budget.set(Some(bytes));
    }

    pub fn unlimit(&self) {
        self.budget.set(None);
    }

    /// Map a parser error to the kind callers can act on.
    ///
    /// The tar reader reports every format problem as `ErrorKind::Other`:
    /// those become `UnexpectedEof` once the source ran dry, `InvalidData`
    /// otherwise. Errors from the output writer keep their kind.
    pub fn classify(&self, err: io::Error) -> io::Error {
        if err.kind() != io::ErrorKind::Other || self.write_failed.get() {
            return err;
        }
        let kind = if self.eof.get() {
            io::ErrorKind::UnexpectedEof
        } else {
            io::ErrorKind::InvalidData
        };
        io::Error::new(kind, err)
    }
}

/// Reads from `source`, copying every byte to `out` and counting it.
pub(super) struct Tee<'a, R, W> {
    source: &'a mut R,
    out: W,
    total: u64,
    meter: &'a Meter,
}

impl<'a, R: Read, W: Write> Tee<'a, R, W> {
    pub fn new(source: &'a mut R, out: W, meter: &'a Meter) -> Self {
        Self {
            source,
            out,
            total: 0,
            meter,
        }
    }

    /// Bytes read so far.
    pub fn total(&self) -> u64 {
        self.total
    }
}

impl<R: Read, W: Write> Read for Tee<'_, R, W> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let len = match self.meter.budget.get() {
            Some(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "tar extended headers exceed 1 MiB",
                ));
            }
            Some(budget) => usize::try_from(budget).map_or(buf.len(), |b| b.min(buf.len())),
            None => buf.len(),
        };

        let n = self.source.read(&mut buf[..len])?;
        if n == 0 {
            self.meter.eof.set(true);
            return Ok(0);
        }

        if let Some(budget) = self.meter.budget.get() {
            self.meter.budget.set(Some(budget - n as u64));
        }
        if let Err(err) = self.out.write_all(&buf[..n]) {
            self.meter.write_failed.set(true);
            return Err(err);
        }
        self.total += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copies_and_counts() {
        let meter = Meter::default();
        let mut source: &[u8] = b"some archive bytes";
        let mut out = Vec::new();
        let mut tee = Tee::new(&mut source, &mut out, &meter);

        io::copy(&mut tee, &mut io::sink()).unwrap();
        assert_eq!(tee.total(), 18);
        drop(tee);
        assert_eq!(out, b"some archive bytes");
    }

    #[test]
    fn test_budget_stops_reads() {
        let meter = Meter::default();
        let data = [1u8; 64];
        let mut source = &data[..];
        let mut tee = Tee::new(&mut source, io::sink(), &meter);

        meter.limit(10);
        let mut buf = [0u8; 32];
        assert_eq!(tee.read(&mut buf).unwrap(), 10);
        let err = tee.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        meter.unlimit();
        assert_eq!(tee.read(&mut buf).unwrap(), 32);
    }

    #[test]
    fn test_classify() {
        let meter = Meter::default();
        let other = || io::Error::new(io::ErrorKind::Other, "archive header checksum mismatch");

        assert_eq!(meter.classify(other()).kind(), io::ErrorKind::InvalidData);
        let broken = io::Error::new(io::ErrorKind::BrokenPipe, "gone");
        assert_eq!(meter.classify(broken).kind(), io::ErrorKind::BrokenPipe);

        meter.eof.set(true);
        assert_eq!(meter.classify(other()).kind(), io::ErrorKind::UnexpectedEof);
    }
}
