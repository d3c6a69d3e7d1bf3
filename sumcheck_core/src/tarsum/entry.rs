//! Header fields of one archive entry, in the form tarsum hashes them.

use super::Version;
use std::collections::BTreeMap;
use std::io::{self, Read};
use tar::{Entry, Header};

const XATTR_PREFIX: &str = "SCHILY.xattr.";

/// Entry metadata after long names and PAX records were applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(super) struct EntryMeta {
    pub name: Vec<u8>,
    pub mode: u32,
    pub uid: u64,
    pub gid: u64,
    pub size: u64,
    pub mtime: i64,
    pub typeflag: u8,
    pub linkname: Vec<u8>,
    pub uname: Vec<u8>,
    pub gname: Vec<u8>,
    pub devmajor: u32,
    pub devminor: u32,
    pub xattrs: BTreeMap<String, Vec<u8>>,
}

impl EntryMeta {
    /// Collect the metadata of `entry` without touching its content.
    pub fn read<R: Read>(entry: &mut Entry<'_, R>) -> io::Result<Self> {
        let header = entry.header();
        let old = header.as_old();
        let (devmajor, devminor) = device_numbers(header)?;

        let mut meta = EntryMeta {
            name: entry.path_bytes().into_owned(),
            mode: numeric_or_zero(&old.mode, || header.mode())?,
            uid: numeric_or_zero(&old.uid, || header.uid())?,
            gid: numeric_or_zero(&old.gid, || header.gid())?,
            size: entry.size(),
            mtime: mtime(header)?,
            typeflag: old.linkflag[0],
            linkname: entry
                .link_name_bytes()
                .map(|name| name.into_owned())
                .unwrap_or_default(),
            uname: header.username_bytes().unwrap_or_default().to_vec(),
            gname: header.groupname_bytes().unwrap_or_default().to_vec(),
            devmajor,
            devminor,
            xattrs: BTreeMap::new(),
        };

        // Pre-POSIX archives mark regular files with NUL, directories by a
        // trailing slash.
        if meta.typeflag == 0 {
            meta.typeflag = if meta.name.ends_with(b"/") { b'5' } else { b'0' };
        }

        if let Some(extensions) = entry.pax_extensions()? {
            for extension in extensions {
                let extension = extension?;
                let key = extension
                    .key()
                    .map_err(|_| invalid("pax record key is not utf-8"))?;
                let value = extension.value_bytes();
                match key {
                    "uname" => meta.uname = value.to_vec(),
                    "gname" => meta.gname = value.to_vec(),
                    "mtime" => meta.mtime = pax_time(&String::from_utf8_lossy(value))?,
                    _ => {
                        if let Some(name) = key.strip_prefix(XATTR_PREFIX) {
                            meta.xattrs.insert(name.to_string(), value.to_vec());
                        }
                    }
                }
            }
        }

        Ok(meta)
    }

    /// The ordered `(key, value)` pairs hashed ahead of the entry content.
    pub fn selectors(&self, version: Version) -> Vec<(String, Vec<u8>)> {
        let mut selected = vec![
            ("name".to_string(), self.name.clone()),
            ("mode".to_string(), self.mode.to_string().into_bytes()),
            ("uid".to_string(), self.uid.to_string().into_bytes()),
            ("gid".to_string(), self.gid.to_string().into_bytes()),
            ("size".to_string(), self.size.to_string().into_bytes()),
            ("mtime".to_string(), self.mtime.to_string().into_bytes()),
            ("typeflag".to_string(), vec![self.typeflag]),
            ("linkname".to_string(), self.linkname.clone()),
            ("uname".to_string(), self.uname.clone()),
            ("gname".to_string(), self.gname.clone()),
            ("devmajor".to_string(), self.devmajor.to_string().into_bytes()),
            ("devminor".to_string(), self.devminor.to_string().into_bytes()),
        ];

        match version {
            Version::V0 => {}
            Version::V1 | Version::Dev => {
                selected.retain(|(key, _)| key != "mtime");
                selected.extend(
                    self.xattrs
                        .iter()
                        .map(|(key, value)| (key.clone(), value.clone())),
                );
            }
        }

        selected
    }
}

fn invalid(reason: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, reason.into())
}

/// A numeric field left blank (only NUL or spaces) reads as zero.
fn numeric_or_zero<T: Default>(
    raw: &[u8],
    parse: impl FnOnce() -> io::Result<T>,
) -> io::Result<T> {
    if raw.iter().all(|&b| b == 0 || b == b' ') {
        Ok(T::default())
    } else {
        parse()
    }
}

/// Device numbers exist only in ustar and GNU headers.
fn device_numbers(header: &Header) -> io::Result<(u32, u32)> {
    let fields = match (header.as_ustar(), header.as_gnu()) {
        (Some(ustar), _) => Some((&ustar.dev_major, &ustar.dev_minor)),
        (_, Some(gnu)) => Some((&gnu.dev_major, &gnu.dev_minor)),
        _ => None,
    };
    let Some((major, minor)) = fields else {
        return Ok((0, 0));
    };

    Ok((
        numeric_or_zero(major, || {
            header.device_major().map(Option::unwrap_or_default)
        })?,
        numeric_or_zero(minor, || {
            header.device_minor().map(Option::unwrap_or_default)
        })?,
    ))
}

/// Modification time, including the negative base-256 times GNU tar
/// writes for dates before 1970.
fn mtime(header: &Header) -> io::Result<i64> {
    let raw = &header.as_old().mtime;
    if raw[0] & 0x80 == 0 {
        let seconds = numeric_or_zero(raw, || header.mtime())?;
        return i64::try_from(seconds).map_err(|_| invalid("tar mtime out of range"));
    }
    signed_base256(raw).ok_or_else(|| invalid("base-256 tar mtime out of range"))
}

/// Big-endian two's-complement number behind the 0x80 marker bit.
///
/// `None` if the value does not fit an `i64`.
fn signed_base256(field: &[u8]) -> Option<i64> {
    let negative = field.first().is_some_and(|&b| b & 0x40 != 0);
    let flip = if negative { 0xff } else { 0x00 };

    let mut value: u64 = 0;
    for (i, &byte) in field.iter().enumerate() {
        let mut byte = byte ^ flip;
        if i == 0 {
            byte &= 0x7f;
        }
        if value >> 56 != 0 {
            return None;
        }
        value = (value << 8) | u64::from(byte);
    }
    if value >> 63 != 0 {
        return None;
    }

    let value = value as i64;
    Some(if negative { !value } else { value })
}

/// PAX time is `seconds[.fraction]`. Whole seconds round toward negative
/// infinity, so `-0.5` is `-1`.
fn pax_time(value: &str) -> io::Result<i64> {
    let bad = || invalid(format!("invalid pax mtime value: {:?}", value));

    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    let seconds: i64 = whole.parse().map_err(|_| bad())?;

    if whole.starts_with('-') && fraction.bytes().any(|b| b != b'0') {
        seconds.checked_sub(1).ok_or_else(bad)
    } else {
        Ok(seconds)
    }
}
