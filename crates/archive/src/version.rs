//! Version resolution from release-channel images.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tar::Archive;
use tracing::instrument;

/// Shape of the `version.json` file inside a release-channel image.
#[derive(Debug, Deserialize)]
struct VersionFile {
    #[serde(default)]
    version: String,
}

/// Resolve the concrete version a release-channel image points at.
///
/// Walks the image's tar stream for the first regular file named
/// `version.json` and returns the non-empty `version` string it carries.
/// Fails with [`VersionMissing`](crate::error::ErrorKind::VersionMissing)
/// if the stream ends without such a file, or if the field is empty: a
/// channel without a resolvable version must not advance.
///
/// # Examples
///
/// ```
/// let mut builder = tar::Builder::new(Vec::new());
/// let body = br#"{"version": "1.44.2"}"#;
/// let mut header = tar::Header::new_gnu();
/// header.set_size(body.len() as u64);
/// header.set_mode(0o644);
/// header.set_cksum();
/// builder.append_data(&mut header, "version.json", &body[..]).unwrap();
/// let image = builder.into_inner().unwrap();
///
/// assert_eq!(modwatch_archive::read_version(image.as_slice()).unwrap(), "1.44.2");
/// ```
#[instrument(skip(source), fields(version))]
pub fn read_version(source: impl Read) -> Result<String> {
    let mut archive = Archive::new(source);
    for entry in archive.entries().or_raise(|| ErrorKind::Io)? {
        let mut entry = entry.or_raise(|| ErrorKind::Io)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = match entry.path() {
            Ok(path) => path.into_owned(),
            Err(_) => continue,
        };
        // Tolerate a `./` prefix; some builders emit one.
        let name = path.strip_prefix(".").unwrap_or(path.as_path());
        if name != Path::new("version.json") {
            continue;
        }
        let parsed: VersionFile = serde_json::from_reader(&mut entry).or_raise(|| ErrorKind::InvalidData)?;
        if parsed.version.is_empty() {
            exn::bail!(ErrorKind::VersionMissing);
        }
        tracing::Span::current().record("version", parsed.version.as_str());
        return Ok(parsed.version);
    }
    exn::bail!(ErrorKind::VersionMissing)
}
