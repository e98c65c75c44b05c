//! Documentation repacking.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::io::Read;
use tar::{Archive, Builder, EntryType, Header};
use tracing::instrument;

/// Path substrings that select a source entry into the documentation
/// archive. A path matching more than one section is still written once.
pub const SECTIONS: [&str; 3] = ["docs/", "openapi/", "crds/"];

/// Directory entries written at the head of every repacked archive, so
/// consumers can unpack into a predictable layout even when a section has
/// no files.
const SECTION_DIRS: [&str; 3] = ["docs", "openapi", "crds"];
const SECTION_DIR_MODE: u32 = 0o700;

/// Filter a version image's tar stream down to its documentation payload.
///
/// Writes the three [section directories](SECTIONS) up front, then copies
/// every regular file whose path contains one of the section substrings,
/// header and body, into an in-memory tar buffer. Entries of any other type
/// (symlinks, devices, ...) are ignored.
///
/// An unreadable individual entry is logged and skipped; an error on the
/// stream itself aborts the whole extraction with
/// [`Io`](crate::error::ErrorKind::Io).
///
/// # Examples
///
/// ```
/// let mut builder = tar::Builder::new(Vec::new());
/// let mut header = tar::Header::new_gnu();
/// header.set_size(5);
/// header.set_mode(0o644);
/// header.set_cksum();
/// builder.append_data(&mut header, "docs/index.md", &b"# hi\n"[..]).unwrap();
/// let source = builder.into_inner().unwrap();
///
/// let repacked = modwatch_archive::repack_docs(source.as_slice()).unwrap();
/// let paths: Vec<String> = tar::Archive::new(repacked.as_slice())
///     .entries()
///     .unwrap()
///     .map(|entry| entry.unwrap().path().unwrap().display().to_string())
///     .collect();
/// assert_eq!(paths, ["docs", "openapi", "crds", "docs/index.md"]);
/// ```
#[instrument(skip(source), fields(copied, output_size))]
pub fn repack_docs(source: impl Read) -> Result<Vec<u8>> {
    let mut archive = Archive::new(source);
    let mut builder = Builder::new(Vec::new());
    for dir in SECTION_DIRS {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Directory);
        header.set_size(0);
        header.set_mode(SECTION_DIR_MODE);
        header.set_cksum();
        builder
            .append_data(&mut header, dir, std::io::empty())
            .or_raise(|| ErrorKind::Io)?;
    }

    let mut copied: u64 = 0;
    for entry in archive.entries().or_raise(|| ErrorKind::Io)? {
        // An error from the iterator itself means the stream is broken;
        // nothing after this point can be trusted.
        let mut entry = entry.or_raise(|| ErrorKind::Io)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = match entry.path() {
            Ok(path) => path.into_owned(),
            Err(err) => {
                tracing::warn!(error = %err, "Skipping tar entry with unreadable path");
                continue;
            },
        };
        if !SECTIONS.iter().any(|section| path.to_string_lossy().contains(section)) {
            continue;
        }
        let mut header = entry.header().clone();
        if let Err(err) = builder.append_data(&mut header, &path, &mut entry) {
            tracing::warn!(path = %path.display(), error = %err, "Skipping unreadable tar entry");
            continue;
        }
        copied += 1;
    }
    tracing::Span::current().record("copied", copied);

    let output = builder.into_inner().or_raise(|| ErrorKind::Io)?;
    tracing::Span::current().record("output_size", output.len());
    Ok(output)
}
