//! Selective extraction from module image tar streams.
//!
//! A module image's `extract()` stream is the concatenated filesystem
//! contents of the image as a tar archive. This crate pulls the two things
//! the watcher needs out of such streams:
//!
//! - [`read_version`] finds `version.json` in a release-channel image and
//!   returns the concrete version string it names.
//! - [`repack_docs`] filters a version image down to its documentation,
//!   OpenAPI and CRD files, re-packed as a single in-memory tar buffer
//!   suitable for serving as a documentation payload.
//!
//! Both walk the stream once, front to back, and never buffer the source
//! archive as a whole. Callers own the reader and should run these under
//! `spawn_blocking`; the stream is released when the reader drops.

mod docs;
pub mod error;
mod version;

pub use crate::docs::{SECTIONS, repack_docs};
pub use crate::version::read_version;
