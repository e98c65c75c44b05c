use crate::error::{ErrorKind, Result};
use derive_more::Display;
use std::str::FromStr;

/// Opaque content identifier of an image, shaped `algorithm:hex`.
///
/// Equality is string equality over the full representation. Two images
/// with equal digests are byte-identical, which is what lets the scanner
/// short-circuit work for unchanged release channels.
///
/// # Examples
///
/// ```
/// use modwatch_registry::Digest;
///
/// let digest: Digest = "sha256:a3f5c9021b44".parse().unwrap();
/// assert_eq!(digest.algorithm(), "sha256");
/// assert!("not-a-digest".parse::<Digest>().is_err());
/// ```
#[derive(Clone, Debug, Display, Eq, Hash, PartialEq)]
#[display("{_0}")]
pub struct Digest(String);

impl Digest {
    /// The full `algorithm:hex` representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The algorithm prefix (everything before the colon).
    pub fn algorithm(&self) -> &str {
        // Parse guarantees the separator is present.
        self.0.split_once(':').map(|(algorithm, _)| algorithm).unwrap_or_default()
    }
}

impl FromStr for Digest {
    type Err = crate::error::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let Some((algorithm, hex)) = raw.split_once(':') else {
            exn::bail!(ErrorKind::InvalidDigest(raw.to_string()));
        };
        if algorithm.is_empty() || !algorithm.bytes().all(|b| b.is_ascii_alphanumeric()) {
            exn::bail!(ErrorKind::InvalidDigest(raw.to_string()));
        }
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            exn::bail!(ErrorKind::InvalidDigest(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }
}
