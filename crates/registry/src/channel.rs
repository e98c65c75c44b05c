use crate::error::{ErrorKind, Result};
use derive_more::Display;
use std::str::FromStr;

/// A named stability lane identifying a rolling pointer to a module version.
///
/// The set is closed: any registry tag outside it is ignored at the source.
/// Variants are declared in stability order (least to most stable), and
/// `Ord` follows declaration order, so sets of channels render
/// deterministically.
///
/// # Examples
///
/// ```
/// use modwatch_registry::ReleaseChannel;
///
/// let channel: ReleaseChannel = "early-access".parse().unwrap();
/// assert_eq!(channel, ReleaseChannel::EarlyAccess);
/// assert_eq!(channel.as_str(), "early-access");
/// assert!("latest".parse::<ReleaseChannel>().is_err());
/// ```
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ReleaseChannel {
    #[display("alpha")]
    Alpha,
    #[display("beta")]
    Beta,
    #[display("early-access")]
    EarlyAccess,
    #[display("rock-solid")]
    RockSolid,
    #[display("stable")]
    Stable,
}

impl ReleaseChannel {
    /// Every known release channel, in stability order.
    pub const ALL: [ReleaseChannel; 5] = [
        ReleaseChannel::Alpha,
        ReleaseChannel::Beta,
        ReleaseChannel::EarlyAccess,
        ReleaseChannel::RockSolid,
        ReleaseChannel::Stable,
    ];

    /// The tag name this channel is published under.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseChannel::Alpha => "alpha",
            ReleaseChannel::Beta => "beta",
            ReleaseChannel::EarlyAccess => "early-access",
            ReleaseChannel::RockSolid => "rock-solid",
            ReleaseChannel::Stable => "stable",
        }
    }
}

impl FromStr for ReleaseChannel {
    type Err = crate::error::Error;

    fn from_str(tag: &str) -> Result<Self> {
        match tag {
            "alpha" => Ok(ReleaseChannel::Alpha),
            "beta" => Ok(ReleaseChannel::Beta),
            "early-access" => Ok(ReleaseChannel::EarlyAccess),
            "rock-solid" => Ok(ReleaseChannel::RockSolid),
            "stable" => Ok(ReleaseChannel::Stable),
            other => exn::bail!(ErrorKind::InvalidChannel(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("alpha", ReleaseChannel::Alpha)]
    #[case("beta", ReleaseChannel::Beta)]
    #[case("early-access", ReleaseChannel::EarlyAccess)]
    #[case("rock-solid", ReleaseChannel::RockSolid)]
    #[case("stable", ReleaseChannel::Stable)]
    fn parse_known_tags(#[case] tag: &str, #[case] expected: ReleaseChannel) {
        assert_eq!(tag.parse::<ReleaseChannel>().unwrap(), expected);
        assert_eq!(expected.to_string(), tag);
        assert_eq!(expected.as_str(), tag);
    }

    #[rstest]
    #[case("latest")]
    #[case("v1.2.3")]
    #[case("Alpha")]
    #[case("")]
    fn reject_unknown_tags(#[case] tag: &str) {
        assert!(tag.parse::<ReleaseChannel>().is_err());
    }

    #[test]
    fn ordered_by_stability() {
        let mut shuffled = [
            ReleaseChannel::Stable,
            ReleaseChannel::Alpha,
            ReleaseChannel::RockSolid,
            ReleaseChannel::Beta,
            ReleaseChannel::EarlyAccess,
        ];
        shuffled.sort();
        assert_eq!(shuffled, ReleaseChannel::ALL);
    }
}
