//! Extension tokens used by Supported/Require/Proxy-Require/Unsupported
//! (`spec.md` §4.2).

use std::fmt;
use std::str::FromStr;

/// Recognized SIP extension tokens. Anything else round-trips as a plain
/// string via [`ExtensionSet`] so an Unsupported response can list exactly
/// what the peer asked for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SipExtension {
    /// `100rel` (RFC 3262 reliable provisional responses).
    Prack,
    /// `norefersub` (RFC 5057 / the no-subscription REFER variant).
    NoReferSub,
    /// `replaces` (RFC 3891).
    Replaces,
}

impl SipExtension {
    pub fn as_token(&self) -> &'static str {
        match self {
            SipExtension::Prack => "100rel",
            SipExtension::NoReferSub => "norefersub",
            SipExtension::Replaces => "replaces",
        }
    }
}

impl fmt::Display for SipExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

impl FromStr for SipExtension {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "100rel" => Ok(SipExtension::Prack),
            "norefersub" => Ok(SipExtension::NoReferSub),
            "replaces" => Ok(SipExtension::Replaces),
            _ => Err(()),
        }
    }
}

/// A comma-separated list of extension tokens (Supported, Require,
/// Proxy-Require, Unsupported). Recognized tokens are kept typed;
/// unrecognized ones are kept verbatim so they can be echoed back in an
/// Unsupported response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionSet {
    pub known: Vec<SipExtension>,
    pub unknown: Vec<String>,
}

impl ExtensionSet {
    pub fn parse(value: &str) -> Self {
        let mut set = ExtensionSet::default();
        for token in value.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            match token.parse::<SipExtension>() {
                Ok(ext) => set.known.push(ext),
                Err(()) => set.unknown.push(token.to_string()),
            }
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty() && self.unknown.is_empty()
    }

    pub fn contains(&self, ext: &SipExtension) -> bool {
        self.known.contains(ext)
    }

    pub fn tokens(&self) -> Vec<String> {
        self.known
            .iter()
            .map(|e| e.as_token().to_string())
            .chain(self.unknown.iter().cloned())
            .collect()
    }
}

impl fmt::Display for ExtensionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tokens_round_trip_for_unsupported_response() {
        let set = ExtensionSet::parse("100rel, gruu, replaces");
        assert_eq!(set.known, vec![SipExtension::Prack, SipExtension::Replaces]);
        assert_eq!(set.unknown, vec!["gruu".to_string()]);
        assert_eq!(set.to_string(), "100rel, replaces, gruu");
    }
}
