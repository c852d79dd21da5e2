//! Shared enums for digest authentication (`spec.md` §4.4).

use std::fmt;
use std::str::FromStr;

/// Which header a [`super::digest::DigestRecord`] was parsed from or is
/// destined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestKind {
    WwwAuthenticate,
    ProxyAuthenticate,
    Authorization,
    ProxyAuthorization,
}

impl DigestKind {
    pub fn header_name(&self) -> &'static str {
        match self {
            DigestKind::WwwAuthenticate => "WWW-Authenticate",
            DigestKind::ProxyAuthenticate => "Proxy-Authenticate",
            DigestKind::Authorization => "Authorization",
            DigestKind::ProxyAuthorization => "Proxy-Authorization",
        }
    }

    pub fn is_challenge(&self) -> bool {
        matches!(self, DigestKind::WwwAuthenticate | DigestKind::ProxyAuthenticate)
    }

    /// The response header kind a client must use to answer this challenge.
    /// This mapping is asymmetric by design (RFC 2617/7616, see `spec.md`
    /// §9 Open Questions): `ProxyAuthenticate` pairs with
    /// `ProxyAuthorization`, `WWWAuthenticate` pairs with `Authorization` —
    /// both map to the header whose name starts the same way, which reads
    /// as an identity mapping but is really two independent pairings that
    /// happen to share that prefix.
    pub fn response_kind(&self) -> Option<DigestKind> {
        match self {
            DigestKind::WwwAuthenticate => Some(DigestKind::Authorization),
            DigestKind::ProxyAuthenticate => Some(DigestKind::ProxyAuthorization),
            _ => None,
        }
    }
}

/// The digest algorithm selected by the `algorithm` parameter. `SHA256` is
/// accepted as a legacy alias for `SHA-256` (`spec.md` §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Algorithm {
    #[default]
    Md5,
    Sha256,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Md5 => "MD5",
            Algorithm::Sha256 => "SHA-256",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MD5" => Ok(Algorithm::Md5),
            "SHA-256" | "SHA256" => Ok(Algorithm::Sha256),
            _ => Err(()),
        }
    }
}

/// Secret material used to compute HA1: either a plaintext password or a
/// precomputed HA1 (e.g. loaded from a credential store that only keeps the
/// hash). `spec.md` §4.4: "When the caller provides a precomputed HA1
/// directly... that value is used verbatim."
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Secret {
    Password(String),
    PrecomputedHa1(String),
}
