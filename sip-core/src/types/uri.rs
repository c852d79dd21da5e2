//! SIP/SIPS/tel URI type (`spec.md` §3 "URI", §4.1).
//!
//! ```text
//! scheme:[user[:password]@]host[:port][;uri-params][?headers]
//! ```
//!
//! Comparison follows RFC 3261 §19.1.4: scheme, user, host and port compare
//! case-sensitively on `user`/case-insensitively on `host`/`scheme`, and
//! every URI parameter present on *both* sides must match — parameters
//! present on only one side do not break equality, which is why `Uri` does
//! not derive `PartialEq` naively off its fields but implements it by hand.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::parser::uri::parse_uri;
use crate::types::escape::{percent_decode, percent_encode, PARAM_EXTRA, PASSWORD_EXTRA, USER_EXTRA};
use crate::types::param::ParamBag;

/// URI scheme. `spec.md` §3 restricts this stack to `sip`/`sips`/`tel`, but
/// an unrecognized scheme still parses (as `Custom`) rather than failing,
/// matching the teacher's tolerant `Scheme` type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scheme {
    Sip,
    Sips,
    Tel,
    Custom(String),
}

impl Scheme {
    pub fn as_str(&self) -> &str {
        match self {
            Scheme::Sip => "sip",
            Scheme::Sips => "sips",
            Scheme::Tel => "tel",
            Scheme::Custom(s) => s,
        }
    }

    /// Whether this scheme implies TLS transport by default (`sips`).
    pub fn is_secure(&self) -> bool {
        matches!(self, Scheme::Sips)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "sip" => Scheme::Sip,
            "sips" => Scheme::Sips,
            "tel" => Scheme::Tel,
            _ => Scheme::Custom(s.to_string()),
        })
    }
}

/// The host component of a URI: a domain name or an IP address. IPv6
/// addresses are stored without the `[...]` brackets; those are reapplied on
/// serialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Host {
    Domain(String),
    Address(IpAddr),
}

impl Host {
    pub fn domain(s: impl Into<String>) -> Self {
        Host::Domain(s.into())
    }

    /// Case-insensitive equality for domain names, exact for addresses —
    /// used by the URI comparison rules in RFC 3261 §19.1.4.
    pub fn eq_ci(&self, other: &Host) -> bool {
        match (self, other) {
            (Host::Domain(a), Host::Domain(b)) => a.eq_ignore_ascii_case(b),
            (Host::Address(a), Host::Address(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::Domain(d) => f.write_str(d),
            Host::Address(IpAddr::V4(v4)) => write!(f, "{v4}"),
            Host::Address(IpAddr::V6(v6)) => write!(f, "[{v6}]"),
        }
    }
}

impl FromStr for Host {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        if let Some(inner) = s.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            return inner
                .parse::<IpAddr>()
                .map(Host::Address)
                .map_err(|e| Error::invalid_uri("host", e.to_string()));
        }
        if let Ok(addr) = s.parse::<IpAddr>() {
            return Ok(Host::Address(addr));
        }
        if s.is_empty() {
            return Err(Error::invalid_uri("host", "empty host"));
        }
        Ok(Host::Domain(s.to_string()))
    }
}

/// A fully parsed SIP/SIPS/tel URI (`spec.md` §3/§4.1).
#[derive(Debug, Clone)]
pub struct Uri {
    pub scheme: Scheme,
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Host,
    pub port: Option<u16>,
    pub params: ParamBag,
    pub headers: ParamBag,
}

impl Uri {
    pub fn sip(host: impl Into<String>) -> Self {
        Uri {
            scheme: Scheme::Sip,
            user: None,
            password: None,
            host: Host::domain(host),
            port: None,
            params: ParamBag::new(),
            headers: ParamBag::new(),
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn transport(&self) -> Option<&str> {
        self.params.get_str("transport")
    }

    /// `true` if the `lr` URI parameter (RFC 3261 §19.1.1 loose-routing
    /// marker) is present.
    pub fn is_loose_route(&self) -> bool {
        self.params.contains("lr")
    }
}

impl FromStr for Uri {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        let (rest, uri) = parse_uri(s).map_err(|e| Error::invalid_uri("uri", e.to_string()))?;
        if !rest.is_empty() {
            return Err(Error::invalid_uri("uri", format!("trailing data: {rest:?}")));
        }
        Ok(uri)
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme)?;
        if let Some(user) = &self.user {
            write!(f, "{}", percent_encode(user, USER_EXTRA))?;
            if let Some(password) = &self.password {
                write!(f, ":{}", percent_encode(password, PASSWORD_EXTRA))?;
            }
            write!(f, "@")?;
        }
        write!(f, "{}", self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        write!(f, "{}", self.params.serialize(';'))?;
        if !self.headers.is_empty() {
            // Header params are `&`-joined after a leading `?`, reusing the
            // `;`-delimited serializer and translating the separators.
            let rendered = self.headers.serialize(';');
            write!(f, "?{}", rendered.replacen(';', "", 1).replace(';', "&"))?;
        }
        Ok(())
    }
}

/// RFC 3261 §19.1.4 URI comparison: scheme and host compare
/// case-insensitively, user/password case-sensitively, port defaults to the
/// scheme default when absent, and every parameter present on both sides
/// must match (a parameter present on only one side does not break
/// equality; `transport`, `user`, `method`, `ttl` additionally default when
/// absent on one side per the RFC, which this comparison treats uniformly
/// via plain presence-matching, a conservative subset sufficient for
/// transaction/dialog matching).
impl PartialEq for Uri {
    fn eq(&self, other: &Self) -> bool {
        if self.scheme.as_str().eq_ignore_ascii_case(other.scheme.as_str()) == false {
            return false;
        }
        if self.user != other.user || self.password != other.password {
            return false;
        }
        if !self.host.eq_ci(&other.host) {
            return false;
        }
        let default_port = default_port_for(&self.scheme);
        if self.port.unwrap_or(default_port) != other.port.unwrap_or(default_port) {
            return false;
        }
        for (key, value) in self.params.iter() {
            if let Some(other_value) = other.params.get(key) {
                if value != other_value {
                    return false;
                }
            }
        }
        for (key, value) in other.params.iter() {
            if let Some(self_value) = self.params.get(key) {
                if value != self_value {
                    return false;
                }
            }
        }
        true
    }
}
impl Eq for Uri {}

fn default_port_for(scheme: &Scheme) -> u16 {
    if scheme.is_secure() { 5061 } else { 5060 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_simple_uri() {
        let uri: Uri = "sip:alice@example.com".parse().unwrap();
        assert_eq!(uri.to_string(), "sip:alice@example.com");
    }

    #[test]
    fn round_trips_with_port_and_params() {
        let uri: Uri = "sip:alice@example.com:5060;transport=tcp".parse().unwrap();
        assert_eq!(uri.to_string(), "sip:alice@example.com:5060;transport=tcp");
    }

    #[test]
    fn ipv6_host_keeps_brackets_on_output_only() {
        let uri: Uri = "sip:[2001:db8::1]:5060".parse().unwrap();
        assert!(matches!(uri.host, Host::Address(IpAddr::V6(_))));
        assert_eq!(uri.to_string(), "sip:[2001:db8::1]:5060");
    }

    #[test]
    fn equality_ignores_one_sided_params() {
        let a: Uri = "sip:alice@example.com;transport=tcp".parse().unwrap();
        let b: Uri = "sip:alice@example.com".parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn equality_requires_matching_shared_params() {
        let a: Uri = "sip:alice@example.com;transport=tcp".parse().unwrap();
        let b: Uri = "sip:alice@example.com;transport=udp".parse().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn user_part_percent_round_trips() {
        let uri: Uri = "sip:al%20ice@example.com".parse().unwrap();
        assert_eq!(uri.user.as_deref(), Some("al ice"));
        assert_eq!(uri.to_string(), "sip:al%20ice@example.com");
    }
}
