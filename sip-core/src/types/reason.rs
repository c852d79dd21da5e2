//! The Reason header (RFC 3326): `Reason: SIP ;cause=487;text="..."`.
//! Used to carry the reason a CANCEL or BYE terminated a call.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::parser::params::parse_params;
use crate::types::param::ParamBag;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reason {
    pub protocol: String,
    pub params: ParamBag,
}

impl Reason {
    pub fn cause(&self) -> Option<u16> {
        self.params.get_str("cause").and_then(|s| s.parse().ok())
    }

    pub fn text(&self) -> Option<&str> {
        self.params.get_str("text")
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.protocol, self.params.serialize(';').trim_start_matches(';'))
    }
}

impl FromStr for Reason {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (protocol, rest) = s
            .split_once(|c: char| c == ';' || c.is_whitespace())
            .ok_or_else(|| Error::invalid_header("Reason", "missing protocol"))?;
        let rest = rest.trim_start();
        let rest = if rest.starts_with(';') { rest.to_string() } else { format!(";{rest}") };
        let (_, params) = parse_params(&rest, ';').map_err(|e| Error::invalid_header("Reason", e.to_string()))?;
        Ok(Reason { protocol: protocol.to_string(), params })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cause_and_text() {
        let r: Reason = "SIP ;cause=487;text=\"Request Terminated\"".parse().unwrap();
        assert_eq!(r.protocol, "SIP");
        assert_eq!(r.cause(), Some(487));
        assert_eq!(r.text(), Some("Request Terminated"));
    }
}
