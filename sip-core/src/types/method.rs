//! SIP request methods and the CSeq header (`spec.md` §3, §4.2).

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A SIP request method. Unknown methods round-trip through
/// [`Method::Unknown`] rather than failing to parse — a proxy must be able
/// to forward methods it has never heard of.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Invite,
    Ack,
    Bye,
    Cancel,
    Options,
    Register,
    Prack,
    Subscribe,
    Notify,
    Publish,
    Info,
    Refer,
    Message,
    Update,
    Unknown(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::Invite => "INVITE",
            Method::Ack => "ACK",
            Method::Bye => "BYE",
            Method::Cancel => "CANCEL",
            Method::Options => "OPTIONS",
            Method::Register => "REGISTER",
            Method::Prack => "PRACK",
            Method::Subscribe => "SUBSCRIBE",
            Method::Notify => "NOTIFY",
            Method::Publish => "PUBLISH",
            Method::Info => "INFO",
            Method::Refer => "REFER",
            Method::Message => "MESSAGE",
            Method::Update => "UPDATE",
            Method::Unknown(s) => s,
        }
    }

    /// Whether this method creates a dialog-establishing transaction that
    /// follows the INVITE client/server state machines (`spec.md` §4.5):
    /// only INVITE itself — CANCEL and ACK are handled by dedicated paths.
    pub fn is_invite_like(&self) -> bool {
        matches!(self, Method::Invite)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "INVITE" => Method::Invite,
            "ACK" => Method::Ack,
            "BYE" => Method::Bye,
            "CANCEL" => Method::Cancel,
            "OPTIONS" => Method::Options,
            "REGISTER" => Method::Register,
            "PRACK" => Method::Prack,
            "SUBSCRIBE" => Method::Subscribe,
            "NOTIFY" => Method::Notify,
            "PUBLISH" => Method::Publish,
            "INFO" => Method::Info,
            "REFER" => Method::Refer,
            "MESSAGE" => Method::Message,
            "UPDATE" => Method::Update,
            other => Method::Unknown(other.to_string()),
        })
    }
}

/// `CSeq: <number> SP <method>` (`spec.md` §3 invariant: CSeq ≥ 0 when
/// present).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CSeq {
    pub sequence: u32,
    pub method: Method,
}

impl CSeq {
    pub fn new(sequence: u32, method: Method) -> Self {
        Self { sequence, method }
    }
}

impl fmt::Display for CSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.sequence, self.method)
    }
}

impl FromStr for CSeq {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.trim().splitn(2, char::is_whitespace);
        let seq = parts.next().ok_or_else(|| Error::invalid_header("CSeq", "missing sequence number"))?;
        let method = parts.next().ok_or_else(|| Error::invalid_header("CSeq", "missing method"))?;
        let sequence = seq.trim().parse().map_err(|e| Error::InvalidInteger { field: "CSeq".into(), source: e })?;
        Ok(CSeq { sequence, method: method.trim().parse()? })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_and_unknown_methods() {
        assert_eq!("INVITE".parse::<Method>().unwrap(), Method::Invite);
        assert_eq!("WIBBLE".parse::<Method>().unwrap(), Method::Unknown("WIBBLE".into()));
    }

    #[test]
    fn cseq_round_trips() {
        let cseq: CSeq = "314159 INVITE".parse().unwrap();
        assert_eq!(cseq.sequence, 314159);
        assert_eq!(cseq.to_string(), "314159 INVITE");
    }
}
