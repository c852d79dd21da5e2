//! The Via header (`spec.md` §3 "Via header", §4.2). Via ordering is
//! load-bearing — the *top* Via identifies the previous hop and carries the
//! branch used for transaction matching (`spec.md` §4.5) — so a request's
//! Via sequence is stored top-first and never reordered by this crate.

use std::fmt;

use crate::error::{Error, Result};
use crate::types::endpoint::TransportProtocol;
use crate::types::param::ParamBag;

/// RFC 3261 §8.1.1.7: every branch this stack generates must start with
/// this magic cookie, and ≥ 64 bits of entropy must follow it.
pub const BRANCH_MAGIC_COOKIE: &str = "z9hG4bK";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Via {
    /// SIP version, always "2.0" on the wire this stack emits, but
    /// preserved verbatim from a parsed message.
    pub version: String,
    pub transport: TransportProtocol,
    pub host: String,
    pub port: Option<u16>,
    pub params: ParamBag,
}

impl Via {
    pub fn new(transport: TransportProtocol, host: impl Into<String>, port: Option<u16>) -> Self {
        Self { version: "2.0".to_string(), transport, host: host.into(), port, params: ParamBag::new() }
    }

    pub fn branch(&self) -> Option<&str> {
        self.params.get_str("branch")
    }

    pub fn set_branch(&mut self, branch: impl Into<String>) {
        self.params.set_value("branch", branch.into());
    }

    /// `true` iff the branch parameter begins with [`BRANCH_MAGIC_COOKIE`]
    /// (RFC 3261 §8.1.1.7 — required for RFC 3261-style transaction
    /// matching).
    pub fn has_rfc3261_branch(&self) -> bool {
        self.branch().map(|b| b.starts_with(BRANCH_MAGIC_COOKIE)).unwrap_or(false)
    }

    pub fn received(&self) -> Option<&str> {
        self.params.get_str("received")
    }

    pub fn set_received(&mut self, addr: impl Into<String>) {
        self.params.set_value("received", addr.into());
    }

    /// RFC 3581 `rport`: `None` if absent, `Some(None)` if present as a bare
    /// flag (client request), `Some(Some(port))` once the server has
    /// stamped the actual source port.
    pub fn rport(&self) -> Option<Option<u16>> {
        self.params.get("rport").map(|v| v.and_then(|s| s.parse().ok()))
    }

    pub fn set_rport(&mut self, port: u16) {
        self.params.set_value("rport", port.to_string());
    }

    pub fn maddr(&self) -> Option<&str> {
        self.params.get_str("maddr")
    }

    pub fn ttl(&self) -> Option<u8> {
        self.params.get_str("ttl").and_then(|s| s.parse().ok())
    }

    /// The (host, port) pair identifying the sender for transaction-key
    /// purposes (RFC 3261 §17.2.3 "sent-by"), defaulting the port to the
    /// transport's default.
    pub fn sent_by(&self) -> (String, u16) {
        (self.host.clone(), self.port.unwrap_or_else(|| self.transport.default_port()))
    }
}

impl fmt::Display for Via {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIP/{} {}", self.version, self.transport.as_str().to_ascii_uppercase())?;
        write!(f, " {}", self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        write!(f, "{}", self.params.serialize(';'))
    }
}

impl std::str::FromStr for Via {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        crate::parser::via::parse_via(s.trim())
            .map(|(_, v)| v)
            .map_err(|e| Error::invalid_header("Via", e.to_string()))
    }
}
