//! `SIPEndPoint`: an immutable `(protocol, addr, port, channel-id,
//! connection-id)` tuple used to address channels and describe where a
//! message was sent from or received on (`spec.md` §3, §6 "Endpoint
//! serialization").

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::types::uri::Uri;

/// The five transports this stack speaks. Default ports per `spec.md` §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportProtocol {
    Udp,
    Tcp,
    Tls,
    Ws,
    Wss,
}

impl TransportProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportProtocol::Udp => "udp",
            TransportProtocol::Tcp => "tcp",
            TransportProtocol::Tls => "tls",
            TransportProtocol::Ws => "ws",
            TransportProtocol::Wss => "wss",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            TransportProtocol::Udp | TransportProtocol::Tcp => 5060,
            TransportProtocol::Tls => 5061,
            TransportProtocol::Ws => 80,
            TransportProtocol::Wss => 443,
        }
    }

    /// Stream-oriented transports require connection identity tracking;
    /// UDP does not (`spec.md` §4.6 channel contract "connection-oriented").
    pub fn is_connection_oriented(&self) -> bool {
        !matches!(self, TransportProtocol::Udp)
    }

    pub fn is_secure(&self) -> bool {
        matches!(self, TransportProtocol::Tls | TransportProtocol::Wss)
    }
}

impl fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportProtocol {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "udp" => TransportProtocol::Udp,
            "tcp" => TransportProtocol::Tcp,
            "tls" => TransportProtocol::Tls,
            "ws" => TransportProtocol::Ws,
            "wss" => TransportProtocol::Wss,
            other => return Err(Error::Malformed(format!("unknown transport protocol: {other}"))),
        })
    }
}

/// An opaque identifier for a registered listening channel.
pub type ChannelId = String;
/// An opaque identifier for a specific connection on a connection-oriented
/// channel (TCP/TLS/WS), used so a response can be sent back down the exact
/// socket a request arrived on.
pub type ConnectionId = String;

/// `proto:ip:port[;cid=...;xid=...]` (`spec.md` §3/§6).
///
/// Equality considers all five fields: two endpoints with the same
/// protocol/IP/port but different channel or connection IDs are distinct,
/// since they name different sockets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SipEndpoint {
    pub protocol: TransportProtocol,
    pub addr: IpAddr,
    pub port: u16,
    pub channel_id: Option<ChannelId>,
    pub connection_id: Option<ConnectionId>,
}

impl SipEndpoint {
    pub fn new(protocol: TransportProtocol, addr: IpAddr, port: u16) -> Self {
        Self { protocol, addr, port, channel_id: None, connection_id: None }
    }

    pub fn with_channel_id(mut self, id: impl Into<ChannelId>) -> Self {
        self.channel_id = Some(id.into());
        self
    }

    pub fn with_connection_id(mut self, id: impl Into<ConnectionId>) -> Self {
        self.connection_id = Some(id.into());
        self
    }

    pub fn socket_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::new(self.addr, self.port)
    }

    /// Whether `addr` is the IPv4/IPv6 "any" sentinel (`0.0.0.0` / `::`),
    /// used by the header-fixup rules in `spec.md` §4.6.
    pub fn is_any(&self) -> bool {
        self.addr.is_unspecified()
    }
}

impl fmt::Display for SipEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.protocol, self.addr, self.port)?;
        if let Some(cid) = &self.channel_id {
            write!(f, ";cid={cid}")?;
        }
        if let Some(xid) = &self.connection_id {
            write!(f, ";xid={xid}")?;
        }
        Ok(())
    }
}

impl FromStr for SipEndpoint {
    type Err = Error;

    /// Accepts both the serialized `proto:addr:port[;cid=...;xid=...]` form
    /// and a relaxed SIP URI (`sip:host:port;transport=proto`), per
    /// `spec.md` §4.1.
    fn from_str(s: &str) -> Result<Self> {
        if let Some((head, rest)) = s.split_once(':') {
            if let Ok(protocol) = head.parse::<TransportProtocol>() {
                return parse_serialized(protocol, rest);
            }
        }
        parse_as_uri(s)
    }
}

fn parse_serialized(protocol: TransportProtocol, rest: &str) -> Result<SipEndpoint> {
    let mut parts = rest.splitn(2, ';');
    let addr_port = parts.next().unwrap_or_default();
    let params = parts.next();

    let (addr_str, port_str) = addr_port
        .rsplit_once(':')
        .ok_or_else(|| Error::Malformed(format!("endpoint missing port: {addr_port:?}")))?;
    let addr: IpAddr = addr_str
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse()
        .map_err(|e: std::net::AddrParseError| Error::Malformed(e.to_string()))?;
    let port: u16 = port_str
        .parse()
        .map_err(|_| Error::Malformed(format!("invalid port: {port_str:?}")))?;

    let mut endpoint = SipEndpoint::new(protocol, addr, port);
    if let Some(params) = params {
        for pair in params.split(';') {
            if let Some((k, v)) = pair.split_once('=') {
                match k {
                    "cid" => endpoint.channel_id = Some(v.to_string()),
                    "xid" => endpoint.connection_id = Some(v.to_string()),
                    _ => {}
                }
            }
        }
    }
    Ok(endpoint)
}

fn parse_as_uri(s: &str) -> Result<SipEndpoint> {
    let uri: Uri = s.parse()?;
    let protocol = uri
        .transport()
        .and_then(|t| t.parse().ok())
        .unwrap_or(if uri.scheme.is_secure() { TransportProtocol::Tls } else { TransportProtocol::Udp });
    let host_str = uri.host.to_string();
    let addr: IpAddr = host_str
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse()
        .map_err(|_| Error::Malformed(format!("endpoint host is not an address: {host_str:?}")))?;
    let port = uri.port.unwrap_or_else(|| protocol.default_port());
    Ok(SipEndpoint::new(protocol, addr, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_serialized_form() {
        let s = "udp:1.2.3.4:5060;cid=chan-1;xid=conn-1";
        let ep: SipEndpoint = s.parse().unwrap();
        assert_eq!(ep.protocol, TransportProtocol::Udp);
        assert_eq!(ep.channel_id.as_deref(), Some("chan-1"));
        assert_eq!(ep.to_string(), s);
    }

    #[test]
    fn parses_without_optional_ids() {
        let ep: SipEndpoint = "tcp:192.168.0.1:5060".parse().unwrap();
        assert_eq!(ep.to_string(), "tcp:192.168.0.1:5060");
    }

    #[test]
    fn equality_considers_all_five_fields() {
        let a: SipEndpoint = "udp:1.2.3.4:5060;cid=a".parse().unwrap();
        let b: SipEndpoint = "udp:1.2.3.4:5060;cid=b".parse().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn parses_relaxed_sip_uri_form() {
        let ep: SipEndpoint = "sip:192.168.0.5:5061;transport=tls".parse().unwrap();
        assert_eq!(ep.protocol, TransportProtocol::Tls);
        assert_eq!(ep.port, 5061);
    }
}
