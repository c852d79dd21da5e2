//! Send-time header fixups (`spec.md` §4.6 "Header fixups at send time").
//!
//! Applied to a request or response's top Via, From and (single) Contact
//! immediately before serialization, once the outbound channel is known.

use std::net::IpAddr;

use sip_core::prelude::{Contact, HeaderBlock, Host, SipEndpoint, TransportProtocol};

/// Rewrites `headers` in place for sending `body_len` bytes of body out
/// `channel_local` on `channel_transport`, per the four header rules plus
/// the Content-Length rule in `spec.md` §4.6. `public_contact_host`, when
/// set, is the fallback documented for the single-Contact rule
/// (`TransportConfig::public_contact_host`).
pub fn apply_send_fixups(
    headers: &mut HeaderBlock,
    channel_local: &SipEndpoint,
    channel_transport: TransportProtocol,
    public_contact_host: Option<&str>,
    body_len: usize,
) {
    if let Some(via) = headers.top_via_mut() {
        if is_any_host_str(&via.host) {
            via.host = channel_local.addr.to_string();
            via.port = Some(channel_local.port);
        }
        if via.transport != channel_transport {
            via.transport = channel_transport;
        }
    }

    if let Some(from) = &mut headers.from {
        if is_any_host(&from.uri.host) {
            from.uri.host = Host::Address(channel_local.addr);
            from.uri.port = Some(channel_local.port);
        }
    }

    if headers.contacts.len() == 1 {
        if let Contact::Address(addr) = &mut headers.contacts[0] {
            if is_any_host(&addr.uri.host) {
                match public_contact_host {
                    Some(public_host) => {
                        addr.uri.host = public_host
                            .parse::<IpAddr>()
                            .map(Host::Address)
                            .unwrap_or_else(|_| Host::domain(public_host));
                    }
                    None => {
                        addr.uri.host = Host::Address(channel_local.addr);
                        addr.uri.port = Some(channel_local.port);
                    }
                }
                if channel_transport != TransportProtocol::Udp {
                    addr.uri.params.set_value("transport", channel_transport.as_str());
                }
            }
        }
    }

    headers.set_content_length(body_len);
}

fn is_any_host(host: &Host) -> bool {
    match host {
        Host::Address(addr) => addr.is_unspecified(),
        Host::Domain(d) => is_any_host_str(d),
    }
}

fn is_any_host_str(s: &str) -> bool {
    s == "0.0.0.0" || s == "::" || s.starts_with("0.0.0.0") || s.starts_with("::")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sip_core::prelude::{Uri, UserField, Via};
    use std::net::Ipv4Addr;

    fn sample_headers() -> HeaderBlock {
        let mut headers = HeaderBlock::new();
        headers.via.push(Via::new(TransportProtocol::Udp, "0.0.0.0", Some(0)));
        headers.from = Some(UserField::new(Uri::sip("0.0.0.0")));
        headers.contacts.push(Contact::Address(UserField::new(Uri::sip("0.0.0.0").with_port(0))));
        headers
    }

    #[test]
    fn rewrites_any_via_host_to_the_channel_endpoint() {
        let mut headers = sample_headers();
        let local = SipEndpoint::new(TransportProtocol::Udp, Ipv4Addr::new(192, 0, 2, 5).into(), 5060);
        apply_send_fixups(&mut headers, &local, TransportProtocol::Udp, None, 0);
        let via = headers.top_via().unwrap();
        assert_eq!(via.host, "192.0.2.5");
        assert_eq!(via.port, Some(5060));
    }

    #[test]
    fn rewrites_via_transport_to_match_the_sending_channel() {
        let mut headers = sample_headers();
        let local = SipEndpoint::new(TransportProtocol::Tcp, Ipv4Addr::new(192, 0, 2, 5).into(), 5060);
        apply_send_fixups(&mut headers, &local, TransportProtocol::Tcp, None, 0);
        assert_eq!(headers.top_via().unwrap().transport, TransportProtocol::Tcp);
    }

    #[test]
    fn single_contact_any_host_falls_back_to_public_contact_host() {
        let mut headers = sample_headers();
        let local = SipEndpoint::new(TransportProtocol::Udp, Ipv4Addr::new(192, 0, 2, 5).into(), 5060);
        apply_send_fixups(&mut headers, &local, TransportProtocol::Udp, Some("proxy.example.com"), 0);
        let contact = headers.contacts[0].as_address().unwrap();
        assert_eq!(contact.uri.host.to_string(), "proxy.example.com");
    }

    #[test]
    fn content_length_is_set_to_the_body_length() {
        let mut headers = sample_headers();
        let local = SipEndpoint::new(TransportProtocol::Udp, Ipv4Addr::new(192, 0, 2, 5).into(), 5060);
        apply_send_fixups(&mut headers, &local, TransportProtocol::Udp, None, 42);
        assert_eq!(headers.content_length, Some(42));
    }
}
