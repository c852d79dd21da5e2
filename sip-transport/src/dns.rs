//! The DNS collaborator contract (`spec.md` §4.7). DNS resolution itself is
//! out of scope for this stack (`spec.md` §1 "Out of scope"); this module
//! only specifies the two-phase cache/resolve seam the transport's send
//! path calls through.

use async_trait::async_trait;

use sip_core::prelude::{SipEndpoint, Uri};

/// The result of a synchronous cache lookup (`spec.md` §4.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// A usable endpoint was already cached.
    Hit(SipEndpoint),
    /// The name is cached as unresolvable (e.g. NXDOMAIN), distinct from
    /// simply never having been looked up.
    KnownFailure,
    /// No cache entry either way; an async resolve is needed.
    Miss,
}

/// Two-phase DNS lookup consumed by the transport's send path (`spec.md`
/// §4.7). Send paths call [`DnsResolver::resolve_from_cache`] first; on a
/// [`CacheLookup::Miss`] they start [`DnsResolver::resolve`] **without**
/// awaiting it and report "pending" to the caller, counting on a
/// retransmit to retry once the cache is populated (`spec.md` §4.7 "Send
/// paths call the cache first... without awaiting it").
#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// Synchronous cache probe; must never block on network I/O.
    fn resolve_from_cache(&self, uri: &Uri, prefer_ipv6: bool) -> CacheLookup;

    /// Asynchronous resolution; may take seconds. Populates the cache this
    /// resolver's own `resolve_from_cache` reads from — this crate doesn't
    /// prescribe how.
    async fn resolve(&self, uri: &Uri, prefer_ipv6: bool) -> Option<SipEndpoint>;

    /// Blocks on resolution for callers that specifically want to wait
    /// rather than get a "pending" status back (`spec.md` §4.7 "Callers
    /// that specifically want to block on resolution use an explicit wait
    /// variant"). The default implementation is exactly that: check the
    /// cache, then await the resolve.
    async fn resolve_and_wait(&self, uri: &Uri, prefer_ipv6: bool) -> Option<SipEndpoint> {
        match self.resolve_from_cache(uri, prefer_ipv6) {
            CacheLookup::Hit(ep) => Some(ep),
            CacheLookup::KnownFailure => None,
            CacheLookup::Miss => self.resolve(uri, prefer_ipv6).await,
        }
    }
}

/// A resolver that only ever reports what a caller seeded directly —
/// no network I/O, no async resolution. Useful for tests and for
/// deployments where destinations are always already-resolved endpoints
/// (`spec.md` §1: "DNS resolution... treated as an injectable lookup").
#[derive(Debug, Default)]
pub struct StaticResolver;

#[async_trait]
impl DnsResolver for StaticResolver {
    fn resolve_from_cache(&self, uri: &Uri, _prefer_ipv6: bool) -> CacheLookup {
        match uri.host.to_string().parse::<std::net::IpAddr>() {
            Ok(addr) => {
                let protocol = uri
                    .transport()
                    .and_then(|t| t.parse().ok())
                    .unwrap_or(sip_core::prelude::TransportProtocol::Udp);
                let port = uri.port.unwrap_or_else(|| protocol.default_port());
                CacheLookup::Hit(SipEndpoint::new(protocol, addr, port))
            }
            Err(_) => CacheLookup::KnownFailure,
        }
    }

    async fn resolve(&self, _uri: &Uri, _prefer_ipv6: bool) -> Option<SipEndpoint> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_resolver_hits_on_literal_ip() {
        let resolver = StaticResolver;
        let uri: Uri = "sip:192.0.2.1:5060".parse().unwrap();
        assert!(matches!(resolver.resolve_from_cache(&uri, false), CacheLookup::Hit(_)));
    }

    #[tokio::test]
    async fn static_resolver_reports_known_failure_for_hostnames() {
        let resolver = StaticResolver;
        let uri: Uri = "sip:bob@atlanta.example.com".parse().unwrap();
        assert!(matches!(resolver.resolve_from_cache(&uri, false), CacheLookup::KnownFailure));
    }
}
