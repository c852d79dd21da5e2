//! The channel registry and outbound channel selection algorithm
//! (`spec.md` §4.6 "Channel registry", "Outbound channel selection").
//!
//! Copy-on-write per `spec.md` §5 "Shared-resource policy" ("channels are
//! added rarely"): reads clone an `Arc` to the current snapshot; a
//! registration builds a new map and swaps it in, so readers never block a
//! writer and vice versa.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use sip_core::prelude::{ChannelId, SipEndpoint, TransportProtocol};

use crate::channel::SharedChannel;
use crate::error::{Error, Result};

/// Opens a new outbound-only channel when no registered channel can reach a
/// destination and on-demand creation is enabled (`spec.md` §4.6: "UDP:
/// bind 0; TCP/TLS/WS: no listener").
#[async_trait]
pub trait ChannelFactory: Send + Sync {
    async fn create_client_channel(&self, protocol: TransportProtocol) -> Result<SharedChannel>;
}

#[derive(Clone, Default)]
pub struct ChannelRegistry {
    channels: Arc<RwLock<Arc<HashMap<ChannelId, SharedChannel>>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self { channels: Arc::new(RwLock::new(Arc::new(HashMap::new()))) }
    }

    pub async fn register(&self, channel: SharedChannel) -> Result<()> {
        let mut guard = self.channels.write().await;
        if guard.contains_key(channel.id()) {
            return Err(Error::DuplicateChannel(channel.id().clone()));
        }
        let mut next = HashMap::clone(&guard);
        next.insert(channel.id().clone(), channel);
        *guard = Arc::new(next);
        Ok(())
    }

    pub async fn deregister(&self, id: &ChannelId) -> Option<SharedChannel> {
        let mut guard = self.channels.write().await;
        let mut next = HashMap::clone(&guard);
        let removed = next.remove(id);
        *guard = Arc::new(next);
        removed
    }

    pub async fn get(&self, id: &ChannelId) -> Option<SharedChannel> {
        self.channels.read().await.get(id).cloned()
    }

    pub async fn snapshot(&self) -> Arc<HashMap<ChannelId, SharedChannel>> {
        self.channels.read().await.clone()
    }

    pub async fn close_all(&self) {
        let snapshot = self.snapshot().await;
        for channel in snapshot.values() {
            channel.close().await;
        }
    }

    /// Outbound channel selection for `dst`, per `spec.md` §4.6's numbered
    /// preference order. `hint` is typically the channel a request arrived
    /// on, so a response can go back out the same socket.
    pub async fn select(&self, dst: &SipEndpoint, hint: Option<&ChannelId>) -> Option<SharedChannel> {
        let snapshot = self.snapshot().await;
        let candidates: Vec<&SharedChannel> =
            snapshot.values().filter(|c| c.supports(dst.protocol) && !c.is_closed()).collect();
        if candidates.is_empty() {
            return None;
        }

        // 1. Explicit hint, if it supports the protocol.
        if let Some(hint) = hint {
            if let Some(channel) = snapshot.get(hint) {
                if channel.supports(dst.protocol) && !channel.is_closed() {
                    return Some(channel.clone());
                }
            }
        }

        // 2. A channel listening on the "any" address.
        if let Some(channel) = candidates.iter().find(|c| c.local_endpoint().is_any() && same_family(c, dst)) {
            return Some((*channel).clone());
        }

        // 3. A channel whose listening address equals the destination.
        if let Some(channel) = candidates.iter().find(|c| c.local_endpoint().addr == dst.addr) {
            return Some((*channel).clone());
        }

        // 4. A channel bound to the source address the OS would route this
        // destination through.
        if let Some(src) = probe_local_addr(SocketAddr::new(dst.addr, dst.port)).await {
            if let Some(channel) = candidates.iter().find(|c| c.local_endpoint().addr == src) {
                return Some((*channel).clone());
            }
        }

        // 5. The default Internet-bound interface (probed against a
        // well-known public address of the same family as a stand-in for
        // "the interface this host normally egresses through").
        if let Some(src) = probe_local_addr(default_internet_probe_target(dst.addr)).await {
            if let Some(channel) = candidates.iter().find(|c| c.local_endpoint().addr == src) {
                return Some((*channel).clone());
            }
        }

        // 6. Any channel matching protocol + address family.
        candidates.into_iter().find(|c| same_family(c, dst)).cloned()
    }
}

fn same_family(channel: &SharedChannel, dst: &SipEndpoint) -> bool {
    matches!(
        (channel.local_endpoint().addr, dst.addr),
        (IpAddr::V4(_), IpAddr::V4(_)) | (IpAddr::V6(_), IpAddr::V6(_))
    )
}

fn default_internet_probe_target(dst: IpAddr) -> SocketAddr {
    match dst {
        IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(std::net::Ipv4Addr::new(8, 8, 8, 8)), 53),
        IpAddr::V6(_) => SocketAddr::new("2001:4860:4860::8888".parse().unwrap(), 53),
    }
}

/// Asks the OS which local address it would use to route to `dst`, by
/// connecting a UDP socket (no packets are sent; `connect` on a datagram
/// socket is purely a kernel route lookup) and reading back `local_addr`.
async fn probe_local_addr(dst: SocketAddr) -> Option<IpAddr> {
    let bind_addr = match dst {
        SocketAddr::V4(_) => "0.0.0.0:0",
        SocketAddr::V6(_) => "[::]:0",
    };
    let socket = tokio::net::UdpSocket::bind(bind_addr).await.ok()?;
    socket.connect(dst).await.ok()?;
    socket.local_addr().ok().map(|a| a.ip())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::RawInbound;
    use async_trait::async_trait;
    use bytes::Bytes;
    use sip_core::prelude::ConnectionId;
    use std::net::Ipv4Addr;
    use tokio_util::sync::CancellationToken;

    struct FakeChannel {
        id: ChannelId,
        protocol: TransportProtocol,
        local: SipEndpoint,
    }

    #[async_trait]
    impl crate::channel::Channel for FakeChannel {
        fn id(&self) -> &ChannelId {
            &self.id
        }
        fn transport(&self) -> TransportProtocol {
            self.protocol
        }
        fn local_endpoint(&self) -> SipEndpoint {
            self.local.clone()
        }
        async fn send(&self, _dst: SocketAddr, _bytes: Bytes, _cid: Option<ConnectionId>, _cancel: &CancellationToken) -> Result<()> {
            Ok(())
        }
        async fn close(&self) {}
        fn is_closed(&self) -> bool {
            false
        }
    }

    #[allow(dead_code)]
    fn unused(_: RawInbound) {}

    #[tokio::test]
    async fn selects_hinted_channel_when_it_supports_the_protocol() {
        let registry = ChannelRegistry::new();
        let any = Arc::new(FakeChannel {
            id: "any-udp".to_string(),
            protocol: TransportProtocol::Udp,
            local: SipEndpoint::new(TransportProtocol::Udp, Ipv4Addr::UNSPECIFIED.into(), 5060),
        });
        let specific = Arc::new(FakeChannel {
            id: "specific-udp".to_string(),
            protocol: TransportProtocol::Udp,
            local: SipEndpoint::new(TransportProtocol::Udp, Ipv4Addr::new(192, 0, 2, 9).into(), 5060),
        });
        registry.register(any.clone()).await.unwrap();
        registry.register(specific.clone()).await.unwrap();

        let dst = SipEndpoint::new(TransportProtocol::Udp, Ipv4Addr::new(198, 51, 100, 1).into(), 5060);
        let selected = registry.select(&dst, Some(&"specific-udp".to_string())).await.unwrap();
        assert_eq!(selected.id(), "specific-udp");
    }

    #[tokio::test]
    async fn falls_back_to_any_bound_channel_without_a_hint() {
        let registry = ChannelRegistry::new();
        let any = Arc::new(FakeChannel {
            id: "any-udp".to_string(),
            protocol: TransportProtocol::Udp,
            local: SipEndpoint::new(TransportProtocol::Udp, Ipv4Addr::UNSPECIFIED.into(), 5060),
        });
        registry.register(any).await.unwrap();

        let dst = SipEndpoint::new(TransportProtocol::Udp, Ipv4Addr::new(198, 51, 100, 1).into(), 5060);
        let selected = registry.select(&dst, None).await.unwrap();
        assert_eq!(selected.id(), "any-udp");
    }

    #[tokio::test]
    async fn no_candidate_of_the_right_protocol_selects_nothing() {
        let registry = ChannelRegistry::new();
        let tcp = Arc::new(FakeChannel {
            id: "tcp-1".to_string(),
            protocol: TransportProtocol::Tcp,
            local: SipEndpoint::new(TransportProtocol::Tcp, Ipv4Addr::UNSPECIFIED.into(), 5060),
        });
        registry.register(tcp).await.unwrap();

        let dst = SipEndpoint::new(TransportProtocol::Udp, Ipv4Addr::new(198, 51, 100, 1).into(), 5060);
        assert!(registry.select(&dst, None).await.is_none());
    }

    #[tokio::test]
    async fn duplicate_registration_is_an_error() {
        let registry = ChannelRegistry::new();
        let chan = Arc::new(FakeChannel {
            id: "dup".to_string(),
            protocol: TransportProtocol::Udp,
            local: SipEndpoint::new(TransportProtocol::Udp, Ipv4Addr::UNSPECIFIED.into(), 5060),
        });
        registry.register(chan.clone()).await.unwrap();
        assert!(registry.register(chan).await.is_err());
    }
}
