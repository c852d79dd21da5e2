//! The channel contract (`spec.md` §4.6 "Channel registry", §6 "Channel
//! contract").
//!
//! A channel is a concrete listening socket (or, for on-demand client
//! channels, an unbound send path). Implementations are sparse and
//! heterogeneous (UDP/TCP/TLS/WS), so this is a narrow `dyn`-dispatched
//! trait rather than a tagged variant (`spec.md` §9 Design Notes: "channels
//! are behind a small dyn-dispatch trait because they are sparse and
//! heterogeneous").

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use sip_core::prelude::{ChannelId, ConnectionId, SipEndpoint, TransportProtocol};

use crate::error::{Error, Result};

/// One fully parsed inbound datagram or reassembled stream message, handed
/// from a channel to whatever is consuming it (the inbound queue, or the
/// dispatch pipeline directly in stateless mode).
#[derive(Debug, Clone)]
pub struct RawInbound {
    pub channel_id: ChannelId,
    pub local: SipEndpoint,
    pub remote: SipEndpoint,
    pub connection_id: Option<ConnectionId>,
    pub bytes: Bytes,
}

/// Where a channel delivers everything it receives (`spec.md` §6 "Call the
/// transport's inbound handler for every received datagram / reassembled
/// stream message"). Implemented once by [`crate::transport::Transport`];
/// channels only ever see this narrow seam.
#[async_trait]
pub trait InboundSink: Send + Sync {
    async fn on_receive(&self, raw: RawInbound);
}

/// An abstract listening socket. `spec.md` §6: "Expose a stable ID string
/// and a supported-protocol predicate... send/send_secure... close cleanly
/// on shutdown; never raise past the transport boundary."
///
/// Implementations must never let a send/receive error escape as a panic —
/// errors are reported through the `Result` return or, for the receive
/// loop, swallowed after being logged (the transport boundary `spec.md` §6
/// describes).
#[async_trait]
pub trait Channel: Send + Sync {
    fn id(&self) -> &ChannelId;

    fn transport(&self) -> TransportProtocol;

    /// The address(es) this channel is listening on. A bound "any" address
    /// (`0.0.0.0`/`::`) is itself meaningful to channel selection
    /// (`spec.md` §4.6 step 2).
    fn local_endpoint(&self) -> SipEndpoint;

    fn is_connection_oriented(&self) -> bool {
        self.transport().is_connection_oriented()
    }

    fn supports(&self, protocol: TransportProtocol) -> bool {
        self.transport() == protocol
    }

    async fn send(&self, dst: SocketAddr, bytes: Bytes, connection_id: Option<ConnectionId>, cancel: &CancellationToken) -> Result<()>;

    /// TLS send with server-name verification (`spec.md` §6). The default
    /// implementation rejects the call; only secure channels override it.
    async fn send_secure(
        &self,
        _dst: SocketAddr,
        _bytes: Bytes,
        _server_name: &str,
        _connection_id: Option<ConnectionId>,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        Err(Error::NotSecure(self.id().clone()))
    }

    async fn close(&self);

    fn is_closed(&self) -> bool;
}

pub type SharedChannel = Arc<dyn Channel>;
