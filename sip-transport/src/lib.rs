//! Multi-transport channel registry, inbound dispatch pipeline and
//! outbound send-path fixups (`spec.md` §4.6-§4.7, §6).
//!
//! This crate wires `sip-core`'s message model and `sip-transaction`'s
//! engine together: [`transport::Transport`] owns the channel registry, the
//! bounded inbound queue, the dispatch pipeline and the DNS/STUN
//! collaborator seams, and drives the transaction engine's retransmit
//! scheduler against the channels it registers. Concrete socket channels
//! (UDP/TCP/TLS/WS) are out of scope (`spec.md` §1); callers implement
//! [`channel::Channel`] themselves.
//!
//! ```
//! use sip_transport::prelude::*;
//!
//! let config = TransportConfig::default();
//! let counters = TransportCounters::default();
//! ```

pub mod channel;
pub mod config;
pub mod dispatch;
pub mod dns;
pub mod error;
pub mod fixup;
pub mod observer;
pub mod queue;
pub mod registry;
pub mod route;
pub mod stun;
pub mod transport;

pub use error::{Error, Result};

/// Re-exports the types most call sites need, mirroring `sip-core` and
/// `sip-transaction`'s `prelude` convention.
pub mod prelude {
    pub use crate::channel::{Channel, InboundSink, RawInbound, SharedChannel};
    pub use crate::config::TransportConfig;
    pub use crate::dispatch::{dispatch_inbound, DispatchContext, DispatchResult};
    pub use crate::dns::{CacheLookup, DnsResolver, StaticResolver};
    pub use crate::error::{Error, Result};
    pub use crate::fixup::apply_send_fixups;
    pub use crate::observer::{Observer, TransportCounters, TransportCountersSnapshot};
    pub use crate::queue::InboundQueue;
    pub use crate::registry::{ChannelFactory, ChannelRegistry};
    pub use crate::route::{next_hop_uri, preprocess_route};
    pub use crate::stun::StunSink;
    pub use crate::transport::Transport;
}
